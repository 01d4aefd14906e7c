//! Turning protocol lines into router commands.
//!
//! The host side owns decoding: it validates and allocates the surface for
//! `init` and decodes the image for `analyze`, then moves both into the command.

use std::path::Path;

use anaface_models::{ModelsError, WireCommand};
use anaface_vision::Surface;

use tracing::debug;

use crate::router::Command;

/// Build a command from one protocol line.
///
/// Returns `None` for blank lines. Anything unparseable becomes
/// [`Command::Unrecognized`] so the router can reject it in order.
pub async fn command_from_line(line: &str, surface_size: u32) -> Option<Command> {
    match WireCommand::parse(line) {
        Ok(wire) => Some(command_from_wire(wire, surface_size).await),
        Err(ModelsError::EmptyCommand) => None,
        Err(ModelsError::UnknownCommand { raw, reason }) => {
            Some(Command::Unrecognized { raw, reason })
        }
        Err(e) => Some(Command::Unrecognized {
            raw: line.trim().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Materialize the payload a wire command describes.
pub async fn command_from_wire(wire: WireCommand, surface_size: u32) -> Command {
    match wire {
        WireCommand::Init { width, height } => {
            let width = width.unwrap_or(surface_size);
            let height = height.unwrap_or(surface_size);
            match Surface::try_new(width, height) {
                Ok(surface) => Command::Init { surface },
                Err(error) => {
                    debug!(width, height, error = %error, "Refusing surface allocation");
                    Command::RejectedInit {
                        width,
                        height,
                        error,
                    }
                }
            }
        }
        WireCommand::Analyze { path } => decode_image(path).await,
    }
}

async fn decode_image(path: String) -> Command {
    let source = path.clone();
    let decoded =
        tokio::task::spawn_blocking(move || image::open(Path::new(&path))).await;

    match decoded {
        Ok(Ok(image)) => {
            debug!(path = %source, width = image.width(), height = image.height(), "Decoded image");
            Command::Analyze { image }
        }
        Ok(Err(e)) => Command::Undecodable {
            source,
            reason: e.to_string(),
        },
        Err(e) => Command::Undecodable {
            source,
            reason: format!("decode task failed: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anaface_vision::VisionError;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn test_blank_line_is_skipped() {
        assert!(command_from_line("   ", 640).await.is_none());
    }

    #[tokio::test]
    async fn test_bare_init_uses_configured_size() {
        match command_from_line(r#"{"cmd":"init"}"#, 320).await {
            Some(Command::Init { surface }) => {
                assert_eq!((surface.width(), surface.height()), (320, 320));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_explicit_init_dimensions_are_kept() {
        match command_from_line(r#"{"cmd":"init","width":320,"height":320}"#, 640).await {
            Some(Command::Init { surface }) => {
                assert_eq!((surface.width(), surface.height()), (320, 320));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_square_init_is_rejected_before_allocation() {
        match command_from_line(r#"{"cmd":"init","width":500,"height":400}"#, 640).await {
            Some(Command::RejectedInit {
                width,
                height,
                error,
            }) => {
                assert_eq!((width, height), (500, 400));
                assert!(matches!(error, VisionError::NonSquareSurface { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_init_is_rejected_not_allocated() {
        let line = r#"{"cmd":"init","width":4294967295,"height":4294967295}"#;
        match command_from_line(line, 640).await {
            Some(Command::RejectedInit { error, .. }) => {
                assert!(matches!(error, VisionError::InvalidSurface(_)));
            }
            other => panic!("unexpected {:?}", other),
        }

        let line = r#"{"cmd":"init","width":4294967295,"height":1}"#;
        assert!(matches!(
            command_from_line(line, 640).await,
            Some(Command::RejectedInit { .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_is_unrecognized() {
        let cmd = command_from_line("{\"cmd\":\"explode\"}", 640).await;
        assert!(matches!(cmd, Some(Command::Unrecognized { .. })));
    }

    #[tokio::test]
    async fn test_analyze_decodes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(12, 8, Rgb([1, 2, 3])).save(&path).unwrap();

        let line = format!(r#"{{"cmd":"analyze","path":"{}"}}"#, path.display());
        match command_from_line(&line, 640).await {
            Some(Command::Analyze { image }) => {
                assert_eq!((image.width(), image.height()), (12, 8));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_undecodable() {
        let line = r#"{"cmd":"analyze","path":"/no/such/image.png"}"#;
        assert!(matches!(
            command_from_line(line, 640).await,
            Some(Command::Undecodable { .. })
        ));
    }
}
