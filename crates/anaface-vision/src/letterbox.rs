//! Letterboxing an arbitrary image onto the square surface.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba};
use tracing::trace;

use crate::error::{VisionError, VisionResult};
use crate::scale::{ScaleInfo, ScaleTracker};
use crate::surface::Surface;

/// Opaque black, the letterbox fill.
pub const DEFAULT_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Paints images onto a square [`Surface`] without distorting aspect ratio.
///
/// The surface is filled with the background first, then the image is drawn
/// at the origin scaled by `factor`. Whatever the image does not cover stays
/// background. The surface is mutated in place; nothing is reallocated.
#[derive(Debug, Clone)]
pub struct FrameProcessor {
    tracker: ScaleTracker,
    background: Rgba<u8>,
    filter: FilterType,
}

impl FrameProcessor {
    pub fn new(size: u32) -> Self {
        Self {
            tracker: ScaleTracker::new(size),
            background: DEFAULT_BACKGROUND,
            filter: FilterType::Triangle,
        }
    }

    /// Override the letterbox fill colour.
    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self
    }

    /// Override the resampling filter used when shrinking.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn size(&self) -> u32 {
        self.tracker.size()
    }

    /// Compute scale info for `image` without touching the surface.
    pub fn scale_for(&self, image: &DynamicImage) -> VisionResult<ScaleInfo> {
        let (w, h) = image.dimensions();
        self.tracker.track(w, h)
    }

    /// Letterbox `image` onto `surface` and return the scale that was used.
    pub fn paint(&self, surface: &mut Surface, image: &DynamicImage) -> VisionResult<ScaleInfo> {
        let side = surface.side()?;
        if side != self.size() {
            return Err(VisionError::internal(format!(
                "surface side {} does not match frame size {}",
                side,
                self.size()
            )));
        }

        let scale = self.scale_for(image)?;
        surface.fill(self.background);

        let (draw_w, draw_h) = scale.scaled_extent();
        trace!(
            image_width = scale.image_width,
            image_height = scale.image_height,
            draw_width = draw_w,
            draw_height = draw_h,
            factor = scale.factor,
            "Letterboxing frame"
        );

        if scale.is_identity() {
            imageops::overlay(surface.canvas_mut(), &image.to_rgba8(), 0, 0);
        } else {
            let resized = image.resize_exact(draw_w, draw_h, self.filter).to_rgba8();
            imageops::overlay(surface.canvas_mut(), &resized, 0, 0);
        }

        Ok(scale)
    }
}
