//! Downscale factor and detector calibration for one analyze call.
//!
//! The network always sees an `S`x`S` frame. Images larger than the frame are
//! shrunk uniformly so the longer side fits; smaller images are drawn as-is.
//! The pipeline never upscales, so `factor <= 1` always holds.
//!
//! The calibration pair `(calib_width, calib_height)` and the derived
//! `det_scale` follow the detector's anchor-decoding convention:
//!
//! ```text
//! ratio = width / height
//! ratio > 1  =>  (S / ratio, S)
//! otherwise  =>  (S, S * ratio)
//! det_scale  =   calib_height / calib_width
//! ```
//!
//! This pair is a fixed contract with the detector, not a function of `factor`.

use crate::error::{VisionError, VisionResult};

/// Default square frame side.
pub const DEFAULT_SURFACE_SIZE: u32 = 640;

/// Per-call scale metadata. Not persisted across calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleInfo {
    /// Original image width in pixels
    pub image_width: u32,
    /// Original image height in pixels
    pub image_height: u32,
    /// Side of the square frame
    pub size: u32,
    /// Uniform downscale factor, always in (0, 1]
    pub factor: f32,
    /// Calibration width handed to the detector
    pub calib_width: f32,
    /// Calibration height handed to the detector
    pub calib_height: f32,
    /// `calib_height / calib_width`
    pub det_scale: f32,
}

impl ScaleInfo {
    /// Width of the image once drawn onto the frame.
    #[inline]
    pub fn rendered_width(&self) -> f32 {
        self.image_width as f32 * self.factor
    }

    /// Height of the image once drawn onto the frame.
    #[inline]
    pub fn rendered_height(&self) -> f32 {
        self.image_height as f32 * self.factor
    }

    /// Whole-pixel extent used when drawing, clamped to the frame.
    pub fn scaled_extent(&self) -> (u32, u32) {
        let w = (self.rendered_width().round() as u32).clamp(1, self.size);
        let h = (self.rendered_height().round() as u32).clamp(1, self.size);
        (w, h)
    }

    /// True when the image is drawn without resampling.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.factor >= 1.0
    }
}

/// Computes [`ScaleInfo`] for a fixed square frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleTracker {
    size: u32,
}

impl ScaleTracker {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Compute scale metadata for an image of `width` x `height`.
    pub fn track(&self, width: u32, height: u32) -> VisionResult<ScaleInfo> {
        if width == 0 || height == 0 {
            return Err(VisionError::invalid_image(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }
        if self.size == 0 {
            return Err(VisionError::internal("frame size is zero"));
        }

        let s = self.size as f32;
        let (w, h) = (width as f32, height as f32);

        let factor = (s / w).min(s / h).min(1.0);

        let ratio = w / h;
        let (calib_width, calib_height) = if ratio > 1.0 {
            (s / ratio, s)
        } else {
            (s, s * ratio)
        };

        Ok(ScaleInfo {
            image_width: width,
            image_height: height,
            size: self.size,
            factor,
            calib_width,
            calib_height,
            det_scale: calib_height / calib_width,
        })
    }
}

impl Default for ScaleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SURFACE_SIZE)
    }
}
