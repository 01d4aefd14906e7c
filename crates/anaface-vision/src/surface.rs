//! The square rendering surface owned by the worker.

use image::{Rgba, RgbaImage};

use crate::error::{VisionError, VisionResult};
use crate::retinaface::MAX_STRIDE;

/// Largest surface side accepted from a host.
pub const MAX_SURFACE_SIDE: u32 = 4096;

/// Check `width` x `height` can back a detection pipeline, without allocating.
///
/// The surface must be square, non-empty, at most [`MAX_SURFACE_SIDE`] and a
/// multiple of the coarsest detector stride. Returns the side.
pub fn check_dimensions(width: u32, height: u32) -> VisionResult<u32> {
    if width != height {
        return Err(VisionError::NonSquareSurface { width, height });
    }
    let side = width;
    if side == 0 {
        return Err(VisionError::invalid_surface("surface has no pixels"));
    }
    if side > MAX_SURFACE_SIDE {
        return Err(VisionError::invalid_surface(format!(
            "surface side {} exceeds maximum {}",
            side, MAX_SURFACE_SIDE
        )));
    }
    if side % MAX_STRIDE != 0 {
        return Err(VisionError::invalid_surface(format!(
            "surface side {} is not a multiple of {}",
            side, MAX_STRIDE
        )));
    }
    Ok(side)
}

/// RGBA8 drawing target the frame processor paints into.
///
/// Moved into the worker at `init` and reused for every analyze call.
/// Not `Clone`: a surface has exactly one owner.
#[derive(Debug)]
pub struct Surface {
    canvas: RgbaImage,
}

impl Surface {
    /// Allocate a surface of `width` x `height`, filled with transparent black.
    ///
    /// Panics if the buffer size overflows; use [`Surface::try_new`] for
    /// untrusted dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    /// Validate with [`check_dimensions`], then allocate.
    pub fn try_new(width: u32, height: u32) -> VisionResult<Self> {
        check_dimensions(width, height)?;
        Ok(Self::new(width, height))
    }

    /// Allocate a square surface.
    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn is_square(&self) -> bool {
        self.width() == self.height()
    }

    /// Side length, or an error if the surface is not square.
    pub fn side(&self) -> VisionResult<u32> {
        if self.is_square() {
            Ok(self.width())
        } else {
            Err(VisionError::NonSquareSurface {
                width: self.width(),
                height: self.height(),
            })
        }
    }

    /// Side length if this surface can back a detection pipeline.
    pub fn validate(&self) -> VisionResult<u32> {
        check_dimensions(self.width(), self.height())
    }

    /// Paint every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.canvas.pixels_mut() {
            *px = color;
        }
    }

    /// Row-major RGBA bytes, four per pixel.
    pub fn pixels(&self) -> &[u8] {
        self.canvas.as_raw()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut RgbaImage {
        &mut self.canvas
    }
}

impl From<RgbaImage> for Surface {
    fn from(canvas: RgbaImage) -> Self {
        Self { canvas }
    }
}
