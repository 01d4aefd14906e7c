//! Surface-space detections to relative coordinates.
//!
//! The box mapping normalizes by the rendered (post-scale) extent:
//!
//! ```text
//! x1' = x1 / rh
//! y1' = y1 * rw / rh / rh
//! x2' = x2 / rh
//! y2' = y2 * rw / rh / rh
//! ```
//!
//! x is normalized by height only and y picks up an extra `rw / rh`. Consumers
//! invert this with [`RelativeBbox::for_size`] using the same extent, so the
//! asymmetry is part of the contract. Keypoints are passed through unchanged.

use anaface_models::RelativeBbox;

use crate::face::{AbsoluteFace, RelativeFace};
use crate::scale::ScaleInfo;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    rendered_width: f32,
    rendered_height: f32,
}

impl CoordinateMapper {
    pub fn new(rendered_width: f32, rendered_height: f32) -> Self {
        Self {
            rendered_width,
            rendered_height,
        }
    }

    /// Mapper for the extent an image was drawn at.
    pub fn from_scale(scale: &ScaleInfo) -> Self {
        Self::new(scale.rendered_width(), scale.rendered_height())
    }

    pub fn rendered_width(&self) -> f32 {
        self.rendered_width
    }

    pub fn rendered_height(&self) -> f32 {
        self.rendered_height
    }

    pub fn map_bbox(&self, bbox: [f32; 4]) -> RelativeBbox {
        let (rw, rh) = (self.rendered_width, self.rendered_height);
        let [x1, y1, x2, y2] = bbox;
        RelativeBbox::new([x1 / rh, y1 * rw / rh / rh, x2 / rh, y2 * rw / rh / rh])
    }

    pub fn to_relative(&self, face: &AbsoluteFace) -> RelativeFace {
        RelativeFace::new(face.score, self.map_bbox(face.bbox), face.keypoints)
    }

    pub fn map_all(&self, faces: &[AbsoluteFace]) -> Vec<RelativeFace> {
        faces.iter().map(|f| self.to_relative(f)).collect()
    }
}
