//! Face records as they cross the worker boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of landmark pairs carried with every face.
pub const KEYPOINT_COUNT: usize = 5;

/// Bounding box in the worker's relative coordinate system.
///
/// The four values are `[x1, y1, x2, y2]` as produced by the worker's
/// coordinate mapper, which normalizes x by the rendered height and scales y
/// by `width / height^2`. `for_size` multiplies x by width and y by height,
/// so it only recovers pixel coordinates exactly for a square rendered
/// extent. For other sizes x keeps true proportions only when width is close
/// to height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RelativeBbox(pub [f32; 4]);

impl RelativeBbox {
    /// Create a relative bbox from `[x1, y1, x2, y2]`.
    pub fn new(values: [f32; 4]) -> Self {
        Self(values)
    }

    /// Scale back to pixel coordinates for a target of `width` x `height`.
    pub fn for_size(&self, width: f32, height: f32) -> [f32; 4] {
        let [x1, y1, x2, y2] = self.0;
        [x1 * width, y1 * height, x2 * width, y2 * height]
    }

    /// Raw relative values.
    pub fn values(&self) -> [f32; 4] {
        self.0
    }
}

/// One detected face in a `faces` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceRecord {
    /// Detection confidence in [0, 1]
    pub score: f32,
    /// Relative bounding box `[x1, y1, x2, y2]`
    pub bbox: RelativeBbox,
    /// Five landmark pairs, flattened as `[x0, y0, x1, y1, ...]`.
    /// These stay in surface pixel space.
    pub keypoints: [f32; KEYPOINT_COUNT * 2],
}

impl FaceRecord {
    /// Landmarks as `(x, y)` pairs.
    pub fn keypoint_pairs(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.keypoints.chunks_exact(2).map(|p| (p[0], p[1]))
    }
}
