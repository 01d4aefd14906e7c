//! Detected faces before and after coordinate mapping.

use anaface_models::{FaceRecord, RelativeBbox, KEYPOINT_COUNT};

/// A detection in square-surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteFace {
    pub score: f32,
    /// `[x1, y1, x2, y2]` in surface pixels
    pub bbox: [f32; 4],
    pub keypoints: [[f32; 2]; KEYPOINT_COUNT],
}

impl AbsoluteFace {
    pub fn width(&self) -> f32 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; zero when the boxes do not overlap.
    pub fn iou(&self, other: &AbsoluteFace) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);

        let inter_w = (x2 - x1).max(0.0);
        let inter_h = (y2 - y1).max(0.0);
        let intersection = inter_w * inter_h;
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// A detection in the resolution-independent coordinate system.
///
/// Immutable once built by the coordinate mapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeFace {
    score: f32,
    bbox: RelativeBbox,
    keypoints: [[f32; 2]; KEYPOINT_COUNT],
}

impl RelativeFace {
    pub(crate) fn new(score: f32, bbox: RelativeBbox, keypoints: [[f32; 2]; KEYPOINT_COUNT]) -> Self {
        Self {
            score,
            bbox,
            keypoints,
        }
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn bbox(&self) -> RelativeBbox {
        self.bbox
    }

    /// Landmarks, still in surface pixels.
    pub fn keypoints(&self) -> &[[f32; 2]; KEYPOINT_COUNT] {
        &self.keypoints
    }
}

impl From<RelativeFace> for FaceRecord {
    fn from(face: RelativeFace) -> Self {
        let mut keypoints = [0.0f32; KEYPOINT_COUNT * 2];
        for (slot, [x, y]) in keypoints.chunks_exact_mut(2).zip(face.keypoints) {
            slot[0] = x;
            slot[1] = y;
        }
        FaceRecord {
            score: face.score,
            bbox: face.bbox,
            keypoints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(bbox: [f32; 4]) -> AbsoluteFace {
        AbsoluteFace {
            score: 1.0,
            bbox,
            keypoints: [[0.0; 2]; KEYPOINT_COUNT],
        }
    }

    #[test]
    fn test_iou() {
        let a = boxed([0.0, 0.0, 10.0, 10.0]);
        let b = boxed([5.0, 0.0, 15.0, 10.0]);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = boxed([0.0, 0.0, 10.0, 10.0]);
        let b = boxed([20.0, 20.0, 30.0, 30.0]);
        assert_eq!(a.iou(&b), 0.0);
        // touching edges
        let c = boxed([10.0, 0.0, 20.0, 10.0]);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_record_flattens_keypoints() {
        let face = RelativeFace::new(
            0.7,
            RelativeBbox::new([0.1, 0.2, 0.3, 0.4]),
            [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0], [9.0, 10.0]],
        );
        let record = FaceRecord::from(face);
        assert_eq!(record.score, 0.7);
        assert_eq!(record.keypoints, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(record.bbox.values(), [0.1, 0.2, 0.3, 0.4]);
    }
}
