//! Anchor-based decoding of the detection network's nine output heads.
//!
//! The network predicts, at strides 8, 16 and 32, one score, four box
//! distances and ten keypoint offsets per anchor, with two anchors per grid
//! cell. Heads arrive positionally as `score@8,16,32`, `bbox@8,16,32`,
//! `kps@8,16,32`.

use std::collections::HashMap;

use anaface_models::KEYPOINT_COUNT;
use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::trace;

use crate::error::{VisionError, VisionResult};
use crate::face::AbsoluteFace;

/// Feature-map strides, one per detection level.
pub const STRIDES: [u32; 3] = [8, 16, 32];
/// Coarsest stride; the input side must be a multiple of it.
pub const MAX_STRIDE: u32 = 32;
/// Anchors stacked on every grid cell.
pub const ANCHORS_PER_CELL: usize = 2;
/// Output tensors the network produces.
pub const HEAD_COUNT: usize = STRIDES.len() * 3;

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

/// Number of anchors at `stride` for a `size`x`size` input.
pub fn anchor_count(size: u32, stride: u32) -> usize {
    let cells = (size / stride) as usize;
    cells * cells * ANCHORS_PER_CELL
}

/// The nine raw output tensors of one inference call, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionHeads {
    heads: Vec<Vec<f32>>,
}

impl DetectionHeads {
    /// Wrap outputs given in network order.
    pub fn new(heads: Vec<Vec<f32>>) -> VisionResult<Self> {
        if heads.len() != HEAD_COUNT {
            return Err(VisionError::inference_failed(format!(
                "expected {} output heads, got {}",
                HEAD_COUNT,
                heads.len()
            )));
        }
        Ok(Self { heads })
    }

    /// All-zero heads sized for a `size`x`size` input.
    pub fn zeroed(size: u32) -> Self {
        let mut heads = Vec::with_capacity(HEAD_COUNT);
        for width in [1usize, 4, KEYPOINT_COUNT * 2] {
            for stride in STRIDES {
                heads.push(vec![0.0; anchor_count(size, stride) * width]);
            }
        }
        Self { heads }
    }

    pub fn score(&self, level: usize) -> &[f32] {
        &self.heads[level]
    }

    pub fn bbox(&self, level: usize) -> &[f32] {
        &self.heads[STRIDES.len() + level]
    }

    pub fn kps(&self, level: usize) -> &[f32] {
        &self.heads[2 * STRIDES.len() + level]
    }

    pub fn score_mut(&mut self, level: usize) -> &mut [f32] {
        &mut self.heads[level]
    }

    pub fn bbox_mut(&mut self, level: usize) -> &mut [f32] {
        &mut self.heads[STRIDES.len() + level]
    }

    pub fn kps_mut(&mut self, level: usize) -> &mut [f32] {
        &mut self.heads[2 * STRIDES.len() + level]
    }
}

/// Inputs to one detector call besides the heads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Side of the square network input
    pub size: u32,
    /// Aspect-ratio calibration from the scale tracker
    pub det_scale: f32,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl DetectParams {
    pub fn new(size: u32, det_scale: f32) -> Self {
        Self {
            size,
            det_scale,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        }
    }

    pub fn with_thresholds(mut self, score_threshold: f32, nms_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self.nms_threshold = nms_threshold;
        self
    }
}

/// Turns raw network heads into faces in surface pixel space.
///
/// The pipeline treats implementations as opaque.
pub trait FaceDetector: Send {
    /// Decode, threshold and suppress. Results are sorted by score, best first.
    fn detect(
        &mut self,
        heads: &DetectionHeads,
        params: &DetectParams,
    ) -> VisionResult<Vec<AbsoluteFace>>;

    /// Detector name for logs.
    fn name(&self) -> &'static str;
}

/// RetinaFace/SCRFD head decoder.
#[derive(Debug, Default)]
pub struct RetinaFaceDetector {
    anchors: HashMap<(u32, u32), Array2<f32>>,
}

impl RetinaFaceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn anchor_centers(&mut self, size: u32, stride: u32) -> &Array2<f32> {
        self.anchors.entry((size, stride)).or_insert_with(|| {
            let cells = (size / stride) as usize;
            let n = anchor_count(size, stride);
            Array2::from_shape_fn((n, 2), |(k, axis)| {
                let cell = k / ANCHORS_PER_CELL;
                let coord = if axis == 0 { cell % cells } else { cell / cells };
                (coord as u32 * stride) as f32
            })
        })
    }

    fn decode_level(
        &mut self,
        level: usize,
        heads: &DetectionHeads,
        params: &DetectParams,
        out: &mut Vec<AbsoluteFace>,
    ) -> VisionResult<()> {
        let stride = STRIDES[level];
        let n = anchor_count(params.size, stride);

        let scores = ArrayView1::from(heads.score(level));
        if scores.len() != n {
            return Err(VisionError::inference_failed(format!(
                "score head at stride {} holds {} values, expected {}",
                stride,
                scores.len(),
                n
            )));
        }
        let boxes = ArrayView2::from_shape((n, 4), heads.bbox(level)).map_err(|e| {
            VisionError::inference_failed(format!("bbox head at stride {}: {}", stride, e))
        })?;
        let kps = ArrayView2::from_shape((n, KEYPOINT_COUNT * 2), heads.kps(level)).map_err(
            |e| VisionError::inference_failed(format!("kps head at stride {}: {}", stride, e)),
        )?;

        let s = stride as f32;
        let scale = params.det_scale;
        let anchors = self.anchor_centers(params.size, stride);

        for (k, &score) in scores.iter().enumerate() {
            if score.is_nan() || score < params.score_threshold {
                continue;
            }
            let (cx, cy) = (anchors[[k, 0]], anchors[[k, 1]]);
            let d = boxes.row(k);
            let bbox = [
                (cx - d[0] * s) / scale,
                (cy - d[1] * s) / scale,
                (cx + d[2] * s) / scale,
                (cy + d[3] * s) / scale,
            ];

            let offsets = kps.row(k);
            let mut keypoints = [[0.0f32; 2]; KEYPOINT_COUNT];
            for (j, point) in keypoints.iter_mut().enumerate() {
                point[0] = (cx + offsets[2 * j] * s) / scale;
                point[1] = (cy + offsets[2 * j + 1] * s) / scale;
            }

            out.push(AbsoluteFace {
                score,
                bbox,
                keypoints,
            });
        }
        Ok(())
    }
}

impl FaceDetector for RetinaFaceDetector {
    fn detect(
        &mut self,
        heads: &DetectionHeads,
        params: &DetectParams,
    ) -> VisionResult<Vec<AbsoluteFace>> {
        if params.det_scale <= 0.0 || !params.det_scale.is_finite() {
            return Err(VisionError::detection_failed(format!(
                "invalid det_scale {}",
                params.det_scale
            )));
        }

        let mut candidates = Vec::new();
        for level in 0..STRIDES.len() {
            self.decode_level(level, heads, params, &mut candidates)?;
        }

        // Stable, so equal scores keep level order.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        let total = candidates.len();
        let kept = non_max_suppression(candidates, params.nms_threshold);

        trace!(candidates = total, kept = kept.len(), "Decoded detection heads");
        Ok(kept)
    }

    fn name(&self) -> &'static str {
        "retinaface"
    }
}

/// Greedy NMS over score-sorted faces: a face survives if its IoU with every
/// face kept before it is at most `threshold`.
pub fn non_max_suppression(sorted: Vec<AbsoluteFace>, threshold: f32) -> Vec<AbsoluteFace> {
    let mut keep: Vec<AbsoluteFace> = Vec::with_capacity(sorted.len().min(64));
    for face in sorted {
        if keep.iter().all(|k| k.iou(&face) <= threshold) {
            keep.push(face);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u32 = 32;

    /// Place one anchor's predictions in the given level.
    fn set_anchor(
        heads: &mut DetectionHeads,
        level: usize,
        k: usize,
        score: f32,
        bbox: [f32; 4],
        kps: [f32; 10],
    ) {
        heads.score_mut(level)[k] = score;
        heads.bbox_mut(level)[k * 4..k * 4 + 4].copy_from_slice(&bbox);
        heads.kps_mut(level)[k * 10..k * 10 + 10].copy_from_slice(&kps);
    }

    #[test]
    fn test_anchor_counts() {
        assert_eq!(anchor_count(640, 8), 12800);
        assert_eq!(anchor_count(640, 16), 3200);
        assert_eq!(anchor_count(640, 32), 800);
    }

    #[test]
    fn test_heads_require_nine_outputs() {
        assert!(DetectionHeads::new(vec![vec![]; 8]).is_err());
        assert!(DetectionHeads::new(vec![vec![]; 9]).is_ok());
    }

    #[test]
    fn test_decodes_single_anchor() {
        let mut heads = DetectionHeads::zeroed(SIZE);
        // level 0: 4x4 grid; anchor 10 -> cell 5 -> (1, 1) -> centre (8, 8)
        set_anchor(
            &mut heads,
            0,
            10,
            0.9,
            [1.0, 1.0, 1.0, 1.0],
            [0.5, 0.0, 0.0, 0.5, 1.0, 1.0, -1.0, 0.0, 0.0, -1.0],
        );

        let mut detector = RetinaFaceDetector::new();
        let faces = detector
            .detect(&heads, &DetectParams::new(SIZE, 1.0))
            .unwrap();

        assert_eq!(faces.len(), 1);
        let face = &faces[0];
        assert_eq!(face.score, 0.9);
        assert_eq!(face.bbox, [0.0, 0.0, 16.0, 16.0]);
        assert_eq!(face.keypoints[0], [12.0, 8.0]);
        assert_eq!(face.keypoints[1], [8.0, 12.0]);
        assert_eq!(face.keypoints[2], [16.0, 16.0]);
        assert_eq!(face.keypoints[3], [0.0, 8.0]);
        assert_eq!(face.keypoints[4], [8.0, 0.0]);
    }

    #[test]
    fn test_det_scale_divides_boxes_and_keypoints() {
        let mut heads = DetectionHeads::zeroed(SIZE);
        set_anchor(&mut heads, 0, 10, 0.9, [1.0; 4], [0.0; 10]);

        let mut detector = RetinaFaceDetector::new();
        let faces = detector
            .detect(&heads, &DetectParams::new(SIZE, 2.0))
            .unwrap();
        assert_eq!(faces[0].bbox, [0.0, 0.0, 8.0, 8.0]);
        assert_eq!(faces[0].keypoints[0], [4.0, 4.0]);
    }

    #[test]
    fn test_score_threshold_is_inclusive() {
        let mut heads = DetectionHeads::zeroed(SIZE);
        set_anchor(&mut heads, 1, 0, 0.5, [1.0; 4], [0.0; 10]);
        set_anchor(&mut heads, 2, 0, 0.49, [1.0; 4], [0.0; 10]);

        let mut detector = RetinaFaceDetector::new();
        let faces = detector
            .detect(&heads, &DetectParams::new(SIZE, 1.0))
            .unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].score, 0.5);
    }

    #[test]
    fn test_nan_scores_are_dropped() {
        let mut heads = DetectionHeads::zeroed(SIZE);
        set_anchor(&mut heads, 0, 10, f32::NAN, [1.0; 4], [0.0; 10]);
        set_anchor(&mut heads, 1, 0, 0.8, [1.0; 4], [0.0; 10]);

        let mut detector = RetinaFaceDetector::new();
        let faces = detector
            .detect(&heads, &DetectParams::new(SIZE, 1.0))
            .unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].score, 0.8);
    }

    #[test]
    fn test_max_stride_is_last_level() {
        assert_eq!(STRIDES.last(), Some(&MAX_STRIDE));
    }

    #[test]
    fn test_nms_drops_overlapping_lower_score() {
        let mut heads = DetectionHeads::zeroed(SIZE);
        // Same cell, both anchors, identical boxes.
        set_anchor(&mut heads, 0, 10, 0.7, [1.0; 4], [0.0; 10]);
        set_anchor(&mut heads, 0, 11, 0.95, [1.0; 4], [0.0; 10]);
        // A far-away box survives.
        set_anchor(&mut heads, 0, 30, 0.6, [0.5; 4], [0.0; 10]);

        let mut detector = RetinaFaceDetector::new();
        let faces = detector
            .detect(&heads, &DetectParams::new(SIZE, 1.0))
            .unwrap();
        let scores: Vec<f32> = faces.iter().map(|f| f.score).collect();
        assert_eq!(scores, vec![0.95, 0.6]);
    }

    #[test]
    fn test_results_sorted_across_levels() {
        let mut heads = DetectionHeads::zeroed(SIZE);
        set_anchor(&mut heads, 0, 0, 0.6, [0.1; 4], [0.0; 10]);
        set_anchor(&mut heads, 2, 1, 0.8, [0.1; 4], [0.0; 10]);
        set_anchor(&mut heads, 1, 7, 0.7, [0.1; 4], [0.0; 10]);

        let mut detector = RetinaFaceDetector::new();
        let faces = detector
            .detect(&heads, &DetectParams::new(SIZE, 1.0))
            .unwrap();
        let scores: Vec<f32> = faces.iter().map(|f| f.score).collect();
        assert_eq!(scores, vec![0.8, 0.7, 0.6]);
    }

    #[test]
    fn test_head_length_mismatch_is_an_error() {
        let heads = DetectionHeads::zeroed(64);
        let mut detector = RetinaFaceDetector::new();
        let err = detector
            .detect(&heads, &DetectParams::new(SIZE, 1.0))
            .unwrap_err();
        assert!(matches!(err, VisionError::InferenceFailed(_)));
    }

    #[test]
    fn test_anchor_cache_is_reused() {
        let heads = DetectionHeads::zeroed(SIZE);
        let mut detector = RetinaFaceDetector::new();
        let params = DetectParams::new(SIZE, 1.0);
        detector.detect(&heads, &params).unwrap();
        detector.detect(&heads, &params).unwrap();
        assert_eq!(detector.anchors.len(), STRIDES.len());
    }
}
