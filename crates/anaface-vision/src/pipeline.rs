//! One analyze call, end to end.

use image::DynamicImage;
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::face::RelativeFace;
use crate::letterbox::FrameProcessor;
use crate::mapping::CoordinateMapper;
use crate::retinaface::{
    DetectParams, FaceDetector, DEFAULT_NMS_THRESHOLD, DEFAULT_SCORE_THRESHOLD,
};
use crate::session::InferenceSession;
use crate::stage::{stages, StageTimer};
use crate::surface::Surface;
use crate::tensor::TensorEncoder;

/// Detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub score: f32,
    pub nms: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            score: DEFAULT_SCORE_THRESHOLD,
            nms: DEFAULT_NMS_THRESHOLD,
        }
    }
}

/// Everything an analyze call needs, owned for the worker's lifetime.
///
/// Built once the surface, session and detector are all available.
pub struct FacePipeline {
    surface: Surface,
    frame: FrameProcessor,
    session: Box<dyn InferenceSession>,
    detector: Box<dyn FaceDetector>,
    thresholds: Thresholds,
}

impl FacePipeline {
    /// Takes ownership of the surface, which must pass [`Surface::validate`].
    pub fn new(
        surface: Surface,
        session: Box<dyn InferenceSession>,
        detector: Box<dyn FaceDetector>,
        thresholds: Thresholds,
    ) -> VisionResult<Self> {
        let size = surface.validate()?;
        Ok(Self {
            surface,
            frame: FrameProcessor::new(size),
            session,
            detector,
            thresholds,
        })
    }

    pub fn size(&self) -> u32 {
        self.frame.size()
    }

    pub fn session(&self) -> &dyn InferenceSession {
        self.session.as_ref()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Letterbox, encode, infer, decode and map `image`.
    ///
    /// The image is dropped when this returns.
    pub async fn analyze(&mut self, image: DynamicImage) -> VisionResult<Vec<RelativeFace>> {
        let size = self.size();

        let timer = StageTimer::start(stages::PAINT);
        let scale = self.frame.paint(&mut self.surface, &image)?;
        drop(image);
        timer.finish();

        let timer = StageTimer::start(stages::PIXELS);
        let input = TensorEncoder::encode(self.surface.pixels(), size as usize)?;
        timer.finish();

        let timer = StageTimer::start(stages::RUN);
        let heads = self.session.run(input).await?;
        timer.finish();

        let timer = StageTimer::start(stages::RETINAFACE);
        let params = DetectParams::new(size, scale.det_scale)
            .with_thresholds(self.thresholds.score, self.thresholds.nms);
        let faces = self.detector.detect(&heads, &params).map_err(|e| match e {
            VisionError::InferenceFailed(_) | VisionError::DetectionFailed(_) => e,
            other => VisionError::detection_failed(other.to_string()),
        })?;
        timer.finish();

        let mapper = CoordinateMapper::from_scale(&scale);
        let relative = mapper.map_all(&faces);

        debug!(
            image_width = scale.image_width,
            image_height = scale.image_height,
            factor = scale.factor,
            det_scale = scale.det_scale,
            faces = relative.len(),
            "Analyzed image"
        );
        Ok(relative)
    }
}

impl std::fmt::Debug for FacePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacePipeline")
            .field("size", &self.size())
            .field("provider", &self.session.provider())
            .field("detector", &self.detector.name())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}
