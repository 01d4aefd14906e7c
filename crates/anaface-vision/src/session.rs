//! Inference sessions bound to the detection network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::debug;

use crate::backend::ExecutionTarget;
use crate::error::{VisionError, VisionResult};
use crate::retinaface::{DetectionHeads, HEAD_COUNT};
use crate::tensor::InputTensor;

/// A loaded network that maps one input tensor to nine detection heads.
///
/// Created once at `init` and reused for every analyze call.
#[async_trait]
pub trait InferenceSession: Send {
    async fn run(&mut self, input: InputTensor) -> VisionResult<DetectionHeads>;

    /// Execution provider the session ended up on.
    fn provider(&self) -> ExecutionTarget;
}

/// ONNX Runtime session.
pub struct OrtSession {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_names: Vec<String>,
    provider: ExecutionTarget,
}

impl OrtSession {
    pub(crate) fn new(session: Session, input_name: String, provider: ExecutionTarget) -> VisionResult<Self> {
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.len() != HEAD_COUNT {
            return Err(VisionError::session_create(format!(
                "model has {} outputs, expected {}",
                output_names.len(),
                HEAD_COUNT
            )));
        }
        debug!(input = %input_name, outputs = ?output_names, "Bound model outputs");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_names,
            provider,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

impl std::fmt::Debug for OrtSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtSession")
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .field("provider", &self.provider)
            .finish()
    }
}

#[async_trait]
impl InferenceSession for OrtSession {
    async fn run(&mut self, input: InputTensor) -> VisionResult<DetectionHeads> {
        let session = Arc::clone(&self.session);
        let input_name = self.input_name.clone();
        let output_names = self.output_names.clone();

        tokio::task::spawn_blocking(move || run_blocking(&session, &input_name, &output_names, input))
            .await
            .map_err(|e| VisionError::inference_failed(format!("inference task panicked: {e}")))?
    }

    fn provider(&self) -> ExecutionTarget {
        self.provider
    }
}

fn run_blocking(
    session: &Mutex<Session>,
    input_name: &str,
    output_names: &[String],
    input: InputTensor,
) -> VisionResult<DetectionHeads> {
    let shape = input.shape().to_vec();
    let value: Value = Tensor::from_array((shape, input.into_data().into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| VisionError::inference_failed(format!("Failed to create tensor: {e}")))?;

    let mut session = session
        .lock()
        .map_err(|_| VisionError::internal("Session lock poisoned"))?;

    let outputs = session
        .run(ort::inputs![input_name => value])
        .map_err(|e| VisionError::inference_failed(format!("ONNX inference failed: {e}")))?;

    let mut heads = Vec::with_capacity(output_names.len());
    for name in output_names {
        let output = outputs
            .get(name.as_str())
            .ok_or_else(|| VisionError::inference_failed(format!("Missing output {name}")))?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference_failed(format!("Failed to extract {name}: {e}")))?;
        heads.push(data.to_vec());
    }

    DetectionHeads::new(heads)
}
