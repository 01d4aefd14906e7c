//! Worker lifecycle.

use anaface_vision::FacePipeline;

/// `Uninitialized -> Initializing -> Ready`, or `Failed`, which is terminal.
///
/// `Ready` owns everything analyze needs: the surface, the session and the
/// detector.
#[derive(Debug, Default)]
pub enum WorkerState {
    #[default]
    Uninitialized,
    Initializing,
    Ready(FacePipeline),
    Failed(String),
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::Initializing => "initializing",
            WorkerState::Ready(_) => "ready",
            WorkerState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WorkerState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WorkerState::Failed(_))
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut FacePipeline> {
        match self {
            WorkerState::Ready(pipeline) => Some(pipeline),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_uninitialized() {
        let state = WorkerState::default();
        assert_eq!(state.name(), "uninitialized");
        assert!(!state.is_ready());
    }

    #[test]
    fn test_failed_is_not_ready() {
        let mut state = WorkerState::Failed("model missing".into());
        assert!(state.is_failed());
        assert!(state.pipeline_mut().is_none());
        assert_eq!(state.name(), "failed");
    }
}
