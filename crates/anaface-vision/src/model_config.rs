//! Where the detection network lives and how it is bound.

use std::path::{Path, PathBuf};

use crate::backend::ExecutionTarget;
use crate::error::{VisionError, VisionResult};

/// File name of the bundled detection network.
pub const MODEL_FILE_NAME: &str = "det_10g.onnx";

/// Input tensor name the network was exported with.
pub const DEFAULT_INPUT_NAME: &str = "input.1";

/// Default intra-op thread count.
pub const DEFAULT_INTRA_THREADS: usize = 4;

/// Standard locations searched when no explicit path is given.
pub const MODEL_SEARCH_PATHS: &[&str] = &[
    "./models/det_10g.onnx",
    "./assets/det_10g.onnx",
    "/app/models/det_10g.onnx",
    "/usr/share/anaface/det_10g.onnx",
];

/// Model artifact and session options.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Explicit model path; overrides the search list
    pub model_path: Option<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub input_name: String,
    pub intra_threads: usize,
    /// Execution providers in priority order, CPU last
    pub providers: Vec<ExecutionTarget>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            search_paths: MODEL_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
            input_name: DEFAULT_INPUT_NAME.to_string(),
            intra_threads: DEFAULT_INTRA_THREADS,
            providers: ExecutionTarget::DEFAULT_PRIORITY.to_vec(),
        }
    }
}

impl ModelConfig {
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Locate the model file.
    ///
    /// An explicit path must exist; otherwise the first existing search path
    /// is used.
    pub fn resolve_path(&self) -> VisionResult<PathBuf> {
        if let Some(path) = &self.model_path {
            return if path.exists() {
                Ok(path.clone())
            } else {
                Err(VisionError::model_not_found(path.display().to_string()))
            };
        }

        self.search_paths
            .iter()
            .find(|p| p.exists())
            .cloned()
            .ok_or_else(|| {
                let tried: Vec<String> = self
                    .search_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                VisionError::model_not_found(format!(
                    "{} (searched: {})",
                    MODEL_FILE_NAME,
                    tried.join(", ")
                ))
            })
    }

    /// Read the resolved model file.
    pub fn read_model(&self) -> VisionResult<(PathBuf, Vec<u8>)> {
        let path = self.resolve_path()?;
        let bytes = read_model_file(&path)?;
        Ok((path, bytes))
    }
}

fn read_model_file(path: &Path) -> VisionResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| VisionError::ModelRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Check if a model file is available at the default locations.
pub fn is_model_available() -> bool {
    ModelConfig::default().resolve_path().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.input_name, "input.1");
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.providers.last(), Some(&ExecutionTarget::Cpu));
        assert_eq!(config.search_paths.len(), MODEL_SEARCH_PATHS.len());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let config = ModelConfig::default().with_model_path("/definitely/not/here.onnx");
        assert!(matches!(
            config.resolve_path(),
            Err(VisionError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_search_finds_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("b.onnx");
        std::fs::write(&second, b"model").unwrap();

        let config = ModelConfig {
            search_paths: vec![dir.path().join("a.onnx"), second.clone()],
            ..ModelConfig::default()
        };
        assert_eq!(config.resolve_path().unwrap(), second);

        let (path, bytes) = config.read_model().unwrap();
        assert_eq!(path, second);
        assert_eq!(bytes, b"model");
    }

    #[test]
    fn test_empty_search_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            search_paths: vec![dir.path().join("missing.onnx")],
            ..ModelConfig::default()
        };
        let err = config.resolve_path().unwrap_err();
        assert!(err.to_string().contains("det_10g.onnx"));
        assert!(err.is_bring_up());
    }
}
