//! ONNX Runtime session loading.

use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::error::{InferenceError, InferenceResult};

/// Load an ONNX session from a model file.
pub fn load_session(model_path: &Path) -> InferenceResult<Session> {
    if !model_path.exists() {
        return Err(InferenceError::ModelNotFound(model_path.to_path_buf()));
    }

    let model_bytes = std::fs::read(model_path)?;

    let session = Session::builder()
        .map_err(|e| InferenceError::session_init(format!("ORT session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::session_init(format!("ORT opt level: {e}")))?
        .commit_from_memory(model_bytes.as_slice())
        .map_err(|e| {
            InferenceError::session_init(format!("ORT load {}: {e}", model_path.display()))
        })?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_reported_with_path() {
        let err = load_session(Path::new("/nonexistent/model.onnx")).unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound(_)));
        assert!(err.to_string().contains("model.onnx"));
    }
}
