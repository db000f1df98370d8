//! ONNX portrait renderer.
//!
//! Model contract: `generator.onnx` with inputs `motion` `(1, MOTION_DIM)`
//! and `appearance` `(1, 32, 64, 64)`, output `image` `(1, 3, 512, 512)` in
//! `[0, 1]`.
//!
//! Rendering is accelerator-bound: each physical device gets its own session
//! behind a `Mutex`, so at most one render is in flight per device while
//! CPU-side decode/crop/compose work overlaps. Calls round-robin across
//! devices.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;

use vivify_models::{AppearanceDescriptor, MotionDescriptor, MotionKind};

use crate::capabilities::PortraitRenderer;
use crate::error::{InferenceError, InferenceResult};
use crate::session::load_session;
use crate::tensor::{chw_to_image, chw_to_tensor, vec_to_tensor};

/// Generator model file name.
pub const GENERATOR_MODEL: &str = "generator.onnx";

/// ONNX Runtime portrait renderer with per-device render serialization.
pub struct OnnxPortraitRenderer {
    sessions: Vec<Mutex<Session>>,
    cursor: AtomicUsize,
}

impl OnnxPortraitRenderer {
    /// Load the generator, one session per physical device.
    pub fn load(model_dir: &Path, device_count: usize) -> InferenceResult<Self> {
        let path = model_dir.join(GENERATOR_MODEL);
        let count = device_count.max(1);
        let mut sessions = Vec::with_capacity(count);
        for _ in 0..count {
            sessions.push(Mutex::new(load_session(&path)?));
        }
        Ok(Self {
            sessions,
            cursor: AtomicUsize::new(0),
        })
    }

    fn next_session(&self) -> &Mutex<Session> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        &self.sessions[idx]
    }
}

impl PortraitRenderer for OnnxPortraitRenderer {
    fn render(
        &self,
        motion: &MotionDescriptor,
        appearance: &AppearanceDescriptor,
    ) -> InferenceResult<RgbImage> {
        if motion.kind != MotionKind::Absolute {
            return Err(InferenceError::shape_mismatch(
                "absolute motion descriptor",
                "relative",
            ));
        }

        let motion_tensor = vec_to_tensor(&motion.values)?;
        let appearance_tensor = chw_to_tensor(&appearance.values, appearance.shape)?;

        let mut session = self
            .next_session()
            .lock()
            .map_err(|_| InferenceError::inference_failed("generator session poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "motion" => motion_tensor,
                "appearance" => appearance_tensor,
            ])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;
        let output = outputs
            .get("image")
            .ok_or_else(|| InferenceError::inference_failed("generator returned no `image` output"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        chw_to_image(&dims, data)
    }

    fn name(&self) -> &'static str {
        "onnx-portrait-renderer"
    }
}
