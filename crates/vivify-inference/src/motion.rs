//! ONNX motion and appearance extraction.
//!
//! Model contract:
//! - `motion_extractor.onnx`: input `(1, 3, 256, 256)` in `[0, 1]`, output
//!   `motion` of shape `(1, MOTION_DIM)`.
//! - `appearance_extractor.onnx`: same input, output `appearance` of shape
//!   `(1, 32, 64, 64)`.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;

use vivify_models::{AppearanceDescriptor, MotionDescriptor, APPEARANCE_SHAPE, MOTION_DIM};

use crate::capabilities::MotionEncoder;
use crate::error::{InferenceError, InferenceResult};
use crate::session::load_session;
use crate::tensor::{image_to_chw, resize, Normalization};

/// Extractor input resolution.
const CROP_INPUT: u32 = 256;

/// Motion extractor model file name.
pub const MOTION_MODEL: &str = "motion_extractor.onnx";

/// Appearance extractor model file name.
pub const APPEARANCE_MODEL: &str = "appearance_extractor.onnx";

/// ONNX Runtime motion/appearance encoder.
pub struct OnnxMotionEncoder {
    motion: Mutex<Session>,
    appearance: Mutex<Session>,
}

impl OnnxMotionEncoder {
    /// Load both extractor models from the model directory.
    pub fn load(model_dir: &Path) -> InferenceResult<Self> {
        let motion = load_session(&model_dir.join(MOTION_MODEL))?;
        let appearance = load_session(&model_dir.join(APPEARANCE_MODEL))?;
        Ok(Self {
            motion: Mutex::new(motion),
            appearance: Mutex::new(appearance),
        })
    }

    fn run_session(
        session: &Mutex<Session>,
        crop: &RgbImage,
        output_name: &str,
    ) -> InferenceResult<(Vec<usize>, Vec<f32>)> {
        let input = resize(crop, CROP_INPUT, CROP_INPUT);
        let tensor = image_to_chw(&input, Normalization::ZeroOne)?;

        let mut session = session
            .lock()
            .map_err(|_| InferenceError::inference_failed("extractor session poisoned"))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;
        let output = outputs.get(output_name).ok_or_else(|| {
            InferenceError::inference_failed(format!("extractor returned no `{output_name}` output"))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?;

        Ok((
            shape.iter().map(|&d| d as usize).collect(),
            data.to_vec(),
        ))
    }
}

impl MotionEncoder for OnnxMotionEncoder {
    fn extract_motion(&self, crop: &RgbImage) -> InferenceResult<MotionDescriptor> {
        let (shape, data) = Self::run_session(&self.motion, crop, "motion")?;
        let flat: usize = shape.iter().product();
        if flat != MOTION_DIM {
            return Err(InferenceError::shape_mismatch(
                format!("(1, {MOTION_DIM})"),
                format!("{shape:?}"),
            ));
        }
        MotionDescriptor::absolute(data).map_err(|e| {
            InferenceError::shape_mismatch(format!("(1, {MOTION_DIM})"), e.to_string())
        })
    }

    fn extract_appearance(&self, crop: &RgbImage) -> InferenceResult<AppearanceDescriptor> {
        let (shape, data) = Self::run_session(&self.appearance, crop, "appearance")?;
        let dims: Vec<usize> = shape.iter().copied().filter(|&d| d != 1).collect();
        let expected: Vec<usize> = APPEARANCE_SHAPE.to_vec();
        if dims != expected {
            return Err(InferenceError::shape_mismatch(
                format!("(1, {:?})", APPEARANCE_SHAPE),
                format!("{shape:?}"),
            ));
        }
        AppearanceDescriptor::new(data, APPEARANCE_SHAPE).map_err(|e| {
            InferenceError::shape_mismatch(format!("{APPEARANCE_SHAPE:?}"), e.to_string())
        })
    }

    fn name(&self) -> &'static str {
        "onnx-motion-encoder"
    }
}
