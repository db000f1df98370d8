//! ONNX face locator: detection plus 68-point landmarks.
//!
//! Model contract:
//! - `face_detector.onnx`: input `(1, 3, 320, 320)` in `[0, 1]`, output
//!   `dets` of shape `(1, N, 5)` — `x1, y1, x2, y2, score` in detector input
//!   space.
//! - `landmark_68.onnx`: input `(1, 3, 224, 224)` in `[0, 1]`, output
//!   `landmarks` of shape `(1, 136)` — 68 (x, y) pairs normalized to the
//!   crop square.

use std::path::Path;
use std::sync::Mutex;

use image::{imageops, RgbImage};
use ort::session::Session;
use tracing::debug;

use vivify_models::{BoundingBox, FaceLandmarks, LANDMARK_COUNT};

use crate::capabilities::{FaceLocation, FaceLocator};
use crate::error::{InferenceError, InferenceResult};
use crate::session::load_session;
use crate::tensor::{image_to_chw, resize, Normalization};

/// Detector input resolution.
const DET_INPUT: u32 = 320;

/// Landmark model input resolution.
const LANDMARK_INPUT: u32 = 224;

/// Minimum detection score for a face to count.
const SCORE_THRESHOLD: f32 = 0.5;

/// Padding around the detection box for the landmark crop.
const LANDMARK_PAD: f32 = 0.25;

/// Detector model file name under the model directory.
pub const DETECTOR_MODEL: &str = "face_detector.onnx";

/// Landmark model file name under the model directory.
pub const LANDMARK_MODEL: &str = "landmark_68.onnx";

/// ONNX Runtime face locator.
pub struct OnnxFaceLocator {
    detector: Mutex<Session>,
    landmarker: Mutex<Session>,
}

impl OnnxFaceLocator {
    /// Load both models from the model directory.
    pub fn load(model_dir: &Path) -> InferenceResult<Self> {
        let detector = load_session(&model_dir.join(DETECTOR_MODEL))?;
        let landmarker = load_session(&model_dir.join(LANDMARK_MODEL))?;
        Ok(Self {
            detector: Mutex::new(detector),
            landmarker: Mutex::new(landmarker),
        })
    }

    fn detect_primary(&self, frame: &RgbImage) -> InferenceResult<Option<(BoundingBox, f32)>> {
        let (fw, fh) = frame.dimensions();
        let input = resize(frame, DET_INPUT, DET_INPUT);
        let tensor = image_to_chw(&input, Normalization::ZeroOne)?;

        let mut session = self
            .detector
            .lock()
            .map_err(|_| InferenceError::inference_failed("detector session poisoned"))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;
        let output = outputs
            .get("dets")
            .ok_or_else(|| InferenceError::inference_failed("detector returned no `dets` output"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?;

        let dets = parse_detections(&shape, data)?;
        let sx = fw as f32 / DET_INPUT as f32;
        let sy = fh as f32 / DET_INPUT as f32;
        Ok(primary_face(&dets, sx, sy))
    }

    fn landmarks_for(
        &self,
        frame: &RgbImage,
        bbox: &BoundingBox,
    ) -> InferenceResult<FaceLandmarks> {
        let (crop, rect) = landmark_crop(frame, bbox);
        let tensor = image_to_chw(&crop, Normalization::ZeroOne)?;

        let mut session = self
            .landmarker
            .lock()
            .map_err(|_| InferenceError::inference_failed("landmark session poisoned"))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::inference_failed(format!("ORT run failed: {e}")))?;
        let output = outputs.get("landmarks").ok_or_else(|| {
            InferenceError::inference_failed("landmark model returned no `landmarks` output")
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::inference_failed(format!("ORT extract: {e}")))?;

        let flat_len: usize = shape.iter().map(|&d| d as usize).product();
        if flat_len != LANDMARK_COUNT * 2 || data.len() < flat_len {
            return Err(InferenceError::shape_mismatch(
                format!("(1, {})", LANDMARK_COUNT * 2),
                format!("{shape:?}"),
            ));
        }

        // Normalized crop coords -> source pixels.
        let points = (0..LANDMARK_COUNT)
            .map(|i| {
                let nx = data[i * 2];
                let ny = data[i * 2 + 1];
                (rect.0 + nx * rect.2, rect.1 + ny * rect.2)
            })
            .collect();
        Ok(FaceLandmarks::new(points))
    }
}

impl FaceLocator for OnnxFaceLocator {
    fn locate(&self, frame: &RgbImage) -> InferenceResult<Option<FaceLocation>> {
        let Some((bbox, confidence)) = self.detect_primary(frame)? else {
            debug!("no face above threshold {SCORE_THRESHOLD}");
            return Ok(None);
        };
        let landmarks = self.landmarks_for(frame, &bbox)?;
        Ok(Some(FaceLocation {
            bbox,
            landmarks,
            confidence,
        }))
    }

    fn name(&self) -> &'static str {
        "onnx-face-locator"
    }
}

/// Parse `(1, N, 5)` or `(N, 5)` detections into rows.
fn parse_detections(shape: &[i64], data: &[f32]) -> InferenceResult<Vec<[f32; 5]>> {
    let (rows, cols) = match shape {
        [1, n, c] => (*n as usize, *c as usize),
        [n, c] => (*n as usize, *c as usize),
        _ => {
            return Err(InferenceError::shape_mismatch(
                "(1, N, 5)",
                format!("{shape:?}"),
            ))
        }
    };
    if cols < 5 || data.len() < rows * cols {
        return Err(InferenceError::shape_mismatch(
            "(1, N, 5)",
            format!("{shape:?} with {} values", data.len()),
        ));
    }
    Ok((0..rows)
        .map(|r| {
            let base = r * cols;
            [
                data[base],
                data[base + 1],
                data[base + 2],
                data[base + 3],
                data[base + 4],
            ]
        })
        .collect())
}

/// Pick the largest detection above the score threshold, mapped to source
/// pixels.
fn primary_face(dets: &[[f32; 5]], sx: f32, sy: f32) -> Option<(BoundingBox, f32)> {
    dets.iter()
        .filter(|d| d[4] >= SCORE_THRESHOLD && d[2] > d[0] && d[3] > d[1])
        .map(|d| {
            (
                BoundingBox::new(
                    d[0] * sx,
                    d[1] * sy,
                    (d[2] - d[0]) * sx,
                    (d[3] - d[1]) * sy,
                ),
                d[4],
            )
        })
        .max_by(|a, b| a.0.area().total_cmp(&b.0.area()))
}

/// Extract a padded square crop around the box, clamped to the frame, resized
/// to the landmark input resolution. Returns the crop and its source-space
/// `(x, y, side)`.
fn landmark_crop(frame: &RgbImage, bbox: &BoundingBox) -> (RgbImage, (f32, f32, f32)) {
    let (fw, fh) = frame.dimensions();
    let side = bbox.width.max(bbox.height) * (1.0 + LANDMARK_PAD);
    let (cx, cy) = bbox.center();

    let mut x = cx - side / 2.0;
    let mut y = cy - side / 2.0;
    let mut s = side;
    if x < 0.0 {
        s += x;
        x = 0.0;
    }
    if y < 0.0 {
        s += y;
        y = 0.0;
    }
    s = s.min(fw as f32 - x).min(fh as f32 - y).max(1.0);

    let sub = imageops::crop_imm(frame, x as u32, y as u32, s as u32, s as u32).to_image();
    let crop = resize(&sub, LANDMARK_INPUT, LANDMARK_INPUT);
    (crop, (x, y, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_face_prefers_largest_above_threshold() {
        let dets = vec![
            [0.0, 0.0, 10.0, 10.0, 0.9],
            [20.0, 20.0, 60.0, 60.0, 0.7],
            [0.0, 0.0, 300.0, 300.0, 0.2], // below threshold
        ];
        let (bbox, score) = primary_face(&dets, 1.0, 1.0).unwrap();
        assert_eq!(score, 0.7);
        assert_eq!(bbox.width, 40.0);
    }

    #[test]
    fn primary_face_scales_to_source_space() {
        let dets = vec![[10.0, 10.0, 20.0, 30.0, 0.8]];
        let (bbox, _) = primary_face(&dets, 2.0, 3.0).unwrap();
        assert_eq!(bbox.x, 20.0);
        assert_eq!(bbox.y, 30.0);
        assert_eq!(bbox.width, 20.0);
        assert_eq!(bbox.height, 60.0);
    }

    #[test]
    fn no_detection_above_threshold_is_none() {
        let dets = vec![[0.0, 0.0, 10.0, 10.0, 0.1]];
        assert!(primary_face(&dets, 1.0, 1.0).is_none());
    }

    #[test]
    fn degenerate_boxes_are_ignored() {
        let dets = vec![[10.0, 10.0, 10.0, 10.0, 0.9]];
        assert!(primary_face(&dets, 1.0, 1.0).is_none());
    }

    #[test]
    fn parse_detections_accepts_both_ranks() {
        let data = [0.0, 0.0, 1.0, 1.0, 0.5];
        assert_eq!(parse_detections(&[1, 1, 5], &data).unwrap().len(), 1);
        assert_eq!(parse_detections(&[1, 5], &data).unwrap().len(), 1);
        assert!(parse_detections(&[5], &data).is_err());
    }

    #[test]
    fn landmark_crop_clamps_to_frame() {
        let frame = RgbImage::new(64, 64);
        let bbox = BoundingBox::new(-10.0, -10.0, 40.0, 40.0);
        let (crop, (x, y, s)) = landmark_crop(&frame, &bbox);
        assert_eq!(crop.dimensions(), (LANDMARK_INPUT, LANDMARK_INPUT));
        assert!(x >= 0.0 && y >= 0.0);
        assert!(x + s <= 64.0 && y + s <= 64.0);
    }
}
