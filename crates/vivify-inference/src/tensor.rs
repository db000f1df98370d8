//! Image <-> tensor conversion helpers shared by the ONNX sessions.

use image::{imageops, Rgb, RgbImage};
use ort::value::{Tensor, Value};

use crate::error::{InferenceError, InferenceResult};

/// Pixel normalization applied when building input tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Map bytes to `[0, 1]`.
    ZeroOne,
    /// Map bytes to `[-1, 1]`.
    PlusMinusOne,
}

/// Resize an image with bilinear filtering.
pub fn resize(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width, height, imageops::FilterType::Triangle)
}

/// Convert an RGB image to a `(1, 3, H, W)` float tensor.
pub fn image_to_chw(img: &RgbImage, norm: Normalization) -> InferenceResult<Value> {
    let (w, h) = img.dimensions();
    let mut chw = Vec::with_capacity((w * h * 3) as usize);
    let data = img.as_raw();
    // HWC -> CHW
    for c in 0..3usize {
        for y in 0..h as usize {
            for x in 0..w as usize {
                let v = data[y * w as usize * 3 + x * 3 + c] as f32 / 255.0;
                chw.push(match norm {
                    Normalization::ZeroOne => v,
                    Normalization::PlusMinusOne => v * 2.0 - 1.0,
                });
            }
        }
    }

    let shape = vec![1usize, 3, h as usize, w as usize];
    Tensor::from_array((shape, chw.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| InferenceError::inference_failed(format!("ORT tensor: {e}")))
}

/// Build a `(1, N)` float tensor from a flat vector.
pub fn vec_to_tensor(values: &[f32]) -> InferenceResult<Value> {
    let shape = vec![1usize, values.len()];
    Tensor::from_array((shape, values.to_vec().into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| InferenceError::inference_failed(format!("ORT tensor: {e}")))
}

/// Build a `(1, C, H, W)` float tensor from a flat buffer and shape.
pub fn chw_to_tensor(values: &[f32], shape: [usize; 3]) -> InferenceResult<Value> {
    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(InferenceError::shape_mismatch(
            format!("{expected} values for shape {shape:?}"),
            format!("{} values", values.len()),
        ));
    }
    let full = vec![1usize, shape[0], shape[1], shape[2]];
    Tensor::from_array((full, values.to_vec().into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| InferenceError::inference_failed(format!("ORT tensor: {e}")))
}

/// Convert a `(1, 3, H, W)` float tensor in `[0, 1]` back to an RGB image.
pub fn chw_to_image(shape: &[usize], data: &[f32]) -> InferenceResult<RgbImage> {
    let (c, h, w) = match shape {
        [1, c, h, w] => (*c, *h, *w),
        [c, h, w] => (*c, *h, *w),
        _ => {
            return Err(InferenceError::shape_mismatch(
                "(1, 3, H, W)",
                format!("{shape:?}"),
            ))
        }
    };
    if c != 3 || data.len() < c * h * w {
        return Err(InferenceError::shape_mismatch(
            "(1, 3, H, W)",
            format!("{shape:?} with {} values", data.len()),
        ));
    }

    let plane = h * w;
    let mut img = RgbImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let px = Rgb([
                (data[i].clamp(0.0, 1.0) * 255.0).round() as u8,
                (data[plane + i].clamp(0.0, 1.0) * 255.0).round() as u8,
                (data[2 * plane + i].clamp(0.0, 1.0) * 255.0).round() as u8,
            ]);
            img.put_pixel(x as u32, y as u32, px);
        }
    }
    Ok(img)
}
