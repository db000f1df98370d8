//! Pixel operations backing crop extraction and paste-back.

use image::{Rgb, RgbImage};
use vivify_models::CropRegion;

/// Bilinearly sample an image at fractional coordinates.
///
/// Returns black for samples outside the frame, which keeps crop squares that
/// extend past the borders well defined without clamping the crop transform.
pub fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = (img.width() as i64, img.height() as i64);

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let fetch = |px: i64, py: i64| -> [f32; 3] {
        if px < 0 || py < 0 || px >= w || py >= h {
            [0.0; 3]
        } else {
            let p = img.get_pixel(px as u32, py as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        }
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Extract a crop region into a `dst_size x dst_size` image.
pub fn extract_crop(frame: &RgbImage, region: &CropRegion) -> RgbImage {
    let size = region.dst_size;
    let mut crop = RgbImage::new(size, size);
    for v in 0..size {
        for u in 0..size {
            let (sx, sy) = region.crop_to_source(u as f32, v as f32);
            crop.put_pixel(u, v, bilinear_sample(frame, sx, sy));
        }
    }
    crop
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivify_models::BoundingBox;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 128]))
    }

    #[test]
    fn sample_at_integer_coords_is_exact() {
        let img = gradient(16, 16);
        assert_eq!(bilinear_sample(&img, 3.0, 7.0), Rgb([3, 7, 128]));
    }

    #[test]
    fn sample_interpolates_between_pixels() {
        let img = gradient(16, 16);
        let p = bilinear_sample(&img, 3.5, 7.0);
        // Midpoint of x=3 and x=4.
        assert!((p[0] as i32 - 4).abs() <= 1);
        assert_eq!(p[1], 7);
    }

    #[test]
    fn sample_outside_frame_is_black() {
        let img = gradient(16, 16);
        assert_eq!(bilinear_sample(&img, -5.0, 3.0), Rgb([0, 0, 0]));
        assert_eq!(bilinear_sample(&img, 3.0, 40.0), Rgb([0, 0, 0]));
    }

    #[test]
    fn crop_has_requested_resolution() {
        let img = gradient(100, 100);
        let region = CropRegion::from_bbox(&BoundingBox::new(20.0, 20.0, 40.0, 40.0), 0.25, 64);
        let crop = extract_crop(&img, &region);
        assert_eq!(crop.dimensions(), (64, 64));
    }

    #[test]
    fn crop_past_borders_pads_black() {
        let img = gradient(32, 32);
        let region = CropRegion {
            x: -16.0,
            y: -16.0,
            side: 32.0,
            dst_size: 32,
        };
        let crop = extract_crop(&img, &region);
        // Top-left quadrant lies fully outside the frame.
        assert_eq!(*crop.get_pixel(4, 4), Rgb([0, 0, 0]));
    }
}
