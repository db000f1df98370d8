//! Paste-back compositing.
//!
//! Re-projects a rendered face crop into the original source frame through
//! the exact inverse of the crop transform, feathering the square boundary
//! so the seam does not show. Output dimensions always equal the source's.

use image::RgbImage;

use vivify_media::bilinear_sample;
use vivify_models::CropRegion;

/// Composite `rendered` back into `source` over `region`.
///
/// `feather_px` is the blend band width in source pixels; zero gives a hard
/// edge. Parts of the crop square that fall outside the source frame are
/// simply not written.
pub fn paste_back(
    source: &RgbImage,
    region: &CropRegion,
    rendered: &RgbImage,
    feather_px: u32,
) -> RgbImage {
    let mut out = source.clone();
    let (src_w, src_h) = source.dimensions();

    // The render may be a different resolution than the crop it was
    // extracted at; rescale crop coordinates accordingly.
    let render_scale = rendered.width() as f32 / region.dst_size as f32;
    let feather = feather_px as f32;

    let x_min = region.x.floor().max(0.0) as u32;
    let y_min = region.y.floor().max(0.0) as u32;
    let x_max = ((region.x + region.side).ceil() as i64).clamp(0, src_w as i64) as u32;
    let y_max = ((region.y + region.side).ceil() as i64).clamp(0, src_h as i64) as u32;

    for py in y_min..y_max {
        for px in x_min..x_max {
            let fx = px as f32;
            let fy = py as f32;
            if !region.contains(fx, fy) {
                continue;
            }

            let (u, v) = region.source_to_crop(fx, fy);
            let sample = bilinear_sample(rendered, u * render_scale, v * render_scale);

            // Distance to the nearest square edge drives the blend weight.
            let edge = (fx - region.x)
                .min(region.x + region.side - fx)
                .min(fy - region.y)
                .min(region.y + region.side - fy);
            let alpha = if feather > 0.0 {
                (edge / feather).clamp(0.0, 1.0)
            } else {
                1.0
            };

            let base = out.get_pixel(px, py).0;
            let blended = [
                lerp(base[0], sample.0[0], alpha),
                lerp(base[1], sample.0[1], alpha),
                lerp(base[2], sample.0[2], alpha),
            ];
            out.put_pixel(px, py, image::Rgb(blended));
        }
    }

    out
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
    }

    #[test]
    fn output_matches_source_dimensions() {
        let source = solid(120, 90, 10);
        let region = CropRegion {
            x: 20.0,
            y: 10.0,
            side: 40.0,
            dst_size: 64,
        };
        let rendered = solid(64, 64, 200);
        let out = paste_back(&source, &region, &rendered, 4);
        assert_eq!(out.dimensions(), source.dimensions());
    }

    #[test]
    fn center_takes_render_and_outside_stays_source() {
        let source = solid(120, 90, 10);
        let region = CropRegion {
            x: 20.0,
            y: 10.0,
            side: 40.0,
            dst_size: 64,
        };
        let rendered = solid(64, 64, 200);
        let out = paste_back(&source, &region, &rendered, 4);
        // Square center, far from any edge: fully the render.
        assert_eq!(out.get_pixel(40, 30).0, [200, 200, 200]);
        // Far outside the square: untouched source.
        assert_eq!(out.get_pixel(100, 80).0, [10, 10, 10]);
    }

    #[test]
    fn feather_band_blends() {
        let source = solid(120, 90, 0);
        let region = CropRegion {
            x: 20.0,
            y: 10.0,
            side: 40.0,
            dst_size: 64,
        };
        let rendered = solid(64, 64, 200);
        let out = paste_back(&source, &region, &rendered, 8);
        // One pixel inside the left edge sits early in the blend band.
        let edge_value = out.get_pixel(21, 30).0[0];
        assert!(edge_value > 0 && edge_value < 200, "got {edge_value}");
    }

    #[test]
    fn region_partially_outside_frame_is_clipped() {
        let source = solid(60, 60, 10);
        let region = CropRegion {
            x: -20.0,
            y: -20.0,
            side: 50.0,
            dst_size: 64,
        };
        let rendered = solid(64, 64, 200);
        let out = paste_back(&source, &region, &rendered, 0);
        assert_eq!(out.dimensions(), (60, 60));
        // Inside the visible part of the square.
        assert_eq!(out.get_pixel(5, 5).0, [200, 200, 200]);
        // Beyond the square.
        assert_eq!(out.get_pixel(50, 50).0, [10, 10, 10]);
    }
}
