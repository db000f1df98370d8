//! Face geometry: bounding boxes and square crop regions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner
    pub x: f32,
    /// Y coordinate of the top-left corner
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Area in square pixels.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// A square crop region in source pixel space, together with the implied
/// similarity transform to a `dst_size x dst_size` crop image.
///
/// The square may extend beyond the frame borders; samples outside the frame
/// are black. Because the region is never clamped, the transform is exactly
/// invertible, which paste-back compositing relies on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CropRegion {
    /// X coordinate of the square's top-left corner (may be negative)
    pub x: f32,
    /// Y coordinate of the square's top-left corner (may be negative)
    pub y: f32,
    /// Side length of the square in source pixels
    pub side: f32,
    /// Resolution of the crop image the region maps to
    pub dst_size: u32,
}

impl CropRegion {
    /// Build a square crop region around a face bounding box.
    ///
    /// The square is centered on the box, sized to its longer side expanded
    /// by `pad_ratio`.
    pub fn from_bbox(bbox: &BoundingBox, pad_ratio: f32, dst_size: u32) -> Self {
        let side = bbox.width.max(bbox.height) * (1.0 + pad_ratio);
        let (cx, cy) = bbox.center();
        Self {
            x: cx - side / 2.0,
            y: cy - side / 2.0,
            side,
            dst_size,
        }
    }

    /// Source pixels per crop pixel.
    pub fn scale(&self) -> f32 {
        self.side / self.dst_size as f32
    }

    /// Map crop-image coordinates to source coordinates.
    pub fn crop_to_source(&self, u: f32, v: f32) -> (f32, f32) {
        let s = self.scale();
        (self.x + (u + 0.5) * s - 0.5, self.y + (v + 0.5) * s - 0.5)
    }

    /// Map source coordinates to crop-image coordinates (inverse transform).
    pub fn source_to_crop(&self, px: f32, py: f32) -> (f32, f32) {
        let s = self.scale();
        ((px - self.x + 0.5) / s - 0.5, (py - self.y + 0.5) / s - 0.5)
    }

    /// Whether a source pixel falls inside the crop square.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.side && py < self.y + self.side
    }
}
