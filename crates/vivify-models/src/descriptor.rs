//! Motion and appearance descriptors.
//!
//! A motion descriptor is a fixed-shape vector representing head pose plus
//! expression. Descriptors are tagged as absolute (extracted directly from a
//! frame) or relative (a delta between two absolute descriptors extracted
//! under the same normalization); the tag is enforced when descriptors are
//! combined so that a relative delta is never mistaken for a pose.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Total length of a motion descriptor.
///
/// Layout: [0..3) pitch/yaw/roll, [3..6) translation, [6] scale,
/// [7..) expression channels.
pub const MOTION_DIM: usize = 72;

/// Start of the expression channels within a motion descriptor.
pub const EXP_OFFSET: usize = 7;

/// Expression channel controlling eyelid aperture.
pub const EYE_OPEN_IDX: usize = EXP_OFFSET + 11;

/// Expression channel controlling lip aperture.
pub const LIP_OPEN_IDX: usize = EXP_OFFSET + 17;

/// Shape of an appearance descriptor (channels, height, width).
pub const APPEARANCE_SHAPE: [usize; 3] = [32, 64, 64];

/// Errors from invalid descriptor combinations.
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("descriptor kind mismatch: expected {expected:?}, got {got:?}")]
    KindMismatch { expected: MotionKind, got: MotionKind },

    #[error("descriptor shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// Whether a motion descriptor is a pose or a delta between poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionKind {
    /// Extracted directly from a frame.
    Absolute,
    /// A difference between two absolute descriptors.
    Relative,
}

/// Fixed-shape head pose + expression descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionDescriptor {
    pub kind: MotionKind,
    pub values: Vec<f32>,
}

impl MotionDescriptor {
    /// Create an absolute descriptor, validating the shape.
    pub fn absolute(values: Vec<f32>) -> Result<Self, DescriptorError> {
        Self::with_kind(MotionKind::Absolute, values)
    }

    /// Create a relative descriptor, validating the shape.
    pub fn relative(values: Vec<f32>) -> Result<Self, DescriptorError> {
        Self::with_kind(MotionKind::Relative, values)
    }

    fn with_kind(kind: MotionKind, values: Vec<f32>) -> Result<Self, DescriptorError> {
        if values.len() != MOTION_DIM {
            return Err(DescriptorError::ShapeMismatch {
                expected: MOTION_DIM,
                got: values.len(),
            });
        }
        Ok(Self { kind, values })
    }

    /// The all-zero relative descriptor (no motion change).
    pub fn zero_delta() -> Self {
        Self {
            kind: MotionKind::Relative,
            values: vec![0.0; MOTION_DIM],
        }
    }

    fn expect_kind(&self, expected: MotionKind) -> Result<(), DescriptorError> {
        if self.kind != expected {
            return Err(DescriptorError::KindMismatch {
                expected,
                got: self.kind,
            });
        }
        Ok(())
    }

    /// Compute `self - other` as a relative descriptor.
    ///
    /// Both inputs must be absolute; mixing normalizations is a caller
    /// contract violation surfaced via the kind tags.
    pub fn delta(&self, other: &MotionDescriptor) -> Result<MotionDescriptor, DescriptorError> {
        self.expect_kind(MotionKind::Absolute)?;
        other.expect_kind(MotionKind::Absolute)?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a - b)
            .collect();
        Ok(MotionDescriptor {
            kind: MotionKind::Relative,
            values,
        })
    }

    /// Apply a relative descriptor on top of this absolute one.
    pub fn compose(&self, delta: &MotionDescriptor) -> Result<MotionDescriptor, DescriptorError> {
        self.expect_kind(MotionKind::Absolute)?;
        delta.expect_kind(MotionKind::Relative)?;
        let values = self
            .values
            .iter()
            .zip(&delta.values)
            .map(|(a, d)| a + d)
            .collect();
        Ok(MotionDescriptor {
            kind: MotionKind::Absolute,
            values,
        })
    }
}

/// Identity/texture representation of the subject, computed once per source
/// portrait and shared read-only across all renders of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppearanceDescriptor {
    pub values: Vec<f32>,
    pub shape: [usize; 3],
}

impl AppearanceDescriptor {
    /// Create a descriptor, validating that the buffer matches the shape.
    pub fn new(values: Vec<f32>, shape: [usize; 3]) -> Result<Self, DescriptorError> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(DescriptorError::ShapeMismatch {
                expected,
                got: values.len(),
            });
        }
        Ok(Self { values, shape })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(fill: f32) -> MotionDescriptor {
        MotionDescriptor::absolute(vec![fill; MOTION_DIM]).unwrap()
    }

    #[test]
    fn wrong_length_rejected() {
        let err = MotionDescriptor::absolute(vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::ShapeMismatch {
                expected: MOTION_DIM,
                got: 3
            }
        );
    }

    #[test]
    fn delta_then_compose_is_identity() {
        let a = abs(0.7);
        let b = abs(0.2);
        let d = a.delta(&b).unwrap();
        assert_eq!(d.kind, MotionKind::Relative);
        let back = b.compose(&d).unwrap();
        assert_eq!(back.kind, MotionKind::Absolute);
        for (x, y) in back.values.iter().zip(&a.values) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn delta_of_relative_is_kind_mismatch() {
        let a = abs(1.0);
        let d = MotionDescriptor::zero_delta();
        assert!(matches!(
            a.delta(&d),
            Err(DescriptorError::KindMismatch { .. })
        ));
        assert!(matches!(
            d.compose(&d),
            Err(DescriptorError::KindMismatch { .. })
        ));
    }

    #[test]
    fn appearance_shape_enforced() {
        let shape = [2, 3, 4];
        assert!(AppearanceDescriptor::new(vec![0.0; 24], shape).is_ok());
        assert!(AppearanceDescriptor::new(vec![0.0; 23], shape).is_err());
    }

    #[test]
    fn named_channels_are_expression_channels() {
        assert!(EYE_OPEN_IDX >= EXP_OFFSET && EYE_OPEN_IDX < MOTION_DIM);
        assert!(LIP_OPEN_IDX >= EXP_OFFSET && LIP_OPEN_IDX < MOTION_DIM);
        assert_ne!(EYE_OPEN_IDX, LIP_OPEN_IDX);
    }
}
