//! Shared data models for the vivify portrait animation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Face geometry (bounding boxes, crop regions and their inverse transforms)
//! - Motion and appearance descriptors
//! - Facial landmarks and eye/lip open-ratio math
//! - Animation request options and outcomes
//! - Encoding configuration

pub mod descriptor;
pub mod encoding;
pub mod geometry;
pub mod landmarks;
pub mod request;

// Re-export common types
pub use descriptor::{
    AppearanceDescriptor, DescriptorError, MotionDescriptor, MotionKind, APPEARANCE_SHAPE,
    EXP_OFFSET, EYE_OPEN_IDX, LIP_OPEN_IDX, MOTION_DIM,
};
pub use encoding::EncodingConfig;
pub use geometry::{BoundingBox, CropRegion};
pub use landmarks::{FaceLandmarks, LANDMARK_COUNT};
pub use request::{AnimationOptions, AnimationOutcome, Ratio, RetargetDefaults, RATIO_MAX};
