#![deny(unreachable_patterns)]
//! Neural collaborators for the vivify pipeline.
//!
//! The pipeline consumes the models here through the capability traits in
//! [`capabilities`] (`FaceLocator`, `MotionEncoder`, `PortraitRenderer`) so
//! alternate backends can be substituted without touching orchestration
//! logic. The ONNX Runtime implementations treat every call as synchronous
//! and potentially failing; retry and skip policy belongs to the caller.

pub mod capabilities;
pub mod error;
pub mod locator;
pub mod motion;
pub mod renderer;
pub mod session;
pub mod tensor;
pub mod weights;

pub use capabilities::{FaceLocation, FaceLocator, MotionEncoder, PortraitRenderer};
pub use error::{InferenceError, InferenceResult};
pub use locator::OnnxFaceLocator;
pub use motion::OnnxMotionEncoder;
pub use renderer::OnnxPortraitRenderer;
pub use weights::{fetch_weights, FetchReport, WeightRepoType};
