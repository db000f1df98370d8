#![deny(unreachable_patterns)]
//! The vivify animation core.
//!
//! This crate sequences crop detection, motion/appearance extraction,
//! per-frame motion transfer, optional paste-back compositing, and
//! retargeting-ratio adjustment:
//!
//! - [`orchestrator::animate`] — still portrait + driving video -> animated
//!   video plus a side-by-side comparison view
//! - [`retarget::RetargetSession`] — eye/lip retargeting of a prepared
//!   source portrait
//!
//! Neural collaborators are consumed through the capability traits of
//! `vivify-inference`; all retry/skip policy (hold-last recovery for driving
//! frames without a detectable face) lives here.

pub mod compositor;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod portrait;
pub mod retarget;

#[cfg(test)]
pub(crate) mod stubs;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::animate;
pub use portrait::SourcePortrait;
pub use retarget::{RetargetOutcome, RetargetSession};
