//! steprunner - multi-dialect YAML test pipeline
//!
//! Detects which YAML dialect a test is written in, validates it, compiles
//! it into canonical steps, and sends those steps to a remote test platform
//! while tracking session context.

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod compiler;
pub mod convert;
pub mod detector;
pub mod dialect;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod validation;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use compiler::{CompiledStep, CompiledTest};
pub use detector::{DetectionResult, Detector};
pub use dialect::{Dialect, Document};
pub use pipeline::{Pipeline, PipelineOptions, ProcessResult};
pub use session::SessionContext;
