//! Error types for steprunner
//!
//! Error messages are written to be actionable: they say what failed and,
//! where possible, how to fix the test file or the environment.

use std::io;
use thiserror::Error;

use crate::dialect::Dialect;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for steprunner
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("YAML parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Format '{0}' is not supported for execution. Convert the test to the compact or simplified format")]
    UnsupportedDialect(Dialect),

    #[error("Cannot convert a {from} test to {to}. Only compact and simplified tests can be converted")]
    UnsupportedConversion { from: Dialect, to: Dialect },

    #[error("Action {index} ('{key}'): {message}. Fix: {fix}")]
    Compile {
        index: usize,
        key: String,
        message: String,
        fix: String,
        example: Option<String>,
    },

    #[error("Validation failed with {count} error(s). Run 'steprunner validate <file>' for details")]
    Validation { count: usize },

    #[error("Invalid compiled step '{command}': {message}")]
    InvalidStep { command: String, message: String },

    // === Execution Errors ===
    #[error("Step {index} ({command}) failed: {message}")]
    StepFailed {
        index: usize,
        command: String,
        message: String,
    },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("No {0} is set in the session. Set one with 'steprunner session set-{0} <id>' or let 'run' create it")]
    MissingContext(&'static str),

    // === Remote API Errors ===
    #[error("API error: {0}")]
    Api(String),

    #[error("API request failed with status {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error from a serde_yaml error, keeping its location
    pub fn parse(err: &serde_yaml::Error) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));
        Self::Parse {
            line,
            column,
            message: err.to_string(),
        }
    }

    /// Create a compile error for an unrecognized action shape
    pub fn compile(index: usize, key: &str, message: &str, fix: &str) -> Self {
        Self::Compile {
            index,
            key: key.to_string(),
            message: message.to_string(),
            fix: fix.to_string(),
            example: None,
        }
    }

    /// Create a step failure error
    pub fn step_failed(index: usize, command: &str, message: &str) -> Self {
        Self::StepFailed {
            index,
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an invalid step error
    pub fn invalid_step(command: &str, message: &str) -> Self {
        Self::InvalidStep {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Attach a corrected example to a compile error
    pub fn with_example(mut self, text: &str) -> Self {
        if let Self::Compile { example, .. } = &mut self {
            *example = Some(text.to_string());
        }
        self
    }

    /// Whether this error came from cancellation or a deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }
}
