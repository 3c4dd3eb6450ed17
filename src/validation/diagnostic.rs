//! Validation diagnostics

use serde::Serialize;
use std::fmt;

use crate::dialect::ShapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One problem found in a test file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// 1-based source line, 0 when unknown
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Field or entry the problem is attached to, e.g. `do[2]`
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    pub severity: Severity,
}

impl ValidationError {
    pub fn error(line: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            field: field.into(),
            message: message.into(),
            fix: None,
            example: None,
            severity: Severity::Error,
        }
    }

    pub fn warning(line: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(line, field, message)
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Error built from an unrecognised entry shape
    pub fn from_shape(line: usize, field: impl Into<String>, shape: ShapeError) -> Self {
        Self {
            line,
            column: None,
            field: field.into(),
            message: shape.message,
            fix: Some(shape.fix),
            example: shape.example,
            severity: Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: ", self.line)?;
        }
        if !self.field.is_empty() {
            write!(f, "{}: ", self.field)?;
        }
        f.write_str(&self.message)?;
        if let Some(fix) = &self.fix {
            write!(f, " (fix: {fix})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_line_and_fix() {
        let err = ValidationError::error(4, "do[0]", "Unknown action 'clik'").with_fix("Did you mean 'c'?");
        assert_eq!(
            err.to_string(),
            "line 4: do[0]: Unknown action 'clik' (fix: Did you mean 'c'?)"
        );
    }

    #[test]
    fn test_display_without_line() {
        let err = ValidationError::warning(0, "", "Something odd");
        assert_eq!(err.to_string(), "Something odd");
        assert!(!err.is_error());
    }
}
