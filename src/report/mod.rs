//! Batch reports
//!
//! JSON is the machine-readable form: a pretty-printed array of
//! [`ProcessResult`]. Text and HTML are summaries for people.
//!
//! Each JSON element carries these fields:
//!
//! | field            | content                                              |
//! |------------------|------------------------------------------------------|
//! | `success`        | true iff `errors` is empty                           |
//! | `test_name`      | declared test name                                   |
//! | `file`           | source path, omitted for in-memory documents         |
//! | `dialect`        | `compact`, `simplified`, `extended` or `unknown`     |
//! | `confidence`     | detection confidence in [0, 1]                       |
//! | `errors`         | diagnostics that failed the test                     |
//! | `warnings`       | diagnostics that did not                             |
//! | `compiled_steps` | canonical steps in execution order                   |
//! | `execution_id`   | platform execution run, when one was started         |
//! | `steps_created`  | steps the platform accepted                          |
//! | `dry_run`        | steps went to the in-memory API                      |
//! | `duration_ms`    | wall-clock duration of the whole test, milliseconds  |
//! | `metrics`        | per-phase timings (`parse_ms` ... `execute_ms`), plus `steps` once steps ran |

mod html;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::common::paths::ensure_parent;
use crate::common::{Error, Result};
use crate::pipeline::ProcessResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Html,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(Error::Config(format!(
                "unknown report format '{other}'; expected text, json or html"
            ))),
        }
    }
}

/// Counts over a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub steps: usize,
}

impl Summary {
    pub fn of(results: &[ProcessResult]) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            steps: results.iter().map(|r| r.compiled_steps.len()).sum(),
        }
    }
}

/// Render `results` in `format`
pub fn render(results: &[ProcessResult], format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        ReportFormat::Text => Ok(render_text(results)),
        ReportFormat::Html => Ok(html::render(results)),
    }
}

/// Write `test-results.<ext>` into `dir` and return its path
pub fn write(results: &[ProcessResult], format: ReportFormat, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(format!("test-results.{}", format.extension()));
    ensure_parent(&path)?;
    std::fs::write(&path, render(results, format)?)?;
    tracing::info!(path = %path.display(), "Wrote report");
    Ok(path)
}

fn render_text(results: &[ProcessResult]) -> String {
    let mut out = String::new();
    for result in results {
        let status = if result.success { "PASS" } else { "FAIL" };
        let _ = writeln!(
            out,
            "[{status}] {} ({}, confidence {:.2}, {} steps, {:.0}ms)",
            result.label(),
            result.dialect,
            result.confidence,
            result.compiled_steps.len(),
            result.duration_ms
        );
        if let Some(file) = &result.file {
            let _ = writeln!(out, "  file: {file}");
        }
        for error in &result.errors {
            let _ = writeln!(out, "  error: {error}");
        }
        for warning in &result.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
        if let Some(id) = &result.execution_id {
            let _ = writeln!(out, "  execution: {id}");
        }
    }

    let summary = Summary::of(results);
    let _ = writeln!(
        out,
        "\n{} test(s): {} passed, {} failed, {} step(s) compiled",
        summary.total, summary.passed, summary.failed, summary.steps
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompiledStep;
    use crate::dialect::{ActionKind, Dialect};
    use crate::validation::ValidationError;

    fn result(name: &str, success: bool) -> ProcessResult {
        let mut result = ProcessResult::new(None, false);
        result.test_name = name.to_string();
        result.success = success;
        result
    }

    fn results() -> Vec<ProcessResult> {
        let mut passed = result("Login", true);
        passed.dialect = Dialect::Compact;
        passed.compiled_steps = vec![CompiledStep::new(
            ActionKind::Click,
            vec!["button".into()],
            "Click button",
        )];

        let mut failed = result("<script>alert(1)</script>", false);
        failed.errors.push(
            ValidationError::error(3, "do[0]", "Unknown action 'clik'").with_fix("Did you mean 'c'?"),
        );
        vec![passed, failed]
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::of(&results());
        assert_eq!(summary, Summary { total: 2, passed: 1, failed: 1, steps: 1 });
    }

    #[test]
    fn test_text_report() {
        let text = render(&results(), ReportFormat::Text).unwrap();
        assert!(text.contains("[PASS] Login"));
        assert!(text.contains("line 3: do[0]: Unknown action 'clik'"));
        assert!(text.contains("2 test(s): 1 passed, 1 failed"));
    }

    #[test]
    fn test_json_report_is_array() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&results(), ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["success"], true);
        assert_eq!(json[1]["errors"][0]["fix"], "Did you mean 'c'?");
    }

    #[test]
    fn test_json_report_field_names() {
        let json: serde_json::Value =
            serde_json::from_str(&render(&results(), ReportFormat::Json).unwrap()).unwrap();
        let first = json[0].as_object().unwrap();
        for key in [
            "success",
            "test_name",
            "dialect",
            "confidence",
            "errors",
            "warnings",
            "compiled_steps",
            "steps_created",
            "dry_run",
            "duration_ms",
            "metrics",
        ] {
            assert!(first.contains_key(key), "missing {key}");
        }
        for phase in ["parse_ms", "detect_ms", "validate_ms", "compile_ms", "execute_ms"] {
            assert!(first["metrics"].get(phase).is_some(), "missing metrics.{phase}");
        }
    }

    #[test]
    fn test_write_creates_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&results(), ReportFormat::Html, &dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), "test-results.html");
        assert!(std::fs::read_to_string(path).unwrap().contains("<table"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
