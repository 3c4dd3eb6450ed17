//! End-to-end processing of test files
//!
//! raw text -> parse -> detect -> validate -> compile -> execute, producing
//! one [`ProcessResult`] per file. An error in a phase stops that file before
//! the next phase; errors never cross from one file to another.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::common::config::Config;
use crate::common::Error;
use crate::compiler::{self, CompiledStep};
use crate::detector::Detector;
use crate::dialect::{Dialect, Document};
use crate::orchestrator::metrics::{millis, timed};
use crate::orchestrator::{pool, CancelToken, Orchestrator, PhaseMetrics};
use crate::session::SessionContext;
use crate::validation::{ValidationError, ValidationReport, Validator};

/// Behaviour switches for a pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Promote warnings to errors
    pub strict: bool,
    /// Steps go to an in-memory API instead of the platform
    pub dry_run: bool,
    pub min_confidence: f64,
    pub best_practices: bool,
    /// Files processed concurrently by [`Pipeline::process_files`]
    pub workers: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            strict: config.validation.strict,
            dry_run: false,
            min_confidence: config.detection.min_confidence,
            best_practices: config.validation.best_practices,
            workers: config.execution.workers,
        }
    }
}

/// Everything known about one processed document
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub test_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub dialect: Dialect,
    pub confidence: f64,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub compiled_steps: Vec<CompiledStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    /// Steps accepted by the platform
    pub steps_created: usize,
    pub dry_run: bool,
    pub duration_ms: f64,
    pub metrics: PhaseMetrics,
}

impl ProcessResult {
    pub(crate) fn new(file: Option<String>, dry_run: bool) -> Self {
        Self {
            success: false,
            test_name: String::new(),
            file,
            dialect: Dialect::Unknown,
            confidence: 0.0,
            errors: Vec::new(),
            warnings: Vec::new(),
            compiled_steps: Vec::new(),
            execution_id: None,
            steps_created: 0,
            dry_run,
            duration_ms: 0.0,
            metrics: PhaseMetrics::default(),
        }
    }

    /// Label for reports: the test name, else the file, else a placeholder
    pub fn label(&self) -> &str {
        if !self.test_name.is_empty() {
            &self.test_name
        } else {
            self.file.as_deref().unwrap_or("<unnamed>")
        }
    }

    fn finish(mut self, start: Instant) -> Self {
        self.success = self.errors.is_empty();
        self.duration_ms = millis(start.elapsed());
        self
    }
}

/// Detect, validate, compile and optionally execute documents
pub struct Pipeline {
    options: PipelineOptions,
    detector: Detector,
    validator: Validator,
    orchestrator: Option<Arc<Orchestrator>>,
}

impl Pipeline {
    /// A pipeline that stops after compilation
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            detector: Detector::new(options.min_confidence),
            validator: Validator::new(options.best_practices),
            options,
            orchestrator: None,
        }
    }

    /// Also execute compiled tests with `orchestrator`
    pub fn with_orchestrator(mut self, orchestrator: Arc<Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every phase over one document
    pub async fn process_document(
        &self,
        text: &str,
        file: Option<String>,
        session: &mut SessionContext,
        cancel: &CancelToken,
    ) -> ProcessResult {
        let start = Instant::now();
        let mut result = ProcessResult::new(file, self.options.dry_run);

        let (parsed, parse_ms) = timed(|| Document::parse(text));
        result.metrics.parse_ms = parse_ms;
        let doc = match parsed {
            Ok(doc) => doc,
            Err(e) => {
                result.errors.push(error_from(&e));
                return result.finish(start);
            }
        };
        result.test_name = declared_name(&doc);

        let (detection, detect_ms) = timed(|| self.detector.detect(&doc));
        result.metrics.detect_ms = detect_ms;
        result.dialect = detection.dialect;
        result.confidence = detection.confidence;

        let (mut report, validate_ms) = timed(|| self.validator.validate(&doc, detection.dialect));
        result.metrics.validate_ms = validate_ms;
        let mut detection_warnings: Vec<ValidationError> = detection
            .warnings
            .iter()
            .map(|w| ValidationError::warning(0, "", w.as_str()))
            .collect();
        detection_warnings.append(&mut report.warnings);
        report.warnings = detection_warnings;
        if self.options.strict {
            report.promote_warnings();
        }
        let ValidationReport { errors, warnings } = report;
        result.errors = errors;
        result.warnings = warnings;
        if !result.errors.is_empty() {
            tracing::info!(file = ?result.file, errors = result.errors.len(), "Validation failed");
            return result.finish(start);
        }

        let (compiled, compile_ms) = timed(|| compiler::compile(&doc, detection.dialect));
        result.metrics.compile_ms = compile_ms;
        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(e) => {
                result.errors.push(error_from(&e));
                return result.finish(start);
            }
        };
        result.test_name = compiled.name.clone();
        result.compiled_steps = compiled.steps.clone();

        if let Some(orchestrator) = &self.orchestrator {
            let outcome = orchestrator.run(&compiled, session, cancel).await;
            result.metrics.execute_ms = outcome.duration_ms;
            result.metrics.steps = outcome.timings;
            result.steps_created = outcome.step_ids.len();
            result.execution_id = outcome.execution_id;
            if let Some(failure) = outcome.failure {
                let field = failure
                    .step
                    .map(|i| format!("steps[{i}]"))
                    .unwrap_or_else(|| "execution".to_string());
                let mut err = ValidationError::error(failure.line, field, failure.message);
                if let Some(screenshot) = failure.screenshot {
                    err = err.with_fix(format!("See screenshot {screenshot}"));
                }
                result.errors.push(err);
            }
        }

        result.finish(start)
    }

    /// Process files with up to `workers` running at once
    ///
    /// Each file gets its own fork of `session`, so journeys, checkpoints and
    /// positions are never shared. Results come back in input order, one per
    /// file, even when a worker dies while processing its file.
    pub async fn process_files(
        self: &Arc<Self>,
        files: Vec<PathBuf>,
        session: &SessionContext,
        cancel: &CancelToken,
    ) -> Vec<ProcessResult> {
        let pipeline = Arc::clone(self);
        let base = session.clone();
        let cancel = cancel.clone();
        let names: Vec<String> = files.iter().map(|path| path.display().to_string()).collect();
        let dry_run = self.options.dry_run;

        let job = move |_: usize, path: PathBuf| {
            let pipeline = pipeline.clone();
            let mut session = base.fork_for_worker();
            let cancel = cancel.clone();
            async move {
                let name = path.display().to_string();
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => {
                        pipeline
                            .process_document(&text, Some(name), &mut session, &cancel)
                            .await
                    }
                    Err(e) => failed(
                        Some(name.clone()),
                        pipeline.options.dry_run,
                        &Error::FileRead {
                            path: name,
                            error: e.to_string(),
                        },
                    ),
                }
            }
        };
        let on_lost = |index: usize| {
            failed(
                names.get(index).cloned(),
                dry_run,
                &Error::Internal("the worker stopped before finishing this file".to_string()),
            )
        };

        pool::run_bounded(files, self.options.workers, job, on_lost).await
    }
}

/// Result for a file that failed outside the phases
fn failed(file: Option<String>, dry_run: bool, err: &Error) -> ProcessResult {
    let mut result = ProcessResult::new(file, dry_run);
    result.errors.push(error_from(err));
    result
}

/// Name from `test` or `name`, before the dialect is known
fn declared_name(doc: &Document) -> String {
    ["test", "name"]
        .iter()
        .find_map(|key| doc.get(key).and_then(|v| v.as_str()))
        .unwrap_or_default()
        .to_string()
}

/// Fold a phase error into a diagnostic
fn error_from(err: &Error) -> ValidationError {
    match err {
        Error::Parse {
            line,
            column,
            message,
        } => {
            let mut diagnostic = ValidationError::error(*line, "", format!("YAML parse error: {message}"));
            diagnostic.column = Some(*column);
            diagnostic
        }
        Error::Compile {
            index,
            key,
            message,
            fix,
            example,
        } => {
            let mut diagnostic = ValidationError::error(0, format!("actions[{index}] ({key})"), message.as_str())
                .with_fix(fix.as_str());
            diagnostic.example = example.clone();
            diagnostic
        }
        Error::UnsupportedDialect(dialect) => ValidationError::error(0, dialect.as_str(), err.to_string())
            .with_fix("Rewrite the test in the compact or simplified format")
            .with_example(Dialect::Compact.example()),
        other => ValidationError::error(0, "", other.to_string()),
    }
}
