//! CLI command handling
//!
//! Dispatches CLI commands to the library and formats output.

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{DryRunApi, HttpStepApi, StepApi};
use crate::commands::{Commands, ConfigCommands, SessionCommands};
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::compiler;
use crate::convert;
use crate::detector::Detector;
use crate::dialect::{Dialect, Document};
use crate::orchestrator::{CancelToken, Orchestrator, OrchestratorOptions};
use crate::pipeline::{Pipeline, PipelineOptions, ProcessResult};
use crate::report::{self, ReportFormat, Summary};
use crate::session::SessionContext;
use crate::validation::{ValidationError, Validator};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but a document failed.
pub async fn dispatch(command: Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Detect { file, json } => {
            let doc = read_document(&file)?;
            let result = Detector::new(config.detection.min_confidence).detect(&doc);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Format: {} (confidence {:.2})",
                    result.dialect.to_string().bold(),
                    result.confidence
                );
                for warning in &result.warnings {
                    println!("  {} {}", "!".yellow(), warning);
                }
            }
            Ok(result.dialect != Dialect::Unknown)
        }

        Commands::Validate { file, strict, json } => {
            let doc = read_document(&file)?;
            let detection = Detector::new(config.detection.min_confidence).detect(&doc);
            let mut report = Validator::from_config(&config.validation).validate(&doc, detection.dialect);
            if strict || config.validation.strict {
                report.promote_warnings();
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Format: {}", detection.dialect);
                print_problems(&report.errors, &report.warnings);
                if report.is_valid() {
                    println!("{} {}", "✓".green(), "Valid".green().bold());
                } else {
                    println!(
                        "{} {} error(s)",
                        "✗".red(),
                        report.errors.len().to_string().red().bold()
                    );
                }
            }
            Ok(report.is_valid())
        }

        Commands::Compile { file, json } => {
            let doc = read_document(&file)?;
            let detection = Detector::new(config.detection.min_confidence).detect(&doc);
            let report = Validator::from_config(&config.validation).validate(&doc, detection.dialect);
            if !report.is_valid() {
                print_problems(&report.errors, &report.warnings);
                return Err(Error::Validation {
                    count: report.errors.len(),
                });
            }

            let compiled = compiler::compile(&doc, detection.dialect)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&compiled)?);
            } else {
                println!("{} ({})", compiled.name.bold(), compiled.dialect);
                if let Some(target) = &compiled.navigation_target {
                    println!("  goal url: {target}");
                }
                for (i, step) in compiled.steps.iter().enumerate() {
                    println!("  {:>3}. {}", i + 1, step);
                }
            }
            Ok(true)
        }

        Commands::Convert { file, to, output } => {
            let target = match to.as_str() {
                "compact" => Dialect::Compact,
                "simplified" => Dialect::Simplified,
                other => {
                    return Err(Error::Config(format!(
                        "unknown target format '{other}', expected compact or simplified"
                    )))
                }
            };
            let text = std::fs::read_to_string(&file).map_err(|e| Error::FileRead {
                path: file.display().to_string(),
                error: e.to_string(),
            })?;
            let conversion = convert::convert(
                &text,
                target,
                &Detector::new(config.detection.min_confidence),
            )?;
            for warning in &conversion.warnings {
                eprintln!("{} {}", "warning:".yellow().bold(), warning);
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, &conversion.output)?;
                    eprintln!(
                        "Converted {} to {} in {}",
                        conversion.source,
                        conversion.target,
                        path.display()
                    );
                }
                None => print!("{}", conversion.output),
            }
            Ok(true)
        }

        Commands::Run {
            files,
            dry_run,
            strict,
            workers,
            report,
            report_dir,
            use_session,
            save_session,
        } => {
            let mut options = PipelineOptions::from_config(config);
            options.strict |= strict;
            options.dry_run = dry_run;
            if let Some(workers) = workers {
                options.workers = workers;
            }
            // --report-dir alone writes the configured default format
            let report = report.or_else(|| report_dir.as_ref().map(|_| config.report.format.clone()));
            let format = report.as_deref().map(str::parse::<ReportFormat>).transpose()?;

            let api: Arc<dyn StepApi> = if dry_run {
                Arc::new(DryRunApi::new())
            } else {
                Arc::new(HttpStepApi::from_config(&config.api)?)
            };
            let orchestrator = Arc::new(Orchestrator::new(
                api,
                OrchestratorOptions::from_config(&config.execution),
            ));
            let pipeline = Arc::new(Pipeline::new(options).with_orchestrator(orchestrator));

            let mut session = if use_session {
                SessionContext::load_or_default(&session_file()?, config.session.auto_increment)?
            } else {
                SessionContext::new(config.session.auto_increment)
            };

            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling remaining steps");
                    on_interrupt.cancel();
                }
            });

            let results = if let [file] = files.as_slice() {
                // A single file runs in the caller's session so it can be saved
                let text = std::fs::read_to_string(file).map_err(|e| Error::FileRead {
                    path: file.display().to_string(),
                    error: e.to_string(),
                })?;
                let result = pipeline
                    .process_document(&text, Some(file.display().to_string()), &mut session, &cancel)
                    .await;
                if save_session {
                    let path = session_file()?;
                    session.save(&path)?;
                    println!("Session saved to {}", path.display());
                }
                vec![result]
            } else {
                if save_session {
                    tracing::warn!("--save-session only applies to single-file runs");
                }
                pipeline.process_files(files, &session, &cancel).await
            };

            for result in &results {
                print_result(result);
            }
            let summary = Summary::of(&results);
            print_summary(&summary);

            if let Some(format) = format {
                let dir = report_dir.unwrap_or_else(|| config.report.output_dir.clone());
                let path = report::write(&results, format, &dir)?;
                println!("Report written to {}", path.display());
            }

            Ok(summary.failed == 0)
        }

        Commands::Session(cmd) => {
            let path = session_file()?;
            let mut session = SessionContext::load_or_default(&path, config.session.auto_increment)?;
            match cmd {
                SessionCommands::Show => {
                    print_session(&session);
                    return Ok(true);
                }
                SessionCommands::SetProject { id } => session.set_project(id),
                SessionCommands::SetGoal { id, snapshot } => session.set_goal(id, snapshot),
                SessionCommands::SetJourney { id } => session.set_journey(id),
                SessionCommands::SetCheckpoint { id } => session.set_checkpoint(id),
                SessionCommands::SetPosition { position } => session.set_next_position(position)?,
                SessionCommands::Clear => session.clear(),
            }
            session.save(&path)?;
            print_session(&session);
            Ok(true)
        }

        Commands::Config(cmd) => {
            match cmd {
                ConfigCommands::Path => match paths::config_path() {
                    Some(path) => println!("{}", path.display()),
                    None => {
                        return Err(Error::Config(
                            "could not determine the configuration directory".to_string(),
                        ))
                    }
                },
                ConfigCommands::Show => print!("{}", config.to_toml()?),
            }
            Ok(true)
        }
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    Document::parse(&text)
}

fn session_file() -> Result<PathBuf> {
    paths::session_path()
        .ok_or_else(|| Error::Config("could not determine the data directory".to_string()))
}

fn print_problems(errors: &[ValidationError], warnings: &[ValidationError]) {
    for error in errors {
        println!("  {} {}", "error:".red().bold(), error);
        if let Some(example) = &error.example {
            for line in example.lines() {
                println!("      {}", line.dimmed());
            }
        }
    }
    for warning in warnings {
        println!("  {} {}", "warning:".yellow().bold(), warning);
    }
}

fn print_result(result: &ProcessResult) {
    let mark = if result.success {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!(
        "{} {} {}",
        mark,
        result.label().bold(),
        format!(
            "({}, {} step(s), {:.0}ms)",
            result.dialect,
            result.compiled_steps.len(),
            result.duration_ms
        )
        .dimmed()
    );
    print_problems(&result.errors, &result.warnings);
    if let Some(id) = &result.execution_id {
        println!("  execution: {id}");
    }
}

fn print_summary(summary: &Summary) {
    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().bold()
    } else {
        summary.failed.to_string().normal()
    };
    println!(
        "\n{} test(s): {} passed, {} failed",
        summary.total,
        summary.passed.to_string().green(),
        failed
    );
}

fn print_session(session: &SessionContext) {
    let show = |id: Option<u64>| id.map_or_else(|| "-".dimmed().to_string(), |id| id.to_string());
    println!("project:    {}", show(session.project_id()));
    println!("goal:       {}", show(session.goal_id()));
    println!("snapshot:   {}", show(session.snapshot_id()));
    println!("journey:    {}", show(session.journey_id()));
    println!("checkpoint: {}", show(session.checkpoint_id()));
    println!("position:   {}", session.peek_position());
    println!(
        "auto-increment: {}",
        if session.auto_increment() { "on" } else { "off" }
    );
}
