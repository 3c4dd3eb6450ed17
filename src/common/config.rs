//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Remote API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Format detection settings
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,

    /// Report output settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the platform REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; usually supplied through `STEPRUNNER_API_TOKEN`
    #[serde(default)]
    pub token: Option<String>,

    /// Organization that owns created projects
    #[serde(default)]
    pub organization_id: Option<u64>,

    /// Timeout for a single HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            organization_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api-app2.virtuoso.qa/api".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

/// Format detection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// Below this confidence a low-confidence warning is attached
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.7
}

/// Validation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Promote warnings to errors
    #[serde(default)]
    pub strict: bool,

    /// Emit best-practice warnings
    #[serde(default = "default_true")]
    pub best_practices: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            best_practices: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Maximum number of test files executed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deadline for a single step dispatch
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Ask the platform for a screenshot when a step fails
    #[serde(default)]
    pub screenshot_on_failure: bool,

    /// Start a platform execution after all steps were created
    #[serde(default)]
    pub start_execution: bool,

    /// Project name used when a project must be created
    #[serde(default)]
    pub default_project_name: Option<String>,

    /// Title of checkpoints created by `run`
    #[serde(default = "default_checkpoint_title")]
    pub checkpoint_title: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            step_timeout_secs: default_step_timeout(),
            screenshot_on_failure: false,
            start_execution: false,
            default_project_name: None,
            checkpoint_title: default_checkpoint_title(),
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_step_timeout() -> u64 {
    60
}
fn default_checkpoint_title() -> String {
    "Test Steps".to_string()
}

/// Session defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Advance the step position after each successful dispatch
    #[serde(default = "default_true")]
    pub auto_increment: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_increment: true,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Default report format: text, json or html
    #[serde(default = "default_report_format")]
    pub format: String,

    /// Directory receiving report files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_report_format(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_report_format() -> String {
    "text".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::read(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Apply `STEPRUNNER_*` environment overrides
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("STEPRUNNER_API_TOKEN") {
            if !token.is_empty() {
                self.api.token = Some(token);
            }
        }
        if let Ok(url) = std::env::var("STEPRUNNER_API_URL") {
            if !url.is_empty() {
                self.api.base_url = url;
            }
        }
        if let Ok(org) = std::env::var("STEPRUNNER_ORG_ID") {
            match org.parse() {
                Ok(id) => self.api.organization_id = Some(id),
                Err(_) => tracing::warn!(value = %org, "Ignoring non-numeric STEPRUNNER_ORG_ID"),
            }
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.api.token.is_some() {
            shown.api.token = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| Error::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.detection.min_confidence, 0.7);
        assert_eq!(config.execution.workers, 4);
        assert!(config.session.auto_increment);
        assert!(!config.validation.strict);
        assert_eq!(config.report.format, "text");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
[execution]
workers = 8

[validation]
strict = true
"#,
        )
        .unwrap();
        assert_eq!(config.execution.workers, 8);
        assert_eq!(config.execution.step_timeout_secs, 60);
        assert!(config.validation.strict);
        assert!(config.validation.best_practices);
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::parse("[execution\nworkers = ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nrequest_timeout_secs = 5\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api.request_timeout_secs, 5);
    }

    #[test]
    fn test_to_toml_redacts_token() {
        let mut config = Config::default();
        config.api.token = Some("secret-token".to_string());
        let text = config.to_toml().unwrap();
        assert!(!text.contains("secret-token"));
        assert!(text.contains("<redacted>"));
    }
}
