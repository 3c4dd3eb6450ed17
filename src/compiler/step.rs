//! Compiled step representation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dialect::ActionKind;

/// One dialect-independent unit of execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledStep {
    pub command: ActionKind,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
    pub description: String,
    /// Source line of the action, 0 when unknown
    #[serde(default)]
    pub line: usize,
}

impl CompiledStep {
    pub fn new(command: ActionKind, args: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            command,
            args,
            options: BTreeMap::new(),
            description: description.into(),
            line: 0,
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Positional argument, if present
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(|v| v.as_u64())
    }
}

impl fmt::Display for CompiledStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        for (key, value) in &self.options {
            write!(f, " --{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_args_with_spaces() {
        let step = CompiledStep::new(
            ActionKind::Write,
            vec!["#q".into(), "hello world".into()],
            "Type",
        )
        .with_option("timeout", 5000);
        assert_eq!(step.to_string(), "write #q \"hello world\" --timeout=5000");
    }

    #[test]
    fn test_json_shape() {
        let step = CompiledStep::new(ActionKind::Click, vec!["button".into()], "Click button");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["command"], "click");
        assert_eq!(json["args"][0], "button");
        assert!(json.get("options").is_none());
    }
}
