//! Extended dialect
//!
//! Verbose syntax with an `infrastructure` block and typed steps. It is
//! recognised and checked structurally, but never compiled.

use serde::Deserialize;
use serde_yaml::Value;

use super::{collect_entries, decode_mapping, Dialect, Document, ShapeError, YamlTest};

/// Top-level fields of an extended test
pub const FIELDS: &[&str] = &["name", "description", "infrastructure", "config", "steps"];

/// Typed extended test
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendedTest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub infrastructure: Option<Value>,
    pub config: Option<Value>,
    pub steps: Option<Vec<Value>>,
}

impl ExtendedTest {
    pub fn decode(doc: &Document) -> Result<Self, ShapeError> {
        decode_mapping(doc, Dialect::Extended)
    }

    pub fn to_yaml_test(&self, doc: &Document) -> YamlTest {
        let steps = self.steps.as_deref().unwrap_or_default();
        let navigation_target = steps.iter().find_map(|step| {
            let map = step.as_mapping()?;
            if map.get("type")?.as_str()? == "navigate" {
                map.get("target")?.as_str().map(str::to_string)
            } else {
                None
            }
        });
        YamlTest {
            dialect: Dialect::Extended,
            name: self.name.clone().unwrap_or_default(),
            navigation_target,
            base_url: None,
            variables: Vec::new(),
            actions: collect_entries(doc, &[("steps", steps)]),
        }
    }
}

/// Structural check of one extended step: a mapping with a string `type`
pub fn check_step(value: &Value) -> Result<(), ShapeError> {
    let example = "- type: click\n  target: \"button.submit\"";
    let map = value.as_mapping().ok_or_else(|| {
        ShapeError::new("", "Step must be a mapping", "Write the step as a mapping with a 'type' field")
            .with_example(example)
    })?;
    match map.get("type") {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        Some(_) => Err(ShapeError::new(
            "type",
            "Step 'type' must be a non-empty string",
            "Set 'type' to the step kind, for example 'click'",
        )
        .with_example(example)),
        None => Err(ShapeError::new(
            "type",
            "Step is missing its 'type' field",
            "Add a 'type' field to every step",
        )
        .with_example(example)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_target_from_first_navigate() {
        let doc = Document::parse(
            "name: x\ninfrastructure: {}\nsteps:\n  - type: navigate\n    target: https://a.b\n  - type: click\n    target: c\n",
        )
        .unwrap();
        let model = ExtendedTest::decode(&doc).unwrap().to_yaml_test(&doc);
        assert_eq!(model.navigation_target.as_deref(), Some("https://a.b"));
        assert_eq!(model.actions.len(), 2);
    }

    #[test]
    fn test_check_step() {
        let ok: Value = serde_yaml::from_str("type: click\ntarget: a").unwrap();
        assert!(check_step(&ok).is_ok());
        let missing: Value = serde_yaml::from_str("target: a").unwrap();
        assert_eq!(check_step(&missing).unwrap_err().key, "type");
    }
}
