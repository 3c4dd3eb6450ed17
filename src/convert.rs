//! Conversion between the compact and simplified dialects
//!
//! Entries are recognised into [`Action`]s and rendered back in the target
//! dialect, so anything the source dialect accepts round-trips through the
//! same typed model the compiler uses. Actions the target dialect has no
//! form for are kept as comments and reported as warnings.

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::common::{Error, Result};
use crate::detector::Detector;
use crate::dialect::action::{
    Action, AssertOp, DialogAction, ScrollTarget, SelectChoice, WaitTarget, WindowAction,
};
use crate::dialect::compact::resolve_url;
use crate::dialect::{Dialect, Document, TestFile};

/// Output of converting one document
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub source: Dialect,
    pub target: Dialect,
    /// The converted test as YAML text
    pub output: String,
    pub warnings: Vec<String>,
}

/// Detect the dialect of `text` and convert it to `target`
///
/// A document already in `target` is returned unchanged.
pub fn convert(text: &str, target: Dialect, detector: &Detector) -> Result<Conversion> {
    let doc = Document::parse(text)?;
    let detection = detector.detect(&doc);
    let source = detection.dialect;
    let mut warnings = detection.warnings;

    if source == target {
        return Ok(Conversion {
            source,
            target,
            output: text.to_string(),
            warnings,
        });
    }
    if !source.is_executable() || !target.is_executable() {
        return Err(Error::UnsupportedConversion {
            from: source,
            to: target,
        });
    }

    let root = convert_document(&doc, source, target, &mut warnings)?;
    let output = serde_yaml::to_string(&Value::Mapping(root))?;
    tracing::debug!(%source, %target, warnings = warnings.len(), "Converted test");

    Ok(Conversion {
        source,
        target,
        output,
        warnings,
    })
}

/// Convert a document known to be written in `source`
pub fn convert_document(
    doc: &Document,
    source: Dialect,
    target: Dialect,
    warnings: &mut Vec<String>,
) -> Result<Mapping> {
    let file = TestFile::decode(doc, source).map_err(|shape| shape.into_compile_error(0))?;
    let test = file.to_yaml_test(doc);
    let description = match &file {
        TestFile::Compact(test) => test.desc.clone(),
        TestFile::Simplified(test) => test.description.clone(),
        TestFile::Extended(_) => None,
    };

    let mut actions = Vec::with_capacity(test.actions.len());
    for entry in &test.actions {
        let action = test
            .parse_entry(entry)
            .map_err(|shape| shape.into_compile_error(entry.index))?;
        actions.push(action);
    }

    let mut root = Mapping::new();
    match target {
        Dialect::Compact => {
            root.insert("test".into(), test.name.clone().into());
            if let Some(desc) = description {
                root.insert("desc".into(), desc.into());
            }
            if let Some(nav) = &test.navigation_target {
                root.insert("nav".into(), nav.clone().into());
            }
            if !test.variables.is_empty() {
                let data: Mapping = test
                    .variables
                    .iter()
                    .map(|(name, value)| (Value::from(name.clone()), Value::from(value.clone())))
                    .collect();
                root.insert("data".into(), Value::Mapping(data));
            }
            let steps = actions.iter().map(to_compact).collect();
            root.insert("do".into(), Value::Sequence(steps));
        }
        Dialect::Simplified => {
            let sections: Vec<&str> = test
                .actions
                .iter()
                .map(|entry| entry.section)
                .filter(|section| *section != "do")
                .collect();
            if !sections.is_empty() {
                warnings.push("setup and teardown actions were merged into steps".to_string());
            }

            root.insert("name".into(), test.name.clone().into());
            if let Some(desc) = description {
                root.insert("description".into(), desc.into());
            }
            if let Some(url) = &test.navigation_target {
                root.insert("url".into(), url.clone().into());
            }
            if !test.variables.is_empty() {
                let vars = test
                    .variables
                    .iter()
                    .map(|(name, value)| {
                        Value::Mapping(pairs(&[("name", name.as_str()), ("value", value.as_str())]))
                    })
                    .collect();
                root.insert("variables".into(), Value::Sequence(vars));
            }

            let base = test.base_url.as_deref();
            let mut steps = Vec::with_capacity(actions.len());
            for (i, action) in actions.iter().enumerate() {
                let action = match action {
                    Action::Navigate { url } => Action::Navigate {
                        url: resolve_url(base, url),
                    },
                    other => other.clone(),
                };
                steps.push(to_simplified(&action, i, warnings));
            }
            root.insert("steps".into(), Value::Sequence(steps));
        }
        Dialect::Extended | Dialect::Unknown => {
            return Err(Error::UnsupportedConversion {
                from: source,
                to: target,
            })
        }
    }
    Ok(root)
}

/// One-entry mapping `key: value`
fn entry(key: &str, value: impl Into<Value>) -> Value {
    let mut map = Mapping::new();
    map.insert(key.into(), value.into());
    Value::Mapping(map)
}

fn pairs(items: &[(&str, &str)]) -> Mapping {
    items
        .iter()
        .map(|(k, v)| (Value::from(*k), Value::from(*v)))
        .collect()
}

fn scroll_text(target: &ScrollTarget) -> String {
    match target {
        ScrollTarget::Top => "top".to_string(),
        ScrollTarget::Bottom => "bottom".to_string(),
        ScrollTarget::Position(s) | ScrollTarget::Element(s) => s.clone(),
    }
}

fn dialog_text(dialog: &DialogAction) -> String {
    match dialog {
        DialogAction::Alert => "accept".to_string(),
        DialogAction::Confirm { accept: true } => "confirm".to_string(),
        DialogAction::Confirm { accept: false } => "cancel".to_string(),
        DialogAction::Prompt(text) => text.clone(),
    }
}

fn window_text(window: &WindowAction) -> String {
    match window {
        WindowAction::Maximize => "maximize".to_string(),
        WindowAction::Resize { width, height } => format!("{width}x{height}"),
        WindowAction::Tab { next: true } => "next".to_string(),
        WindowAction::Tab { next: false } => "prev".to_string(),
    }
}

/// Render an action as a compact entry
pub fn to_compact(action: &Action) -> Value {
    match action {
        Action::Navigate { url } => entry("nav", url.as_str()),
        Action::Scroll(target) => entry("scroll", scroll_text(target)),
        Action::Click {
            selector,
            position,
            variable,
        } => {
            if position.is_none() && variable.is_none() {
                return entry("c", selector.as_str());
            }
            let mut opts = Mapping::new();
            if let Some(pos) = position {
                opts.insert("pos".into(), pos.as_str().into());
            }
            if let Some(var) = variable {
                opts.insert("var".into(), var.as_str().into());
            }
            entry("c", entry(selector, Value::Mapping(opts)))
        }
        Action::Write {
            selector: None,
            text,
        } => entry("t", text.as_str()),
        Action::Write {
            selector: Some(selector),
            text,
        } => entry("t", entry(selector, text.as_str())),
        Action::Key(key) => entry("k", key.as_str()),
        Action::Hover(selector) => entry("h", selector.as_str()),
        Action::Assert {
            op,
            selector,
            expected,
        } => {
            let key = match op {
                AssertOp::Exists => "ch",
                AssertOp::NotExists => "nch",
                AssertOp::Equals => "eq",
                AssertOp::NotEquals => "neq",
                AssertOp::GreaterThan => "gt",
                AssertOp::LessThan => "lt",
            };
            match expected {
                Some(expected) if op.takes_value() => {
                    entry(key, entry(selector, expected.as_str()))
                }
                _ => entry(key, selector.as_str()),
            }
        }
        Action::Store { selector, variable } => entry("store", entry(selector, variable.as_str())),
        Action::Wait(WaitTarget::Time(ms)) => entry("wait", *ms),
        Action::Wait(WaitTarget::Element {
            selector,
            timeout_ms: None,
        }) => entry("wait", selector.as_str()),
        Action::Wait(WaitTarget::Element {
            selector,
            timeout_ms: Some(ms),
        }) => {
            let mut opts = Mapping::new();
            opts.insert("for".into(), selector.as_str().into());
            opts.insert("max".into(), (*ms).into());
            entry("wait", Value::Mapping(opts))
        }
        Action::Execute(script) => entry("js", script.as_str()),
        Action::Comment(text) => entry("note", text.as_str()),
        Action::Dialog(dialog) => entry("dialog", dialog_text(dialog)),
        Action::Select {
            selector,
            choice: SelectChoice::Option(option),
        } => entry("select", entry(selector, option.as_str())),
        Action::Select {
            selector,
            choice: SelectChoice::Index(index),
        } => entry("select", entry(selector, u64::from(*index))),
        Action::Window(window) => entry("window", window_text(window)),
        Action::Upload { selector, url } => entry("upload", entry(selector, url.as_str())),
        Action::Mouse { action, target } => match (action.as_str(), target) {
            ("down" | "up", None) => entry("mouse", action.as_str()),
            ("move-to", Some(coords)) if coords.contains(',') => entry("mouse", coords.as_str()),
            _ => {
                let mut opts = Mapping::new();
                opts.insert("action".into(), action.as_str().into());
                if let Some(target) = target {
                    opts.insert("target".into(), target.as_str().into());
                }
                entry("mouse", Value::Mapping(opts))
            }
        },
    }
}

/// Render an action as a simplified step
///
/// Actions without a simplified verb become a comment holding their compact
/// form; `index` labels the warning.
pub fn to_simplified(action: &Action, index: usize, warnings: &mut Vec<String>) -> Value {
    match action {
        Action::Navigate { url } => entry("navigate", url.as_str()),
        Action::Click {
            selector,
            position,
            variable,
        } => {
            if position.is_some() || variable.is_some() {
                warnings.push(format!(
                    "steps[{index}]: click position and variable options have no simplified form and were dropped"
                ));
            }
            entry("click", selector.as_str())
        }
        Action::Write {
            selector: None,
            text,
        } => entry("write", text.as_str()),
        Action::Write {
            selector: Some(selector),
            text,
        } => entry(
            "write",
            Value::Mapping(pairs(&[("selector", selector.as_str()), ("text", text.as_str())])),
        ),
        Action::Key(key) => entry("key", key.as_str()),
        Action::Hover(selector) => entry("hover", selector.as_str()),
        Action::Assert {
            op: AssertOp::Exists,
            selector,
            ..
        } => entry("assert", selector.as_str()),
        Action::Assert {
            op: AssertOp::NotExists,
            selector,
            ..
        } => {
            let mut map = pairs(&[("selector", selector.as_str())]);
            map.insert("exists".into(), false.into());
            entry("assert", Value::Mapping(map))
        }
        Action::Assert {
            op,
            selector,
            expected,
        } => {
            let condition = match op {
                AssertOp::Equals => "equals",
                AssertOp::NotEquals => "not_equals",
                AssertOp::GreaterThan => "gt",
                _ => "lt",
            };
            let expected = expected.as_deref().unwrap_or_default();
            entry(
                "assert",
                Value::Mapping(pairs(&[("selector", selector.as_str()), (condition, expected)])),
            )
        }
        Action::Store { selector, variable } => entry(
            "store",
            Value::Mapping(pairs(&[("selector", selector.as_str()), ("as", variable.as_str())])),
        ),
        Action::Wait(WaitTarget::Time(ms)) => entry("wait", *ms),
        Action::Wait(WaitTarget::Element {
            selector,
            timeout_ms,
        }) => {
            let mut map = pairs(&[("selector", selector.as_str())]);
            if let Some(ms) = timeout_ms {
                map.insert("timeout".into(), (*ms).into());
            }
            entry("wait", Value::Mapping(map))
        }
        Action::Execute(script) => entry("execute", script.as_str()),
        Action::Comment(text) => entry("comment", text.as_str()),
        Action::Select { selector, choice } => {
            let mut map = pairs(&[("selector", selector.as_str())]);
            match choice {
                SelectChoice::Option(option) => map.insert("option".into(), option.as_str().into()),
                SelectChoice::Index(i) => map.insert("index".into(), u64::from(*i).into()),
            };
            entry("select", Value::Mapping(map))
        }
        Action::Scroll(_)
        | Action::Dialog(_)
        | Action::Window(_)
        | Action::Upload { .. }
        | Action::Mouse { .. } => {
            let kind = action.kind();
            warnings.push(format!(
                "steps[{index}]: {kind} has no simplified form and was kept as a comment"
            ));
            let compact = serde_yaml::to_string(&to_compact(action)).unwrap_or_default();
            entry(
                "comment",
                format!("Not converted (compact form): {}", compact.trim_end()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::dialect::ActionKind;

    fn detector() -> Detector {
        Detector::new(0.7)
    }

    const COMPACT: &str = "\
test: Checkout
desc: Buy one item
nav: https://shop.example.com
data:
  sku: A-1
do:
  - c: \"Add to cart\"
  - wait: 500
  - t:
      \"#coupon\": \"{{sku}}\"
  - store:
      \"#order-id\": orderId
  - eq:
      \"#total\": \"42\"
  - nch: Error
";

    #[test]
    fn test_compact_to_simplified() {
        let conversion = convert(COMPACT, Dialect::Simplified, &detector()).unwrap();
        assert_eq!(conversion.source, Dialect::Compact);
        assert!(conversion.warnings.is_empty(), "{:?}", conversion.warnings);

        let doc = Document::parse(&conversion.output).unwrap();
        assert_eq!(detector().detect(&doc).dialect, Dialect::Simplified);
        assert_eq!(doc.get("name").and_then(Value::as_str), Some("Checkout"));
        assert_eq!(doc.get("description").and_then(Value::as_str), Some("Buy one item"));
        assert_eq!(doc.get("url").and_then(Value::as_str), Some("https://shop.example.com"));
        assert_eq!(doc.sequence("steps").len(), 6);
        assert_eq!(doc.sequence("variables").len(), 1);
    }

    #[test]
    fn test_conversion_keeps_compiled_steps() {
        let original = compile(&Document::parse(COMPACT).unwrap(), Dialect::Compact).unwrap();
        let conversion = convert(COMPACT, Dialect::Simplified, &detector()).unwrap();
        let converted =
            compile(&Document::parse(&conversion.output).unwrap(), Dialect::Simplified).unwrap();

        assert_eq!(converted.name, original.name);
        assert_eq!(converted.navigation_target, original.navigation_target);
        let commands = |test: &crate::CompiledTest| -> Vec<ActionKind> {
            test.steps.iter().map(|s| s.command).collect()
        };
        assert_eq!(commands(&converted), commands(&original));
        let args = |test: &crate::CompiledTest| -> Vec<Vec<String>> {
            test.steps.iter().map(|s| s.args.clone()).collect()
        };
        assert_eq!(args(&converted), args(&original));
    }

    #[test]
    fn test_simplified_to_compact() {
        let text = "\
name: Search
url: https://example.com
steps:
  - write:
      selector: \"#q\"
      text: rust
  - key: enter
  - wait:
      selector: \"#results\"
      timeout: 3000
  - assert:
      selector: \"#count\"
      gt: 0
  - select:
      selector: \"#sort\"
      index: 2
";
        let conversion = convert(text, Dialect::Compact, &detector()).unwrap();
        let doc = Document::parse(&conversion.output).unwrap();
        assert_eq!(detector().detect(&doc).dialect, Dialect::Compact);
        assert_eq!(doc.get("test").and_then(Value::as_str), Some("Search"));
        assert_eq!(doc.get("nav").and_then(Value::as_str), Some("https://example.com"));

        let steps = doc.sequence("do");
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[1], entry("k", "Enter"));
        let wait = steps[2].get("wait").unwrap();
        assert_eq!(wait.get("for").and_then(Value::as_str), Some("#results"));
        assert_eq!(wait.get("max").and_then(Value::as_u64), Some(3000));
        assert_eq!(steps[4], entry("select", entry("#sort", 2u64)));
    }

    #[test]
    fn test_actions_without_simplified_verb_become_comments() {
        let text = "test: Scroll\nnav: https://a.b\ndo:\n  - scroll: bottom\n  - dialog: accept\n";
        let conversion = convert(text, Dialect::Simplified, &detector()).unwrap();
        assert_eq!(conversion.warnings.len(), 2);
        assert!(conversion.warnings[0].starts_with("steps[0]: scroll"));

        let doc = Document::parse(&conversion.output).unwrap();
        let comment = doc.sequence("steps")[0].get("comment").and_then(Value::as_str).unwrap();
        assert!(comment.contains("scroll: bottom"), "{comment}");
    }

    #[test]
    fn test_setup_and_relative_nav_are_flattened() {
        let text = "test: T\nbase: https://a.b\nsetup:\n  - nav: /login\ndo:\n  - c: go\n";
        let conversion = convert(text, Dialect::Simplified, &detector()).unwrap();
        assert!(conversion.warnings.iter().any(|w| w.contains("merged")));

        let doc = Document::parse(&conversion.output).unwrap();
        let steps = doc.sequence("steps");
        assert_eq!(steps[0], entry("navigate", "https://a.b/login"));
        assert_eq!(steps[1], entry("click", "go"));
    }

    #[test]
    fn test_same_dialect_is_unchanged() {
        let conversion = convert(COMPACT, Dialect::Compact, &detector()).unwrap();
        assert_eq!(conversion.output, COMPACT);
    }

    #[test]
    fn test_extended_cannot_be_converted() {
        let text = "name: x\ninfrastructure:\n  goal: g\nsteps:\n  - type: navigate\n    target: https://a.b\n";
        let err = convert(text, Dialect::Compact, &detector()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedConversion {
                from: Dialect::Extended,
                ..
            }
        ));
    }

    #[test]
    fn test_unrecognised_action_names_index() {
        let text = "test: T\nnav: https://a.b\ndo:\n  - c: go\n  - clik: stop\n";
        let err = convert(text, Dialect::Simplified, &detector()).unwrap_err();
        assert!(matches!(err, Error::Compile { index: 1, .. }));
    }
}
