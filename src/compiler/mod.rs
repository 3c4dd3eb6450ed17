//! Compilation of validated tests into canonical steps
//!
//! A direct, order-preserving rewrite: every input action becomes exactly
//! one [`CompiledStep`]. Data variables are substituted here; variables
//! captured at run time by `store` stay as references for the platform.

mod step;

pub use step::CompiledStep;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::common::{Error, Result};
use crate::dialect::action::{
    Action, DialogAction, ScrollTarget, SelectChoice, WaitTarget, WindowAction,
};
use crate::dialect::compact::resolve_url;
use crate::dialect::{variables, Dialect, Document, TestFile, YamlTest};
#[cfg(test)]
use crate::dialect::ActionKind;

/// Output of compiling one document
#[derive(Debug, Clone, Serialize)]
pub struct CompiledTest {
    pub name: String,
    pub dialect: Dialect,
    /// Goal URL of the test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_target: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub steps: Vec<CompiledStep>,
}

/// Compile a document written in `dialect`
///
/// Extended and unknown documents are rejected. No partial result is
/// returned when any action fails to compile.
pub fn compile(doc: &Document, dialect: Dialect) -> Result<CompiledTest> {
    if !dialect.is_executable() {
        return Err(Error::UnsupportedDialect(dialect));
    }
    let file = TestFile::decode(doc, dialect).map_err(|shape| shape.into_compile_error(0))?;
    let test = file.to_yaml_test(doc);
    let steps = compile_test(&test)?;

    let values: HashMap<String, String> = test.variables.iter().cloned().collect();
    let navigation_target = test
        .navigation_target
        .as_deref()
        .map(|url| variables::expand(url, &values));

    tracing::debug!(
        name = %test.name,
        dialect = %dialect,
        steps = steps.len(),
        "Compiled test"
    );

    Ok(CompiledTest {
        name: test.name,
        dialect,
        navigation_target,
        variables: test.variables.into_iter().collect(),
        steps,
    })
}

/// Compile the actions of a dialect-independent test
pub fn compile_test(test: &YamlTest) -> Result<Vec<CompiledStep>> {
    let lowering = Lowering {
        base: test.base_url.as_deref(),
        values: test.variables.iter().cloned().collect(),
    };

    test.actions
        .iter()
        .map(|entry| {
            let action = test
                .parse_entry(entry)
                .map_err(|shape| shape.into_compile_error(entry.index))?;
            Ok(lowering.lower(&action).at_line(entry.line))
        })
        .collect()
}

struct Lowering<'a> {
    base: Option<&'a str>,
    values: HashMap<String, String>,
}

impl Lowering<'_> {
    fn text(&self, s: &str) -> String {
        variables::expand(s, &self.values)
    }

    fn lower(&self, action: &Action) -> CompiledStep {
        let kind = action.kind();
        match action {
            Action::Navigate { url } => {
                let url = resolve_url(self.base, &self.text(url));
                let description = format!("Navigate to {url}");
                CompiledStep::new(kind, vec![url], description)
            }
            Action::Scroll(target) => {
                let (args, description) = match target {
                    ScrollTarget::Top => (vec!["top".to_string()], "Scroll to top".to_string()),
                    ScrollTarget::Bottom => {
                        (vec!["bottom".to_string()], "Scroll to bottom".to_string())
                    }
                    ScrollTarget::Position(pos) => {
                        let pos = self.text(pos);
                        let description = format!("Scroll to {pos}");
                        (vec!["position".to_string(), pos], description)
                    }
                    ScrollTarget::Element(selector) => {
                        let selector = self.text(selector);
                        let description = format!("Scroll to {selector}");
                        (vec!["element".to_string(), selector], description)
                    }
                };
                CompiledStep::new(kind, args, description)
            }
            Action::Click {
                selector,
                position,
                variable,
            } => {
                let selector = self.text(selector);
                let description = format!("Click {selector}");
                let mut step = CompiledStep::new(kind, vec![selector], description);
                if let Some(position) = position {
                    step = step.with_option("position", position.as_str());
                }
                if let Some(variable) = variable {
                    step = step.with_option("variable", variable.as_str());
                }
                step
            }
            Action::Write { selector, text } => {
                let text = self.text(text);
                match selector {
                    Some(selector) => {
                        let selector = self.text(selector);
                        let description = format!("Type '{text}' into {selector}");
                        CompiledStep::new(kind, vec![selector, text], description)
                    }
                    None => {
                        let description = format!("Type '{text}' into the focused element");
                        CompiledStep::new(kind, vec![String::new(), text], description)
                    }
                }
            }
            Action::Key(key) => {
                let key = self.text(key);
                let description = format!("Press {key}");
                CompiledStep::new(kind, vec![key], description)
            }
            Action::Hover(selector) => {
                let selector = self.text(selector);
                let description = format!("Hover over {selector}");
                CompiledStep::new(kind, vec![selector], description)
            }
            Action::Assert {
                op,
                selector,
                expected,
            } => {
                let selector = self.text(selector);
                let mut args = vec![op.as_str().to_string(), selector.clone()];
                let description = match expected {
                    Some(expected) => {
                        let expected = self.text(expected);
                        let description = format!("Assert {selector} {} {expected}", op.as_str());
                        args.push(expected);
                        description
                    }
                    None => format!("Assert {selector} {}", op.as_str()),
                };
                CompiledStep::new(kind, args, description)
            }
            Action::Store { selector, variable } => {
                let selector = self.text(selector);
                let description = format!("Store text of {selector} as {variable}");
                CompiledStep::new(kind, vec![selector, variable.clone()], description)
            }
            Action::Wait(WaitTarget::Time(ms)) => {
                CompiledStep::new(kind, vec!["time".to_string(), ms.to_string()], format!("Wait {ms}ms"))
            }
            Action::Wait(WaitTarget::Element {
                selector,
                timeout_ms,
            }) => {
                let selector = self.text(selector);
                let description = format!("Wait for {selector}");
                let step = CompiledStep::new(kind, vec!["element".to_string(), selector], description);
                match timeout_ms {
                    Some(ms) => step.with_option("timeout", *ms),
                    None => step,
                }
            }
            Action::Execute(script) => {
                CompiledStep::new(kind, vec![self.text(script)], "Execute JavaScript")
            }
            Action::Comment(note) => {
                let note = self.text(note);
                let description = format!("Note: {note}");
                CompiledStep::new(kind, vec![note], description)
            }
            Action::Dialog(dialog) => {
                let (args, description) = match dialog {
                    DialogAction::Alert => (vec!["alert".to_string()], "Dismiss alert".to_string()),
                    DialogAction::Confirm { accept } => {
                        let answer = if *accept { "accept" } else { "reject" };
                        (
                            vec!["confirm".to_string(), answer.to_string()],
                            format!("Answer confirm dialog with {answer}"),
                        )
                    }
                    DialogAction::Prompt(text) => {
                        let text = self.text(text);
                        let description = format!("Answer prompt with '{text}'");
                        (vec!["prompt".to_string(), text], description)
                    }
                };
                CompiledStep::new(kind, args, description)
            }
            Action::Select { selector, choice } => {
                let selector = self.text(selector);
                let (mode, value) = match choice {
                    SelectChoice::Option(value) => ("option", self.text(value)),
                    SelectChoice::Index(index) => ("index", index.to_string()),
                };
                let description = format!("Select {mode} '{value}' in {selector}");
                CompiledStep::new(kind, vec![mode.to_string(), selector, value], description)
            }
            Action::Window(window) => {
                let (args, description) = match window {
                    WindowAction::Maximize => {
                        (vec!["maximize".to_string()], "Maximize window".to_string())
                    }
                    WindowAction::Resize { width, height } => {
                        let size = format!("{width}x{height}");
                        let description = format!("Resize window to {size}");
                        (vec!["resize".to_string(), size], description)
                    }
                    WindowAction::Tab { next } => {
                        let dir = if *next { "next" } else { "prev" };
                        (
                            vec!["tab".to_string(), dir.to_string()],
                            format!("Switch to {dir} tab"),
                        )
                    }
                };
                CompiledStep::new(kind, args, description)
            }
            Action::Upload { selector, url } => {
                let selector = self.text(selector);
                let url = self.text(url);
                let description = format!("Upload {url} to {selector}");
                CompiledStep::new(kind, vec![selector, url], description)
            }
            Action::Mouse { action, target } => {
                let mut args = vec![action.clone()];
                let description = match target {
                    Some(target) => {
                        let target = self.text(target);
                        let description = format!("Mouse {action} {target}");
                        args.push(target);
                        description
                    }
                    None => format!("Mouse {action}"),
                };
                CompiledStep::new(kind, args, description)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(steps: &[CompiledStep]) -> Vec<ActionKind> {
        steps.iter().map(|s| s.command).collect()
    }

    fn compile_str(yaml: &str, dialect: Dialect) -> Result<CompiledTest> {
        compile(&Document::parse(yaml).unwrap(), dialect)
    }

    #[test]
    fn test_login_scenario_compiles_to_two_steps() {
        let compiled = compile_str(
            "test: Login\nnav: https://example.com\ndo:\n  - c: \"button.start\"\n  - ch: \"Success\"",
            Dialect::Compact,
        )
        .unwrap();
        assert_eq!(
            commands(&compiled.steps),
            vec![ActionKind::Click, ActionKind::Assert]
        );
        assert_eq!(compiled.steps[0].args, vec!["button.start"]);
        assert_eq!(compiled.steps[1].args, vec!["exists", "Success"]);
        assert_eq!(
            compiled.navigation_target.as_deref(),
            Some("https://example.com")
        );
        assert_eq!(compiled.steps[0].line, 4);
    }

    #[test]
    fn test_order_and_count_preserved() {
        let compiled = compile_str(
            "test: t\nsetup:\n  - nav: /start\ndo:\n  - t:\n      '#a': x\n  - k: enter\n  - wait: 100\n  - h: '.menu'\nteardown:\n  - note: bye\n",
            Dialect::Compact,
        )
        .unwrap();
        assert_eq!(
            commands(&compiled.steps),
            vec![
                ActionKind::Navigate,
                ActionKind::Write,
                ActionKind::Key,
                ActionKind::Wait,
                ActionKind::Hover,
                ActionKind::Comment
            ]
        );
    }

    #[test]
    fn test_simplified_compiles() {
        let compiled = compile_str(
            "name: t\nsteps:\n  - navigate: https://a.b\n  - write:\n      selector: '#q'\n      text: rust\n  - assert:\n      selector: '#n'\n      equals: 3\n",
            Dialect::Simplified,
        )
        .unwrap();
        assert_eq!(compiled.steps.len(), 3);
        assert_eq!(compiled.steps[1].args, vec!["#q", "rust"]);
        assert_eq!(compiled.steps[2].args, vec!["equals", "#n", "3"]);
    }

    #[test]
    fn test_data_variables_expand_but_stored_do_not() {
        let compiled = compile_str(
            "test: t\ndata:\n  user: alice\ndo:\n  - store:\n      '#id': orderId\n  - t:\n      '#q': \"{{user}}/${orderId}\"\n",
            Dialect::Compact,
        )
        .unwrap();
        assert_eq!(compiled.steps[1].args, vec!["#q", "alice/${orderId}"]);
    }

    #[test]
    fn test_relative_navigation_uses_base() {
        let compiled = compile_str(
            "test: t\nbase: https://shop.example\ndo:\n  - nav: /cart\n",
            Dialect::Compact,
        )
        .unwrap();
        assert_eq!(compiled.steps[0].args, vec!["https://shop.example/cart"]);
    }

    #[test]
    fn test_wait_timeout_option() {
        let compiled = compile_str(
            "test: t\ndo:\n  - wait:\n      for: '#r'\n      max: 5000\n",
            Dialect::Compact,
        )
        .unwrap();
        let step = &compiled.steps[0];
        assert_eq!(step.args, vec!["element", "#r"]);
        assert_eq!(step.option_u64("timeout"), Some(5000));
    }

    #[test]
    fn test_unrecognised_shape_names_index_and_key() {
        let err = compile_str("test: t\ndo:\n  - c: a\n  - clik: b\n", Dialect::Compact).unwrap_err();
        match err {
            Error::Compile { index, key, .. } => {
                assert_eq!(index, 1);
                assert_eq!(key, "clik");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extended_is_unsupported() {
        let err = compile_str(
            "name: x\ninfrastructure: {}\nsteps:\n  - type: click\n    target: a\n",
            Dialect::Extended,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDialect(Dialect::Extended)));
        assert!(err.to_string().contains("not supported for execution"));
    }
}
