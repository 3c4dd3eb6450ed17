//! Typed step requests
//!
//! A [`StepRequest`] is the checked form of a [`CompiledStep`]: the positional
//! arguments are validated once, and the request then knows how to render
//! itself as the platform's `parsedStep` body.

use serde_json::{json, Value};

use crate::common::{Error, Result};
use crate::compiler::CompiledStep;
use crate::dialect::action::{
    AssertOp, DialogAction, ScrollTarget, SelectChoice, WaitTarget, WindowAction,
};
use crate::dialect::ActionKind;

/// Default element wait used by the platform when none is given
const DEFAULT_ELEMENT_WAIT_MS: u64 = 20_000;

/// One step creation call, per command kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRequest {
    Navigate {
        url: String,
    },
    Scroll(ScrollTarget),
    Click {
        selector: String,
        position: Option<String>,
        variable: Option<String>,
    },
    Write {
        selector: Option<String>,
        text: String,
    },
    Key {
        key: String,
    },
    Hover {
        selector: String,
    },
    Assert {
        op: AssertOp,
        selector: String,
        expected: Option<String>,
    },
    Store {
        selector: String,
        variable: String,
    },
    Wait(WaitTarget),
    Execute {
        script: String,
    },
    Comment {
        text: String,
    },
    Dialog(DialogAction),
    Select {
        selector: String,
        choice: SelectChoice,
    },
    Window(WindowAction),
    Upload {
        selector: String,
        url: String,
    },
    Mouse {
        action: String,
        target: Option<String>,
    },
}

impl StepRequest {
    /// Check a compiled step's arguments and build the matching request
    pub fn from_compiled(step: &CompiledStep) -> Result<Self> {
        let args = Args { step };
        let request = match step.command {
            ActionKind::Navigate => Self::Navigate {
                url: args.required(0, "url")?,
            },
            ActionKind::Scroll => Self::Scroll(match args.required(0, "scroll mode")?.as_str() {
                "top" => ScrollTarget::Top,
                "bottom" => ScrollTarget::Bottom,
                "position" => ScrollTarget::Position(args.required(1, "coordinates")?),
                "element" => ScrollTarget::Element(args.required(1, "selector")?),
                other => return Err(args.invalid(&format!("unknown scroll mode '{other}'"))),
            }),
            ActionKind::Click => Self::Click {
                selector: args.required(0, "selector")?,
                position: step.option_str("position").map(str::to_string),
                variable: step.option_str("variable").map(str::to_string),
            },
            ActionKind::Write => Self::Write {
                selector: step.arg(0).filter(|s| !s.is_empty()).map(str::to_string),
                text: args.present(1, "text")?,
            },
            ActionKind::Key => Self::Key {
                key: args.required(0, "key")?,
            },
            ActionKind::Hover => Self::Hover {
                selector: args.required(0, "selector")?,
            },
            ActionKind::Assert => {
                let name = args.required(0, "operator")?;
                let op = AssertOp::parse(&name)
                    .ok_or_else(|| args.invalid(&format!("unknown assertion '{name}'")))?;
                let expected = if op.takes_value() {
                    Some(args.present(2, "expected value")?)
                } else {
                    None
                };
                Self::Assert {
                    op,
                    selector: args.required(1, "selector")?,
                    expected,
                }
            }
            ActionKind::Store => Self::Store {
                selector: args.required(0, "selector")?,
                variable: args.required(1, "variable")?,
            },
            ActionKind::Wait => Self::Wait(match args.required(0, "wait mode")?.as_str() {
                "time" => {
                    let ms = args.required(1, "milliseconds")?;
                    WaitTarget::Time(ms.parse().map_err(|_| {
                        args.invalid(&format!("'{ms}' is not a number of milliseconds"))
                    })?)
                }
                "element" => WaitTarget::Element {
                    selector: args.required(1, "selector")?,
                    timeout_ms: step.option_u64("timeout"),
                },
                other => return Err(args.invalid(&format!("unknown wait mode '{other}'"))),
            }),
            ActionKind::Execute => Self::Execute {
                script: args.required(0, "script")?,
            },
            ActionKind::Comment => Self::Comment {
                text: args.present(0, "text")?,
            },
            ActionKind::Dialog => Self::Dialog(match args.required(0, "dialog kind")?.as_str() {
                "alert" => DialogAction::Alert,
                "confirm" => DialogAction::Confirm {
                    accept: args.required(1, "answer")? == "accept",
                },
                "prompt" => DialogAction::Prompt(args.present(1, "text")?),
                other => return Err(args.invalid(&format!("unknown dialog kind '{other}'"))),
            }),
            ActionKind::Select => {
                let mode = args.required(0, "select mode")?;
                let selector = args.required(1, "selector")?;
                let value = args.present(2, "value")?;
                let choice = match mode.as_str() {
                    "option" => SelectChoice::Option(value),
                    "index" => SelectChoice::Index(value.parse().map_err(|_| {
                        args.invalid(&format!("'{value}' is not a valid index"))
                    })?),
                    other => return Err(args.invalid(&format!("unknown select mode '{other}'"))),
                };
                Self::Select { selector, choice }
            }
            ActionKind::Window => {
                let mode = args.required(0, "window action")?;
                let window = match mode.as_str() {
                    "maximize" => Some(WindowAction::Maximize),
                    "resize" | "tab" => WindowAction::parse(&args.required(1, "argument")?),
                    _ => None,
                };
                Self::Window(window.ok_or_else(|| args.invalid("unrecognised window action"))?)
            }
            ActionKind::Upload => Self::Upload {
                selector: args.required(0, "selector")?,
                url: args.required(1, "file url")?,
            },
            ActionKind::Mouse => Self::Mouse {
                action: args.required(0, "mouse action")?,
                target: step.arg(1).map(str::to_string),
            },
        };
        Ok(request)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Navigate { .. } => ActionKind::Navigate,
            Self::Scroll(_) => ActionKind::Scroll,
            Self::Click { .. } => ActionKind::Click,
            Self::Write { .. } => ActionKind::Write,
            Self::Key { .. } => ActionKind::Key,
            Self::Hover { .. } => ActionKind::Hover,
            Self::Assert { .. } => ActionKind::Assert,
            Self::Store { .. } => ActionKind::Store,
            Self::Wait(_) => ActionKind::Wait,
            Self::Execute { .. } => ActionKind::Execute,
            Self::Comment { .. } => ActionKind::Comment,
            Self::Dialog(_) => ActionKind::Dialog,
            Self::Select { .. } => ActionKind::Select,
            Self::Window(_) => ActionKind::Window,
            Self::Upload { .. } => ActionKind::Upload,
            Self::Mouse { .. } => ActionKind::Mouse,
        }
    }

    /// Render the platform `parsedStep` body
    pub fn parsed_step(&self) -> Value {
        match self {
            Self::Navigate { url } => json!({
                "action": "NAVIGATE",
                "target": target(url),
                "value": url,
                "meta": { "kind": "NAVIGATE", "useNewTab": false },
            }),
            Self::Scroll(scroll) => match scroll {
                ScrollTarget::Top => meta_only("SCROLL", "", json!({ "kind": "SCROLL", "type": "TOP" })),
                ScrollTarget::Bottom => {
                    meta_only("SCROLL", "", json!({ "kind": "SCROLL", "type": "BOTTOM" }))
                }
                ScrollTarget::Position(pos) => {
                    let (x, y) = pos.split_once(',').unwrap_or(("0", pos.as_str()));
                    let x: i64 = x.trim().parse().unwrap_or(0);
                    let y: i64 = y.trim().parse().unwrap_or(0);
                    meta_only(
                        "SCROLL",
                        "",
                        json!({ "kind": "SCROLL", "type": "POSITION", "x": x, "y": y }),
                    )
                }
                ScrollTarget::Element(selector) => json!({
                    "action": "SCROLL",
                    "target": target(selector),
                    "value": "",
                    "meta": { "kind": "SCROLL", "type": "ELEMENT" },
                }),
            },
            Self::Click {
                selector,
                position,
                variable,
            } => {
                let mut clue = json!({ "clue": selector });
                if let Some(position) = position {
                    clue["position"] = json!(position);
                }
                if let Some(variable) = variable {
                    clue["variable"] = json!(variable);
                }
                json!({
                    "action": "CLICK",
                    "target": { "selectors": [{ "type": "GUESS", "value": clue.to_string() }] },
                    "value": "",
                    "meta": {},
                })
            }
            Self::Write { selector, text } => {
                let mut body = json!({
                    "action": "WRITE",
                    "value": text,
                    "meta": { "kind": "WRITE", "append": false },
                });
                if let Some(selector) = selector {
                    body["target"] = target(selector);
                }
                body
            }
            Self::Key { key } => meta_only("KEY", key, json!({ "kind": "KEY", "key": key })),
            Self::Hover { selector } => json!({
                "action": "MOUSE",
                "target": target(selector),
                "value": "",
                "meta": { "kind": "MOUSE", "action": "OVER" },
            }),
            Self::Assert {
                op,
                selector,
                expected,
            } => json!({
                "action": assert_action(*op),
                "target": target(selector),
                "value": expected.as_deref().unwrap_or(""),
                "meta": {},
            }),
            Self::Store { selector, variable } => json!({
                "action": "STORE",
                "variable": variable,
                "target": target(selector),
                "meta": { "kind": "STORE" },
            }),
            Self::Wait(WaitTarget::Time(ms)) => meta_only(
                "WAIT",
                &ms.to_string(),
                json!({ "kind": "WAIT", "type": "TIME", "duration": ms, "poll": 100 }),
            ),
            Self::Wait(WaitTarget::Element {
                selector,
                timeout_ms,
            }) => json!({
                "action": "WAIT",
                "target": target(selector),
                "value": timeout_ms.unwrap_or(DEFAULT_ELEMENT_WAIT_MS).to_string(),
                "meta": { "kind": "WAIT", "type": "ELEMENT" },
            }),
            Self::Execute { script } => meta_only(
                "EXECUTE",
                script,
                json!({ "explicit": true, "script": script }),
            ),
            Self::Comment { text } => meta_only("COMMENT", text, json!({ "kind": "COMMENT" })),
            Self::Dialog(dialog) => match dialog {
                DialogAction::Alert => {
                    meta_only("DISMISS", "", json!({ "kind": "DISMISS", "type": "ALERT" }))
                }
                DialogAction::Confirm { accept } => {
                    let answer = if *accept { "OK" } else { "CANCEL" };
                    meta_only(
                        "DISMISS",
                        "",
                        json!({ "kind": "DISMISS", "type": "CONFIRM", "action": answer }),
                    )
                }
                DialogAction::Prompt(text) => meta_only(
                    "DISMISS",
                    text,
                    json!({ "kind": "DISMISS", "type": "PROMPT", "action": "OK" }),
                ),
            },
            Self::Select { selector, choice } => {
                let (value, kind) = match choice {
                    SelectChoice::Option(text) => (text.clone(), "OPTION"),
                    SelectChoice::Index(index) => (index.to_string(), "INDEX"),
                };
                json!({
                    "action": "PICK",
                    "target": target(selector),
                    "value": value,
                    "meta": { "kind": "PICK", "type": kind },
                })
            }
            Self::Window(window) => match window {
                WindowAction::Maximize => {
                    meta_only("WINDOW", "", json!({ "kind": "WINDOW", "type": "MAXIMIZE" }))
                }
                WindowAction::Resize { width, height } => meta_only(
                    "WINDOW",
                    "",
                    json!({
                        "kind": "WINDOW",
                        "type": "RESIZE",
                        "dimension": { "width": width, "height": height },
                    }),
                ),
                WindowAction::Tab { next } => {
                    let direction = if *next { "NEXT_TAB" } else { "PREV_TAB" };
                    meta_only("SWITCH", "", json!({ "kind": "SWITCH", "type": direction }))
                }
            },
            Self::Upload { selector, url } => json!({
                "action": "UPLOAD",
                "value": url,
                "element": { "target": target(selector) },
                "meta": { "kind": "UPLOAD" },
            }),
            Self::Mouse { action, target: at } => {
                let mut body = meta_only(
                    "MOUSE",
                    at.as_deref().unwrap_or(""),
                    json!({ "kind": "MOUSE", "action": mouse_action(action) }),
                );
                if let Some(at) = at.as_deref().filter(|t| !t.contains(',')) {
                    body["target"] = target(at);
                }
                body
            }
        }
    }
}

/// Positional argument access with uniform error messages
struct Args<'a> {
    step: &'a CompiledStep,
}

impl Args<'_> {
    /// A non-empty argument
    fn required(&self, index: usize, what: &str) -> Result<String> {
        match self.step.arg(index) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(self.invalid(&format!("missing {what} (argument {})", index + 1))),
        }
    }

    /// An argument that may be empty but must exist
    fn present(&self, index: usize, what: &str) -> Result<String> {
        self.step
            .arg(index)
            .map(str::to_string)
            .ok_or_else(|| self.invalid(&format!("missing {what} (argument {})", index + 1)))
    }

    fn invalid(&self, message: &str) -> Error {
        Error::invalid_step(self.step.command.as_str(), message)
    }
}

fn target(selector: &str) -> Value {
    let clue = json!({ "clue": selector }).to_string();
    json!({ "selectors": [{ "type": "GUESS", "value": clue }] })
}

fn meta_only(action: &str, value: &str, meta: Value) -> Value {
    json!({ "action": action, "value": value, "meta": meta })
}

fn assert_action(op: AssertOp) -> &'static str {
    match op {
        AssertOp::Exists => "ASSERT_EXISTS",
        AssertOp::NotExists => "ASSERT_NOT_EXISTS",
        AssertOp::Equals => "ASSERT_EQUALS",
        AssertOp::NotEquals => "ASSERT_NOT_EQUALS",
        AssertOp::GreaterThan => "ASSERT_GREATER_THAN",
        AssertOp::LessThan => "ASSERT_LESS_THAN",
    }
}

fn mouse_action(action: &str) -> String {
    match action {
        "move-to" | "move" => "MOVE".to_string(),
        "move-by" => "OFFSET".to_string(),
        other => other.to_ascii_uppercase().replace('-', "_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(command: ActionKind, args: &[&str]) -> CompiledStep {
        CompiledStep::new(command, args.iter().map(|s| s.to_string()).collect(), "")
    }

    #[test]
    fn test_click_with_variable() {
        let compiled = step(ActionKind::Click, &["Submit"]).with_option("variable", "btn");
        let request = StepRequest::from_compiled(&compiled).unwrap();
        assert_eq!(
            request,
            StepRequest::Click {
                selector: "Submit".into(),
                position: None,
                variable: Some("btn".into()),
            }
        );

        let body = request.parsed_step();
        assert_eq!(body["action"], "CLICK");
        let clue: Value =
            serde_json::from_str(body["target"]["selectors"][0]["value"].as_str().unwrap()).unwrap();
        assert_eq!(clue["clue"], "Submit");
        assert_eq!(clue["variable"], "btn");
    }

    #[test]
    fn test_selector_with_quotes_is_escaped() {
        let request = StepRequest::from_compiled(&step(ActionKind::Hover, &["a[title=\"x\"]"])).unwrap();
        let body = request.parsed_step();
        let raw = body["target"]["selectors"][0]["value"].as_str().unwrap();
        let clue: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(clue["clue"], "a[title=\"x\"]");
    }

    #[test]
    fn test_assert_requires_expected_value() {
        let err = StepRequest::from_compiled(&step(ActionKind::Assert, &["equals", "#total"])).unwrap_err();
        assert!(matches!(err, Error::InvalidStep { .. }));

        let ok = StepRequest::from_compiled(&step(ActionKind::Assert, &["equals", "#total", "42"])).unwrap();
        assert_eq!(ok.parsed_step()["action"], "ASSERT_EQUALS");
        assert_eq!(ok.parsed_step()["value"], "42");
    }

    #[test]
    fn test_wait_time_must_be_numeric() {
        let err = StepRequest::from_compiled(&step(ActionKind::Wait, &["time", "soon"])).unwrap_err();
        assert!(err.to_string().contains("soon"));

        let ok = StepRequest::from_compiled(&step(ActionKind::Wait, &["time", "1500"])).unwrap();
        assert_eq!(ok.parsed_step()["meta"]["duration"], 1500);
    }

    #[test]
    fn test_write_without_selector() {
        let request = StepRequest::from_compiled(&step(ActionKind::Write, &["", "hello"])).unwrap();
        let body = request.parsed_step();
        assert_eq!(body["value"], "hello");
        assert!(body.get("target").is_none());
    }

    #[test]
    fn test_dialog_and_window() {
        let confirm = StepRequest::from_compiled(&step(ActionKind::Dialog, &["confirm", "reject"])).unwrap();
        assert_eq!(confirm.parsed_step()["meta"]["action"], "CANCEL");

        let resize = StepRequest::from_compiled(&step(ActionKind::Window, &["resize", "1024x768"])).unwrap();
        assert_eq!(
            resize,
            StepRequest::Window(WindowAction::Resize {
                width: 1024,
                height: 768
            })
        );
        assert!(StepRequest::from_compiled(&step(ActionKind::Window, &["resize", "big"])).is_err());
    }

    #[test]
    fn test_missing_argument_names_command() {
        let err = StepRequest::from_compiled(&step(ActionKind::Navigate, &[])).unwrap_err();
        assert!(err.to_string().contains("navigate"));
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_kind_round_trips_command() {
        let compiled = step(ActionKind::Select, &["index", "#country", "2"]);
        let request = StepRequest::from_compiled(&compiled).unwrap();
        assert_eq!(request.kind(), ActionKind::Select);
        assert_eq!(request.parsed_step()["action"], "PICK");
    }
}
