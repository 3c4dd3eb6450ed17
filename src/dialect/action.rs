//! Typed actions shared by every executable dialect
//!
//! Each dialect recognises its own entry shapes and produces an [`Action`].
//! From here on nothing depends on which syntax the test was written in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command kind of a compiled step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Navigate,
    Scroll,
    Click,
    Write,
    Key,
    Hover,
    Assert,
    Store,
    Wait,
    Execute,
    Comment,
    Dialog,
    Select,
    Window,
    Upload,
    Mouse,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Scroll => "scroll",
            Self::Click => "click",
            Self::Write => "write",
            Self::Key => "key",
            Self::Hover => "hover",
            Self::Assert => "assert",
            Self::Store => "store",
            Self::Wait => "wait",
            Self::Execute => "execute",
            Self::Comment => "comment",
            Self::Dialog => "dialog",
            Self::Select => "select",
            Self::Window => "window",
            Self::Upload => "upload",
            Self::Mouse => "mouse",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assertion operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertOp {
    Exists,
    NotExists,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
}

impl AssertOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::NotExists => "not-exists",
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::GreaterThan => "gt",
            Self::LessThan => "lt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "exists" => Self::Exists,
            "not-exists" => Self::NotExists,
            "equals" => Self::Equals,
            "not-equals" => Self::NotEquals,
            "gt" => Self::GreaterThan,
            "lt" => Self::LessThan,
            _ => return None,
        })
    }

    /// Whether the operator compares against an expected value
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTarget {
    Top,
    Bottom,
    /// `x,y` coordinates
    Position(String),
    Element(String),
}

impl ScrollTarget {
    /// Interpret a scroll argument: `top`, `bottom`, `x,y`, a bare y offset or a selector
    pub fn parse(s: &str) -> Self {
        match s {
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            _ if s.contains(',') => Self::Position(s.to_string()),
            _ if s.parse::<i64>().is_ok() => Self::Position(format!("0,{s}")),
            _ => Self::Element(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// Fixed delay in milliseconds
    Time(u64),
    Element {
        selector: String,
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    Alert,
    Confirm { accept: bool },
    Prompt(String),
}

impl DialogAction {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "accept" | "dismiss" => Self::Alert,
            "confirm" => Self::Confirm { accept: true },
            "cancel" => Self::Confirm { accept: false },
            _ => Self::Prompt(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectChoice {
    Option(String),
    Index(u32),
}

impl SelectChoice {
    /// Numeric values select by index, anything else by option text
    pub fn parse(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Option(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowAction {
    Maximize,
    Resize { width: u32, height: u32 },
    Tab { next: bool },
}

impl WindowAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "maximize" => Some(Self::Maximize),
            "next" => Some(Self::Tab { next: true }),
            "prev" | "previous" => Some(Self::Tab { next: false }),
            _ => {
                let (w, h) = s.split_once('x')?;
                Some(Self::Resize {
                    width: w.trim().parse().ok()?,
                    height: h.trim().parse().ok()?,
                })
            }
        }
    }
}

/// A recognised action entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate {
        url: String,
    },
    Scroll(ScrollTarget),
    Click {
        selector: String,
        position: Option<String>,
        variable: Option<String>,
    },
    /// `selector: None` writes into the focused element
    Write {
        selector: Option<String>,
        text: String,
    },
    Key(String),
    Hover(String),
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
    Execute(String),
    Comment(String),
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

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Navigate { .. } => ActionKind::Navigate,
            Self::Scroll(_) => ActionKind::Scroll,
            Self::Click { .. } => ActionKind::Click,
            Self::Write { .. } => ActionKind::Write,
            Self::Key(_) => ActionKind::Key,
            Self::Hover(_) => ActionKind::Hover,
            Self::Assert { .. } => ActionKind::Assert,
            Self::Store { .. } => ActionKind::Store,
            Self::Wait(_) => ActionKind::Wait,
            Self::Execute(_) => ActionKind::Execute,
            Self::Comment(_) => ActionKind::Comment,
            Self::Dialog(_) => ActionKind::Dialog,
            Self::Select { .. } => ActionKind::Select,
            Self::Window(_) => ActionKind::Window,
            Self::Upload { .. } => ActionKind::Upload,
            Self::Mouse { .. } => ActionKind::Mouse,
        }
    }

    /// Variable this action makes available to later actions
    pub fn defined_variable(&self) -> Option<&str> {
        match self {
            Self::Store { variable, .. } => Some(variable.as_str()),
            Self::Click {
                variable: Some(variable),
                ..
            } => Some(variable.as_str()),
            _ => None,
        }
    }

    /// Selector the action targets, if any
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Click { selector, .. }
            | Self::Assert { selector, .. }
            | Self::Store { selector, .. }
            | Self::Select { selector, .. }
            | Self::Upload { selector, .. } => Some(selector.as_str()),
            Self::Write { selector, .. } => selector.as_deref(),
            Self::Hover(selector) => Some(selector.as_str()),
            Self::Scroll(ScrollTarget::Element(selector)) => Some(selector.as_str()),
            Self::Wait(WaitTarget::Element { selector, .. }) => Some(selector.as_str()),
            _ => None,
        }
    }

    /// Every user-supplied string that may contain variable references
    pub fn texts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            Self::Navigate { url } => out.push(url.as_str()),
            Self::Scroll(ScrollTarget::Position(s) | ScrollTarget::Element(s)) => out.push(s),
            Self::Scroll(_) => {}
            Self::Click { selector, .. } => out.push(selector),
            Self::Write { selector, text } => {
                if let Some(selector) = selector {
                    out.push(selector);
                }
                out.push(text);
            }
            Self::Key(s) | Self::Hover(s) | Self::Execute(s) | Self::Comment(s) => out.push(s),
            Self::Assert {
                selector, expected, ..
            } => {
                out.push(selector);
                if let Some(expected) = expected {
                    out.push(expected);
                }
            }
            Self::Store { selector, .. } => out.push(selector),
            Self::Wait(WaitTarget::Element { selector, .. }) => out.push(selector),
            Self::Wait(WaitTarget::Time(_)) => {}
            Self::Dialog(DialogAction::Prompt(text)) => out.push(text),
            Self::Dialog(_) | Self::Window(_) => {}
            Self::Select { selector, choice } => {
                out.push(selector);
                if let SelectChoice::Option(value) = choice {
                    out.push(value);
                }
            }
            Self::Upload { selector, url } => {
                out.push(selector);
                out.push(url);
            }
            Self::Mouse { target, .. } => {
                if let Some(target) = target {
                    out.push(target);
                }
            }
        }
        out
    }
}

/// Normalise a key name (`enter` -> `Enter`, `esc` -> `Escape`, ...)
pub fn normalize_key(key: &str) -> String {
    let mapped = match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => "Enter",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "space" => "Space",
        "backspace" => "Backspace",
        "delete" => "Delete",
        "up" => "ArrowUp",
        "down" => "ArrowDown",
        "left" => "ArrowLeft",
        "right" => "ArrowRight",
        _ => return key.to_string(),
    };
    mapped.to_string()
}
