//! Compact dialect
//!
//! Terse syntax built around short action keys:
//!
//! ```yaml
//! test: Login
//! nav: https://example.com
//! do:
//!   - c: "button.start"
//!   - t:
//!       "#email": user@example.com
//!   - ch: "Success"
//! ```

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::action::{
    normalize_key, Action, AssertOp, DialogAction, ScrollTarget, SelectChoice, WaitTarget,
    WindowAction,
};
use super::{
    action_key, collect_entries, decode_mapping, scalar_string, single_pair, suggest_key, Dialect,
    Document, ShapeError, YamlTest,
};

/// Top-level fields of a compact test
pub const FIELDS: &[&str] = &[
    "test", "desc", "base", "nav", "data", "config", "setup", "do", "teardown",
];

/// Recognised action keys
pub const ACTION_KEYS: &[&str] = &[
    "nav", "scroll", "c", "t", "k", "h", "ch", "nch", "eq", "neq", "gt", "lt", "store", "wait",
    "js", "note", "dialog", "select", "window", "upload", "mouse",
];

const EXAMPLE: &str = r##"do:
  - c: "button.submit"
  - t:
      "#email": user@example.com
  - ch: "Welcome""##;

/// Typed compact test
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompactTest {
    pub test: Option<String>,
    pub desc: Option<String>,
    pub base: Option<String>,
    /// Navigation target of the test, used as the goal URL
    pub nav: Option<String>,
    pub data: Option<Mapping>,
    pub config: Option<Value>,
    pub setup: Option<Vec<Value>>,
    #[serde(rename = "do")]
    pub actions: Option<Vec<Value>>,
    pub teardown: Option<Vec<Value>>,
}

impl CompactTest {
    pub fn decode(doc: &Document) -> Result<Self, ShapeError> {
        decode_mapping(doc, Dialect::Compact)
    }

    /// Action lists in execution order
    pub fn sections(&self) -> [(&'static str, &[Value]); 3] {
        [
            ("setup", self.setup.as_deref().unwrap_or_default()),
            ("do", self.actions.as_deref().unwrap_or_default()),
            ("teardown", self.teardown.as_deref().unwrap_or_default()),
        ]
    }

    /// `data` entries; non-scalar values are rendered as JSON
    pub fn variables(&self) -> Vec<(String, String)> {
        self.data
            .iter()
            .flatten()
            .filter_map(|(k, v)| {
                let name = scalar_string(k)?;
                let value = scalar_string(v)
                    .or_else(|| serde_json::to_string(v).ok())
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect()
    }

    pub fn to_yaml_test(&self, doc: &Document) -> YamlTest {
        let base = self.base.as_deref();
        YamlTest {
            dialect: Dialect::Compact,
            name: self.test.clone().unwrap_or_default(),
            navigation_target: self.nav.as_deref().map(|nav| resolve_url(base, nav)),
            base_url: self.base.clone(),
            variables: self.variables(),
            actions: collect_entries(doc, &self.sections()),
        }
    }
}

/// Prefix a relative URL with `base`
pub fn resolve_url(base: Option<&str>, url: &str) -> String {
    let absolute = url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("{{")
        || url.starts_with("${");
    match base {
        Some(base) if !absolute && !base.is_empty() => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        _ => url.to_string(),
    }
}

/// Other spellings of compact action keys
const ALIASES: &[(&str, &str)] = &[
    ("click", "c"),
    ("type", "t"),
    ("write", "t"),
    ("fill", "t"),
    ("input", "t"),
    ("check", "ch"),
    ("assert", "ch"),
    ("see", "ch"),
    ("key", "k"),
    ("press", "k"),
    ("hover", "h"),
    ("navigate", "nav"),
    ("goto", "nav"),
    ("visit", "nav"),
    ("open", "nav"),
    ("comment", "note"),
    ("execute", "js"),
    ("javascript", "js"),
    ("script", "js"),
    ("sleep", "wait"),
    ("pause", "wait"),
    ("equals", "eq"),
];

fn suggest(key: &str) -> Option<&'static str> {
    suggest_key(key, ACTION_KEYS, ALIASES)
}

fn example_for(key: &str) -> &'static str {
    match key {
        "nav" => "- nav: /login",
        "scroll" => "- scroll: bottom",
        "c" => "- c: \"button.submit\"",
        "t" => "- t:\n    \"#email\": user@example.com",
        "k" => "- k: Enter",
        "h" => "- h: \".menu\"",
        "ch" | "nch" => "- ch: \"Welcome\"",
        "eq" | "neq" | "gt" | "lt" => "- eq:\n    \"#total\": \"42\"",
        "store" => "- store:\n    \"#order-id\": orderId",
        "wait" => "- wait: 1000\n- wait: \"#results\"\n- wait:\n    for: \"#results\"\n    max: 5000",
        "js" => "- js: \"window.scrollTo(0, 0)\"",
        "note" => "- note: \"Checkout starts here\"",
        "dialog" => "- dialog: accept",
        "select" => "- select:\n    \"#country\": Canada",
        "window" => "- window: 1024x768",
        "upload" => "- upload:\n    \"input[type=file]\": https://example.com/file.pdf",
        "mouse" => "- mouse:\n    action: move\n    target: \"#canvas\"",
        _ => EXAMPLE,
    }
}

/// Recognise one compact action entry
pub fn parse_action(value: &Value) -> Result<Action, ShapeError> {
    let Some(map) = value.as_mapping() else {
        return Err(ShapeError::new(
            scalar_string(value).unwrap_or_default(),
            "Action must be a 'key: value' mapping",
            "Prefix the value with its action key, for example 'c:' for a click",
        )
        .with_example(EXAMPLE));
    };
    let (key, body) = action_key(map, ACTION_KEYS, suggest, EXAMPLE)?;
    let key = key.as_str();

    let action = match key {
        "nav" => Action::Navigate {
            url: text(key, body)?,
        },
        "scroll" => Action::Scroll(ScrollTarget::parse(&text(key, body)?)),
        "c" => click(body)?,
        "t" => write(body)?,
        "k" => Action::Key(normalize_key(&text(key, body)?)),
        "h" => Action::Hover(text(key, body)?),
        "ch" | "nch" => Action::Assert {
            op: if key == "ch" {
                AssertOp::Exists
            } else {
                AssertOp::NotExists
            },
            selector: text(key, body)?,
            expected: None,
        },
        "eq" | "neq" | "gt" | "lt" => {
            let op = match key {
                "eq" => AssertOp::Equals,
                "neq" => AssertOp::NotEquals,
                "gt" => AssertOp::GreaterThan,
                _ => AssertOp::LessThan,
            };
            let (selector, expected) = pair(key, body)?;
            Action::Assert {
                op,
                selector,
                expected: Some(expected),
            }
        }
        "store" => {
            let (selector, variable) = pair(key, body)?;
            Action::Store { selector, variable }
        }
        "wait" => wait(body)?,
        "js" => Action::Execute(text(key, body)?),
        "note" => Action::Comment(text(key, body)?),
        "dialog" => Action::Dialog(DialogAction::parse(&text(key, body)?)),
        "select" => {
            let (selector, value) = pair(key, body)?;
            Action::Select {
                selector,
                choice: SelectChoice::parse(&value),
            }
        }
        "window" => {
            let value = text(key, body)?;
            let window = WindowAction::parse(&value).ok_or_else(|| {
                ShapeError::new(
                    key,
                    format!("Unknown window action '{value}'"),
                    "Use maximize, next, prev or a size like 1024x768",
                )
                .with_example(example_for(key))
            })?;
            Action::Window(window)
        }
        "upload" => {
            let (selector, url) = pair(key, body)?;
            Action::Upload { selector, url }
        }
        "mouse" => mouse(body)?,
        other => {
            return Err(
                ShapeError::new(other, format!("Unknown action '{other}'"), "Check the action key")
                    .with_example(EXAMPLE),
            )
        }
    };
    Ok(action)
}

fn text(key: &str, body: &Value) -> Result<String, ShapeError> {
    match scalar_string(body) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ShapeError::new(
            key,
            format!("'{key}' expects a text value"),
            format!("Give '{key}' a single value"),
        )
        .with_example(example_for(key))),
    }
}

fn pair(key: &str, body: &Value) -> Result<(String, String), ShapeError> {
    single_pair(body)
        .and_then(|(k, v)| Some((k, scalar_string(v)?)))
        .ok_or_else(|| {
            ShapeError::new(
                key,
                format!("'{key}' expects a single 'selector: value' mapping"),
                format!("Write '{key}' as a mapping with exactly one entry"),
            )
            .with_example(example_for(key))
        })
}

fn click(body: &Value) -> Result<Action, ShapeError> {
    if let Some(selector) = scalar_string(body) {
        return Ok(Action::Click {
            selector,
            position: None,
            variable: None,
        });
    }

    let bad = || {
        ShapeError::new(
            "c",
            "'c' expects a selector or a 'selector: {pos, var}' mapping",
            "Use 'c: <selector>' or put options under the selector",
        )
        .with_example("- c: \"button.submit\"\n- c:\n    \"a.result\":\n      pos: first\n      var: link")
    };

    let (selector, opts) = single_pair(body).ok_or_else(bad)?;
    let (position, variable) = match opts {
        Value::Null => (None, None),
        Value::Mapping(opts) => (
            opts.get("pos").and_then(scalar_string),
            opts.get("var").and_then(scalar_string),
        ),
        _ => return Err(bad()),
    };
    Ok(Action::Click {
        selector,
        position,
        variable,
    })
}

fn write(body: &Value) -> Result<Action, ShapeError> {
    if let Some(text) = scalar_string(body) {
        return Ok(Action::Write {
            selector: None,
            text,
        });
    }
    if let Some(map) = body.as_mapping() {
        if map.len() > 1 {
            return Err(ShapeError::new(
                "t",
                "'t' writes into one field per action",
                "Split the fields into separate 't' entries",
            )
            .with_example("- t:\n    \"#email\": user@example.com\n- t:\n    \"#password\": secret"));
        }
    }
    let (selector, text) = pair("t", body)?;
    Ok(Action::Write {
        selector: Some(selector),
        text,
    })
}

fn wait(body: &Value) -> Result<Action, ShapeError> {
    let bad = || {
        ShapeError::new(
            "wait",
            "'wait' expects milliseconds, a selector or a 'for'/'max' mapping",
            "Use a number for a fixed delay or a selector to wait for an element",
        )
        .with_example(example_for("wait"))
    };

    let target = match body {
        Value::Number(n) => {
            let ms = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(bad)?;
            WaitTarget::Time(ms)
        }
        Value::String(s) => match s.parse::<u64>() {
            Ok(ms) => WaitTarget::Time(ms),
            Err(_) if !s.is_empty() => WaitTarget::Element {
                selector: s.clone(),
                timeout_ms: None,
            },
            Err(_) => return Err(bad()),
        },
        Value::Mapping(map) => {
            let selector = map.get("for").and_then(scalar_string).ok_or_else(bad)?;
            let timeout_ms = match map.get("max") {
                None => None,
                Some(max) => Some(max.as_u64().ok_or_else(bad)?),
            };
            WaitTarget::Element {
                selector,
                timeout_ms,
            }
        }
        _ => return Err(bad()),
    };
    Ok(Action::Wait(target))
}

fn mouse(body: &Value) -> Result<Action, ShapeError> {
    let bad = || {
        ShapeError::new(
            "mouse",
            "'mouse' expects down, up, 'x,y' coordinates or an 'action'/'target' mapping",
            "Use one of the supported mouse forms",
        )
        .with_example(example_for("mouse"))
    };

    match body {
        Value::String(s) => match s.as_str() {
            "down" | "up" => Ok(Action::Mouse {
                action: s.clone(),
                target: None,
            }),
            coords if coords.contains(',') => Ok(Action::Mouse {
                action: "move-to".to_string(),
                target: Some(coords.to_string()),
            }),
            _ => Err(bad()),
        },
        Value::Mapping(map) => {
            let action = map.get("action").and_then(scalar_string).ok_or_else(bad)?;
            Ok(Action::Mouse {
                action,
                target: map.get("target").and_then(scalar_string),
            })
        }
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(yaml: &str) -> Result<Action, ShapeError> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        parse_action(&value)
    }

    #[test]
    fn test_decode_sections_in_order() {
        let doc = Document::parse(
            "test: t\nsetup:\n  - nav: /a\ndo:\n  - c: b\nteardown:\n  - note: done\n",
        )
        .unwrap();
        let test = CompactTest::decode(&doc).unwrap();
        let model = test.to_yaml_test(&doc);
        let sections: Vec<_> = model.actions.iter().map(|e| e.section).collect();
        assert_eq!(sections, vec!["setup", "do", "teardown"]);
        assert_eq!(model.actions[2].index, 2);
        assert_eq!(model.actions[1].line, 5);
    }

    #[test]
    fn test_nav_header_resolves_against_base() {
        let doc = Document::parse("test: t\nbase: https://example.com/\nnav: /login\ndo: []\n").unwrap();
        let model = CompactTest::decode(&doc).unwrap().to_yaml_test(&doc);
        assert_eq!(
            model.navigation_target.as_deref(),
            Some("https://example.com/login")
        );
    }

    #[test]
    fn test_data_variables() {
        let doc = Document::parse("test: t\ndata:\n  user: alice\n  retries: 3\ndo: []\n").unwrap();
        let test = CompactTest::decode(&doc).unwrap();
        assert_eq!(
            test.variables(),
            vec![
                ("user".to_string(), "alice".to_string()),
                ("retries".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn test_click_forms() {
        assert_eq!(
            action("c: button").unwrap(),
            Action::Click {
                selector: "button".into(),
                position: None,
                variable: None
            }
        );
        assert_eq!(
            action("c:\n  a.result:\n    pos: first\n    var: link").unwrap(),
            Action::Click {
                selector: "a.result".into(),
                position: Some("first".into()),
                variable: Some("link".into())
            }
        );
    }

    #[test]
    fn test_write_forms() {
        assert_eq!(
            action("t: hello").unwrap(),
            Action::Write {
                selector: None,
                text: "hello".into()
            }
        );
        assert_eq!(
            action("t:\n  '#email': a@b.c").unwrap(),
            Action::Write {
                selector: Some("#email".into()),
                text: "a@b.c".into()
            }
        );
        let err = action("t:\n  '#a': x\n  '#b': y").unwrap_err();
        assert!(err.message.contains("one field"));
    }

    #[test]
    fn test_assertions() {
        assert_eq!(
            action("nch: Error").unwrap(),
            Action::Assert {
                op: AssertOp::NotExists,
                selector: "Error".into(),
                expected: None
            }
        );
        assert_eq!(
            action("gt:\n  '#count': 3").unwrap(),
            Action::Assert {
                op: AssertOp::GreaterThan,
                selector: "#count".into(),
                expected: Some("3".into())
            }
        );
    }

    #[test]
    fn test_wait_forms() {
        assert_eq!(action("wait: 500").unwrap(), Action::Wait(WaitTarget::Time(500)));
        assert_eq!(
            action("wait: '#results'").unwrap(),
            Action::Wait(WaitTarget::Element {
                selector: "#results".into(),
                timeout_ms: None
            })
        );
        assert_eq!(
            action("wait:\n  for: '#results'\n  max: 5000").unwrap(),
            Action::Wait(WaitTarget::Element {
                selector: "#results".into(),
                timeout_ms: Some(5000)
            })
        );
        assert!(action("wait: [1, 2]").is_err());
    }

    #[test]
    fn test_key_is_normalized() {
        assert_eq!(action("k: enter").unwrap(), Action::Key("Enter".into()));
    }

    #[test]
    fn test_unknown_key_suggests_alias() {
        let err = action("click: button").unwrap_err();
        assert_eq!(err.key, "click");
        assert!(err.fix.contains("'c'"));
        assert!(err.example.is_some());
    }

    #[test]
    fn test_misspelled_alias_suggests_short_key() {
        let err = action("clik: button").unwrap_err();
        assert_eq!(err.fix, "Did you mean 'c'?");
        let err = action("chek: Welcome").unwrap_err();
        assert_eq!(err.fix, "Did you mean 'ch'?");
    }

    #[test]
    fn test_scalar_entry_is_rejected() {
        let err = action("just text").unwrap_err();
        assert!(err.message.contains("mapping"));
    }

    #[test]
    fn test_window_and_mouse() {
        assert_eq!(
            action("window: maximize").unwrap(),
            Action::Window(WindowAction::Maximize)
        );
        assert!(action("window: sideways").is_err());
        assert_eq!(
            action("mouse: 10,20").unwrap(),
            Action::Mouse {
                action: "move-to".into(),
                target: Some("10,20".into())
            }
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url(Some("https://a.b"), "/x"), "https://a.b/x");
        assert_eq!(resolve_url(Some("https://a.b"), "https://c.d"), "https://c.d");
        assert_eq!(resolve_url(None, "/x"), "/x");
    }
}
