//! Simplified dialect
//!
//! Named verbs with either a plain value or a small mapping of options:
//!
//! ```yaml
//! name: Login
//! url: https://example.com
//! steps:
//!   - click: "button.start"
//!   - write:
//!       selector: "#email"
//!       text: user@example.com
//!   - assert: "Success"
//! ```

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::action::{normalize_key, Action, AssertOp, SelectChoice, WaitTarget};
use super::{
    action_key, collect_entries, decode_mapping, scalar_string, suggest_key, Dialect, Document,
    ShapeError, YamlTest,
};

/// Top-level fields of a simplified test
pub const FIELDS: &[&str] = &[
    "name",
    "description",
    "url",
    "project",
    "variables",
    "steps",
    "config",
];

/// Recognised step verbs
pub const VERBS: &[&str] = &[
    "navigate", "click", "write", "assert", "wait", "hover", "key", "select", "store", "comment",
    "execute",
];

const EXAMPLE: &str = r##"steps:
  - navigate: https://example.com
  - click: "button.submit"
  - assert: "Welcome""##;

/// Typed simplified test
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimplifiedTest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "starting_url")]
    pub url: Option<String>,
    pub project: Option<Value>,
    /// Either a list of `{name, value}` or a plain mapping
    pub variables: Option<Value>,
    pub steps: Option<Vec<Value>>,
    pub config: Option<Value>,
}

impl SimplifiedTest {
    pub fn decode(doc: &Document) -> Result<Self, ShapeError> {
        decode_mapping(doc, Dialect::Simplified)
    }

    pub fn variables(&self) -> Vec<(String, String)> {
        match &self.variables {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| {
                    let map = item.as_mapping()?;
                    let name = map.get("name").and_then(scalar_string)?;
                    let value = map.get("value").and_then(scalar_string).unwrap_or_default();
                    Some((name, value))
                })
                .collect(),
            Some(Value::Mapping(map)) => map
                .iter()
                .filter_map(|(k, v)| Some((scalar_string(k)?, scalar_string(v).unwrap_or_default())))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_yaml_test(&self, doc: &Document) -> YamlTest {
        let steps = self.steps.as_deref().unwrap_or_default();
        YamlTest {
            dialect: Dialect::Simplified,
            name: self.name.clone().unwrap_or_default(),
            navigation_target: self.url.clone(),
            base_url: None,
            variables: self.variables(),
            actions: collect_entries(doc, &[("steps", steps)]),
        }
    }
}

/// Other spellings of simplified verbs
const ALIASES: &[(&str, &str)] = &[
    ("c", "click"),
    ("t", "write"),
    ("type", "write"),
    ("fill", "write"),
    ("input", "write"),
    ("ch", "assert"),
    ("check", "assert"),
    ("verify", "assert"),
    ("expect", "assert"),
    ("k", "key"),
    ("press", "key"),
    ("h", "hover"),
    ("nav", "navigate"),
    ("goto", "navigate"),
    ("visit", "navigate"),
    ("open", "navigate"),
    ("note", "comment"),
    ("js", "execute"),
    ("javascript", "execute"),
    ("script", "execute"),
    ("sleep", "wait"),
    ("pause", "wait"),
];

fn suggest(key: &str) -> Option<&'static str> {
    suggest_key(key, VERBS, ALIASES)
}

fn example_for(verb: &str) -> &'static str {
    match verb {
        "navigate" => "- navigate: https://example.com/login",
        "click" => "- click: \"button.submit\"",
        "write" => "- write:\n    selector: \"#email\"\n    text: user@example.com",
        "assert" => "- assert: \"Welcome\"\n- assert:\n    selector: \"#total\"\n    equals: \"42\"",
        "wait" => "- wait: 1000\n- wait:\n    selector: \"#results\"\n    timeout: 5000",
        "hover" => "- hover: \".menu\"",
        "key" => "- key: Enter",
        "select" => "- select:\n    selector: \"#country\"\n    option: Canada",
        "store" => "- store:\n    selector: \"#order-id\"\n    as: orderId",
        "comment" => "- comment: \"Checkout starts here\"",
        "execute" => "- execute: \"window.scrollTo(0, 0)\"",
        _ => EXAMPLE,
    }
}

/// Recognise one simplified step
pub fn parse_step(value: &Value) -> Result<Action, ShapeError> {
    let Some(map) = value.as_mapping() else {
        return Err(ShapeError::new(
            scalar_string(value).unwrap_or_default(),
            "Step must be a 'verb: value' mapping",
            "Start the step with a verb such as 'click:' or 'assert:'",
        )
        .with_example(EXAMPLE));
    };
    let (verb, body) = action_key(map, VERBS, suggest, EXAMPLE)?;
    let verb = verb.as_str();
    let bad = |what: &str| {
        ShapeError::new(verb, format!("'{verb}' expects {what}"), format!("Fix the '{verb}' step"))
            .with_example(example_for(verb))
    };

    let action = match verb {
        "navigate" => Action::Navigate {
            url: value_or_field(body, &["url"]).ok_or_else(|| bad("a URL"))?,
        },
        "click" => Action::Click {
            selector: value_or_field(body, &["selector"]).ok_or_else(|| bad("a selector"))?,
            position: None,
            variable: None,
        },
        "hover" => Action::Hover(value_or_field(body, &["selector"]).ok_or_else(|| bad("a selector"))?),
        "key" => Action::Key(normalize_key(
            &value_or_field(body, &["key"]).ok_or_else(|| bad("a key name"))?,
        )),
        "comment" => Action::Comment(value_or_field(body, &["text"]).ok_or_else(|| bad("text"))?),
        "execute" => Action::Execute(
            value_or_field(body, &["script", "code"]).ok_or_else(|| bad("a script"))?,
        ),
        "write" => match body {
            Value::Mapping(map) => Action::Write {
                selector: field(map, &["selector"]),
                text: field(map, &["text", "value"])
                    .ok_or_else(|| bad("a 'text' field"))?,
            },
            other => Action::Write {
                selector: None,
                text: scalar_string(other).ok_or_else(|| bad("text or a selector/text mapping"))?,
            },
        },
        "assert" => assertion(body).ok_or_else(|| bad("a selector or a selector/condition mapping"))?,
        "wait" => Action::Wait(wait(body).map_err(bad)?),
        "select" => {
            let map = body.as_mapping().ok_or_else(|| bad("a selector/option mapping"))?;
            let selector = field(map, &["selector"]).ok_or_else(|| bad("a 'selector' field"))?;
            let choice = match field(map, &["index"]) {
                Some(index) => SelectChoice::Index(
                    index.parse().map_err(|_| bad("a numeric 'index'"))?,
                ),
                None => SelectChoice::Option(
                    field(map, &["option", "value"]).ok_or_else(|| bad("an 'option' field"))?,
                ),
            };
            Action::Select { selector, choice }
        }
        "store" => {
            let map = body.as_mapping().ok_or_else(|| bad("a selector/as mapping"))?;
            Action::Store {
                selector: field(map, &["selector"]).ok_or_else(|| bad("a 'selector' field"))?,
                variable: field(map, &["as", "variable"]).ok_or_else(|| bad("an 'as' field"))?,
            }
        }
        other => {
            return Err(
                ShapeError::new(other, format!("Unknown step '{other}'"), "Check the verb")
                    .with_example(EXAMPLE),
            )
        }
    };
    Ok(action)
}

fn field(map: &Mapping, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| map.get(*name).and_then(scalar_string))
        .filter(|s| !s.is_empty())
}

fn value_or_field(body: &Value, names: &[&str]) -> Option<String> {
    match body {
        Value::Mapping(map) => field(map, names),
        other => scalar_string(other).filter(|s| !s.is_empty()),
    }
}

fn assertion(body: &Value) -> Option<Action> {
    let map = match body {
        Value::Mapping(map) => map,
        other => {
            return Some(Action::Assert {
                op: AssertOp::Exists,
                selector: scalar_string(other).filter(|s| !s.is_empty())?,
                expected: None,
            })
        }
    };

    let selector = field(map, &["selector"])?;
    let conditions = [
        ("equals", AssertOp::Equals),
        ("not_equals", AssertOp::NotEquals),
        ("gt", AssertOp::GreaterThan),
        ("lt", AssertOp::LessThan),
    ];
    for (name, op) in conditions {
        if let Some(expected) = map.get(name).and_then(scalar_string) {
            return Some(Action::Assert {
                op,
                selector,
                expected: Some(expected),
            });
        }
    }

    let op = match map.get("exists").and_then(Value::as_bool) {
        Some(false) => AssertOp::NotExists,
        _ => AssertOp::Exists,
    };
    Some(Action::Assert {
        op,
        selector,
        expected: None,
    })
}

/// Read a wait step; the error names what was expected
fn wait(body: &Value) -> Result<WaitTarget, &'static str> {
    const EXPECTED: &str = "milliseconds or a selector";
    match body {
        Value::Number(n) => n.as_u64().map(WaitTarget::Time).ok_or(EXPECTED),
        Value::String(s) => match s.parse::<u64>() {
            Ok(ms) => Ok(WaitTarget::Time(ms)),
            Err(_) if !s.is_empty() => Ok(WaitTarget::Element {
                selector: s.clone(),
                timeout_ms: None,
            }),
            Err(_) => Err(EXPECTED),
        },
        Value::Mapping(map) => {
            if let Some(time) = map.get("time") {
                return time
                    .as_u64()
                    .map(WaitTarget::Time)
                    .ok_or("'time' as a whole number of milliseconds");
            }
            let selector = field(map, &["selector", "for"]).ok_or("a 'selector' field")?;
            let timeout_ms = match map.get("timeout") {
                None => None,
                Some(timeout) => Some(
                    timeout
                        .as_u64()
                        .ok_or("'timeout' as a whole number of milliseconds")?,
                ),
            };
            Ok(WaitTarget::Element {
                selector,
                timeout_ms,
            })
        }
        _ => Err(EXPECTED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(yaml: &str) -> Result<Action, ShapeError> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        parse_step(&value)
    }

    #[test]
    fn test_decode_and_model() {
        let doc = Document::parse(
            "name: Login\nurl: https://example.com\nvariables:\n  - name: user\n    value: alice\nsteps:\n  - click: a\n  - assert: b\n",
        )
        .unwrap();
        let test = SimplifiedTest::decode(&doc).unwrap();
        let model = test.to_yaml_test(&doc);
        assert_eq!(model.name, "Login");
        assert_eq!(model.navigation_target.as_deref(), Some("https://example.com"));
        assert_eq!(model.variables, vec![("user".to_string(), "alice".to_string())]);
        assert_eq!(model.actions.len(), 2);
        assert_eq!(model.actions[0].line, 7);
    }

    #[test]
    fn test_starting_url_alias() {
        let doc = Document::parse("name: x\nstarting_url: https://a.b\nsteps: []\n").unwrap();
        let test = SimplifiedTest::decode(&doc).unwrap();
        assert_eq!(test.url.as_deref(), Some("https://a.b"));
    }

    #[test]
    fn test_write_forms() {
        assert_eq!(
            step("write:\n  selector: '#email'\n  text: a@b.c").unwrap(),
            Action::Write {
                selector: Some("#email".into()),
                text: "a@b.c".into()
            }
        );
        assert_eq!(
            step("write: hello").unwrap(),
            Action::Write {
                selector: None,
                text: "hello".into()
            }
        );
        assert!(step("write:\n  selector: '#email'").is_err());
    }

    #[test]
    fn test_assert_forms() {
        assert_eq!(
            step("assert: Welcome").unwrap(),
            Action::Assert {
                op: AssertOp::Exists,
                selector: "Welcome".into(),
                expected: None
            }
        );
        assert_eq!(
            step("assert:\n  selector: '#total'\n  equals: 42").unwrap(),
            Action::Assert {
                op: AssertOp::Equals,
                selector: "#total".into(),
                expected: Some("42".into())
            }
        );
        assert_eq!(
            step("assert:\n  selector: '.error'\n  exists: false").unwrap(),
            Action::Assert {
                op: AssertOp::NotExists,
                selector: ".error".into(),
                expected: None
            }
        );
    }

    #[test]
    fn test_store_and_select() {
        assert_eq!(
            step("store:\n  selector: '#id'\n  as: orderId").unwrap(),
            Action::Store {
                selector: "#id".into(),
                variable: "orderId".into()
            }
        );
        assert_eq!(
            step("select:\n  selector: '#c'\n  index: 2").unwrap(),
            Action::Select {
                selector: "#c".into(),
                choice: SelectChoice::Index(2)
            }
        );
    }

    #[test]
    fn test_wait_forms() {
        assert_eq!(step("wait: 250").unwrap(), Action::Wait(WaitTarget::Time(250)));
        assert_eq!(
            step("wait:\n  selector: '#r'\n  timeout: 3000").unwrap(),
            Action::Wait(WaitTarget::Element {
                selector: "#r".into(),
                timeout_ms: Some(3000)
            })
        );
    }

    #[test]
    fn test_unreadable_wait_timeout_is_rejected() {
        let err = step("wait:\n  selector: '#r'\n  timeout: '5000'").unwrap_err();
        assert_eq!(err.key, "wait");
        assert!(err.message.contains("'timeout'"), "{}", err.message);
        assert!(err.example.as_deref().unwrap().contains("timeout: 5000"));

        let err = step("wait:\n  selector: '#r'\n  timeout: 5s").unwrap_err();
        assert!(err.message.contains("'timeout'"));
        assert!(step("wait:\n  time: soon").is_err());
    }

    #[test]
    fn test_compact_key_suggests_verb() {
        let err = step("c: button").unwrap_err();
        assert!(err.fix.contains("'click'"));
        let err = step("clik: button").unwrap_err();
        assert!(err.fix.contains("'click'"));
    }
}
