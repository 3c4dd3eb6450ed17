//! Variable references inside action values
//!
//! `{{name}}` and `${name}` refer to test variables. `${ENV:NAME}` refers to
//! the environment of the remote runner and is left alone.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("variable reference pattern")
});

fn name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Names referenced by `text`, in order of appearance
pub fn references(text: &str) -> Vec<&str> {
    REFERENCE_RE.captures_iter(text).filter_map(|c| name(&c)).collect()
}

/// Replace references to known variables; unknown references are kept
pub fn expand(text: &str, values: &HashMap<String, String>) -> String {
    if !text.contains("{{") && !text.contains("${") {
        return text.to_string();
    }
    REFERENCE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            name(caps)
                .and_then(|n| values.get(n))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
