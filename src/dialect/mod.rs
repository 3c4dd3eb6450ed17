//! Test dialects and the canonical test model
//!
//! Decoding happens in two stages. [`Document::parse`] turns raw YAML into a
//! generic key/value mapping that the detector inspects. Once the dialect is
//! known, [`TestFile::decode`] reads the mapping into the dialect's typed
//! structure and each action entry is recognised into an [`Action`].

pub mod action;
pub mod compact;
pub mod extended;
pub mod simplified;
mod source_map;
pub mod variables;

pub use action::{Action, ActionKind};
pub use source_map::SourceMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

use crate::common::{Error, Result};

use self::compact::CompactTest;
use self::extended::ExtendedTest;
use self::simplified::SimplifiedTest;

/// Concrete YAML syntax a test was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Compact,
    Simplified,
    Extended,
    Unknown,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Simplified => "simplified",
            Self::Extended => "extended",
            Self::Unknown => "unknown",
        }
    }

    /// Only compact and simplified tests can be compiled and run
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Compact | Self::Simplified)
    }

    /// Minimal valid test in this dialect
    pub fn example(&self) -> &'static str {
        match self {
            Self::Compact | Self::Unknown => COMPACT_EXAMPLE,
            Self::Simplified => SIMPLIFIED_EXAMPLE,
            Self::Extended => EXTENDED_EXAMPLE,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMPACT_EXAMPLE: &str = r##"test: Login flow
nav: https://example.com/login
do:
  - t:
      "#email": user@example.com
  - c: "button[type=submit]"
  - ch: "Welcome""##;

const SIMPLIFIED_EXAMPLE: &str = r##"name: Login flow
url: https://example.com/login
steps:
  - write:
      selector: "#email"
      text: user@example.com
  - click: "button[type=submit]"
  - assert: "Welcome""##;

const EXTENDED_EXAMPLE: &str = r##"name: Login flow
infrastructure:
  goal: Login
steps:
  - type: navigate
    target: https://example.com/login"##;

/// A parsed YAML document: top-level mapping plus line lookup
#[derive(Debug, Clone, Default)]
pub struct Document {
    mapping: Mapping,
    source: SourceMap,
}

impl Document {
    /// Parse YAML text into a document
    ///
    /// Blank input or a null root is an empty document. Any other
    /// non-mapping root is a parse error.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = if is_blank(text) {
            Value::Null
        } else {
            serde_yaml::from_str(text).map_err(|e| Error::parse(&e))?
        };

        let mapping = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(mapping) => mapping,
            Value::Tagged(tagged) => match tagged.value {
                Value::Mapping(mapping) => mapping,
                _ => return Err(not_a_mapping()),
            },
            _ => return Err(not_a_mapping()),
        };

        Ok(Self {
            mapping,
            source: SourceMap::build(text),
        })
    }

    /// Wrap an already-decoded mapping; line numbers are unknown
    pub fn from_mapping(mapping: Mapping) -> Self {
        Self {
            mapping,
            source: SourceMap::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.mapping.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.mapping.get(key)
    }

    /// String keys in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.mapping.keys().filter_map(Value::as_str)
    }

    /// Entries of a top-level list, empty when absent or not a list
    pub fn sequence(&self, key: &str) -> &[Value] {
        match self.mapping.get(key) {
            Some(Value::Sequence(items)) => items,
            _ => &[],
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

fn not_a_mapping() -> Error {
    Error::Parse {
        line: 1,
        column: 1,
        message: "the top level of a test file must be a mapping of keys".to_string(),
    }
}

/// An entry that does not have a recognised shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    /// Offending key, empty when the entry has no usable key
    pub key: String,
    pub message: String,
    pub fix: String,
    pub example: Option<String>,
}

impl ShapeError {
    pub fn new(key: impl Into<String>, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
            fix: fix.into(),
            example: None,
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Convert into a compile error for the action at `index`
    pub fn into_compile_error(self, index: usize) -> Error {
        Error::Compile {
            index,
            key: self.key,
            message: self.message,
            fix: self.fix,
            example: self.example,
        }
    }
}

/// One untyped action entry with its origin
#[derive(Debug, Clone)]
pub struct ActionEntry {
    /// List the entry came from (`do`, `setup`, `steps`, ...)
    pub section: &'static str,
    /// Position within the whole test, 0-based
    pub index: usize,
    /// Position within `section`, 0-based
    pub offset: usize,
    /// Source line, 0 when unknown
    pub line: usize,
    pub value: Value,
}

impl ActionEntry {
    /// Location label such as `do[2]`
    pub fn label(&self) -> String {
        format!("{}[{}]", self.section, self.offset)
    }
}

/// Dialect-independent view of a test
#[derive(Debug, Clone)]
pub struct YamlTest {
    pub dialect: Dialect,
    pub name: String,
    pub navigation_target: Option<String>,
    /// Prefix for relative navigation URLs
    pub base_url: Option<String>,
    /// Variables declared up front, in declaration order
    pub variables: Vec<(String, String)>,
    pub actions: Vec<ActionEntry>,
}

impl YamlTest {
    /// Recognise one entry of this test
    pub fn parse_entry(&self, entry: &ActionEntry) -> std::result::Result<Action, ShapeError> {
        parse_entry(self.dialect, &entry.value)
    }
}

/// Recognise an action entry written in `dialect`
pub fn parse_entry(dialect: Dialect, value: &Value) -> std::result::Result<Action, ShapeError> {
    match dialect {
        Dialect::Compact => compact::parse_action(value),
        Dialect::Simplified => simplified::parse_step(value),
        Dialect::Extended | Dialect::Unknown => Err(ShapeError::new(
            "",
            format!("Steps in the {dialect} format cannot be compiled"),
            "Convert the test to the compact or simplified format",
        )
        .with_example(COMPACT_EXAMPLE)),
    }
}

/// A document decoded into its dialect's typed structure
#[derive(Debug, Clone)]
pub enum TestFile {
    Compact(CompactTest),
    Simplified(SimplifiedTest),
    Extended(ExtendedTest),
}

impl TestFile {
    pub fn decode(doc: &Document, dialect: Dialect) -> std::result::Result<Self, ShapeError> {
        match dialect {
            Dialect::Compact => CompactTest::decode(doc).map(Self::Compact),
            Dialect::Simplified => SimplifiedTest::decode(doc).map(Self::Simplified),
            Dialect::Extended => ExtendedTest::decode(doc).map(Self::Extended),
            Dialect::Unknown => Err(ShapeError::new(
                "",
                "Unable to determine the test format",
                "Use either the compact format (test/do) or the simplified format (name/steps), not a mix",
            )
            .with_example(format!(
                "{COMPACT_EXAMPLE}\n\n# or\n\n{SIMPLIFIED_EXAMPLE}"
            ))),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Compact(_) => Dialect::Compact,
            Self::Simplified(_) => Dialect::Simplified,
            Self::Extended(_) => Dialect::Extended,
        }
    }

    /// Build the dialect-independent view, attaching source lines from `doc`
    pub fn to_yaml_test(&self, doc: &Document) -> YamlTest {
        match self {
            Self::Compact(test) => test.to_yaml_test(doc),
            Self::Simplified(test) => test.to_yaml_test(doc),
            Self::Extended(test) => test.to_yaml_test(doc),
        }
    }
}

/// Decode the document's mapping into a typed structure
pub(crate) fn decode_mapping<T>(doc: &Document, dialect: Dialect) -> std::result::Result<T, ShapeError>
where
    T: serde::de::DeserializeOwned,
{
    serde_yaml::from_value(Value::Mapping(doc.mapping().clone())).map_err(|e| {
        ShapeError::new(
            "",
            format!("Invalid {dialect} test structure: {e}"),
            "Check the types of the top-level fields",
        )
        .with_example(dialect.example())
    })
}

/// Collect entries of the named sections in order
pub(crate) fn collect_entries(
    doc: &Document,
    sections: &[(&'static str, &[Value])],
) -> Vec<ActionEntry> {
    let mut entries = Vec::new();
    for &(section, values) in sections {
        for (i, value) in values.iter().enumerate() {
            let index = entries.len();
            entries.push(ActionEntry {
                section,
                index,
                offset: i,
                line: doc.source_map().entry_line(section, i),
                value: value.clone(),
            });
        }
    }
    entries
}

/// Render a scalar as text; mappings and sequences yield `None`
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}

/// Single `key: value` pair of a one-entry mapping
pub(crate) fn single_pair(value: &Value) -> Option<(String, &Value)> {
    let map = value.as_mapping()?;
    if map.len() != 1 {
        return None;
    }
    let (k, v) = map.iter().next()?;
    Some((scalar_string(k)?, v))
}

/// Find the single recognised key of an action entry
///
/// `suggest` proposes a replacement for an unknown key.
pub(crate) fn action_key<'a>(
    map: &'a Mapping,
    known: &[&str],
    suggest: impl Fn(&str) -> Option<&'static str>,
    example: &str,
) -> std::result::Result<(String, &'a Value), ShapeError> {
    let mut recognised = Vec::new();
    for (k, v) in map {
        let Some(key) = k.as_str() else {
            return Err(ShapeError::new(
                scalar_string(k).unwrap_or_default(),
                "Action keys must be strings",
                "Use one of the recognised action keys",
            )
            .with_example(example));
        };
        if matches!(key, "if" | "loop") {
            return Err(ShapeError::new(
                key,
                format!("Control flow '{key}' is not supported"),
                "Write the conditional or repeated steps out as plain actions",
            )
            .with_example(example));
        }
        if !known.contains(&key) {
            let fix = match suggest(key) {
                Some(s) => format!("Did you mean '{s}'?"),
                None => format!("Use one of: {}", known.join(", ")),
            };
            return Err(
                ShapeError::new(key, format!("Unknown action '{key}'"), fix).with_example(example),
            );
        }
        recognised.push((key.to_string(), v));
    }

    match recognised.len() {
        0 => Err(ShapeError::new(
            "",
            "Empty action entry",
            format!("Use one of: {}", known.join(", ")),
        )
        .with_example(example)),
        1 => Ok(recognised.remove(0)),
        _ => {
            let keys: Vec<_> = recognised.iter().map(|(k, _)| k.as_str()).collect();
            Err(ShapeError::new(
                keys[1],
                format!("Multiple actions in one entry: {}", keys.join(", ")),
                "Split each action into its own list entry",
            )
            .with_example(example))
        }
    }
}

/// Closest candidate by edit distance, if reasonably close
pub(crate) fn nearest(key: &str, candidates: &[&'static str]) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    candidates
        .iter()
        .map(|c| (*c, strsim::levenshtein(&key, c)))
        .filter(|(c, d)| *d <= 2 && *d < c.len().max(key.len()))
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

/// Replacement for an unknown action key
///
/// `aliases` maps other spellings to a recognised key. A typo of either a
/// recognised key or an alias resolves to the recognised key.
pub(crate) fn suggest_key(
    key: &str,
    known: &[&'static str],
    aliases: &[(&'static str, &'static str)],
) -> Option<&'static str> {
    let lowered = key.to_ascii_lowercase();
    if let Some((_, target)) = aliases.iter().find(|(alias, _)| *alias == lowered) {
        return Some(*target);
    }
    let candidates: Vec<&'static str> = known
        .iter()
        .copied()
        .chain(aliases.iter().map(|(alias, _)| *alias))
        .collect();
    let hit = nearest(&lowered, &candidates)?;
    Some(
        aliases
            .iter()
            .find(|(alias, _)| *alias == hit)
            .map_or(hit, |(_, target)| *target),
    )
}
