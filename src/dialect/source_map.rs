//! Line lookup for parsed documents
//!
//! serde_yaml does not expose node positions once a document is decoded into a
//! `Value`, so line numbers are recovered by scanning the source text. Only
//! block-style YAML is mapped: top-level keys and the `- ` entries of a block
//! list directly under a top-level key. Anything else (flow-style `[...]`
//! lists, entries nested deeper) reports line 0.

use std::collections::HashMap;

/// 1-based line numbers for top-level keys and their list entries
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    keys: HashMap<String, usize>,
    entries: HashMap<String, Vec<usize>>,
}

impl SourceMap {
    /// Build a source map by scanning YAML text
    pub fn build(text: &str) -> Self {
        let mut map = Self::default();
        let mut section: Option<String> = None;
        let mut item_indent: Option<usize> = None;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let content = raw.trim_start();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let indent = raw.len() - content.len();

            let is_item = content == "-" || content.starts_with("- ");
            if is_item {
                if let Some(name) = &section {
                    match item_indent {
                        None => item_indent = Some(indent),
                        Some(expected) if expected != indent => continue,
                        Some(_) => {}
                    }
                    map.entries.entry(name.clone()).or_default().push(line_no);
                }
                continue;
            }

            if indent == 0 {
                if content.starts_with("---") || content.starts_with("...") {
                    section = None;
                    continue;
                }
                section = top_level_key(content);
                item_indent = None;
                if let Some(key) = &section {
                    map.keys.entry(key.clone()).or_insert(line_no);
                }
            }
        }

        map
    }

    /// Line of a top-level key, 0 if unknown
    pub fn key_line(&self, key: &str) -> usize {
        self.keys.get(key).copied().unwrap_or(0)
    }

    /// Line of the `index`-th list entry under `section`, 0 if unknown
    pub fn entry_line(&self, section: &str, index: usize) -> usize {
        self.entries
            .get(section)
            .and_then(|lines| lines.get(index))
            .copied()
            .unwrap_or(0)
    }
}

fn top_level_key(content: &str) -> Option<String> {
    let colon = content.find(':')?;
    let key = content[..colon]
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_entry_lines() {
        let text = "test: Login\nnav: https://example.com\ndo:\n  - c: \"button.start\"\n  - t:\n      \"#email\": a@b.c\n  - ch: \"Success\"\n";
        let map = SourceMap::build(text);
        assert_eq!(map.key_line("test"), 1);
        assert_eq!(map.key_line("nav"), 2);
        assert_eq!(map.key_line("do"), 3);
        assert_eq!(map.entry_line("do", 0), 4);
        assert_eq!(map.entry_line("do", 1), 5);
        assert_eq!(map.entry_line("do", 2), 7);
        assert_eq!(map.entry_line("do", 3), 0);
    }

    #[test]
    fn test_unindented_list_items() {
        let text = "name: x\nsteps:\n- click: a\n- assert: b\n";
        let map = SourceMap::build(text);
        assert_eq!(map.entry_line("steps", 0), 3);
        assert_eq!(map.entry_line("steps", 1), 4);
    }

    #[test]
    fn test_nested_items_are_not_entries() {
        let text = "do:\n  - c: a\n  - if:\n      then:\n        - c: b\n  - ch: c\n";
        let map = SourceMap::build(text);
        assert_eq!(map.entry_line("do", 0), 2);
        assert_eq!(map.entry_line("do", 1), 3);
        assert_eq!(map.entry_line("do", 2), 6);
    }

    #[test]
    fn test_flow_style_has_no_lines() {
        let map = SourceMap::build("do: [{c: a}, {ch: b}]\n");
        assert_eq!(map.key_line("do"), 1);
        assert_eq!(map.entry_line("do", 0), 0);
    }

    #[test]
    fn test_comments_are_skipped() {
        let map = SourceMap::build("# header\n\ntest: x\n");
        assert_eq!(map.key_line("test"), 3);
    }
}
