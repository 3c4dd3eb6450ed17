//! Semantic validation of test files
//!
//! Checks that required fields exist, that every entry has a recognised
//! shape, that variable references resolve to an earlier definition, and
//! (optionally) a handful of best practices. Problems are reported with the
//! source line when the document has one, otherwise line 0.

mod diagnostic;

pub use diagnostic::{Severity, ValidationError};

use serde::Serialize;
use std::collections::HashSet;

use crate::common::config::ValidationConfig;
use crate::dialect::action::Action;
use crate::dialect::{extended, variables, ActionEntry, Dialect, Document, TestFile, YamlTest};

/// Longest test name that does not draw a warning
const MAX_NAME_LEN: usize = 80;

const CREDENTIAL_HINTS: &[&str] = &["password", "passwd", "secret", "token", "apikey", "api_key"];

/// Errors and warnings from one validation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Strict mode: every warning becomes an error
    pub fn promote_warnings(&mut self) {
        for mut warning in self.warnings.drain(..) {
            warning.severity = Severity::Error;
            self.errors.push(warning);
        }
    }

    fn error(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    fn warn(&mut self, warning: ValidationError) {
        self.warnings.push(warning);
    }
}

/// Rule-based validator
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    best_practices: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Validator {
    pub fn new(best_practices: bool) -> Self {
        Self { best_practices }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.best_practices)
    }

    /// Validate `doc` under the rules of `dialect`
    pub fn validate(&self, doc: &Document, dialect: Dialect) -> ValidationReport {
        let mut report = ValidationReport::default();

        let file = match TestFile::decode(doc, dialect) {
            Ok(file) => file,
            Err(shape) => {
                let field = shape.key.clone();
                report.error(ValidationError::from_shape(0, field, shape));
                return report;
            }
        };

        check_required(&file, doc, &mut report);
        let test = file.to_yaml_test(doc);

        if let TestFile::Extended(_) = file {
            for entry in &test.actions {
                if let Err(shape) = extended::check_step(&entry.value) {
                    report.error(ValidationError::from_shape(entry.line, entry.label(), shape));
                }
            }
            return report;
        }

        let actions = check_actions(&test, doc, &mut report);
        if self.best_practices {
            check_practices(&test, doc, &actions, &mut report);
        }

        tracing::debug!(
            dialect = %dialect,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Validated document"
        );
        report
    }
}

/// Validate with default rules, returning validity and errors
///
/// Warnings from the same pass are available through [`Validator::validate`].
pub fn validate(doc: &Document, dialect: Dialect) -> (bool, Vec<ValidationError>) {
    let report = Validator::default().validate(doc, dialect);
    (report.is_valid(), report.errors)
}

fn check_required(file: &TestFile, doc: &Document, report: &mut ValidationReport) {
    let example = file.dialect().example();
    let (name_field, name, list_field, list) = match file {
        TestFile::Compact(t) => ("test", t.test.as_deref(), "do", t.actions.as_deref()),
        TestFile::Simplified(t) => ("name", t.name.as_deref(), "steps", t.steps.as_deref()),
        TestFile::Extended(t) => ("name", t.name.as_deref(), "steps", t.steps.as_deref()),
    };

    if name.map_or(true, |n| n.trim().is_empty()) {
        report.error(
            ValidationError::error(
                doc.source_map().key_line(name_field),
                name_field,
                format!("Missing required field '{name_field}'"),
            )
            .with_fix(format!("Add a '{name_field}' field naming the test"))
            .with_example(example),
        );
    }

    match list {
        None => report.error(
            ValidationError::error(
                doc.source_map().key_line(list_field),
                list_field,
                format!("Missing required field '{list_field}'"),
            )
            .with_fix(format!("Add a '{list_field}' list with at least one action"))
            .with_example(example),
        ),
        Some([]) => report.error(
            ValidationError::error(
                doc.source_map().key_line(list_field),
                list_field,
                format!("'{list_field}' must contain at least one action"),
            )
            .with_fix(format!("Add an action to '{list_field}'"))
            .with_example(example),
        ),
        Some(_) => {}
    }
}

/// Recognise every entry and check variable references in order
fn check_actions<'t>(
    test: &'t YamlTest,
    doc: &Document,
    report: &mut ValidationReport,
) -> Vec<(&'t ActionEntry, Action)> {
    let mut defined: HashSet<String> = test.variables.iter().map(|(n, _)| n.clone()).collect();
    let mut actions = Vec::with_capacity(test.actions.len());

    if let Some(target) = &test.navigation_target {
        let line = doc.source_map().key_line(match test.dialect {
            Dialect::Simplified => "url",
            _ => "nav",
        });
        for name in variables::references(target) {
            if !defined.contains(name) {
                report.error(undefined_variable(line, "navigation", name, test.dialect));
            }
        }
    }

    for entry in &test.actions {
        let action = match test.parse_entry(entry) {
            Ok(action) => action,
            Err(shape) => {
                report.error(ValidationError::from_shape(entry.line, entry.label(), shape));
                continue;
            }
        };

        for text in action.texts() {
            for name in variables::references(text) {
                if !defined.contains(name) {
                    report.error(undefined_variable(
                        entry.line,
                        &entry.label(),
                        name,
                        test.dialect,
                    ));
                }
            }
        }
        if let Some(variable) = action.defined_variable() {
            defined.insert(variable.to_string());
        }
        actions.push((entry, action));
    }

    actions
}

fn undefined_variable(line: usize, field: &str, name: &str, dialect: Dialect) -> ValidationError {
    let example = match dialect {
        Dialect::Simplified => format!("- store:\n    selector: \"#value\"\n    as: {name}"),
        _ => format!("- store:\n    \"#value\": {name}"),
    };
    ValidationError::error(
        line,
        field,
        format!("Variable '{name}' is used before it is defined"),
    )
    .with_fix(format!(
        "Declare '{name}' up front or capture it with an earlier 'store' action"
    ))
    .with_example(example)
}

fn check_practices(
    test: &YamlTest,
    doc: &Document,
    actions: &[(&ActionEntry, Action)],
    report: &mut ValidationReport,
) {
    let name_field = match test.dialect {
        Dialect::Compact => "test",
        _ => "name",
    };
    if test.name.chars().count() > MAX_NAME_LEN {
        report.warn(
            ValidationError::warning(
                doc.source_map().key_line(name_field),
                name_field,
                format!("Test name is longer than {MAX_NAME_LEN} characters"),
            )
            .with_fix("Shorten the name and move details into the description"),
        );
    }

    let vars_field = match test.dialect {
        Dialect::Compact => "data",
        _ => "variables",
    };
    for (name, value) in &test.variables {
        let lowered = name.to_ascii_lowercase();
        let looks_secret = CREDENTIAL_HINTS.iter().any(|hint| lowered.contains(hint));
        if looks_secret && !value.is_empty() && !value.contains("${") && !value.contains("{{") {
            report.warn(
                ValidationError::warning(
                    doc.source_map().key_line(vars_field),
                    vars_field,
                    format!("Variable '{name}' looks like a hard-coded credential"),
                )
                .with_fix("Reference an environment value such as ${ENV:PASSWORD} instead"),
            );
        }
    }

    let mut waited = false;
    let mut warned_unwaited_assert = false;
    for (i, (entry, action)) in actions.iter().enumerate() {
        match action {
            Action::Wait(_) => waited = true,
            Action::Assert { .. } if !waited && !warned_unwaited_assert => {
                warned_unwaited_assert = true;
                report.warn(
                    ValidationError::warning(
                        entry.line,
                        entry.label(),
                        "Assertion without an earlier explicit wait",
                    )
                    .with_fix("Wait for the element before asserting on it")
                    .with_example(wait_example(test.dialect)),
                );
            }
            Action::Navigate { .. } => {
                let next = actions.get(i + 1).map(|(_, a)| a);
                if let Some(next) = next {
                    if !matches!(next, Action::Wait(_) | Action::Assert { .. }) {
                        report.warn(
                            ValidationError::warning(
                                entry.line,
                                entry.label(),
                                "Navigation is not followed by a wait or check",
                            )
                            .with_fix("Wait for an element that shows the page has loaded")
                            .with_example(wait_example(test.dialect)),
                        );
                    }
                }
            }
            _ => {}
        }

        if let Some(selector) = action.selector() {
            if unbalanced(selector) {
                report.warn(
                    ValidationError::warning(
                        entry.line,
                        entry.label(),
                        format!("Selector '{selector}' has unbalanced quotes or brackets"),
                    )
                    .with_fix("Close every quote and bracket in the selector"),
                );
            }
        }
    }
}

fn wait_example(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Simplified => "- wait:\n    selector: \"#content\"\n    timeout: 5000",
        _ => "- wait: \"#content\"",
    }
}

fn unbalanced(selector: &str) -> bool {
    let quotes = selector.matches('"').count();
    let open = selector.matches('[').count();
    let close = selector.matches(']').count();
    quotes % 2 == 1 || open != close
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(yaml: &str, dialect: Dialect) -> ValidationReport {
        Validator::default().validate(&Document::parse(yaml).unwrap(), dialect)
    }

    #[test]
    fn test_valid_compact() {
        let report = run(
            "test: Login\nnav: https://example.com\ndo:\n  - wait: \"#form\"\n  - c: \"button.start\"\n  - ch: \"Success\"\n",
            Dialect::Compact,
        );
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_missing_do_names_field() {
        let report = run("test: Login\nnav: https://example.com\n", Dialect::Compact);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.message.contains("'do'")));
    }

    #[test]
    fn test_missing_steps_names_field() {
        let (valid, errors) = validate(&Document::parse("name: Login\n").unwrap(), Dialect::Simplified);
        assert!(!valid);
        assert!(errors[0].message.contains("'steps'"));
    }

    #[test]
    fn test_unknown_action_has_line_fix_and_example() {
        let report = run(
            "test: Login\ndo:\n  - c: a\n  - clik: b\n",
            Dialect::Compact,
        );
        let err = &report.errors[0];
        assert_eq!(err.line, 4);
        assert_eq!(err.field, "do[1]");
        assert!(err.fix.as_deref().unwrap().contains("'c'"));
        assert!(err.example.is_some());
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let report = run(
            "test: t\ndo:\n  - t:\n      '#q': \"{{query}}\"\n",
            Dialect::Compact,
        );
        assert!(report.errors.iter().any(|e| e.message.contains("'query'")));
    }

    #[test]
    fn test_variable_defined_by_store_or_data() {
        let report = run(
            "test: t\ndata:\n  user: alice\ndo:\n  - store:\n      '#id': orderId\n  - t:\n      '#q': \"{{user}} ${orderId} ${ENV:HOME}\"\n",
            Dialect::Compact,
        );
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_variable_used_before_store_is_error() {
        let report = run(
            "name: t\nsteps:\n  - write:\n      selector: '#q'\n      text: \"${orderId}\"\n  - store:\n      selector: '#id'\n      as: orderId\n",
            Dialect::Simplified,
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 3);
    }

    #[test]
    fn test_unknown_dialect_is_error() {
        let report = run("foo: bar\n", Dialect::Unknown);
        assert!(!report.is_valid());
        assert!(report.errors[0].example.as_deref().unwrap().contains("steps:"));
    }

    #[test]
    fn test_extended_step_without_type() {
        let report = run(
            "name: x\ninfrastructure: {}\nsteps:\n  - target: a\n",
            Dialect::Extended,
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 4);
    }

    #[test]
    fn test_best_practice_warnings() {
        let report = run(
            "test: t\ndata:\n  password: hunter2\ndo:\n  - nav: /a\n  - c: 'a[href'\n  - ch: done\n",
            Dialect::Compact,
        );
        assert!(report.is_valid());
        let messages: Vec<_> = report.warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("credential")));
        assert!(messages.iter().any(|m| m.contains("Navigation")));
        assert!(messages.iter().any(|m| m.contains("unbalanced")));
        assert!(messages.iter().any(|m| m.contains("Assertion without")));
    }

    #[test]
    fn test_best_practices_can_be_disabled() {
        let report = Validator::new(false).validate(
            &Document::parse("test: t\ndo:\n  - ch: done\n").unwrap(),
            Dialect::Compact,
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_promote_warnings() {
        let mut report = run("test: t\ndo:\n  - ch: done\n", Dialect::Compact);
        assert!(report.is_valid());
        report.promote_warnings();
        assert!(!report.is_valid());
        assert!(report.warnings.is_empty());
        assert!(report.errors.iter().all(|e| e.is_error()));
    }
}
