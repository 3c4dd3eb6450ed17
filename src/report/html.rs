//! Self-contained HTML report

use std::fmt::Write as _;

use super::Summary;
use crate::pipeline::ProcessResult;
use crate::validation::ValidationError;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left;vertical-align:top}\
.pass{color:#1a7f37}.fail{color:#cf222e}.warn{color:#9a6700}\
ul{margin:0;padding-left:1.2em}";

pub(super) fn render(results: &[ProcessResult]) -> String {
    let summary = Summary::of(results);
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Test results</title>\
         <style>{STYLE}</style></head><body>\n<h1>Test results</h1>\n\
         <p>{} test(s): <span class=\"pass\">{} passed</span>, \
         <span class=\"fail\">{} failed</span>, {} step(s) compiled</p>\n",
        summary.total, summary.passed, summary.failed, summary.steps
    );

    out.push_str(
        "<table>\n<tr><th>Status</th><th>Test</th><th>Format</th><th>Steps</th>\
         <th>Duration</th><th>Problems</th></tr>\n",
    );
    for result in results {
        let (class, status) = if result.success {
            ("pass", "PASS")
        } else {
            ("fail", "FAIL")
        };
        let _ = write!(
            out,
            "<tr><td class=\"{class}\">{status}</td><td>{}",
            escape(result.label())
        );
        if let Some(file) = &result.file {
            let _ = write!(out, "<br><small>{}</small>", escape(file));
        }
        let _ = write!(
            out,
            "</td><td>{} ({:.2})</td><td>{}</td><td>{:.0} ms</td><td>",
            result.dialect,
            result.confidence,
            result.compiled_steps.len(),
            result.duration_ms
        );
        problems(&mut out, &result.errors, "fail");
        problems(&mut out, &result.warnings, "warn");
        out.push_str("</td></tr>\n");
    }
    out.push_str("</table>\n</body></html>\n");
    out
}

fn problems(out: &mut String, list: &[ValidationError], class: &str) {
    if list.is_empty() {
        return;
    }
    let _ = write!(out, "<ul class=\"{class}\">");
    for problem in list {
        let _ = write!(out, "<li>{}</li>", escape(&problem.to_string()));
    }
    out.push_str("</ul>");
}

/// Escape text for HTML element and attribute content
pub(super) fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
