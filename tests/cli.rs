//! Black-box tests for the steprunner binary
//!
//! Each test runs the compiled binary against files in a temp dir, with the
//! config and data directories pointed inside it.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct TestContext {
    dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write test file");
        path
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_steprunner"))
            .args(args)
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env_remove("STEPRUNNER_API_TOKEN")
            .env("NO_COLOR", "1")
            .current_dir(self.path())
            .output()
            .expect("Failed to run steprunner")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

const COMPACT: &str = "test: Login\nnav: https://example.com\ndo:\n  - c: \"button.start\"\n  - wait: 500\n  - ch: \"Success\"\n";

#[test]
fn test_detect_compact() {
    let ctx = TestContext::new();
    let file = ctx.file("login.yaml", COMPACT);

    let output = ctx.run(&["detect", file.to_str().unwrap(), "--json"]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["dialect"], "compact");
}

#[test]
fn test_validate_reports_fix_and_fails() {
    let ctx = TestContext::new();
    let file = ctx.file("bad.yaml", "test: Bad\nnav: https://example.com\ndo:\n  - clik: Submit\n");

    let output = ctx.run(&["validate", file.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("clik"), "{text}");
    assert!(text.contains("line 4"), "{text}");
}

#[test]
fn test_compile_json() {
    let ctx = TestContext::new();
    let file = ctx.file("login.yaml", COMPACT);

    let output = ctx.run(&["compile", file.to_str().unwrap(), "--json"]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["steps"][0]["command"], "click");
    assert_eq!(json["navigation_target"], "https://example.com");
}

#[test]
fn test_dry_run_writes_json_report() {
    let ctx = TestContext::new();
    let first = ctx.file("a.yaml", COMPACT);
    let second = ctx.file(
        "b.yaml",
        "name: Search\nurl: https://example.com\nsteps:\n  - click: Search\n  - wait: 1\n  - assert: Results\n",
    );

    let output = ctx.run(&[
        "run",
        first.to_str().unwrap(),
        second.to_str().unwrap(),
        "--dry-run",
        "--report",
        "json",
        "--report-dir",
        "reports",
    ]);

    assert!(output.status.success(), "{}", stdout(&output));
    let report = std::fs::read_to_string(ctx.path().join("reports").join("test-results.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report).unwrap();
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["test_name"], "Login");
    assert_eq!(results[1]["dialect"], "simplified");
    assert_eq!(results[1]["steps_created"], 3);
}

#[test]
fn test_convert_to_simplified_then_compile() {
    let ctx = TestContext::new();
    let file = ctx.file("login.yaml", COMPACT);

    let output = ctx.run(&["convert", file.to_str().unwrap(), "--to", "simplified", "-o", "out.yaml"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let converted = std::fs::read_to_string(ctx.path().join("out.yaml")).unwrap();
    assert!(converted.contains("steps:"), "{converted}");
    assert!(converted.contains("click: button.start"), "{converted}");

    let output = ctx.run(&["compile", "out.yaml", "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["dialect"], "simplified");
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
}

#[test]
fn test_convert_rejects_unknown_target() {
    let ctx = TestContext::new();
    let file = ctx.file("login.yaml", COMPACT);

    let output = ctx.run(&["convert", file.to_str().unwrap(), "--to", "extended"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("compact or simplified"));
}

#[test]
fn test_run_without_token_fails() {
    let ctx = TestContext::new();
    let file = ctx.file("login.yaml", COMPACT);

    let output = ctx.run(&["run", file.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("API token"));
}

#[test]
fn test_session_set_and_show() {
    let ctx = TestContext::new();

    assert!(ctx.run(&["session", "set-checkpoint", "42"]).status.success());
    assert!(ctx.run(&["session", "set-position", "3"]).status.success());
    let shown = stdout(&ctx.run(&["session", "show"]));
    assert!(shown.contains("checkpoint: 42"), "{shown}");
    assert!(shown.contains("position:   3"), "{shown}");

    assert!(ctx.run(&["session", "set-journey", "7"]).status.success());
    let shown = stdout(&ctx.run(&["session", "show"]));
    assert!(shown.contains("journey:    7"), "{shown}");
    assert!(shown.contains("position:   1"), "{shown}");
    assert!(!shown.contains("checkpoint: 42"), "{shown}");
}
