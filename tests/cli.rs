//! Smoke tests for the `research-rs` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn research_rs() -> Command {
    Command::cargo_bin("research-rs").unwrap_or_else(|_| unreachable!())
}

#[test]
fn test_help_lists_commands() {
    research_rs()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("init-prompts"))
        .stdout(predicate::str::contains("providers"));
}

#[test]
fn test_run_help_shows_examples() {
    research_rs()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--report-type"))
        .stdout(predicate::str::contains("Examples:"));
}

#[test]
fn test_init_prompts_writes_templates() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let target = dir.path().join("prompts");

    research_rs()
        .args(["init-prompts", "--dir"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 9 prompt template(s)"));
    assert!(target.join("persona.md").exists());

    research_rs()
        .args(["init-prompts", "--dir"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}

#[test]
fn test_providers_json() {
    research_rs()
        .args(["--format", "json", "providers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"retrievers\""))
        .stdout(predicate::str::contains("duckduckgo"))
        .stdout(predicate::str::contains("openai"));
}

#[test]
fn test_run_rejects_empty_query() {
    research_rs()
        .args(["run", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn test_unknown_subcommand_fails() {
    research_rs().arg("summon").assert().failure();
}
