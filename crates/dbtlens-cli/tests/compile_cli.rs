//! CLI integration tests for `dbtlens compile` and `dbtlens schema`.

use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::tempdir;

fn dbtlens() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dbtlens"))
}

#[test]
fn compile_dbt_ref_macro() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("model.sql");
    std::fs::write(&sql_path, "SELECT * FROM {{ ref('users') }}").expect("write sql");

    let output = dbtlens()
        .current_dir(dir.path())
        .args(["--project", "acme", "--dataset", "analytics", "compile"])
        .arg(&sql_path)
        .output()
        .expect("run CLI");

    assert!(output.status.success(), "CLI should succeed");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "SELECT * FROM `acme`.`analytics`.`users`\n"
    );
}

#[test]
fn compile_jinja_with_variable() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("model.sql");
    std::fs::write(&sql_path, "SELECT * FROM {{ table_name }}").expect("write sql");

    let output = dbtlens()
        .current_dir(dir.path())
        .args(["--template", "jinja", "--template-var", "table_name=orders", "compile"])
        .arg(&sql_path)
        .output()
        .expect("run CLI");

    assert!(output.status.success(), "CLI should succeed");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "SELECT * FROM orders\n");
}

#[test]
fn compile_reads_stdin() {
    let dir = tempdir().expect("temp dir");
    let mut child = dbtlens()
        .current_dir(dir.path())
        .args(["--template", "raw", "compile", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("run CLI");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"SELECT {{ untouched }}")
        .expect("write stdin");

    let output = child.wait_with_output().expect("wait for CLI");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "SELECT {{ untouched }}\n");
}

#[test]
fn compile_failure_exits_with_failure() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("model.sql");
    std::fs::write(&sql_path, "SELECT {% if %}").expect("write sql");

    let output = dbtlens()
        .current_dir(dir.path())
        .arg("compile")
        .arg(&sql_path)
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("model.sql"));
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, "debounceMs = \"soon\"").expect("write config");

    let output = dbtlens()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["schema"])
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(66));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid config file"));
}

#[test]
fn schema_prints_config_schema() {
    let dir = tempdir().expect("temp dir");
    let output = dbtlens()
        .current_dir(dir.path())
        .args(["schema", "config"])
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).expect("JSON schema");
    assert!(schema["properties"]["debounceMs"].is_object());
}
