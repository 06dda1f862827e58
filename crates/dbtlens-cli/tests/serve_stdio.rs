//! Drives `dbtlens serve` as a child process over its stdio.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::tempdir;

struct Server {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Server {
    fn start(dir: &std::path::Path) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_dbtlens"))
            .current_dir(dir)
            .args(["--debounce-ms", "20", "--project", "acme", "--dataset", "analytics"])
            .args(["--schema", "schema.json", "serve"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn server");
        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));
        Self {
            child,
            stdin,
            stdout,
        }
    }

    fn send(&mut self, message: Value) {
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{message}").expect("write request");
        stdin.flush().expect("flush request");
    }

    fn next(&mut self) -> Option<Value> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).expect("read reply");
        (read > 0).then(|| serde_json::from_str(&line).expect("JSON reply"))
    }

    fn next_of_type(&mut self, kind: &str) -> Value {
        loop {
            let message = self.next().expect("server closed early");
            if message["type"] == kind {
                return message;
            }
        }
    }

    /// Reads until the next `progress` end and returns the last diagnostics
    /// published before it.
    fn settle(&mut self) -> Value {
        let mut last = Value::Null;
        loop {
            let message = self.next().expect("server closed early");
            match message["type"].as_str() {
                Some("publishDiagnostics") => last = message,
                Some("progress") if message["kind"] == "end" => return last,
                _ => {}
            }
        }
    }
}

const URI: &str = "file:///project/models/active_users.sql";

#[test]
fn serve_session_round_trip() {
    let dir = tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("schema.json"),
        r#"{"tables":[{"name":"acme.analytics.users","columns":[
            {"name":"id","type":"INT64"},{"name":"paused","type":"BOOL"}]}]}"#,
    )
    .expect("write schema");
    let mut server = Server::start(dir.path());

    server.send(json!({
        "method": "didOpen",
        "uri": URI,
        "version": 1,
        "text": "SELECT id\nFROM {{ ref('users') }}\nWHERE pausd"
    }));
    let published = server.settle();
    assert_eq!(published["version"], 1);
    assert_eq!(
        published["diagnostics"][0]["message"],
        "Unrecognized name: pausd; Did you mean paused?"
    );
    assert_eq!(
        published["diagnostics"][0]["range"],
        json!({"start": {"line": 2, "character": 6}, "end": {"line": 2, "character": 11}})
    );

    server.send(json!({
        "method": "didChange",
        "uri": URI,
        "version": 2,
        "changes": [{
            "range": {"start": {"line": 2, "character": 6}, "end": {"line": 2, "character": 11}},
            "text": "paused"
        }]
    }));
    let compiled = server.next_of_type("compiledText");
    assert_eq!(
        compiled["text"],
        "SELECT id\nFROM `acme`.`analytics`.`users`\nWHERE paused"
    );
    let published = server.next_of_type("publishDiagnostics");
    assert_eq!(published["version"], 2);
    assert_eq!(published["diagnostics"], json!([]));

    server.send(json!({
        "method": "hover",
        "id": 1,
        "uri": URI,
        "position": {"line": 2, "character": 8}
    }));
    let response = server.next_of_type("response");
    assert_eq!(response["id"], 1);
    assert!(response["result"]["contents"]
        .as_str()
        .expect("hover text")
        .contains("BOOL"));

    server.send(json!({"method": "didChange", "uri": URI, "version": 1, "changes": []}));
    let error = server.next_of_type("error");
    assert!(error["message"].as_str().expect("message").contains("version"));

    server.send(json!({"method": "shutdown", "id": 2}));
    let cleared = server.next_of_type("publishDiagnostics");
    assert_eq!(cleared["diagnostics"], json!([]));
    assert_eq!(server.next_of_type("response")["id"], 2);
    assert!(server.next().is_none());

    drop(server.stdin.take());
    let status = server.child.wait().expect("server exit");
    assert!(status.success());
}

#[test]
fn closing_stdin_stops_the_server() {
    let dir = tempdir().expect("temp dir");
    std::fs::write(dir.path().join("schema.json"), "{}").expect("write schema");
    let mut server = Server::start(dir.path());

    server.send(json!({"method": "didOpen", "uri": URI, "version": 1, "text": "SELECT 1 AS one"}));
    server.settle();
    drop(server.stdin.take());

    let mut cleared = false;
    while let Some(message) = server.next() {
        if message["type"] == "publishDiagnostics" {
            cleared = message["diagnostics"] == json!([]);
        }
    }
    assert!(cleared);
    assert!(server.child.wait().expect("server exit").success());
}
