mod common;

use common::{settle, Harness, RecordingSink};
use dbtlens_core::{
    CompletionKind, EmptySchemaSource, ObjectKind, ObjectName, Position, Range, SessionError,
    SessionState, TextEdit, Workspace,
};
use std::sync::Arc;

const ACTIVE_USERS: &str = "file:///models/active_users.sql";
const REPORT: &str = "file:///models/report.sql";

#[tokio::test(start_paused = true)]
async fn opening_twice_is_rejected() {
    let harness = Harness::new();
    harness.open(ACTIVE_USERS, "SELECT 1 AS one");

    let err = harness
        .workspace
        .did_open(ACTIVE_USERS, 1, "SELECT 2 AS two", "sql")
        .unwrap_err();
    assert_eq!(err, SessionError::AlreadyOpen(ACTIVE_USERS.to_string()));
    assert_eq!(harness.workspace.open_documents(), [ACTIVE_USERS]);
}

#[tokio::test(start_paused = true)]
async fn requests_for_unknown_documents_fail() {
    let harness = Harness::new();
    let unknown = SessionError::UnknownDocument(REPORT.to_string());

    let change = harness
        .workspace
        .did_change(REPORT, 2, vec![TextEdit::full("SELECT 1")])
        .await;
    assert_eq!(change.unwrap_err(), unknown);
    assert_eq!(
        harness.workspace.hover(REPORT, Position::new(0, 0)).await.unwrap_err(),
        unknown
    );
    assert_eq!(harness.workspace.force_recompile(REPORT).await.unwrap_err(), unknown);
    assert_eq!(harness.workspace.did_close(REPORT).await.unwrap_err(), unknown);
}

#[tokio::test(start_paused = true)]
async fn reopening_after_close_starts_fresh() {
    let harness = Harness::new();
    harness.open(ACTIVE_USERS, "SELECT 1 AS one");
    settle().await;
    harness.workspace.did_close(ACTIVE_USERS).await.unwrap();

    let session = harness
        .workspace
        .did_open(ACTIVE_USERS, 7, "SELECT 2 AS two", "sql")
        .unwrap();
    settle().await;
    let status = session.status().await.unwrap();
    assert_eq!((status.raw_version, status.compiled.as_str()), (7, "SELECT 2 AS two"));
}

#[tokio::test(start_paused = true)]
async fn model_output_is_visible_to_other_documents() {
    let harness = Harness::new();
    harness.open(ACTIVE_USERS, "SELECT id, name\nFROM {{ ref('users') }}\nWHERE NOT paused");
    settle().await;

    let report = harness.open(REPORT, "SELECT nam\nFROM {{ ref('active_users') }}");
    settle().await;

    assert!(!harness
        .schema
        .fetched()
        .contains(&ObjectName::parse("acme.analytics.active_users")));
    assert!(harness
        .workspace
        .catalog()
        .is_registered(&ObjectName::parse("acme.analytics.active_users"), ObjectKind::Table));

    let status = report.status().await.unwrap();
    assert_eq!(status.state, SessionState::Error);
    assert_eq!(status.diagnostics[0].range, Range::on_line(0, 7, 10));
    assert_eq!(
        status.diagnostics[0].message,
        "Unrecognized name: nam; Did you mean name?"
    );
}

#[tokio::test(start_paused = true)]
async fn completion_offers_scope_columns() {
    let harness = Harness::new();
    harness.open(REPORT, "SELECT u.id\nFROM {{ ref('users') }} u");
    settle().await;

    harness
        .workspace
        .did_change(REPORT, 2, vec![TextEdit::replace(Range::on_line(0, 11, 11), ", u.na")])
        .await
        .unwrap();
    let items = harness
        .workspace
        .completion(REPORT, Position::new(0, 17))
        .await
        .unwrap();
    let columns: Vec<&str> = items
        .iter()
        .filter(|item| item.kind == CompletionKind::Column)
        .map(|item| item.label.as_str())
        .collect();
    assert_eq!(columns, ["name"]);
}

#[tokio::test(start_paused = true)]
async fn signature_help_for_builtin() {
    let harness = Harness::new();
    harness.open(REPORT, "SELECT IFNULL(name, ");
    let help = harness
        .workspace
        .signature_help(REPORT, Position::new(0, 20))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(help.signatures[0].label, "IFNULL(expression, null_result) -> any");
    assert_eq!(help.active_parameter, 1);
}

#[cfg(feature = "templating")]
#[tokio::test(start_paused = true)]
async fn bundled_workspace_compiles_dbt_models() {
    let sink = Arc::new(RecordingSink::default());
    let workspace = Workspace::bundled(common::config(), Arc::new(EmptySchemaSource), sink.clone());
    let session = workspace
        .did_open(
            ACTIVE_USERS,
            1,
            "{{ config(materialized='view') }}\nSELECT 1 AS one\nFROM {{ ref('users') }}",
            "sql",
        )
        .unwrap();
    settle().await;

    let status = session.status().await.unwrap();
    assert_eq!(status.compiled, "\nSELECT 1 AS one\nFROM `acme`.`analytics`.`users`");
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(sink.last_diagnostics(), Some((1, Vec::new())));
    workspace.shutdown().await;
    assert!(workspace.open_documents().is_empty());
}
