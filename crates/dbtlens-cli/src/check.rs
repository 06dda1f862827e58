//! `dbtlens check`: drive each model through a session and collect what
//! the editor would have been shown.

use crate::input::ModelSource;
use anyhow::{anyhow, Result};
use dbtlens_core::{Diagnostic, EditorSink, EngineConfig, Progress, SchemaSource, Severity, Workspace};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Final state of one checked model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    /// Absent when the template never expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

#[derive(Debug)]
enum CheckEvent {
    Diagnostics(Vec<Diagnostic>),
    Compiled(String),
    Done,
}

#[derive(Debug, Clone)]
struct CheckSink {
    events: mpsc::UnboundedSender<(String, CheckEvent)>,
}

impl CheckSink {
    fn send(&self, uri: &str, event: CheckEvent) {
        let _ = self.events.send((uri.to_string(), event));
    }
}

impl EditorSink for CheckSink {
    fn publish_diagnostics(&self, uri: &str, _version: i32, diagnostics: Vec<Diagnostic>) {
        self.send(uri, CheckEvent::Diagnostics(diagnostics));
    }

    fn compiled_text_changed(&self, uri: &str, text: &str) {
        self.send(uri, CheckEvent::Compiled(text.to_string()));
    }

    fn progress(&self, uri: &str, progress: Progress) {
        if progress == Progress::End {
            self.send(uri, CheckEvent::Done);
        }
    }
}

/// Checks `models` one after another against a shared catalog, so a model
/// checked earlier is visible to the ones after it.
pub async fn check_models(
    models: &[ModelSource],
    mut config: EngineConfig,
    schema: Arc<dyn SchemaSource>,
) -> Result<Vec<FileReport>> {
    config.debounce_ms = 0;
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let workspace = Workspace::bundled(config, schema, Arc::new(CheckSink { events: events_tx }));

    let mut reports = Vec::with_capacity(models.len());
    for model in models {
        workspace.did_open(&model.uri, 1, &model.content, "sql")?;

        let mut report = FileReport {
            path: model.name.clone(),
            compiled: None,
            diagnostics: Vec::new(),
        };
        loop {
            let (uri, event) = events
                .recv()
                .await
                .ok_or_else(|| anyhow!("engine stopped while checking {}", model.name))?;
            if uri != model.uri {
                continue;
            }
            match event {
                CheckEvent::Diagnostics(diagnostics) => report.diagnostics = diagnostics,
                CheckEvent::Compiled(text) => report.compiled = Some(text),
                CheckEvent::Done => break,
            }
        }
        debug!(path = %model.name, diagnostics = report.diagnostics.len(), "checked model");

        workspace.did_close(&model.uri).await?;
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtlens_core::EmptySchemaSource;

    fn model(name: &str, content: &str) -> ModelSource {
        ModelSource {
            name: format!("models/{name}.sql"),
            uri: format!("file:///project/models/{name}.sql"),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn reports_compiled_text_and_diagnostics() {
        let reports = check_models(
            &[model("ok", "SELECT 1 AS one"), model("broken", "SELECT (1 AS one")],
            EngineConfig::default(),
            Arc::new(EmptySchemaSource),
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].compiled.as_deref(), Some("SELECT 1 AS one"));
        assert!(reports[0].diagnostics.is_empty());
        assert!(!reports[0].has_errors());
        assert!(reports[1].has_errors());
    }

    #[cfg(feature = "templating")]
    #[tokio::test]
    async fn template_errors_leave_no_compiled_text() {
        let mut config = EngineConfig::default();
        config.template.mode = dbtlens_core::TemplateMode::Jinja;
        let reports = check_models(
            &[model("unclosed", "SELECT {{ 1")],
            config,
            Arc::new(EmptySchemaSource),
        )
        .await
        .unwrap();

        assert_eq!(reports[0].compiled, None);
        assert_eq!(reports[0].diagnostics.len(), 1);
    }
}
