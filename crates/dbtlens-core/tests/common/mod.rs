//! Fake collaborators for driving sessions in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dbtlens_core::{
    CatalogRegistry, Column, CompileError, Diagnostic, EditorSink, EngineConfig, Engines,
    FetchError, ObjectKind, ObjectName, Progress, SchemaObject, SchemaSource, SessionHandle,
    SqlparserAnalyzer, TemplateConfig, TemplateEngine, TextSnapshot, Workspace,
};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Expands `{{ ref('x') }}` to `` `acme`.`analytics`.`x` `` and drops lines
/// made only of `{% ... %}` blocks. Anything else in braces fails.
#[derive(Default)]
pub struct FakeTemplater {
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeTemplater {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn render(text: &str) -> Result<String, CompileError> {
        static REF: OnceLock<Regex> = OnceLock::new();
        static BLOCK_LINE: OnceLock<Regex> = OnceLock::new();
        let reference = REF.get_or_init(|| Regex::new(r"\{\{\s*ref\('(\w+)'\)\s*\}\}").unwrap());
        let block = BLOCK_LINE.get_or_init(|| Regex::new(r"(?m)^\{%[^\n]*%\}\n").unwrap());

        let text = block.replace_all(text, "");
        let text = reference.replace_all(&text, "`acme`.`analytics`.`$1`");
        if text.contains("{{") || text.contains("{%") {
            return Err(CompileError::new("unexpected end of template"));
        }
        Ok(text.into_owned())
    }
}

#[async_trait]
impl TemplateEngine for FakeTemplater {
    async fn expand(&self, document: &TextSnapshot) -> Result<String, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Self::render(&document.content)
    }
}

/// Serves a fixed set of tables and records every fetch.
#[derive(Default)]
pub struct FakeSchema {
    objects: HashMap<ObjectName, SchemaObject>,
    fetched: Mutex<Vec<ObjectName>>,
}

impl FakeSchema {
    pub fn new(objects: impl IntoIterator<Item = SchemaObject>) -> Self {
        Self {
            objects: objects
                .into_iter()
                .map(|object| (object.identity.clone(), object))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<ObjectName> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl SchemaSource for FakeSchema {
    async fn fetch(&self, name: &ObjectName, _kind: ObjectKind) -> Result<SchemaObject, FetchError> {
        self.fetched.lock().push(name.clone());
        self.objects
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(name.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Diagnostics {
        uri: String,
        version: i32,
        diagnostics: Vec<Diagnostic>,
    },
    Compiled {
        uri: String,
        text: String,
    },
    Progress(Progress),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn last_diagnostics(&self) -> Option<(i32, Vec<Diagnostic>)> {
        self.events.lock().iter().rev().find_map(|event| match event {
            Event::Diagnostics {
                version,
                diagnostics,
                ..
            } => Some((*version, diagnostics.clone())),
            _ => None,
        })
    }

    pub fn progress(&self) -> Vec<Progress> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Progress(progress) => Some(*progress),
                _ => None,
            })
            .collect()
    }
}

impl EditorSink for RecordingSink {
    fn publish_diagnostics(&self, uri: &str, version: i32, diagnostics: Vec<Diagnostic>) {
        self.events.lock().push(Event::Diagnostics {
            uri: uri.to_string(),
            version,
            diagnostics,
        });
    }

    fn compiled_text_changed(&self, uri: &str, text: &str) {
        self.events.lock().push(Event::Compiled {
            uri: uri.to_string(),
            text: text.to_string(),
        });
    }

    fn progress(&self, _uri: &str, progress: Progress) {
        self.events.lock().push(Event::Progress(progress));
    }
}

pub fn users() -> SchemaObject {
    SchemaObject::table(
        ObjectName::parse("acme.analytics.users"),
        vec![
            Column::new("id", "INT64"),
            Column::new("name", "STRING"),
            Column::new("paused", "BOOL"),
        ],
    )
}

pub fn orders() -> SchemaObject {
    SchemaObject::table(
        ObjectName::parse("acme.analytics.orders"),
        vec![Column::new("id", "INT64"), Column::new("user_id", "INT64")],
    )
}

pub fn config() -> EngineConfig {
    EngineConfig {
        debounce_ms: DEBOUNCE.as_millis() as u64,
        template: TemplateConfig {
            project: Some("acme".into()),
            dataset: Some("analytics".into()),
            ..TemplateConfig::default()
        },
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub templater: Arc<FakeTemplater>,
    pub schema: Arc<FakeSchema>,
    pub sink: Arc<RecordingSink>,
    pub workspace: Workspace,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FakeTemplater::default(), CatalogRegistry::new())
    }

    pub fn build(templater: FakeTemplater, catalog: CatalogRegistry) -> Self {
        let templater = Arc::new(templater);
        let schema = Arc::new(FakeSchema::new([users(), orders()]));
        let sink = Arc::new(RecordingSink::default());
        let config = config();
        let engines = Engines {
            templater: templater.clone(),
            analyzer: Arc::new(SqlparserAnalyzer::new(config.dialect, config.analyzer)),
            schema: schema.clone(),
            sink: sink.clone(),
        };
        Self {
            templater,
            schema,
            sink,
            workspace: Workspace::with_catalog(config, engines, catalog),
        }
    }

    pub fn open(&self, uri: &str, text: &str) -> SessionHandle {
        self.workspace.did_open(uri, 1, text, "sql").unwrap()
    }
}

/// Lets every timer fire and every pass finish. Time is paused in these
/// tests, so this returns immediately in wall-clock terms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(10)).await;
}
