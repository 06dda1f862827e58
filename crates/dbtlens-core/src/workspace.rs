//! All open documents of one editor connection.
//!
//! A [`Workspace`] routes editor requests to the session that owns the
//! document. Sessions share the catalog and the collaborators; nothing else
//! crosses between them.

use crate::analyzer::SqlparserAnalyzer;
use crate::catalog::CatalogRegistry;
use crate::config::EngineConfig;
use crate::engine::{EditorSink, Engines, SchemaSource};
use crate::error::SessionError;
use crate::session::{ChangeOutcome, SessionDriver, SessionHandle, SessionStatus};
use crate::templater::DbtTemplater;
use crate::text::TextSnapshot;
use crate::types::{CompletionItem, Hover, Position, SignatureHelp, TextEdit};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct Workspace {
    config: EngineConfig,
    engines: Engines,
    catalog: CatalogRegistry,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl Workspace {
    pub fn new(config: EngineConfig, engines: Engines) -> Self {
        Self::with_catalog(config, engines, CatalogRegistry::new())
    }

    pub fn with_catalog(config: EngineConfig, engines: Engines, catalog: CatalogRegistry) -> Self {
        Self {
            config,
            engines,
            catalog,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// A workspace using the bundled templater and analyzer.
    pub fn bundled(
        config: EngineConfig,
        schema: Arc<dyn SchemaSource>,
        sink: Arc<dyn EditorSink>,
    ) -> Self {
        let engines = Engines {
            templater: Arc::new(DbtTemplater::new(config.template.clone())),
            analyzer: Arc::new(SqlparserAnalyzer::new(config.dialect, config.analyzer)),
            schema,
            sink,
        };
        Self::new(config, engines)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogRegistry {
        &self.catalog
    }

    /// URIs of the open documents, sorted.
    pub fn open_documents(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.sessions.lock().keys().cloned().collect();
        uris.sort();
        uris
    }

    pub fn session(&self, uri: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| SessionError::UnknownDocument(uri.to_string()))
    }

    /// Opens a document and arms its first compile. Must be called inside a
    /// tokio runtime.
    pub fn did_open(
        &self,
        uri: &str,
        version: i32,
        text: &str,
        language_id: &str,
    ) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.lock();
        if sessions.get(uri).is_some_and(|handle| !handle.is_closed()) {
            return Err(SessionError::AlreadyOpen(uri.to_string()));
        }
        let raw = TextSnapshot::new(uri, version, text, language_id);
        let handle = SessionDriver::spawn(raw, self.engines.clone(), self.catalog.clone(), &self.config);
        info!(%uri, version, "opened document");
        sessions.insert(uri.to_string(), handle.clone());
        Ok(handle)
    }

    pub async fn did_change(
        &self,
        uri: &str,
        version: i32,
        edits: Vec<TextEdit>,
    ) -> Result<ChangeOutcome, SessionError> {
        self.session(uri)?.change(version, edits).await
    }

    pub async fn did_close(&self, uri: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .lock()
            .remove(uri)
            .ok_or_else(|| SessionError::UnknownDocument(uri.to_string()))?;
        info!(%uri, "closed document");
        handle.close().await
    }

    pub async fn force_recompile(&self, uri: &str) -> Result<(), SessionError> {
        self.session(uri)?.force_recompile().await
    }

    pub async fn hover(&self, uri: &str, position: Position) -> Result<Option<Hover>, SessionError> {
        self.session(uri)?.hover(position).await
    }

    pub async fn completion(
        &self,
        uri: &str,
        position: Position,
    ) -> Result<Vec<CompletionItem>, SessionError> {
        self.session(uri)?.completion(position).await
    }

    pub async fn signature_help(
        &self,
        uri: &str,
        position: Position,
    ) -> Result<Option<SignatureHelp>, SessionError> {
        self.session(uri)?.signature_help(position).await
    }

    pub async fn status(&self, uri: &str) -> Result<SessionStatus, SessionError> {
        self.session(uri)?.status().await
    }

    /// Closes every open document.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.sessions.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.close().await;
        }
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("documents", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}
