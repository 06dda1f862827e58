//! Seams to the external collaborators of a document session.
//!
//! The session only talks to these traits. Bundled implementations live in
//! [`crate::templater`], [`crate::analyzer`] and the CLI crate.

use crate::catalog::{CatalogSnapshot, ObjectKind, ObjectName, ObjectRef, SchemaObject};
use crate::error::{AnalysisError, CompileError, FetchError};
use crate::text::TextSnapshot;
use crate::types::{Analysis, Diagnostic, Progress};
use async_trait::async_trait;
use std::sync::Arc;

/// Expands a raw templated document into plain SQL.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    async fn expand(&self, document: &TextSnapshot) -> Result<String, CompileError>;
}

/// Parses and validates compiled SQL.
#[async_trait]
pub trait SqlAnalyzer: Send + Sync {
    /// Tables and functions the SQL refers to. Unparseable SQL yields none.
    async fn referenced_objects(&self, sql: &str) -> Vec<ObjectRef>;

    /// Validates `sql` against `catalog`.
    ///
    /// Errors use the `"<description> [at <line>:<col>]"` message format
    /// with 1-based coordinates.
    async fn analyze(&self, sql: &str, catalog: &CatalogSnapshot) -> Result<Analysis, AnalysisError>;
}

/// Looks up schema objects by identity.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch(&self, name: &ObjectName, kind: ObjectKind) -> Result<SchemaObject, FetchError>;
}

/// Notifications sent to the editor.
pub trait EditorSink: Send + Sync {
    fn publish_diagnostics(&self, uri: &str, version: i32, diagnostics: Vec<Diagnostic>);

    fn compiled_text_changed(&self, uri: &str, text: &str);

    fn progress(&self, _uri: &str, _progress: Progress) {}
}

/// A schema source that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySchemaSource;

#[async_trait]
impl SchemaSource for EmptySchemaSource {
    async fn fetch(&self, name: &ObjectName, _kind: ObjectKind) -> Result<SchemaObject, FetchError> {
        Err(FetchError::NotFound(name.clone()))
    }
}

/// The collaborators one session works with.
#[derive(Clone)]
pub struct Engines {
    pub templater: Arc<dyn TemplateEngine>,
    pub analyzer: Arc<dyn SqlAnalyzer>,
    pub schema: Arc<dyn SchemaSource>,
    pub sink: Arc<dyn EditorSink>,
}

impl std::fmt::Debug for Engines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engines").finish_non_exhaustive()
    }
}
