//! Dual-document synchronization for templated SQL.
//!
//! Each open model is kept twice: the raw templated text the user edits and
//! the compiled SQL the analyzer sees. Edits that cannot change template
//! output are mirrored straight into the compiled text; everything else goes
//! through a debounced recompile. Diagnostics and cursor positions travel
//! between the two through a line-level correspondence.
//!
//! ```text
//! edit ─▶ DocumentSession ─▶ RecompileScheduler::decide
//!                               ├─ mirror ─▶ align_range ─────▶ compiled
//!                               └─ recompile ─▶ TemplateEngine ─▶ compiled
//! compiled ─▶ CatalogRegistry::sync ─▶ SqlAnalyzer ─▶ translate_line ─▶ diagnostics
//! ```

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
pub mod features;
pub mod parser;
pub mod position;
pub mod scheduler;
pub mod session;
pub mod templater;
pub mod text;
pub mod types;
pub mod workspace;

pub use analyzer::{referenced_objects, SqlparserAnalyzer};
pub use catalog::{
    CatalogRegistry, CatalogSnapshot, Column, ObjectKind, ObjectName, ObjectRef, SchemaObject,
    SyncReport,
};
pub use config::{AnalyzerOptions, EngineConfig, SchemaSourceConfig};
pub use directive::{contains_directive_syntax, find_spans, touches_any_span, DirectiveSpan};
pub use engine::{EditorSink, EmptySchemaSource, Engines, SchemaSource, SqlAnalyzer, TemplateEngine};
pub use error::{AnalysisError, CompileError, FetchError, SessionError};
pub use position::{
    align_position, align_range, locate_position, translate_line, translate_position, translate_range,
};
pub use scheduler::{Decision, RecompileReason, RecompileScheduler};
pub use session::{
    AnalysisResult, ChangeOutcome, DocumentSession, SessionHandle, SessionState, SessionStatus,
};
pub use templater::{model_name, template_sql, DbtTemplater, TemplateConfig, TemplateError, TemplateMode};
pub use text::TextSnapshot;
pub use types::{
    Analysis, CompletionItem, CompletionKind, Diagnostic, Dialect, Hover, Position, Progress,
    Range, Severity, SignatureHelp, TextEdit,
};
pub use workspace::Workspace;
