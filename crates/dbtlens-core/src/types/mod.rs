//! Value types shared by the engine, its collaborators and the editor boundary.

mod analysis;
mod common;
mod dialect;
mod editor;

pub use analysis::{Analysis, ColumnRef, ColumnSource, OutputColumn, Scope, ScopeTable};
pub use common::{Diagnostic, Position, Range, Severity, Span, TextEdit, DIAGNOSTIC_SOURCE};
pub use dialect::Dialect;
pub use editor::{
    CompletionItem, CompletionKind, Hover, Progress, SignatureHelp, SignatureInfo,
};
