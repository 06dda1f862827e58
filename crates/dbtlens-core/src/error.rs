//! Error types for compilation, analysis, schema fetching and session misuse.
//!
//! Only [`SessionError`] is ever returned to an editor request. The others are
//! folded into diagnostics or sync reports by the session that hit them.

use crate::catalog::ObjectName;
use crate::types::Position;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Template expansion failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The analyzer rejected the compiled SQL.
///
/// The message follows the fixed `"<description> [at <line>:<col>]"` shape
/// with 1-based coordinates in the compiled text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AnalysisError {
    pub message: String,
}

/// Location parsed out of an [`AnalysisError`] message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    pub description: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl ErrorLocation {
    /// The location as a 0-based position.
    pub fn position(&self) -> Position {
        Position::new(self.line.saturating_sub(1), self.column.saturating_sub(1))
    }
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds an error in the located message format.
    pub fn at(description: impl AsRef<str>, line: u32, column: u32) -> Self {
        Self::new(format!("{} [at {line}:{column}]", description.as_ref()))
    }

    /// Splits the message into its description and location.
    ///
    /// Messages without a location are reported at 1:1.
    pub fn location(&self) -> ErrorLocation {
        static LOCATION: OnceLock<Regex> = OnceLock::new();
        let re = LOCATION.get_or_init(|| {
            Regex::new(r"(?s)^(.*?)\s*\[at (\d+):(\d+)\]").expect("Invalid regex pattern")
        });

        re.captures(&self.message)
            .and_then(|caps| {
                Some(ErrorLocation {
                    description: caps.get(1)?.as_str().to_string(),
                    line: caps.get(2)?.as_str().parse().ok()?,
                    column: caps.get(3)?.as_str().parse().ok()?,
                })
            })
            .unwrap_or_else(|| ErrorLocation {
                description: self.message.trim().to_string(),
                line: 1,
                column: 1,
            })
    }
}

impl From<sqlparser::parser::ParserError> for AnalysisError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        static POSITION: OnceLock<Regex> = OnceLock::new();
        let re = POSITION.get_or_init(|| {
            Regex::new(r"\s*at Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("Invalid regex pattern")
        });

        let message = err.to_string();
        let message = message
            .strip_prefix("sql parser error: ")
            .unwrap_or(&message);

        let located = re.captures(message).and_then(|caps| {
            let line: u32 = caps.get(1)?.as_str().parse().ok()?;
            let column: u32 = caps.get(2)?.as_str().parse().ok()?;
            let description = re.replace(message, "");
            Some(Self::at(description.trim(), line.max(1), column.max(1)))
        });

        if located.is_none() && message.contains("Line") {
            tracing::trace!(%message, "parser error has an unrecognised position format");
        }

        located.unwrap_or_else(|| Self::at(message.trim(), 1, 1))
    }
}

/// Fetching one schema object failed. Never escalates past a catalog sync.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{0} was not found")]
    NotFound(ObjectName),

    #[error("failed to fetch {name}: {reason}")]
    Source { name: ObjectName, reason: String },
}

impl FetchError {
    pub fn failed(name: ObjectName, reason: impl Into<String>) -> Self {
        Self::Source {
            name,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Protocol misuse reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("document {0} is not open")]
    UnknownDocument(String),

    #[error("document {0} is already open")]
    AlreadyOpen(String),

    #[error("edit for {uri} targets version {received}, but the document is at version {current}")]
    OutOfOrderVersion {
        uri: String,
        current: i32,
        received: i32,
    },

    #[error("session for {0} has been closed")]
    Closed(String),
}
