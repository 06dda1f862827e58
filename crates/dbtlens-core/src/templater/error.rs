//! Error types for template expansion.

use super::TemplateMode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// Unclosed tags, invalid expressions and similar.
    #[error("template syntax error: {0}")]
    SyntaxError(String),

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("render error: {0}")]
    RenderError(String),

    #[error("template mode {0:?} needs the `templating` feature")]
    Unsupported(TemplateMode),
}

#[cfg(feature = "templating")]
impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        let detail = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.kind().to_string());
        let message = match err.line() {
            Some(line) => format!("{detail} (line {line})"),
            None => detail,
        };
        match err.kind() {
            ErrorKind::SyntaxError => Self::SyntaxError(message),
            ErrorKind::UndefinedError => Self::UndefinedVariable(message),
            _ => Self::RenderError(message),
        }
    }
}
