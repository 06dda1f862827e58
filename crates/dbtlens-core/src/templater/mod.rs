//! Template expansion for dbt models.
//!
//! Expansion turns a raw model into the SQL the analyzer sees:
//!
//! ```text
//! raw model → [templater] → compiled SQL → [analyzer] → diagnostics
//! ```
//!
//! # Modes
//!
//! - **Raw**: the text is used unchanged
//! - **Jinja**: plain Jinja2 rendering with strict undefined checks
//! - **Dbt**: Jinja2 with stubs for the dbt builtins (`ref`, `source`,
//!   `config`, `var`, `env_var`, `is_incremental`, `this`, ...)
//!
//! # Example
//!
//! ```
//! use dbtlens_core::templater::{template_sql, TemplateConfig};
//!
//! let config = TemplateConfig {
//!     project: Some("acme".into()),
//!     dataset: Some("analytics".into()),
//!     ..TemplateConfig::default()
//! };
//!
//! let compiled = template_sql("SELECT * FROM {{ ref('users') }}", &config, None).unwrap();
//! assert_eq!(compiled, "SELECT * FROM `acme`.`analytics`.`users`");
//! ```

#[cfg(feature = "templating")]
mod dbt;
mod error;
#[cfg(feature = "templating")]
mod jinja;

pub use error::TemplateError;

use crate::engine::TemplateEngine;
use crate::error::CompileError;
use crate::text::TextSnapshot;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for template expansion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    #[serde(default)]
    pub mode: TemplateMode,

    /// Project (database) that `ref()` and `this` resolve into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Dataset (schema) that `ref()` and `this` resolve into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,

    /// Values returned by `var()`.
    #[serde(default)]
    pub vars: HashMap<String, serde_json::Value>,

    /// Values returned by `env_var()`. The process environment is never read.
    #[serde(default)]
    pub env_vars: HashMap<String, String>,

    /// Extra package namespaces whose macros render as passthroughs.
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
    Raw,
    Jinja,
    #[default]
    Dbt,
}

/// Renders `sql` according to `config`.
///
/// `model` names the model being compiled and backs the `this` relation.
pub fn template_sql(
    sql: &str,
    config: &TemplateConfig,
    model: Option<&str>,
) -> Result<String, TemplateError> {
    match config.mode {
        TemplateMode::Raw => Ok(sql.to_string()),
        #[cfg(feature = "templating")]
        TemplateMode::Jinja => jinja::render_jinja(sql, &config.vars),
        #[cfg(feature = "templating")]
        TemplateMode::Dbt => jinja::render_dbt(sql, config, model),
        #[cfg(not(feature = "templating"))]
        TemplateMode::Jinja | TemplateMode::Dbt => {
            let _ = model;
            Err(TemplateError::Unsupported(config.mode))
        }
    }
}

/// Model name of a document: its file stem.
pub fn model_name(uri: &str) -> Option<&str> {
    let file = uri.rsplit(['/', '\\']).next()?;
    let stem = file.split('.').next()?;
    (!stem.is_empty()).then_some(stem)
}

/// [`TemplateEngine`] backed by [`template_sql`].
#[derive(Debug, Clone, Default)]
pub struct DbtTemplater {
    config: TemplateConfig,
}

impl DbtTemplater {
    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }
}

#[async_trait]
impl TemplateEngine for DbtTemplater {
    async fn expand(&self, document: &TextSnapshot) -> Result<String, CompileError> {
        let model = model_name(&document.uri);
        debug!(uri = %document.uri, version = document.version, "expanding template");
        template_sql(&document.content, &self.config, model).map_err(CompileError::from)
    }
}

impl From<TemplateError> for CompileError {
    fn from(err: TemplateError) -> Self {
        CompileError::new(err.to_string())
    }
}
