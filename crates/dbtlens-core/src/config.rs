//! Engine configuration.
//!
//! Every field has a default so a partial config file is always valid.

use crate::templater::TemplateConfig;
use crate::types::Dialect;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Trailing debounce window before a recompile, in milliseconds.
    pub debounce_ms: u64,

    /// Dialect of the compiled SQL.
    pub dialect: Dialect,

    pub template: TemplateConfig,

    pub analyzer: AnalyzerOptions,

    pub schema: SchemaSourceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            dialect: Dialect::default(),
            template: TemplateConfig::default(),
            analyzer: AnalyzerOptions::default(),
            schema: SchemaSourceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// How strictly the bundled analyzer resolves names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerOptions {
    /// Report tables missing from the catalog.
    pub strict_tables: bool,

    /// Report columns missing from tables the catalog knows.
    pub strict_columns: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            strict_tables: false,
            strict_columns: true,
        }
    }
}

/// Where table and function schemas are fetched from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaSourceConfig {
    /// JSON file listing tables and functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Database URL for live `information_schema` lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Schema to search when a table name has no schema part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_schema: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templater::TemplateMode;

    #[test]
    fn empty_config_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.dialect, Dialect::Bigquery);
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "debounceMs": 50, "template": { "project": "acme" }, "analyzer": { "strictTables": true } }"#,
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.template.project.as_deref(), Some("acme"));
        assert_eq!(config.template.mode, TemplateMode::Dbt);
        assert!(config.analyzer.strict_tables);
        assert!(config.analyzer.strict_columns);
    }
}
