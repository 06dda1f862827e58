//! Configuration loading: TOML file first, then command-line overrides.

use crate::cli::Args;
use anyhow::{Context, Result};
use dbtlens_core::EngineConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dbtlens.toml";

pub fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config_file(&default)?
            } else {
                EngineConfig::default()
            }
        }
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse_config(content: &str) -> Result<EngineConfig> {
    Ok(toml::from_str(content)?)
}

fn apply_overrides(config: &mut EngineConfig, args: &Args) {
    if let Some(dialect) = args.dialect {
        config.dialect = dialect.into();
    }
    if let Some(mode) = args.template {
        config.template.mode = mode.into();
    }
    config.template.vars.extend(parse_template_vars(&args.template_vars));
    if let Some(project) = &args.project {
        config.template.project = Some(project.clone());
    }
    if let Some(dataset) = &args.dataset {
        config.template.dataset = Some(dataset.clone());
    }
    if let Some(schema) = &args.schema {
        config.schema.file = Some(schema.clone());
    }
    #[cfg(feature = "metadata-provider")]
    {
        if let Some(url) = &args.metadata_url {
            config.schema.database_url = Some(url.clone());
        }
        if let Some(schema) = &args.metadata_schema {
            config.schema.database_schema = Some(schema.clone());
        }
    }
    if let Some(debounce_ms) = args.debounce_ms {
        config.debounce_ms = debounce_ms;
    }
}

/// Parses `KEY=VALUE` pairs. Values are read as JSON when they parse,
/// otherwise as plain strings.
pub fn parse_template_vars(vars: &[String]) -> HashMap<String, serde_json::Value> {
    let mut context = HashMap::new();

    for var in vars {
        if let Some((key, value)) = var.split_once('=') {
            let key = key.trim();
            let value = value.trim();

            if key.is_empty() {
                continue;
            }

            let json_value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            context.insert(key.to_string(), json_value);
        }
    }

    context
}
