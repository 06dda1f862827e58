//! Schema sources the CLI can hand to the engine.
//!
//! A database URL takes precedence over a schema file; with neither, every
//! lookup misses and tables are treated as opaque.

mod json_file;
#[cfg(feature = "metadata-provider")]
mod sqlx_source;

pub use json_file::{FunctionEntry, JsonSchemaSource, SchemaFile, TableEntry};
#[cfg(feature = "metadata-provider")]
pub use sqlx_source::{DatabaseType, SqlxSchemaSource};

use anyhow::Result;
use dbtlens_core::{EmptySchemaSource, SchemaSource, SchemaSourceConfig};
use std::sync::Arc;
use tracing::info;

pub async fn connect_schema_source(config: &SchemaSourceConfig) -> Result<Arc<dyn SchemaSource>> {
    if let Some(url) = &config.database_url {
        return connect_database(url, config.database_schema.clone()).await;
    }
    if let Some(path) = &config.file {
        let source = JsonSchemaSource::load(path)?;
        info!(path = %path.display(), objects = source.len(), "using schema file");
        return Ok(Arc::new(source));
    }
    Ok(Arc::new(EmptySchemaSource))
}

#[cfg(feature = "metadata-provider")]
async fn connect_database(url: &str, schema: Option<String>) -> Result<Arc<dyn SchemaSource>> {
    use anyhow::Context;

    let source = SqlxSchemaSource::connect(url, schema)
        .await
        .context("Failed to connect to metadata database")?;
    info!(database = ?source.database_type(), "using live database schema");
    Ok(Arc::new(source))
}

#[cfg(not(feature = "metadata-provider"))]
async fn connect_database(_url: &str, _schema: Option<String>) -> Result<Arc<dyn SchemaSource>> {
    anyhow::bail!("databaseUrl requires the metadata-provider feature")
}
