//! Schema source backed by a JSON file.
//!
//! ```json
//! {
//!   "tables": [
//!     { "name": "acme.analytics.users", "columns": [{ "name": "id", "type": "INT64" }] }
//!   ],
//!   "functions": [
//!     { "name": "acme.udfs.clean", "arguments": [{ "name": "value", "type": "STRING" }], "returns": "STRING" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use dbtlens_core::{
    Column, FetchError, ObjectKind, ObjectName, SchemaObject, SchemaSource,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default)]
    pub tables: Vec<TableEntry>,
    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    /// Dotted name, e.g. `project.dataset.table`.
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Adds the `_PARTITIONTIME` / `_PARTITIONDATE` pseudo-columns.
    #[serde(default)]
    pub time_partitioned: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Column>,
    #[serde(default)]
    pub returns: Option<String>,
}

/// Serves the objects of a [`SchemaFile`] by exact name. Names are matched
/// case-insensitively.
#[derive(Debug, Default)]
pub struct JsonSchemaSource {
    objects: HashMap<(ObjectKind, String), SchemaObject>,
}

impl JsonSchemaSource {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
        let file: SchemaFile = serde_json::from_str(&content)
            .with_context(|| format!("Invalid schema file: {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: SchemaFile) -> Self {
        let tables = file.tables.into_iter().map(|table| {
            SchemaObject::table(ObjectName::parse(&table.name), table.columns)
                .partitioned(table.time_partitioned)
        });
        let functions = file.functions.into_iter().map(|function| {
            SchemaObject::function(
                ObjectName::parse(&function.name),
                function.arguments,
                function.returns,
            )
        });

        let objects: HashMap<_, _> = tables
            .chain(functions)
            .map(|object| ((object.kind, key(&object.identity)), object))
            .collect();
        debug!(objects = objects.len(), "loaded schema file");
        Self { objects }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

fn key(name: &ObjectName) -> String {
    name.to_string().to_ascii_lowercase()
}

#[async_trait]
impl SchemaSource for JsonSchemaSource {
    async fn fetch(&self, name: &ObjectName, kind: ObjectKind) -> Result<SchemaObject, FetchError> {
        self.objects
            .get(&(kind, key(name)))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(name.clone()))
    }
}
