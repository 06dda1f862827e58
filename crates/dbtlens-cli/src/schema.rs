//! JSON schemas for the files and messages the CLI reads and writes.

use crate::cli::SchemaTarget;
use crate::metadata::SchemaFile;
use crate::protocol::{ClientMessage, ServerMessage};
use dbtlens_core::EngineConfig;
use schemars::schema_for;

pub fn schema_json(target: SchemaTarget) -> String {
    let schema = match target {
        SchemaTarget::Config => schema_for!(EngineConfig),
        SchemaTarget::Requests => schema_for!(ClientMessage),
        SchemaTarget::Notifications => schema_for!(ServerMessage),
        SchemaTarget::SchemaFile => schema_for!(SchemaFile),
    };
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
