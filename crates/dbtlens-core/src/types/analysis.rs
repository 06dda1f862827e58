use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::Range;
use crate::catalog::{Column, ObjectName};

/// Result of a successful analysis of compiled SQL.
///
/// All ranges are in compiled-text coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Columns produced by the outermost query, in select order.
    pub output_columns: Vec<OutputColumn>,
    /// One scope per SELECT, outermost last.
    pub scopes: Vec<Scope>,
    /// Every column reference that resolved to a table column.
    pub column_refs: Vec<ColumnRef>,
    /// Catalog tables read by the statement.
    pub tables: Vec<ObjectName>,
}

impl Analysis {
    /// The innermost scope whose range contains `position`, falling back to
    /// the outermost scope.
    pub fn scope_at(&self, position: crate::types::Position) -> Option<&Scope> {
        self.scopes
            .iter()
            .filter(|scope| scope.range.contains(position))
            .min_by_key(|scope| {
                let lines = scope.range.end.line - scope.range.start.line;
                (lines, scope.range.end.character.abs_diff(scope.range.start.character))
            })
            .or_else(|| self.scopes.last())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputColumn {
    pub name: String,
    /// True when the name came from an explicit `AS` alias.
    pub aliased: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ColumnSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSource {
    pub table: ObjectName,
    pub column: String,
}

/// A resolved column reference and where it appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    pub range: Range,
    pub table: ObjectName,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// The tables visible inside one SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub range: Range,
    pub tables: Vec<ScopeTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopeTable {
    pub name: ObjectName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub columns: Vec<Column>,
}

impl ScopeTable {
    /// The name a query uses to qualify this table's columns.
    pub fn qualifier(&self) -> &str {
        self.alias
            .as_deref()
            .unwrap_or_else(|| self.name.last().unwrap_or_default())
    }
}
