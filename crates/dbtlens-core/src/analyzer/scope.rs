use crate::catalog::{Column, ObjectName};
use crate::types::{OutputColumn, Range, Scope, ScopeTable};

/// A table visible inside one SELECT while it is being resolved.
#[derive(Debug, Clone)]
pub(super) struct FrameTable {
    /// Catalog identity, CTE name or derived-table alias.
    pub name: ObjectName,
    /// The path as written in the query.
    pub written: ObjectName,
    pub alias: Option<String>,
    pub columns: Vec<Column>,
    /// False when the column list is unknown, which makes every
    /// unqualified name in the frame unverifiable.
    pub known: bool,
}

impl FrameTable {
    pub fn known(name: ObjectName, written: ObjectName, alias: Option<String>, columns: Vec<Column>) -> Self {
        Self {
            name,
            written,
            alias,
            columns,
            known: true,
        }
    }

    pub fn opaque(written: ObjectName, alias: Option<String>) -> Self {
        Self {
            name: written.clone(),
            written,
            alias,
            columns: Vec::new(),
            known: false,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Whether `parts` qualifies this table's columns. An alias hides the
    /// table's own name.
    pub fn matches_qualifier(&self, parts: &[String]) -> bool {
        let qualifier = ObjectName::new(parts.iter().cloned());
        match &self.alias {
            Some(alias) => parts.len() == 1 && alias.eq_ignore_ascii_case(&parts[0]),
            None => {
                !qualifier.is_empty()
                    && (self.written.ends_with(&qualifier) || self.name.ends_with(&qualifier))
            }
        }
    }

    fn qualifier(&self) -> Option<&str> {
        self.alias.as_deref().or_else(|| self.written.last())
    }
}

/// The tables of one SELECT.
#[derive(Debug, Clone, Default)]
pub(super) struct ScopeFrame {
    pub tables: Vec<FrameTable>,
}

impl ScopeFrame {
    pub fn is_fully_known(&self) -> bool {
        self.tables.iter().all(|table| table.known)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|table| table.columns.iter().map(|column| column.name.as_str()))
    }

    pub fn qualifiers(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().filter_map(FrameTable::qualifier)
    }

    /// Output columns of `*` or `q.*`.
    pub fn wildcard(&self, qualifier: Option<&[String]>) -> Vec<OutputColumn> {
        self.tables
            .iter()
            .filter(|table| qualifier.is_none_or(|parts| table.matches_qualifier(parts)))
            .flat_map(|table| {
                table.columns.iter().map(|column| OutputColumn {
                    name: column.name.clone(),
                    aliased: false,
                    source: Some(crate::types::ColumnSource {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    }),
                    data_type: Some(column.data_type.clone()),
                })
            })
            .collect()
    }

    pub fn into_scope(self, range: Range) -> Scope {
        Scope {
            range,
            tables: self
                .tables
                .into_iter()
                .map(|table| ScopeTable {
                    name: table.name,
                    alias: table.alias,
                    columns: table.columns,
                })
                .collect(),
        }
    }
}

/// Columns a CTE or derived table exposes, from its output.
pub(super) fn columns_of(outputs: &[OutputColumn]) -> Vec<Column> {
    outputs
        .iter()
        .map(|output| {
            Column::new(
                output.name.clone(),
                output.data_type.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            )
        })
        .collect()
}
