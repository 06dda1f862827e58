//! The bundled [`SqlAnalyzer`]: sqlparser for syntax, the catalog snapshot
//! for names.
//!
//! Analysis runs in three steps:
//!
//! 1. Parse the compiled SQL with the configured dialect. Parser errors are
//!    rewritten to `"<message> [at <line>:<col>]"`.
//! 2. Resolve every FROM relation against CTEs and the catalog.
//! 3. Resolve every column identifier in SELECT, WHERE, GROUP BY, HAVING,
//!    QUALIFY and ORDER BY against the tables in scope.
//!
//! Name checks are deliberately partial. A column is only reported missing
//! when every table it could belong to has a known column list, so a model
//! reading an unregistered table never produces false positives.

mod helpers;
mod references;
mod resolve;
mod scope;
mod visit;

pub use references::referenced_objects;

use crate::catalog::{CatalogSnapshot, ObjectRef};
use crate::config::AnalyzerOptions;
use crate::engine::SqlAnalyzer;
use crate::error::AnalysisError;
use crate::parser::parse_sql_with_dialect;
use crate::types::{Analysis, Dialect};
use async_trait::async_trait;
use resolve::Resolver;
use sqlparser::ast::Statement;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlparserAnalyzer {
    dialect: Dialect,
    options: AnalyzerOptions,
}

impl SqlparserAnalyzer {
    pub fn new(dialect: Dialect, options: AnalyzerOptions) -> Self {
        Self { dialect, options }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn options(&self) -> AnalyzerOptions {
        self.options
    }

    /// Synchronous form of [`SqlAnalyzer::analyze`].
    pub fn analyze_sql(&self, sql: &str, catalog: &CatalogSnapshot) -> Result<Analysis, AnalysisError> {
        let statements = parse_sql_with_dialect(sql, self.dialect)?;
        let mut resolver = Resolver::new(catalog, self.options);
        for statement in &statements {
            match statement {
                Statement::Query(query) => resolver.statement_query(query)?,
                Statement::CreateView { query, .. } => resolver.statement_query(query)?,
                Statement::CreateTable(create) => {
                    if let Some(query) = &create.query {
                        resolver.statement_query(query)?;
                    }
                }
                _ => debug!("statement kind is not analyzed"),
            }
        }
        Ok(resolver.finish())
    }
}

#[async_trait]
impl SqlAnalyzer for SqlparserAnalyzer {
    async fn referenced_objects(&self, sql: &str) -> Vec<ObjectRef> {
        referenced_objects(sql, self.dialect)
    }

    async fn analyze(&self, sql: &str, catalog: &CatalogSnapshot) -> Result<Analysis, AnalysisError> {
        self.analyze_sql(sql, catalog)
    }
}
