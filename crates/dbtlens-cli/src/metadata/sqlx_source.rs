//! SQLx-backed schema source for live database lookups.
//!
//! Supports PostgreSQL, MySQL, and SQLite. Tables are looked up one at a
//! time, as the catalog asks for them; user functions are not introspected.

use async_trait::async_trait;
use dbtlens_core::{Column, FetchError, ObjectKind, ObjectName, SchemaObject, SchemaSource};
use sqlx::{AnyPool, Row};
use tracing::debug;

/// Database type inferred from connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Postgres,
    Mysql,
    Sqlite,
}

impl DatabaseType {
    /// Infer database type from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Some(Self::Mysql)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

pub struct SqlxSchemaSource {
    pool: AnyPool,
    db_type: DatabaseType,
    default_schema: Option<String>,
}

impl SqlxSchemaSource {
    /// Connects to the database at `url`.
    ///
    /// `default_schema` is searched for names without a schema part.
    pub async fn connect(url: &str, default_schema: Option<String>) -> anyhow::Result<Self> {
        let db_type = DatabaseType::from_url(url)
            .ok_or_else(|| anyhow::anyhow!("Unsupported database URL scheme: {url}"))?;

        sqlx::any::install_default_drivers();
        let pool = AnyPool::connect(url).await?;

        Ok(Self {
            pool,
            db_type,
            default_schema,
        })
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Schema and table parts of `name`; anything before the schema is a
    /// project or catalog and is not used for lookups.
    fn split_name<'a>(&'a self, name: &'a ObjectName) -> Option<(Option<&'a str>, &'a str)> {
        let parts = name.parts();
        let table = parts.last()?;
        let schema = match parts.len() {
            0 | 1 => self.default_schema.as_deref(),
            n => Some(parts[n - 2].as_str()),
        };
        Some((schema, table))
    }

    async fn columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<Column>, sqlx::Error> {
        match self.db_type {
            DatabaseType::Postgres => {
                self.information_schema_columns(schema.or(Some("public")), table, "$1", "$2")
                    .await
            }
            DatabaseType::Mysql => {
                self.information_schema_columns(schema, table, "?", "?")
                    .await
            }
            DatabaseType::Sqlite => self.sqlite_columns(table).await,
        }
    }

    async fn information_schema_columns(
        &self,
        schema: Option<&str>,
        table: &str,
        schema_param: &str,
        table_param: &str,
    ) -> Result<Vec<Column>, sqlx::Error> {
        let rows = match schema {
            Some(schema) => {
                let query = format!(
                    "SELECT column_name AS column_name, data_type AS data_type \
                     FROM information_schema.columns \
                     WHERE table_schema = {schema_param} AND table_name = {table_param} \
                     ORDER BY ordinal_position"
                );
                sqlx::query(&query)
                    .bind(schema.to_string())
                    .bind(table.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                // MySQL without a schema: the connection's current database.
                let query = format!(
                    "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type \
                     FROM information_schema.COLUMNS \
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {table_param} \
                     ORDER BY ORDINAL_POSITION"
                );
                sqlx::query(&query)
                    .bind(table.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get("column_name");
                let data_type: String = row.get("data_type");
                Column::new(name, data_type.to_ascii_uppercase())
            })
            .collect())
    }

    async fn sqlite_columns(&self, table: &str) -> Result<Vec<Column>, sqlx::Error> {
        // pragma_table_info is a table-valued function, so the name is inlined.
        let query = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get("name");
                let data_type: String = row.get("type");
                let data_type = if data_type.is_empty() {
                    "UNKNOWN".to_string()
                } else {
                    data_type.to_ascii_uppercase()
                };
                Column::new(name, data_type)
            })
            .collect())
    }
}

#[async_trait]
impl SchemaSource for SqlxSchemaSource {
    async fn fetch(&self, name: &ObjectName, kind: ObjectKind) -> Result<SchemaObject, FetchError> {
        if kind == ObjectKind::Function {
            return Err(FetchError::NotFound(name.clone()));
        }
        let (schema, table) = self
            .split_name(name)
            .ok_or_else(|| FetchError::NotFound(name.clone()))?;

        let columns = self
            .columns(schema, table)
            .await
            .map_err(|err| FetchError::failed(name.clone(), err.to_string()))?;
        debug!(%name, columns = columns.len(), "fetched table from database");

        if columns.is_empty() {
            return Err(FetchError::NotFound(name.clone()));
        }
        Ok(SchemaObject::table(name.clone(), columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_url() {
        assert_eq!(
            DatabaseType::from_url("postgres://localhost/db"),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            DatabaseType::from_url("postgresql://localhost/db"),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            DatabaseType::from_url("mariadb://localhost/db"),
            Some(DatabaseType::Mysql)
        );
        assert_eq!(
            DatabaseType::from_url("sqlite::memory:"),
            Some(DatabaseType::Sqlite)
        );
        assert_eq!(DatabaseType::from_url("oracle://localhost/db"), None);
    }

    #[tokio::test]
    async fn sqlite_tables_are_fetched_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name text)", [])
            .unwrap();
        drop(conn);

        let url = format!("sqlite://{}", path.display());
        let source = SqlxSchemaSource::connect(&url, None).await.unwrap();
        assert_eq!(source.database_type(), DatabaseType::Sqlite);

        let users = source
            .fetch(&ObjectName::parse("main.users"), ObjectKind::Table)
            .await
            .unwrap();
        assert_eq!(
            users.columns,
            [Column::new("id", "INTEGER"), Column::new("name", "TEXT")]
        );

        let missing = source
            .fetch(&ObjectName::parse("ghosts"), ObjectKind::Table)
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }
}
