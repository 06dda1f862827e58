use crate::error::AnalysisError;
use crate::text::position_at;
use crate::types::Dialect;
use sqlparser::ast::Statement;
use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::Parser;

/// Parses compiled SQL with the configured dialect.
///
/// Generic SQL that fails to parse is retried as BigQuery, since compiled
/// dbt models commonly use back-tick quoted paths.
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, AnalysisError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => Ok(statements),
        Err(primary_err) => {
            if matches!(dialect, Dialect::Generic) && sql.contains('`') {
                if let Ok(statements) = Parser::parse_sql(&BigQueryDialect {}, sql) {
                    return Ok(statements);
                }
            }
            Err(locate_end_of_input(primary_err.into(), sql))
        }
    }
}

/// sqlparser reports no location for errors at end of input; point them at
/// the end of the text instead of the origin.
fn locate_end_of_input(err: AnalysisError, sql: &str) -> AnalysisError {
    if !err.message.contains("found: EOF") {
        return err;
    }
    let end = position_at(sql, sql.len());
    AnalysisError::at(err.location().description, end.line + 1, end.character + 1)
}
