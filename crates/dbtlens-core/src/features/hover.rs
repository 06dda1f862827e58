use crate::catalog::{CatalogSnapshot, ObjectName, SchemaObject};
use crate::position::locate_position;
use crate::session::{identifier_range, range_text, AnalysisResult};
use crate::types::{Hover, Position};

fn column_hover(table: &ObjectName, column: &str, data_type: Option<&str>) -> String {
    format!(
        "Table: {table}\nColumn: {column}\nType: {}",
        data_type.unwrap_or("UNKNOWN")
    )
}

fn table_hover(table: &SchemaObject) -> String {
    let mut contents = format!("Table: {}", table.identity);
    for column in &table.columns {
        contents.push_str(&format!("\n{}: {}", column.name, column.data_type));
    }
    contents
}

/// Hover for the identifier at a raw position, looked up in the last
/// successful analysis and then the catalog.
pub fn hover(
    raw: &str,
    position: Position,
    result: Option<&AnalysisResult>,
    catalog: &CatalogSnapshot,
) -> Option<Hover> {
    let range = identifier_range(raw, position);
    if range.is_empty() {
        return None;
    }
    let word = range_text(raw, range);
    let name = word.trim_matches('`');
    let found = |contents: String| Some(Hover {
        contents,
        range: Some(range),
    });

    if let Some(result) = result {
        let analysis = &result.analysis;
        if let Some(output) = analysis
            .output_columns
            .iter()
            .find(|output| output.name.eq_ignore_ascii_case(name))
        {
            match (&output.source, output.aliased) {
                (Some(source), false) => {
                    return found(column_hover(
                        &source.table,
                        &source.column,
                        output.data_type.as_deref(),
                    ));
                }
                _ => return found(format!("Alias: {}", output.name)),
            }
        }

        let compiled = locate_position(raw, &result.compiled.content, position);
        let reference = analysis
            .column_refs
            .iter()
            .find(|reference| {
                reference.range.contains(compiled) && reference.column.eq_ignore_ascii_case(name)
            })
            .or_else(|| {
                analysis
                    .column_refs
                    .iter()
                    .find(|reference| reference.column.eq_ignore_ascii_case(name))
            });
        if let Some(reference) = reference {
            return found(column_hover(
                &reference.table,
                &reference.column,
                reference.data_type.as_deref(),
            ));
        }

        let aliased = analysis
            .scopes
            .iter()
            .flat_map(|scope| &scope.tables)
            .find(|table| table.qualifier().eq_ignore_ascii_case(name));
        if let Some(table) = aliased {
            if let Some(object) = catalog.table(&table.name) {
                return found(table_hover(object));
            }
        }
    }

    catalog
        .find_table(&ObjectName::parse(name))
        .and_then(|table| found(table_hover(table)))
}
