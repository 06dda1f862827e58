use super::signature::BUILTIN_FUNCTIONS;
use crate::catalog::CatalogSnapshot;
use crate::position::locate_position;
use crate::session::{prefix_range, range_text, AnalysisResult};
use crate::text::line_text;
use crate::types::{CompletionItem, CompletionKind, Position, ScopeTable};
use std::collections::HashSet;

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "LEFT", "RIGHT", "FULL", "INNER", "CROSS", "OUTER", "ON",
    "USING", "GROUP", "BY", "HAVING", "ORDER", "LIMIT", "OFFSET", "QUALIFY", "WINDOW", "WITH",
    "AS", "DISTINCT", "UNION", "ALL", "INTERSECT", "EXCEPT", "CASE", "WHEN", "THEN", "ELSE", "END",
    "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "BETWEEN", "EXISTS", "UNNEST", "STRUCT",
    "ARRAY", "PARTITION", "OVER", "ASC", "DESC",
];

/// The qualifier before a `.` that precedes the prefix, e.g. `u` in `u.na`.
fn qualifier_before(line: &str, prefix_start: usize) -> Option<String> {
    let chars: Vec<char> = line.chars().collect();
    if prefix_start == 0 || chars.get(prefix_start - 1) != Some(&'.') {
        return None;
    }
    let end = prefix_start - 1;
    let start = chars[..end]
        .iter()
        .rposition(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '`'))
        .map_or(0, |idx| idx + 1);
    let qualifier: String = chars[start..end].iter().filter(|c| **c != '`').collect();
    (!qualifier.is_empty()).then_some(qualifier)
}

fn column_items<'a>(tables: impl Iterator<Item = &'a ScopeTable>) -> Vec<CompletionItem> {
    tables
        .flat_map(|table| {
            table.columns.iter().map(move |column| {
                CompletionItem::new(column.name.clone(), CompletionKind::Column)
                    .with_detail(format!("{} {}", table.qualifier(), column.data_type))
            })
        })
        .collect()
}

/// Completion items for a raw cursor position.
///
/// The cursor is translated into the compiled text of the last analysis to
/// pick the SELECT scope it sits in.
pub fn completion(
    raw: &str,
    position: Position,
    result: Option<&AnalysisResult>,
    catalog: &CatalogSnapshot,
) -> Vec<CompletionItem> {
    let range = prefix_range(raw, position);
    let prefix = range_text(raw, range).to_ascii_lowercase();
    let line = line_text(raw, range.start.line).unwrap_or_default();
    let qualifier = qualifier_before(line, range.start.character as usize);

    let scope = result.and_then(|result| {
        let compiled = locate_position(raw, &result.compiled.content, position);
        result.analysis.scope_at(compiled)
    });

    let mut items = Vec::new();
    if let Some(qualifier) = qualifier {
        if let Some(scope) = scope {
            items = column_items(
                scope
                    .tables
                    .iter()
                    .filter(|table| table.qualifier().eq_ignore_ascii_case(&qualifier)),
            );
        }
    } else {
        if let Some(scope) = scope {
            items.extend(column_items(scope.tables.iter()));
            items.extend(scope.tables.iter().map(|table| {
                CompletionItem::new(table.qualifier(), CompletionKind::Alias)
                    .with_detail(table.name.to_string())
            }));
        }
        if let Some(result) = result {
            items.extend(
                result
                    .analysis
                    .output_columns
                    .iter()
                    .filter(|output| output.aliased)
                    .map(|output| CompletionItem::new(output.name.clone(), CompletionKind::Alias)),
            );
        }
        items.extend(catalog.tables().filter_map(|table| {
            let name = table.identity.last()?;
            Some(CompletionItem::new(name, CompletionKind::Table).with_detail(table.identity.to_string()))
        }));
        items.extend(
            BUILTIN_FUNCTIONS
                .iter()
                .map(|function| CompletionItem::new(function.name, CompletionKind::Function)),
        );
        items.extend(catalog.functions().map(|function| {
            CompletionItem::new(function.identity.to_string(), CompletionKind::Function)
        }));
        items.extend(
            KEYWORDS
                .iter()
                .map(|keyword| CompletionItem::new(*keyword, CompletionKind::Keyword)),
        );
    }

    let mut seen = HashSet::new();
    items.retain(|item| {
        item.label.to_ascii_lowercase().starts_with(&prefix)
            && seen.insert((item.label.to_ascii_lowercase(), item.kind))
    });
    items
}
