use crate::catalog::ObjectName;
use crate::error::AnalysisError;
use crate::types::{Position, Range};
use sqlparser::ast::{self, Ident};
use sqlparser::tokenizer::{Location, Span};

/// Date and time parts that appear as bare identifiers in function
/// arguments, e.g. `DATE_DIFF(a, b, DAY)`.
const DATE_PARTS: &[&str] = &[
    "MICROSECOND",
    "MILLISECOND",
    "SECOND",
    "MINUTE",
    "HOUR",
    "DAY",
    "DAYOFWEEK",
    "DAYOFYEAR",
    "WEEK",
    "ISOWEEK",
    "MONTH",
    "QUARTER",
    "YEAR",
    "ISOYEAR",
    "DATE",
    "TIME",
    "DATETIME",
];

pub(super) fn is_date_part(name: &str) -> bool {
    DATE_PARTS.iter().any(|part| part.eq_ignore_ascii_case(name))
}

/// Converts an AST name to a catalog path. Quoted parts containing dots
/// (`` `p.d.t` ``) are split.
pub(super) fn object_name(name: &ast::ObjectName) -> ObjectName {
    let parts: Vec<String> = name
        .0
        .iter()
        .map(|part| {
            part.as_ident()
                .map(|ident| ident.value.clone())
                .unwrap_or_else(|| part.to_string())
        })
        .flat_map(|part| {
            part.split('.')
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    ObjectName::new(parts)
}

pub(super) fn first_ident(name: &ast::ObjectName) -> Option<&Ident> {
    name.0.first().and_then(|part| part.as_ident())
}

fn to_position(location: Location) -> Option<Position> {
    if location.line == 0 || location.column == 0 {
        return None;
    }
    Some(Position::new(
        (location.line - 1) as u32,
        (location.column - 1) as u32,
    ))
}

/// Zero-based range of a parser span, if the parser recorded one.
pub(super) fn span_range(span: Span) -> Option<Range> {
    let start = to_position(span.start)?;
    let end = to_position(span.end).unwrap_or(start);
    Some(Range::new(start, end.max(start)))
}

pub(super) fn ident_range(ident: &Ident) -> Range {
    span_range(ident.span).unwrap_or_default()
}

/// An analysis error located at `ident`, or at 1:1 when it has no span.
pub(super) fn error_at(description: impl AsRef<str>, ident: Option<&Ident>) -> AnalysisError {
    let (line, column) = ident
        .map(|ident| ident.span.start)
        .filter(|start| start.line > 0 && start.column > 0)
        .map(|start| (start.line as u32, start.column as u32))
        .unwrap_or((1, 1));
    AnalysisError::at(description, line, column)
}

/// The closest candidate within a third of the name's length.
pub(super) fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let needle = name.to_ascii_lowercase();
    let limit = needle.chars().count().div_ceil(3).max(1);
    candidates
        .into_iter()
        .map(|candidate| (strsim::levenshtein(&needle, &candidate.to_ascii_lowercase()), candidate))
        .filter(|(distance, _)| *distance <= limit)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}
