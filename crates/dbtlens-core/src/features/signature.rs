//! Signature help for the function call around the cursor.

use crate::catalog::{CatalogSnapshot, ObjectName, SchemaObject};
use crate::session::{range_text, text_before_bracket};
use crate::text::line_text;
use crate::types::{Position, SignatureHelp, SignatureInfo};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A builtin function signature.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub parameters: &'static [&'static str],
    pub returns: &'static str,
    pub summary: &'static str,
}

const fn builtin(
    name: &'static str,
    parameters: &'static [&'static str],
    returns: &'static str,
    summary: &'static str,
) -> BuiltinFunction {
    BuiltinFunction {
        name,
        parameters,
        returns,
        summary,
    }
}

pub const BUILTIN_FUNCTIONS: &[BuiltinFunction] = &[
    builtin("ARRAY_AGG", &["expression"], "ARRAY", "Collects values into an array."),
    builtin("AVG", &["expression"], "FLOAT64", "Average of non-NULL values."),
    builtin("CAST", &["expression AS type"], "type", "Converts a value to another type."),
    builtin("COALESCE", &["expression", "..."], "any", "First non-NULL argument."),
    builtin("CONCAT", &["value", "..."], "STRING", "Concatenates strings."),
    builtin("COUNT", &["expression"], "INT64", "Number of rows or non-NULL values."),
    builtin("COUNTIF", &["condition"], "INT64", "Number of rows where the condition holds."),
    builtin("CURRENT_DATE", &["[time_zone]"], "DATE", "The current date."),
    builtin("CURRENT_TIMESTAMP", &[], "TIMESTAMP", "The current timestamp."),
    builtin("DATE", &["timestamp_expression", "[time_zone]"], "DATE", "Constructs or extracts a DATE."),
    builtin("DATE_ADD", &["date_expression", "INTERVAL n part"], "DATE", "Adds an interval to a date."),
    builtin("DATE_DIFF", &["end_date", "start_date", "part"], "INT64", "Whole parts between two dates."),
    builtin("DATE_SUB", &["date_expression", "INTERVAL n part"], "DATE", "Subtracts an interval from a date."),
    builtin("DATE_TRUNC", &["date_expression", "part"], "DATE", "Truncates a date to a part."),
    builtin("EXTRACT", &["part FROM expression"], "INT64", "A part of a date or timestamp."),
    builtin("FORMAT_DATE", &["format_string", "date_expression"], "STRING", "Formats a date."),
    builtin("IF", &["condition", "true_result", "else_result"], "any", "Conditional value."),
    builtin("IFNULL", &["expression", "null_result"], "any", "The expression, or a fallback when NULL."),
    builtin("LAG", &["expression", "[offset]", "[default]"], "any", "Value of a preceding row."),
    builtin("LEAD", &["expression", "[offset]", "[default]"], "any", "Value of a following row."),
    builtin("LENGTH", &["value"], "INT64", "Length of a string or bytes value."),
    builtin("LOWER", &["value"], "STRING", "Lower-cased string."),
    builtin("MAX", &["expression"], "any", "Largest non-NULL value."),
    builtin("MIN", &["expression"], "any", "Smallest non-NULL value."),
    builtin("NULLIF", &["expression", "expression_to_match"], "any", "NULL when both arguments are equal."),
    builtin("PARSE_DATE", &["format_string", "date_string"], "DATE", "Parses a date from a string."),
    builtin("REGEXP_CONTAINS", &["value", "regexp"], "BOOL", "Whether the value matches the pattern."),
    builtin("REGEXP_EXTRACT", &["value", "regexp"], "STRING", "First substring matching the pattern."),
    builtin("REPLACE", &["original_value", "from_pattern", "to_pattern"], "STRING", "Replaces all occurrences."),
    builtin("ROUND", &["value", "[digits]"], "FLOAT64", "Rounds to the given precision."),
    builtin("ROW_NUMBER", &[], "INT64", "Sequential row number within a window."),
    builtin("SAFE_CAST", &["expression AS type"], "type", "CAST returning NULL on failure."),
    builtin("SAFE_DIVIDE", &["dividend", "divisor"], "FLOAT64", "Division returning NULL on error."),
    builtin("SPLIT", &["value", "[delimiter]"], "ARRAY<STRING>", "Splits a string."),
    builtin("STRING_AGG", &["expression", "[delimiter]"], "STRING", "Concatenates non-NULL values."),
    builtin("SUBSTR", &["value", "position", "[length]"], "STRING", "Substring of a value."),
    builtin("SUM", &["expression"], "numeric", "Sum of non-NULL values."),
    builtin("TIMESTAMP_TRUNC", &["timestamp_expression", "part", "[time_zone]"], "TIMESTAMP", "Truncates a timestamp to a part."),
    builtin("TRIM", &["value", "[set_of_characters]"], "STRING", "Removes leading and trailing characters."),
    builtin("UPPER", &["value"], "STRING", "Upper-cased string."),
];

static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinFunction>> =
    LazyLock::new(|| {
        BUILTIN_FUNCTIONS
            .iter()
            .map(|function| (function.name, function))
            .collect()
    });

pub fn builtin_function(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTIN_INDEX.get(name.to_ascii_uppercase().as_str()).copied()
}

impl BuiltinFunction {
    fn signature(&self) -> SignatureInfo {
        SignatureInfo {
            label: format!("{}({}) -> {}", self.name, self.parameters.join(", "), self.returns),
            documentation: Some(self.summary.to_string()),
            parameters: self.parameters.iter().map(|p| p.to_string()).collect(),
        }
    }
}

fn udf_signature(function: &SchemaObject) -> SignatureInfo {
    let parameters: Vec<String> = function
        .columns
        .iter()
        .map(|argument| format!("{} {}", argument.name, argument.data_type))
        .collect();
    let returns = function.return_type.as_deref().unwrap_or("UNKNOWN");
    SignatureInfo {
        label: format!("{}({}) -> {returns}", function.identity, parameters.join(", ")),
        documentation: None,
        parameters,
    }
}

/// Signature of the function whose argument list the cursor is in.
pub fn signature_help(raw: &str, position: Position, catalog: &CatalogSnapshot) -> Option<SignatureHelp> {
    let range = text_before_bracket(raw, position);
    if range.is_empty() {
        return None;
    }
    let name = range_text(raw, range);
    let name = name.trim_matches('`');

    let signature = match builtin_function(name) {
        Some(builtin) => builtin.signature(),
        None => udf_signature(catalog.find_function(&ObjectName::parse(name))?),
    };

    let line = line_text(raw, range.start.line).unwrap_or_default();
    let arguments: String = line
        .chars()
        .skip(range.end.character as usize + 1)
        .take(position.character.saturating_sub(range.end.character + 1) as usize)
        .collect();
    let active_parameter = arguments.matches(',').count() as u32;

    Some(SignatureHelp {
        signatures: vec![signature],
        active_parameter,
    })
}
