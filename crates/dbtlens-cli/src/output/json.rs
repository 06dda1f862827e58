//! JSON output formatting.

use crate::check::FileReport;

/// Format check reports as a JSON array.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_json(reports: &[FileReport], compact: bool) -> String {
    let result = if compact {
        serde_json::to_string(reports)
    } else {
        serde_json::to_string_pretty(reports)
    };
    result.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtlens_core::{Diagnostic, Range};

    fn reports() -> Vec<FileReport> {
        vec![FileReport {
            path: "models/users.sql".into(),
            compiled: None,
            diagnostics: vec![Diagnostic::error(Range::on_line(0, 7, 9), "Unrecognized name: nm")],
        }]
    }

    #[test]
    fn test_json_pretty() {
        let json = format_json(&reports(), false);
        assert!(json.contains('\n'));
        assert!(json.contains("\"diagnostics\""));
        assert!(!json.contains("\"compiled\""));
    }

    #[test]
    fn test_json_compact() {
        let json = format_json(&reports(), true);
        assert!(!json.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["diagnostics"][0]["severity"], "error");
        assert_eq!(parsed[0]["diagnostics"][0]["range"]["start"]["character"], 7);
    }
}
