//! Human-readable check output.

use crate::check::FileReport;
use dbtlens_core::{Diagnostic, Severity};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DiagnosticRow {
    #[tabled(rename = "Line")]
    line: u32,
    #[tabled(rename = "Col")]
    col: u32,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl DiagnosticRow {
    /// Positions are printed 1-based.
    fn new(diagnostic: &Diagnostic, colored: bool) -> Self {
        let label = severity_label(diagnostic.severity);
        let severity = if colored {
            match diagnostic.severity {
                Severity::Error => label.red().to_string(),
                Severity::Warning => label.yellow().to_string(),
                Severity::Info => label.blue().to_string(),
            }
        } else {
            label.to_string()
        };
        Self {
            line: diagnostic.range.start.line + 1,
            col: diagnostic.range.start.character + 1,
            severity,
            message: diagnostic.message.clone(),
        }
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

/// Format check reports as text, with colors when stdout is a terminal.
pub fn format_table(reports: &[FileReport], quiet: bool, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut found = 0usize;

    for report in reports {
        if report.diagnostics.is_empty() {
            passed += 1;
            if quiet {
                continue;
            }
        } else {
            failed += 1;
            found += report.diagnostics.len();
        }
        write_file_section(&mut out, report, colored);
    }

    let summary = format!(
        "{} passed. {} failed. {} diagnostics found.",
        files(passed),
        files(failed),
        found
    );
    if colored && failed > 0 {
        writeln!(out, "{}", summary.red()).unwrap();
    } else if colored {
        writeln!(out, "{}", summary.green()).unwrap();
    } else {
        writeln!(out, "{summary}").unwrap();
    }
    out
}

fn write_file_section(out: &mut String, report: &FileReport, colored: bool) {
    let status = match (report.diagnostics.is_empty(), colored) {
        (true, true) => "PASS".green().to_string(),
        (true, false) => "PASS".to_string(),
        (false, true) => "FAIL".red().to_string(),
        (false, false) => "FAIL".to_string(),
    };
    writeln!(out, "== [{}] {}", report.path, status).unwrap();

    if report.diagnostics.is_empty() {
        return;
    }
    let rows = report
        .diagnostics
        .iter()
        .map(|diagnostic| DiagnosticRow::new(diagnostic, colored));
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    writeln!(out, "{table}").unwrap();
}

fn files(count: usize) -> String {
    format!("{count} file{}", if count == 1 { "" } else { "s" })
}
