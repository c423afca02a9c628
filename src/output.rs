//! JSON output for diagnostics and fix reports

use crate::diagnostic::{Diagnostic, Severity};
use crate::engine::FixReport;
use serde::{Deserialize, Serialize};

/// One diagnostic in the output schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub fix_applied: bool,
}

impl From<&Diagnostic> for DiagnosticRecord {
    fn from(d: &Diagnostic) -> Self {
        Self {
            rule_id: d.rule_id.clone(),
            severity: d.severity,
            message: d.message.clone(),
            line: d.span.start.line,
            column: d.span.start.column,
            end_line: d.span.end.line,
            end_column: d.span.end.column,
            fix_applied: d.fix_applied,
        }
    }
}

/// Counts over a set of diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    /// Diagnostics still carrying an unapplied fix
    pub fixable_count: usize,
    pub fixed_count: usize,
}

impl Summary {
    pub fn from_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Self {
        let mut summary = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Error => summary.error_count += 1,
                Severity::Warning => summary.warning_count += 1,
                Severity::Info => summary.info_count += 1,
            }
            if d.fix_applied {
                summary.fixed_count += 1;
            } else if d.has_fix() {
                summary.fixable_count += 1;
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.error_count + self.warning_count + self.info_count
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportOutput<'a> {
    diagnostics: Vec<DiagnosticRecord>,
    fixed: Vec<DiagnosticRecord>,
    passes_used: usize,
    max_passes_exceeded: bool,
    conflict_count: usize,
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
}

/// JSON formatter for machine-readable output
#[derive(Debug, Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
    /// Include the fixed text in report output
    pub include_output: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn with_output(mut self) -> Self {
        self.include_output = true;
        self
    }

    /// Render diagnostics as a JSON array of records
    pub fn format_diagnostics(&self, diagnostics: &[Diagnostic]) -> String {
        let records: Vec<DiagnosticRecord> = diagnostics.iter().map(Into::into).collect();
        self.render(&records, "[]")
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        self.render(&DiagnosticRecord::from(diagnostic), "{}")
    }

    /// Render a fix report: remaining and fixed diagnostics plus pass info
    pub fn format_report(&self, report: &FixReport) -> String {
        let output = ReportOutput {
            diagnostics: report.diagnostics.iter().map(Into::into).collect(),
            fixed: report.fixed.iter().map(Into::into).collect(),
            passes_used: report.passes_used,
            max_passes_exceeded: report.max_passes_exceeded,
            conflict_count: report.conflicts.len(),
            summary: Summary::from_diagnostics(report.diagnostics.iter().chain(&report.fixed)),
            output: self.include_output.then_some(report.text.as_str()),
        };
        self.render(&output, "{}")
    }

    fn render<T: Serialize>(&self, value: &T, fallback: &str) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|_| fallback.to_string())
    }
}

/// Compact JSON array of diagnostic records
pub fn to_json(diagnostics: &[Diagnostic]) -> String {
    JsonFormatter::new().format_diagnostics(diagnostics)
}

/// Indented JSON array of diagnostic records
pub fn to_json_pretty(diagnostics: &[Diagnostic]) -> String {
    JsonFormatter::new().pretty().format_diagnostics(diagnostics)
}
