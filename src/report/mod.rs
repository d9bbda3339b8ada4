//! Scan reports and output formats
//!
//! Per-file findings fold into a `ScanReport` with stable ordering:
//! files by path, findings severity-first. Renderers:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON

mod json;
mod text;

use crate::models::{Finding, FindingsSummary, Severity};
use crate::parsers::ParseDiagnostic;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Scan result for one source file
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub findings: Vec<Finding>,
    pub summary: FindingsSummary,
    /// Statements skipped during parsing, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ParseDiagnostic>,
    /// Whole-file failure (unreadable/binary); the rest of the scan
    /// continues without this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    /// Report for a successfully scanned unit.
    pub fn new(
        file: PathBuf,
        findings: Vec<Finding>,
        diagnostics: Vec<ParseDiagnostic>,
    ) -> Self {
        let summary = FindingsSummary::from_findings(&findings);
        Self {
            file,
            findings,
            summary,
            diagnostics,
            error: None,
        }
    }

    /// Report for a file that could not be scanned at all.
    pub fn failed(file: PathBuf, error: String) -> Self {
        Self {
            file,
            findings: Vec::new(),
            summary: FindingsSummary::default(),
            diagnostics: Vec::new(),
            error: Some(error),
        }
    }
}

/// Aggregated result of one scan invocation
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub files: Vec<FileReport>,
    pub summary: FindingsSummary,
    pub files_scanned: usize,
    pub files_with_errors: usize,
}

impl ScanReport {
    /// Fold per-file reports into a scan report. Files sort by path so
    /// repeated scans of identical input serialize identically.
    pub fn from_files(mut files: Vec<FileReport>) -> Self {
        files.sort_by(|a, b| a.file.cmp(&b.file));
        let mut summary = FindingsSummary::default();
        let mut files_with_errors = 0;
        for report in &files {
            summary.merge(&report.summary);
            if report.error.is_some() {
                files_with_errors += 1;
            }
        }
        Self {
            files_scanned: files.len(),
            files_with_errors,
            files,
            summary,
        }
    }

    /// All findings across files, report order.
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.files.iter().flat_map(|f| f.findings.iter())
    }

    /// Whether any finding meets the severity threshold; drives the CLI
    /// exit code.
    pub fn exceeds_threshold(&self, threshold: Severity) -> bool {
        self.summary.at_or_above(threshold) > 0
    }
}

/// Render a report in the given format.
pub fn render(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(report),
        OutputFormat::Json => json::render(report),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Finding;

    /// Minimal report for renderer tests
    pub(crate) fn test_report() -> ScanReport {
        let findings = vec![
            Finding::new(
                "sql-injection",
                Severity::Critical,
                "app.js",
                36,
                9,
                "Query built from user input",
            )
            .with_snippet("const result = await pool.query(query);")
            .with_cwe("CWE-89"),
            Finding::new(
                "permissive-cors",
                Severity::Medium,
                "app.js",
                164,
                2,
                "Wildcard origin",
            ),
        ];
        ScanReport::from_files(vec![FileReport::new(
            PathBuf::from("app.js"),
            findings,
            Vec::new(),
        )])
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_report_aggregation() {
        let report = test_report();
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.critical, 1);
        assert!(report.exceeds_threshold(Severity::High));
        assert!(report.exceeds_threshold(Severity::Critical));
    }

    #[test]
    fn test_file_order_is_stable() {
        let report = ScanReport::from_files(vec![
            FileReport::new(PathBuf::from("b.js"), vec![], vec![]),
            FileReport::new(PathBuf::from("a.js"), vec![], vec![]),
        ]);
        assert_eq!(report.files[0].file, PathBuf::from("a.js"));
    }

    #[test]
    fn test_failed_file_counted() {
        let report = ScanReport::from_files(vec![FileReport::failed(
            PathBuf::from("blob.js"),
            "binary content".to_string(),
        )]);
        assert_eq!(report.files_with_errors, 1);
        assert_eq!(report.summary.total, 0);
    }
}
