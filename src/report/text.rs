//! Text (terminal) reporter with colors and formatting

use crate::models::Severity;
use crate::report::ScanReport;
use anyhow::Result;

/// Severity colors (ANSI escape codes)
fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::Critical => "\x1b[31m", // Red
        Severity::High => "\x1b[91m",     // Light red
        Severity::Medium => "\x1b[33m",   // Yellow
        Severity::Low => "\x1b[34m",      // Blue
    }
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Severity tag
fn severity_tag(severity: &Severity) -> &'static str {
    match severity {
        Severity::Critical => "[C]",
        Severity::High => "[H]",
        Severity::Medium => "[M]",
        Severity::Low => "[L]",
    }
}

/// Render report as formatted terminal output
pub fn render(report: &ScanReport) -> Result<String> {
    let mut out = String::new();

    out.push_str(&format!("\n{BOLD}sinktrace scan{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Files: {}  Errors: {}\n\n",
        report.files_scanned, report.files_with_errors
    ));

    let fs = &report.summary;
    out.push_str(&format!("{BOLD}FINDINGS{RESET} ({} total)\n", fs.total));

    let mut summary_parts = Vec::new();
    if fs.critical > 0 {
        summary_parts.push(format!("\x1b[31m{} critical{RESET}", fs.critical));
    }
    if fs.high > 0 {
        summary_parts.push(format!("\x1b[91m{} high{RESET}", fs.high));
    }
    if fs.medium > 0 {
        summary_parts.push(format!("\x1b[33m{} medium{RESET}", fs.medium));
    }
    if fs.low > 0 {
        summary_parts.push(format!("\x1b[34m{} low{RESET}", fs.low));
    }
    if !summary_parts.is_empty() {
        out.push_str(&format!("  {}\n", summary_parts.join(" | ")));
    }
    out.push('\n');

    for file in &report.files {
        if let Some(error) = &file.error {
            out.push_str(&format!(
                "{BOLD}{}{RESET}  {DIM}skipped: {}{RESET}\n\n",
                file.file.display(),
                error
            ));
            continue;
        }
        if file.findings.is_empty() {
            continue;
        }

        out.push_str(&format!("{BOLD}{}{RESET}\n", file.file.display()));
        for finding in &file.findings {
            let sev_c = severity_color(&finding.severity);
            let tag = severity_tag(&finding.severity);
            out.push_str(&format!(
                "  {sev_c}{tag}{RESET} {}:{}  {BOLD}{}{RESET}",
                finding.line, finding.column, finding.rule
            ));
            if let Some(cwe) = &finding.cwe_id {
                out.push_str(&format!("  {DIM}{cwe}{RESET}"));
            }
            out.push('\n');
            out.push_str(&format!("      {}\n", finding.message));
            if !finding.snippet.is_empty() {
                out.push_str(&format!("      {DIM}{}{RESET}\n", finding.snippet));
            }
        }
        if !file.diagnostics.is_empty() {
            out.push_str(&format!(
                "  {DIM}({} statement(s) skipped by the parser){RESET}\n",
                file.diagnostics.len()
            ));
        }
        out.push('\n');
    }

    if fs.total == 0 {
        out.push_str(&format!("{DIM}No findings.{RESET}\n"));
    }

    Ok(out)
}
