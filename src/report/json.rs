//! JSON reporter
//!
//! Outputs the full ScanReport as pretty-printed JSON for machine
//! consumption, piping to jq, or further processing.

use crate::report::ScanReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render report as compact JSON (single line)
#[allow(dead_code)] // Public API helper
pub fn render_compact(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::test_report;

    #[test]
    fn test_json_render_valid() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["summary"]["critical"], 1);
        assert_eq!(
            parsed["files"][0]["findings"][0]["rule"],
            "sql-injection"
        );
        assert_eq!(parsed["files"][0]["findings"][0]["line"], 36);
    }

    #[test]
    fn test_json_render_compact() {
        let report = test_report();
        let json_str = render_compact(&report).expect("render compact JSON");
        assert!(!json_str.contains('\n'));
        let _: serde_json::Value = serde_json::from_str(&json_str).expect("parse compact JSON");
    }

    #[test]
    fn test_json_deterministic() {
        let a = render(&test_report()).expect("render");
        let b = render(&test_report()).expect("render");
        assert_eq!(a, b);
    }
}
