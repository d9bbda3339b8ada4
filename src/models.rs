//! Core data models for sinktrace
//!
//! These models are shared across the parser, taint tracker, rule engine,
//! and reporters: severities, findings, and per-scan summaries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Generate a deterministic finding ID based on content hash.
///
/// This ensures findings have stable IDs across runs, enabling:
/// - Tracking findings over time (fixed vs new vs recurring)
/// - Suppression by ID in config files
/// - Reliable deduplication
///
/// The ID is a 16-character hex string derived from hashing:
/// - rule ID (which rule found it)
/// - file path (where it was found)
/// - line and column (specific location)
/// - message (what the issue is)
pub fn deterministic_finding_id(
    rule: &str,
    file: &str,
    line: u32,
    column: u32,
    message: &str,
) -> String {
    // MD5 for stable cross-version hashing; DefaultHasher is intentionally
    // not stable across Rust/compiler versions.
    let input = format!("{rule}\n{file}\n{line}\n{column}\n{message}");
    let digest = md5::compute(input.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Severity levels for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(anyhow::anyhow!(
                "Unknown severity '{}'. Valid: critical, high, medium, low",
                s
            )),
        }
    }
}

/// A single reported instance of a matched vulnerability pattern
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Finding {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file: PathBuf,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    /// The offending source line, trimmed
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub cwe_id: Option<String>,
    /// Confidence score from 0.0 to 1.0; lower for taint states the
    /// tracker could only classify as Unknown
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Dataflow chain from taint source to this location, when available
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<String>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Finding {
    /// Build a finding with its deterministic ID filled in.
    pub fn new(
        rule: &str,
        severity: Severity,
        file: impl Into<PathBuf>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        let file = file.into();
        let message = message.into();
        let id = deterministic_finding_id(rule, &file.to_string_lossy(), line, column, &message);
        Self {
            id,
            rule: rule.to_string(),
            severity,
            message,
            file,
            line,
            column,
            snippet: String::new(),
            cwe_id: None,
            confidence: 1.0,
            provenance: Vec::new(),
        }
    }

    /// Attach the evidence snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Attach a CWE identifier.
    pub fn with_cwe(mut self, cwe: &str) -> Self {
        self.cwe_id = Some(cwe.to_string());
        self
    }

    /// Set the confidence score.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Attach the source-to-sink provenance chain.
    pub fn with_provenance(mut self, provenance: Vec<String>) -> Self {
        self.provenance = provenance;
        self
    }
}

/// Summary of findings by severity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindingsSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for f in findings {
            summary.add(f.severity);
        }
        summary
    }

    /// Count one finding of the given severity.
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
        self.total += 1;
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &FindingsSummary) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.total += other.total;
    }

    /// Number of findings at or above the given severity.
    pub fn at_or_above(&self, threshold: Severity) -> usize {
        let mut count = self.critical;
        if threshold <= Severity::High {
            count += self.high;
        }
        if threshold <= Severity::Medium {
            count += self.medium;
        }
        if threshold <= Severity::Low {
            count += self.low;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_round_trip() {
        for s in ["critical", "high", "medium", "low"] {
            let sev: Severity = s.parse().expect("parse severity");
            assert_eq!(sev.to_string(), s);
        }
        assert!("bogus".parse::<Severity>().is_err());
    }

    #[test]
    fn test_deterministic_id_stability() {
        let a = deterministic_finding_id("sql-injection", "app.js", 10, 4, "tainted query");
        let b = deterministic_finding_id("sql-injection", "app.js", 10, 4, "tainted query");
        let c = deterministic_finding_id("sql-injection", "app.js", 11, 4, "tainted query");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_summary_counts() {
        let findings = vec![
            Finding::new("a", Severity::Critical, "f.js", 1, 1, "x"),
            Finding::new("b", Severity::High, "f.js", 2, 1, "y"),
            Finding::new("c", Severity::High, "f.js", 3, 1, "z"),
            Finding::new("d", Severity::Low, "f.js", 4, 1, "w"),
        ];
        let summary = FindingsSummary::from_findings(&findings);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.high, 2);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.at_or_above(Severity::High), 3);
        assert_eq!(summary.at_or_above(Severity::Low), 4);
    }
}
