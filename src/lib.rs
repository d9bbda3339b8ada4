//! sinktrace - static security-pattern scanner
//!
//! Parses script-like web-service source, tracks tainted data from request
//! fields through variable bindings to dangerous sinks, and reports
//! findings for the classic vulnerability classes: SQL injection, command
//! injection, path traversal, SSRF, unsafe eval, weak hardcoded secrets,
//! missing auth checks, permissive CORS, and sensitive-data logging.
//!
//! Pipeline per source unit: parse → taint → rules → report. Units are
//! independent and scan in parallel; see [`pipeline::Scanner`] for the
//! entry point.

pub mod cli;
pub mod config;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod rules;
pub mod taint;

pub use models::{Finding, FindingsSummary, Severity};
pub use pipeline::{ScanOptions, Scanner};
pub use report::{FileReport, OutputFormat, ScanReport};
