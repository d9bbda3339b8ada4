//! CLI command definitions and handlers

use crate::config::ScanConfig;
use crate::models::Severity;
use crate::pipeline::{ScanOptions, Scanner};
use crate::report::{self, OutputFormat};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// sinktrace - taint-aware security pattern scanner
#[derive(Parser, Debug)]
#[command(name = "sinktrace")]
#[command(
    version,
    about = "Static security-pattern scanner — traces user input to dangerous sinks in web-service source",
    long_about = "sinktrace parses script-like source files, tracks tainted data from request \
fields to dangerous sinks, and reports injection flaws, SSRF, weak secrets, \
missing auth checks, permissive CORS, and sensitive-data logging.\n\n\
Run without a subcommand to scan the given path:\n  \
sinktrace .",
    after_help = "\
Examples:
  sinktrace .                          Scan current directory
  sinktrace scan src/ --format json    JSON output for scripting
  sinktrace scan . --fail-on medium    Exit 1 on medium+ findings (CI mode)
  sinktrace scan . --skip-rule weak-secret
  sinktrace rules                      List registered rules"
)]
pub struct Cli {
    /// Path to scan (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: auto)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan source files for security findings
    Scan {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Exit nonzero when findings at or above this severity exist
        #[arg(long, default_value = "high", value_parser = ["critical", "high", "medium", "low"])]
        fail_on: String,

        /// Skip specific rules (repeatable)
        #[arg(long)]
        skip_rule: Vec<String>,
    },

    /// List registered rules
    Rules,
}

/// Run the CLI; returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Some(Commands::Scan {
            ref format,
            ref output,
            ref fail_on,
            ref skip_rule,
        }) => scan(
            &cli.path,
            format,
            output.as_deref(),
            Some(fail_on.as_str()),
            skip_rule,
            cli.workers,
        ),
        Some(Commands::Rules) => {
            list_rules();
            Ok(0)
        }
        // Bare `sinktrace <path>` scans with defaults
        None => scan(&cli.path, "text", None, None, &[], cli.workers),
    }
}

fn scan(
    path: &std::path::Path,
    format: &str,
    output: Option<&std::path::Path>,
    fail_on_flag: Option<&str>,
    skip_rules_flag: &[String],
    workers: Option<usize>,
) -> Result<i32> {
    let config = ScanConfig::load(path)?;

    // CLI flags override file config
    let fail_on = fail_on_flag
        .or(config.fail_on.as_deref())
        .unwrap_or("high");
    let fail_on = Severity::from_str(fail_on)?;

    let mut skip_rules = config.skip_rules.clone();
    skip_rules.extend(skip_rules_flag.iter().cloned());

    let mut extensions: Vec<String> = crate::parsers::supported_extensions()
        .iter()
        .map(|e| e.to_string())
        .collect();
    extensions.extend(config.extra_extensions.clone());

    let options = ScanOptions {
        workers: workers.unwrap_or(0),
        skip_rules,
        max_findings_per_file: config.max_findings_per_file,
        extensions,
    };

    let scanner = Scanner::new(options);
    let scan_report = scanner.scan_path(path)?;

    let format = OutputFormat::from_str(format)?;
    let rendered = report::render(&scan_report, format)?;
    match output {
        Some(out_path) => std::fs::write(out_path, rendered)?,
        None => print!("{rendered}"),
    }

    Ok(if scan_report.exceeds_threshold(fail_on) {
        1
    } else {
        0
    })
}

fn list_rules() {
    let registry = std::sync::Arc::new(crate::registry::Registry::with_default_patterns());
    let engine = crate::rules::RuleEngine::with_default_rules(&registry);
    println!("{:<20} {:<10} {:<9} DESCRIPTION", "RULE", "SEVERITY", "CWE");
    for rule in engine.rules() {
        println!(
            "{:<20} {:<10} {:<9} {}",
            rule.id(),
            rule.severity().to_string(),
            rule.cwe().unwrap_or("-"),
            rule.description()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_scan_flags() {
        let cli = Cli::try_parse_from([
            "sinktrace",
            "scan",
            "--format",
            "json",
            "--fail-on",
            "medium",
            "--skip-rule",
            "weak-secret",
            "src",
        ])
        .expect("parse CLI");
        match cli.command {
            Some(Commands::Scan {
                format,
                fail_on,
                skip_rule,
                ..
            }) => {
                assert_eq!(format, "json");
                assert_eq!(fail_on, "medium");
                assert_eq!(skip_rule, vec!["weak-secret".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.path, PathBuf::from("src"));
    }

    #[test]
    fn test_cli_bare_path_defaults_to_scan() {
        let cli = Cli::try_parse_from(["sinktrace", "."]).expect("parse CLI");
        assert!(cli.command.is_none());
        assert_eq!(cli.path, PathBuf::from("."));
    }

    #[test]
    fn test_workers_validation() {
        assert!(parse_workers("8").is_ok());
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("abc").is_err());
    }

    #[test]
    fn test_invalid_format_rejected() {
        let result = Cli::try_parse_from(["sinktrace", "scan", "--format", "sarif", "."]);
        assert!(result.is_err());
    }
}
