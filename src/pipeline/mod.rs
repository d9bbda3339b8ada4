//! Scan pipeline
//!
//! Orchestrates the full analysis per unit: parse → taint → rules →
//! report. Units are independent, so files fan out across a fixed rayon
//! pool; the registry and engine are built once and shared read-only.

use crate::parsers;
use crate::registry::Registry;
use crate::report::{FileReport, ScanReport};
use crate::rules::RuleEngine;
use crate::taint::TaintTracker;
use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Options controlling one scan invocation. No process-wide state: every
/// scan gets its own configuration and registry.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Worker threads (0 = auto-detect, capped at 16)
    pub workers: usize,
    /// Rule ids to skip
    pub skip_rules: Vec<String>,
    /// Cap on findings kept per file
    pub max_findings_per_file: usize,
    /// File extensions to scan (without dots)
    pub extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            skip_rules: Vec::new(),
            max_findings_per_file: 500,
            extensions: parsers::supported_extensions()
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Full scan pipeline with its rule engine and pattern registry.
pub struct Scanner {
    registry: Arc<Registry>,
    engine: Arc<RuleEngine>,
    options: ScanOptions,
}

impl Scanner {
    /// Scanner with the default registry and every built-in rule.
    pub fn new(options: ScanOptions) -> Self {
        let registry = Arc::new(Registry::with_default_patterns());
        Self::with_registry(options, registry)
    }

    /// Scanner over a custom sink/source registry.
    pub fn with_registry(options: ScanOptions, registry: Arc<Registry>) -> Self {
        let mut engine = RuleEngine::with_default_rules(&registry)
            .with_max_findings(options.max_findings_per_file);
        engine.skip_rules(&options.skip_rules);
        Self {
            registry,
            engine: Arc::new(engine),
            options,
        }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn worker_count(&self) -> usize {
        if self.options.workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
                .min(16)
        } else {
            self.options.workers
        }
    }

    /// Collect scannable files under a root, honoring .gitignore. Sorted
    /// for deterministic reports.
    pub fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        if root.is_file() {
            return vec![root.to_path_buf()];
        }
        let walker = ignore::WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| self.options.extensions.iter().any(|s| s == ext))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    /// Scan every supported file under `root` in parallel.
    pub fn scan_path(&self, root: &Path) -> Result<ScanReport> {
        let files = self.collect_files(root);
        info!(
            "Scanning {} files with {} rules on {} workers",
            files.len(),
            self.engine.rule_count(),
            self.worker_count()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count())
            .build()?;

        let reports: Vec<FileReport> = pool.install(|| {
            files
                .par_iter()
                .map(|path| self.scan_file(path))
                .collect()
        });

        Ok(ScanReport::from_files(reports))
    }

    /// Scan one file from disk. Read and whole-file parse failures become
    /// file-level errors; other files are unaffected.
    pub fn scan_file(&self, path: &Path) -> FileReport {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return FileReport::failed(path.to_path_buf(), format!("unreadable: {e}"));
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        self.scan_source(path, &text)
    }

    /// Scan in-memory source. The entry point tests and embedders use.
    pub fn scan_source(&self, path: &Path, text: &str) -> FileReport {
        debug!("Scanning {}", path.display());
        let unit = match parsers::parse(path, text) {
            Ok(unit) => unit,
            Err(e) => return FileReport::failed(path.to_path_buf(), e.to_string()),
        };
        let tracker = TaintTracker::new(Arc::clone(&self.registry));
        let symbols = tracker.analyze(&unit);
        let findings = self.engine.evaluate(&unit, &symbols);
        FileReport::new(unit.path.clone(), findings, unit.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn scanner() -> Scanner {
        Scanner::new(ScanOptions::default())
    }

    #[test]
    fn test_scan_source_end_to_end() {
        let src = "const userInput = req.query.user;\n\
                   const query = \"SELECT * FROM users WHERE u = '\" + userInput + \"'\";\n\
                   db.query(query);";
        let report = scanner().scan_source(Path::new("app.js"), src);
        assert!(report.error.is_none());
        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.findings[0].rule, "sql-injection");
    }

    #[test]
    fn test_scan_path_walks_and_aggregates() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("a.js"),
            "const ip = req.query.ip;\nexec(`ping ${ip}`);",
        )?;
        fs::write(dir.path().join("b.js"), "const x = 1;")?;
        fs::write(dir.path().join("notes.txt"), "not scanned")?;

        let report = scanner().scan_path(dir.path())?;
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.summary.critical, 1);
        // path order is stable
        assert!(report.files[0].file.ends_with("a.js"));
        Ok(())
    }

    #[test]
    fn test_binary_file_reported_not_fatal() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("blob.js"), b"\x00\x01\x02binary")?;
        fs::write(dir.path().join("ok.js"), "const x = 1;")?;

        let report = scanner().scan_path(dir.path())?;
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_with_errors, 1);
        let blob = report
            .files
            .iter()
            .find(|f| f.file.ends_with("blob.js"))
            .expect("blob report");
        assert!(blob.error.is_some());
        Ok(())
    }

    #[test]
    fn test_skip_rules_option() {
        let options = ScanOptions {
            skip_rules: vec!["sql-injection".to_string()],
            ..Default::default()
        };
        let scanner = Scanner::new(options);
        let src = "const u = req.query.u;\n\
                   db.query(`SELECT * FROM t WHERE u = '${u}'`);";
        let report = scanner.scan_source(Path::new("app.js"), src);
        assert!(report.findings.iter().all(|f| f.rule != "sql-injection"));
    }

    #[test]
    fn test_determinism_repeated_scans() {
        let src = "const u = req.query.u;\n\
                   db.query(`SELECT * FROM t WHERE u = '${u}'`);\n\
                   exec(`cat ${u}`);\n\
                   const secret = 'hunter2';";
        let s = scanner();
        let a = s.scan_source(Path::new("app.js"), src);
        let b = s.scan_source(Path::new("app.js"), src);
        let ids_a: Vec<_> = a.findings.iter().map(|f| f.id.clone()).collect();
        let ids_b: Vec<_> = b.findings.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert!(!ids_a.is_empty());
    }
}
