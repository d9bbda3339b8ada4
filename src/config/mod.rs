//! Project configuration
//!
//! Optional `sinktrace.toml` at the scan root. CLI flags override file
//! settings; the merged result is passed into the scan invocation, so
//! there is no process-wide configuration state.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "sinktrace.toml";

fn default_max_findings() -> usize {
    500
}

/// Settings read from `sinktrace.toml`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScanConfig {
    /// Severity threshold for a nonzero exit code
    pub fail_on: Option<String>,
    /// Rule ids to skip
    #[serde(default)]
    pub skip_rules: Vec<String>,
    /// Cap on findings kept per file
    #[serde(default = "default_max_findings")]
    pub max_findings_per_file: usize,
    /// Extra file extensions to scan, on top of the built-in set
    #[serde(default)]
    pub extra_extensions: Vec<String>,
}

impl ScanConfig {
    /// Load config from `root/sinktrace.toml`, or defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = if root.is_file() {
            root.parent().unwrap_or(Path::new(".")).join(CONFIG_FILE)
        } else {
            root.join(CONFIG_FILE)
        };
        if !path.exists() {
            return Ok(Self {
                max_findings_per_file: default_max_findings(),
                ..Self::default()
            });
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().expect("tempdir");
        let config = ScanConfig::load(dir.path()).expect("load");
        assert!(config.fail_on.is_none());
        assert!(config.skip_rules.is_empty());
        assert_eq!(config.max_findings_per_file, 500);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "fail-on = \"medium\"\nskip-rules = [\"weak-secret\"]\nmax-findings-per-file = 50\n",
        )
        .expect("write config");

        let config = ScanConfig::load(dir.path()).expect("load");
        assert_eq!(config.fail_on.as_deref(), Some("medium"));
        assert_eq!(config.skip_rules, vec!["weak-secret".to_string()]);
        assert_eq!(config.max_findings_per_file, 50);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "bogus-key = 1\n").expect("write config");
        assert!(ScanConfig::load(dir.path()).is_err());
    }
}
