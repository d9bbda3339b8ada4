//! Path Traversal Detection
//!
//! A path-construction or file-access call whose argument derives from
//! user input, with no prior normalization or allow-list check in the same
//! scope. CWE-22.

use crate::models::{Finding, Severity};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, sanitizer_called_before, sink_finding, Rule};
use crate::taint::SymbolTable;
use anyhow::Result;
use std::sync::Arc;

pub struct PathTraversalRule {
    registry: Arc<Registry>,
}

impl PathTraversalRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for PathTraversalRule {
    fn id(&self) -> &'static str {
        "path-traversal"
    }

    fn description(&self) -> &'static str {
        "User-controlled input reaches a file path without normalization or allow-listing"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-22")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::PathAccess) {
            for arg in sink.sensitive_args {
                let flow = symbols.flow_of(arg, sink.scope);
                if !flow.is_suspect() {
                    continue;
                }
                // Sanitized along the dataflow chain
                if flow
                    .callees()
                    .any(|c| self.registry.is_sanitizer(SinkKind::PathAccess, c))
                {
                    continue;
                }
                // Or normalized earlier in the same scope
                if sanitizer_called_before(
                    unit,
                    symbols,
                    &self.registry,
                    SinkKind::PathAccess,
                    sink.scope,
                    sink.span.line,
                ) {
                    continue;
                }
                findings.push(sink_finding(
                    self,
                    unit,
                    sink.span,
                    format!(
                        "Path passed to {}() derives from user input without \
                         normalization or an allow-list check",
                        sink.callee
                    ),
                    flow.state().confidence(),
                    flow.chain(),
                ));
                break;
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse;
    use crate::taint::TaintTracker;

    fn run(src: &str) -> Vec<Finding> {
        let unit = parse("app.js", src).expect("parse");
        let registry = Arc::new(Registry::with_default_patterns());
        let symbols = TaintTracker::new(Arc::clone(&registry)).analyze(&unit);
        PathTraversalRule::new(registry)
            .evaluate(&unit, &symbols)
            .expect("evaluate")
    }

    #[test]
    fn test_tainted_join_fires() {
        let src = "const filename = req.query.file;\n\
                   const filepath = path.join('/uploads', filename);";
        let findings = run(src);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn test_basename_in_chain_suppresses() {
        let src = "const filename = req.query.file;\n\
                   const filepath = path.join('/uploads', path.basename(filename));";
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_prior_normalization_suppresses() {
        let src = "const filename = req.query.file;\n\
                   const safe = sanitizePath(filename);\n\
                   fs.readFile(filename);";
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_static_path_is_clean() {
        assert!(run("fs.readFile('/etc/app/config.json');").is_empty());
    }
}
