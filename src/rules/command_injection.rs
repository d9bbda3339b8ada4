//! Command Injection Detection
//!
//! Any tainted substring in any argument of a shell-execution call. CWE-78.

use crate::models::{Finding, Severity};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, sink_finding, Rule};
use crate::taint::SymbolTable;
use anyhow::Result;
use std::sync::Arc;

pub struct CommandInjectionRule {
    registry: Arc<Registry>,
}

impl CommandInjectionRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for CommandInjectionRule {
    fn id(&self) -> &'static str {
        "command-injection"
    }

    fn description(&self) -> &'static str {
        "User-controlled input reaches a shell-execution call"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-78")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::ShellExec) {
            for arg in sink.sensitive_args {
                let flow = symbols.flow_of(arg, sink.scope);
                if !flow.is_suspect() {
                    continue;
                }
                if flow
                    .callees()
                    .any(|c| self.registry.is_sanitizer(SinkKind::ShellExec, c))
                {
                    continue;
                }
                findings.push(sink_finding(
                    self,
                    unit,
                    sink.span,
                    format!(
                        "Command passed to {}() contains user-controlled input",
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
        CommandInjectionRule::new(registry)
            .evaluate(&unit, &symbols)
            .expect("evaluate")
    }

    #[test]
    fn test_tainted_exec_in_handler_fires() {
        let src = "app.get('/ping', (req, res) => {\n\
                     const ip = req.query.ip;\n\
                     exec(`ping -c 4 ${ip}`);\n\
                   });";
        let findings = run(src);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_fires_once_per_call_not_per_arg() {
        let src = "const a = req.query.a;\nconst b = req.query.b;\nexec(a, b);";
        assert_eq!(run(src).len(), 1);
    }

    #[test]
    fn test_static_command_is_clean() {
        assert!(run("exec('ls -la /tmp');").is_empty());
    }

    #[test]
    fn test_quoted_argument_is_clean() {
        let src = "const f = req.query.f;\nexec(shellQuote(f));";
        assert!(run(src).is_empty());
    }
}
