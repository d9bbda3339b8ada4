//! Dynamic Code Evaluation Detection
//!
//! Tainted input reaching eval-like calls is remote code execution. CWE-94.

use crate::models::{Finding, Severity};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, sink_finding, Rule};
use crate::taint::SymbolTable;
use anyhow::Result;
use std::sync::Arc;

pub struct UnsafeEvalRule {
    registry: Arc<Registry>,
}

impl UnsafeEvalRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for UnsafeEvalRule {
    fn id(&self) -> &'static str {
        "unsafe-eval"
    }

    fn description(&self) -> &'static str {
        "User-controlled input reaches a dynamic code-evaluation call"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-94")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::DynamicEval) {
            for arg in sink.sensitive_args {
                let flow = symbols.flow_of(arg, sink.scope);
                if !flow.is_suspect() {
                    continue;
                }
                findings.push(sink_finding(
                    self,
                    unit,
                    sink.span,
                    format!(
                        "{}() evaluates user-controlled input as code",
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
        UnsafeEvalRule::new(registry)
            .evaluate(&unit, &symbols)
            .expect("evaluate")
    }

    #[test]
    fn test_eval_of_body_field_fires() {
        let src = "app.post('/config', (req, res) => {\n\
                     const config = req.body;\n\
                     const result = eval(config.callback);\n\
                   });";
        let findings = run(src);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].line, 3);
    }

    #[test]
    fn test_eval_of_constant_is_clean() {
        assert!(run("eval('1 + 1');").is_empty());
    }

    #[test]
    fn test_evaluate_is_not_eval() {
        // Bare `eval` pattern must not match other names
        let src = "const v = req.body.x;\nevaluateRules(v);";
        assert!(run(src).is_empty());
    }
}
