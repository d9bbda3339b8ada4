//! Sensitive Data Logging Detection
//!
//! A logging call whose argument carries tainted data whose provenance
//! includes a field named like a card number, password, or token. The
//! taint requirement keeps ordinary constant log lines out; the field
//! check keeps ordinary request logging out. CWE-532.

use crate::models::{Finding, Severity};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, sink_finding, Rule};
use crate::taint::SymbolTable;
use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

static SENSITIVE_FIELD: OnceLock<Regex> = OnceLock::new();

fn sensitive_field_pattern() -> &'static Regex {
    SENSITIVE_FIELD.get_or_init(|| {
        Regex::new(r"(?i)(card|cvv|passw|pwd|secret|token|ssn|credential|account)")
            .expect("valid regex")
    })
}

pub struct SensitiveLoggingRule {
    registry: Arc<Registry>,
}

impl SensitiveLoggingRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for SensitiveLoggingRule {
    fn id(&self) -> &'static str {
        "sensitive-logging"
    }

    fn description(&self) -> &'static str {
        "Sensitive user-supplied fields written to logs"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-532")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::Logging) {
            for arg in sink.sensitive_args {
                let flow = symbols.flow_of(arg, sink.scope);
                if !flow.is_suspect() {
                    continue;
                }
                let sensitive_fields: Vec<&str> = flow
                    .fields()
                    .filter(|f| sensitive_field_pattern().is_match(f))
                    .collect();
                if sensitive_fields.is_empty() {
                    continue;
                }
                findings.push(sink_finding(
                    self,
                    unit,
                    sink.span,
                    format!(
                        "{}() writes sensitive field(s) {} to the log",
                        sink.callee,
                        sensitive_fields.join(", ")
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
        SensitiveLoggingRule::new(registry)
            .evaluate(&unit, &symbols)
            .expect("evaluate")
    }

    #[test]
    fn test_logging_card_fields_fires() {
        let src = "app.post('/payment', (req, res) => {\n\
                     const { cardNumber, cvv, amount } = req.body;\n\
                     console.log(`Processing payment: ${cardNumber} CVV: ${cvv}`);\n\
                   });";
        let findings = run(src);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert!(findings[0].message.contains("cardNumber"));
    }

    #[test]
    fn test_logging_reset_token_fires() {
        let src = "const { email } = req.body;\n\
                   const resetToken = req.body.resetToken;\n\
                   console.log(`Reset token for ${email}: ${resetToken}`);";
        let findings = run(src);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_constant_log_is_clean() {
        assert!(run("console.log('server started on port 3000');").is_empty());
    }

    #[test]
    fn test_non_sensitive_tainted_log_is_clean() {
        // Tainted but no sensitive field name in the provenance
        let src = "const { username } = req.body;\nconsole.log(`login attempt: ${username}`);";
        assert!(run(src).is_empty());
    }
}
