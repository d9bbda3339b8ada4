//! CORS Misconfiguration Detection

use crate::models::{Finding, Severity};
use crate::parsers::ast::Expr;
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, Rule};
use crate::taint::{walk_calls, SymbolTable};
use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

static ORIGIN_HEADER: OnceLock<Regex> = OnceLock::new();

fn origin_header_pattern() -> &'static Regex {
    ORIGIN_HEADER
        .get_or_init(|| Regex::new(r"(?i)^access-control-allow-origin$").expect("valid regex"))
}

pub struct CorsMisconfigRule {
    registry: Arc<Registry>,
}

impl CorsMisconfigRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for CorsMisconfigRule {
    fn id(&self) -> &'static str {
        "permissive-cors"
    }

    fn description(&self) -> &'static str {
        "Detects wildcard Access-Control-Allow-Origin responses"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-942")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        // res.header('Access-Control-Allow-Origin', '*') and friends;
        // one finding per occurrence
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::HeaderSet) {
            let header = sink.args.first().and_then(|a| match a {
                Expr::StrLit { value, .. } => Some(value.as_str()),
                _ => None,
            });
            let value = sink.args.get(1).and_then(|a| match a {
                Expr::StrLit { value, .. } => Some(value.as_str()),
                _ => None,
            });
            if let (Some(header), Some("*")) = (header, value) {
                if origin_header_pattern().is_match(header) {
                    findings.push(self.finding(unit, sink.span));
                }
            }
        }

        // cors({ origin: '*' }) middleware config
        walk_calls(unit, symbols, &mut |call, _| {
            let Expr::Call { callee, args, span } = call else {
                return;
            };
            let is_cors = callee
                .callee_path()
                .map(|p| p.rsplit('.').next().unwrap_or("") == "cors")
                .unwrap_or(false);
            if !is_cors {
                return;
            }
            for arg in args {
                if let Expr::Object { props, .. } = arg {
                    let wildcard = props.iter().any(|(key, value)| {
                        key == "origin"
                            && matches!(value, Expr::StrLit { value, .. } if value == "*")
                    });
                    if wildcard {
                        findings.push(self.finding(unit, *span));
                    }
                }
            }
        });

        Ok(findings)
    }
}

impl CorsMisconfigRule {
    fn finding(&self, unit: &SourceUnit, span: crate::parsers::ast::Span) -> Finding {
        Finding::new(
            self.id(),
            self.severity(),
            unit.path.clone(),
            span.line,
            span.column,
            "Access-Control-Allow-Origin is set to '*', allowing any site to \
             make credentialed-adjacent requests; list allowed origins explicitly"
                .to_string(),
        )
        .with_snippet(unit.snippet(span))
        .with_cwe("CWE-942")
        .with_confidence(0.95)
    }
}
