//! SQL Injection Detection
//!
//! Fires when a query-execution sink receives a first argument that is
//! tainted and was built by string concatenation or template interpolation.
//! Parameterized queries pass a literal query text, which is never tainted,
//! so they do not trigger. CWE-89.

use crate::models::{Finding, Severity};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, sink_finding, Rule};
use crate::taint::SymbolTable;
use anyhow::Result;
use std::sync::Arc;

pub struct SqlInjectionRule {
    registry: Arc<Registry>,
}

impl SqlInjectionRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for SqlInjectionRule {
    fn id(&self) -> &'static str {
        "sql-injection"
    }

    fn description(&self) -> &'static str {
        "Tainted string built via concatenation/interpolation reaches a query-execution call"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-89")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::QueryExec) {
            let Some(query_arg) = sink.sensitive_args.first() else {
                continue;
            };
            let flow = symbols.flow_of(query_arg, sink.scope);
            if !flow.is_suspect() || !flow.via_concat {
                continue;
            }
            findings.push(sink_finding(
                self,
                unit,
                sink.span,
                format!(
                    "Query passed to {}() is built from user-controlled input via string \
                     concatenation or interpolation; use parameterized placeholders",
                    sink.callee
                ),
                flow.state().confidence(),
                flow.chain(),
            ));
        }
        Ok(findings)
    }
}
