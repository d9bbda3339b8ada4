//! Server-Side Request Forgery Detection
//!
//! An outbound HTTP call whose URL argument is tainted, with no allow-list
//! or host check preceding it in the same scope. CWE-918.

use crate::models::{Finding, Severity};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::{collect_sink_uses, sanitizer_called_before, sink_finding, Rule};
use crate::taint::SymbolTable;
use anyhow::Result;
use std::sync::Arc;

pub struct SsrfRule {
    registry: Arc<Registry>,
}

impl SsrfRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Rule for SsrfRule {
    fn id(&self) -> &'static str {
        "ssrf"
    }

    fn description(&self) -> &'static str {
        "User-controlled URL reaches an outbound HTTP call without a host check"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-918")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for sink in collect_sink_uses(unit, symbols, &self.registry, SinkKind::HttpFetch) {
            let Some(url_arg) = sink.sensitive_args.first() else {
                continue;
            };
            let flow = symbols.flow_of(url_arg, sink.scope);
            if !flow.is_suspect() {
                continue;
            }
            if flow
                .callees()
                .any(|c| self.registry.is_sanitizer(SinkKind::HttpFetch, c))
            {
                continue;
            }
            if sanitizer_called_before(
                unit,
                symbols,
                &self.registry,
                SinkKind::HttpFetch,
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
                    "URL passed to {}() is user-controlled; validate against an \
                     allow-list of hosts before fetching",
                    sink.callee
                ),
                flow.state().confidence(),
                flow.chain(),
            ));
        }
        Ok(findings)
    }
}
