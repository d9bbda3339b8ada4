//! Base rule trait and shared matching helpers
//!
//! A rule is a pure predicate over one parsed unit plus its symbol table.
//! Rules hold no mutable state, share nothing between invocations, and may
//! be registered in any order: the engine's dedup and sort make the final
//! finding set order-independent.

use crate::models::{Finding, Severity};
use crate::parsers::ast::{Expr, Span};
use crate::parsers::SourceUnit;
use crate::registry::{ArgPositions, Registry, SinkKind};
use crate::taint::{walk_calls, ScopeId, SymbolTable};
use anyhow::Result;

/// Trait for all vulnerability pattern rules
pub trait Rule: Send + Sync {
    /// Unique identifier, kebab-case (`sql-injection`)
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule finds
    fn description(&self) -> &'static str;

    /// Severity attached to this rule's findings
    fn severity(&self) -> Severity;

    /// CWE identifier for this vulnerability class
    fn cwe(&self) -> Option<&'static str> {
        None
    }

    /// Evaluate the rule against one unit. Must not mutate shared state.
    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>>;
}

/// Result of running a single rule on a unit
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule: String,
    pub findings: Vec<Finding>,
    pub success: bool,
    pub error: Option<String>,
}

impl RuleOutcome {
    pub fn success(rule: String, findings: Vec<Finding>) -> Self {
        Self {
            rule,
            findings,
            success: true,
            error: None,
        }
    }

    pub fn failure(rule: String, error: String) -> Self {
        Self {
            rule,
            findings: Vec::new(),
            success: false,
            error: Some(error),
        }
    }
}

/// One use of a registered sink in a unit.
pub struct SinkUse<'a> {
    pub callee: String,
    pub args: &'a [Expr],
    /// Arguments at the sink's sensitive positions
    pub sensitive_args: &'a [Expr],
    pub scope: ScopeId,
    pub span: Span,
}

/// Collect every call to a sink of the given kind, lexical order.
pub fn collect_sink_uses<'a>(
    unit: &'a SourceUnit,
    symbols: &SymbolTable,
    registry: &Registry,
    kind: SinkKind,
) -> Vec<SinkUse<'a>> {
    let mut uses = Vec::new();
    walk_calls(unit, symbols, &mut |call, scope| {
        let Expr::Call { callee, args, span } = call else {
            return;
        };
        let Some(path) = callee.callee_path() else {
            return;
        };
        let Some(spec) = registry.sink_for(&path) else {
            return;
        };
        if spec.kind != kind {
            return;
        }
        let sensitive_args = match spec.arg_positions {
            ArgPositions::First => &args[..args.len().min(1)],
            ArgPositions::All => &args[..],
        };
        uses.push(SinkUse {
            callee: path,
            args,
            sensitive_args,
            scope,
            span: *span,
        });
    });
    uses
}

/// Whether a recognized sanitizer for `kind` is called in `scope` before
/// the given line. Used by rules whose trigger is "tainted argument with no
/// prior normalization/allow-list check".
pub fn sanitizer_called_before(
    unit: &SourceUnit,
    symbols: &SymbolTable,
    registry: &Registry,
    kind: SinkKind,
    scope: ScopeId,
    line: u32,
) -> bool {
    let mut found = false;
    walk_calls(unit, symbols, &mut |call, call_scope| {
        if found || call_scope != scope {
            return;
        }
        let Expr::Call { callee, span, .. } = call else {
            return;
        };
        if span.line >= line {
            return;
        }
        if let Some(path) = callee.callee_path() {
            if registry.is_sanitizer(kind, &path) {
                found = true;
            }
        }
    });
    found
}

/// Build a finding at a sink use with snippet and provenance attached.
pub fn sink_finding(
    rule: &dyn Rule,
    unit: &SourceUnit,
    span: Span,
    message: String,
    confidence: f64,
    provenance: Vec<String>,
) -> Finding {
    let mut finding = Finding::new(
        rule.id(),
        rule.severity(),
        unit.path.clone(),
        span.line,
        span.column,
        message,
    )
    .with_snippet(unit.snippet(span))
    .with_confidence(confidence)
    .with_provenance(provenance);
    if let Some(cwe) = rule.cwe() {
        finding = finding.with_cwe(cwe);
    }
    finding
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse;
    use crate::taint::TaintTracker;
    use std::sync::Arc;

    #[test]
    fn test_collect_sink_uses_filters_by_kind() {
        let unit = parse(
            "app.js",
            "pool.query('SELECT 1');\nexec('ls');\nconsole.log('hi');",
        )
        .expect("parse");
        let registry = Arc::new(Registry::with_default_patterns());
        let symbols = TaintTracker::new(Arc::clone(&registry)).analyze(&unit);

        let queries = collect_sink_uses(&unit, &symbols, &registry, SinkKind::QueryExec);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].callee, "pool.query");
        assert_eq!(queries[0].sensitive_args.len(), 1);

        let shells = collect_sink_uses(&unit, &symbols, &registry, SinkKind::ShellExec);
        assert_eq!(shells.len(), 1);
        assert_eq!(shells[0].callee, "exec");
    }

    #[test]
    fn test_sanitizer_called_before() {
        let unit = parse(
            "app.js",
            "const safe = path.basename(name);\nfs.readFile(safe);",
        )
        .expect("parse");
        let registry = Arc::new(Registry::with_default_patterns());
        let symbols = TaintTracker::new(Arc::clone(&registry)).analyze(&unit);

        assert!(sanitizer_called_before(
            &unit,
            &symbols,
            &registry,
            SinkKind::PathAccess,
            crate::taint::MODULE_SCOPE,
            2
        ));
        assert!(!sanitizer_called_before(
            &unit,
            &symbols,
            &registry,
            SinkKind::PathAccess,
            crate::taint::MODULE_SCOPE,
            1
        ));
    }
}
