//! Missing Authentication Detection
//!
//! A route handler that reads sensitive data (query execution, file
//! access) with no recognized auth/permission check before the first such
//! sink — neither as route middleware nor inside the handler body. CWE-306.

use crate::models::{Finding, Severity};
use crate::parsers::ast::{Expr, Span};
use crate::parsers::SourceUnit;
use crate::registry::{Registry, SinkKind};
use crate::rules::base::Rule;
use crate::taint::{walk_calls, walk_calls_in, SymbolTable};
use anyhow::Result;
use std::sync::Arc;

const ROUTE_BASES: &[&str] = &["app", "router", "server", "api"];
const ROUTE_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "all"];

/// Sinks that count as "reads sensitive data" for this rule.
const DATA_SINKS: &[SinkKind] = &[SinkKind::QueryExec, SinkKind::PathAccess];

pub struct MissingAuthRule {
    registry: Arc<Registry>,
}

impl MissingAuthRule {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// `app.get`, `router.post`, ... → the HTTP method name
    fn route_method(callee: &str) -> Option<&str> {
        let mut parts = callee.rsplit('.');
        let method = parts.next()?;
        let base = parts.next()?;
        if ROUTE_BASES.contains(&base) && ROUTE_METHODS.contains(&method) {
            Some(method)
        } else {
            None
        }
    }
}

impl Rule for MissingAuthRule {
    fn id(&self) -> &'static str {
        "missing-auth"
    }

    fn description(&self) -> &'static str {
        "Route handler reaches a data sink with no preceding auth check"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-306")
    }

    fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        walk_calls(unit, symbols, &mut |call, _scope| {
            let Expr::Call { callee, args, span } = call else {
                return;
            };
            let Some(path) = callee.callee_path() else {
                return;
            };
            let Some(method) = Self::route_method(&path) else {
                return;
            };

            let route = args.first().and_then(|a| match a {
                Expr::StrLit { value, .. } => Some(value.as_str()),
                _ => None,
            });

            // Auth middleware between path and handler suppresses:
            // app.get('/admin', requireAuth, handler)
            let has_auth_middleware = args.iter().any(|arg| match arg {
                Expr::Identifier { name, .. } => self.registry.is_auth_check(name),
                Expr::Call { callee, .. } => callee
                    .callee_path()
                    .map(|p| self.registry.is_auth_check(&p))
                    .unwrap_or(false),
                _ => false,
            });
            if has_auth_middleware {
                return;
            }

            let Some(handler) = args.iter().rev().find_map(|arg| match arg {
                Expr::Function { id, body, .. } => Some((*id, body)),
                _ => None,
            }) else {
                return;
            };

            if let Some(finding) =
                self.check_handler(unit, symbols, handler.0, handler.1, method, route, *span)
            {
                findings.push(finding);
            }
        });
        Ok(findings)
    }
}

impl MissingAuthRule {
    fn check_handler(
        &self,
        unit: &SourceUnit,
        symbols: &SymbolTable,
        handler_id: u32,
        body: &[crate::parsers::ast::Stmt],
        method: &str,
        route: Option<&str>,
        span: Span,
    ) -> Option<Finding> {
        let scope = symbols.scope_for_function(handler_id);

        let mut first_sink: Option<(u32, String)> = None;
        let mut first_auth: Option<u32> = None;

        walk_calls_in(body, scope, symbols, &mut |call, _| {
            let Expr::Call { callee, span, .. } = call else {
                return;
            };
            let Some(path) = callee.callee_path() else {
                return;
            };
            if self.registry.is_auth_check(&path) {
                if first_auth.map(|l| span.line < l).unwrap_or(true) {
                    first_auth = Some(span.line);
                }
                return;
            }
            if let Some(spec) = self.registry.sink_for(&path) {
                if DATA_SINKS.contains(&spec.kind)
                    && first_sink
                        .as_ref()
                        .map(|(l, _)| span.line < *l)
                        .unwrap_or(true)
                {
                    first_sink = Some((span.line, path));
                }
            }
        });

        let (sink_line, sink_callee) = first_sink?;
        if first_auth.map(|auth| auth <= sink_line).unwrap_or(false) {
            return None;
        }

        let route_display = route.unwrap_or("<dynamic>");
        let finding = Finding::new(
            self.id(),
            self.severity(),
            unit.path.clone(),
            span.line,
            span.column,
            format!(
                "Handler for {} {} reads data via {}() with no authentication \
                 or permission check before it",
                method.to_uppercase(),
                route_display,
                sink_callee
            ),
        )
        .with_snippet(unit.snippet(span))
        .with_cwe("CWE-306")
        .with_confidence(0.7);
        Some(finding)
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
        MissingAuthRule::new(registry)
            .evaluate(&unit, &symbols)
            .expect("evaluate")
    }

    #[test]
    fn test_unauthenticated_data_read_fires() {
        let src = "app.get('/api/admin/users', async (req, res) => {\n\
                     const result = await pool.query('SELECT * FROM users');\n\
                     res.json({ users: result.rows });\n\
                   });";
        let findings = run(src);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("GET /api/admin/users"));
    }

    #[test]
    fn test_auth_call_before_sink_suppresses() {
        let src = "app.get('/api/admin/users', async (req, res) => {\n\
                     requireAuth(req);\n\
                     const result = await pool.query('SELECT * FROM users');\n\
                   });";
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_auth_middleware_suppresses() {
        let src = "app.get('/api/admin/users', requireAuth, async (req, res) => {\n\
                     const result = await pool.query('SELECT * FROM users');\n\
                   });";
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_auth_after_sink_still_fires() {
        let src = "app.get('/x', async (req, res) => {\n\
                     const rows = await pool.query('SELECT * FROM t');\n\
                     requireAuth(req);\n\
                   });";
        assert_eq!(run(src).len(), 1);
    }

    #[test]
    fn test_handler_without_data_sink_is_clean() {
        let src = "app.get('/health', (req, res) => { res.json({ ok: true }); });";
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_non_route_call_ignored() {
        assert!(run("emitter.get('key', () => { pool.query('SELECT 1'); });").is_empty());
    }
}
