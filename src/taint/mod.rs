//! Taint tracking
//!
//! Forward dataflow over statements in lexical order, one pass per
//! function scope. Reading a recognized source member marks the bound
//! symbol tainted and starts its provenance chain; assignment propagates;
//! concatenation and template interpolation taint the result and flag it
//! concat-built; unrecognized calls over tainted arguments degrade to
//! `Unknown`. Loops and conditional merges take the conservative union —
//! taint only ever escalates within a pass, so a single sweep suffices.
//!
//! Analysis is intra-function only. Cross-boundary flows surface as
//! `Unknown` instead of being resolved through a call graph; see DESIGN.md.

pub mod types;

use crate::parsers::ast::{Expr, FuncId, Pattern, Stmt, TemplatePart};
use crate::parsers::SourceUnit;
use crate::registry::Registry;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use types::{ExprFlow, ProvenanceStep, SymbolInfo, TaintState};

/// Index into the symbol table's scope list.
pub type ScopeId = usize;

/// Methods that pass a string through unchanged for taint purposes.
/// Conversion and slicing preserve taint; without this list every
/// `tainted.toString()` would degrade to Unknown.
const PASSTHROUGH_METHODS: &[&str] = &[
    "toString",
    "toLowerCase",
    "toUpperCase",
    "trim",
    "slice",
    "substring",
    "substr",
    "concat",
    "String",
    "JSON.stringify",
    "decodeURIComponent",
    "encodeURIComponent",
];

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: FxHashMap<String, SymbolInfo>,
}

/// Symbol table for one source unit: scopes keyed by function id, symbols
/// with taint states and provenance. Read-only for rules after analysis.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    func_scopes: FxHashMap<FuncId, ScopeId>,
    registry: Arc<Registry>,
}

/// The module-level scope every unit starts with.
pub const MODULE_SCOPE: ScopeId = 0;

impl SymbolTable {
    fn new(registry: Arc<Registry>) -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                symbols: FxHashMap::default(),
            }],
            func_scopes: FxHashMap::default(),
            registry,
        }
    }

    fn push_scope(&mut self, parent: ScopeId, func: FuncId) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(parent),
            symbols: FxHashMap::default(),
        });
        self.func_scopes.insert(func, id);
        id
    }

    /// Scope defined by a function body. Functions outside the analyzed
    /// tree (degraded parses) fall back to module scope.
    pub fn scope_for_function(&self, func: FuncId) -> ScopeId {
        self.func_scopes.get(&func).copied().unwrap_or(MODULE_SCOPE)
    }

    /// Resolve a name through the scope chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&SymbolInfo> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id];
            if let Some(info) = scope.symbols.get(name) {
                return Some(info);
            }
            current = scope.parent;
        }
        None
    }

    /// The scope (if any) in the chain that declares `name`.
    fn declaring_scope(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.scopes[id].symbols.contains_key(name) {
                return Some(id);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    fn bind(&mut self, scope: ScopeId, info: SymbolInfo) {
        self.scopes[scope].symbols.insert(info.name.clone(), info);
    }

    /// Escalate an existing binding with a new flow; never downgrades.
    fn escalate(&mut self, scope: ScopeId, name: &str, flow: &ExprFlow, line: u32) {
        let target = self
            .declaring_scope(scope, name)
            .unwrap_or(scope);
        let entry = self.scopes[target]
            .symbols
            .entry(name.to_string())
            .or_insert_with(|| SymbolInfo {
                name: name.to_string(),
                taint: TaintState::Untainted,
                concat_built: false,
                steps: Vec::new(),
                decl_line: line,
            });
        let joined = entry.taint.join(flow.state());
        if flow.state().is_suspect() {
            entry.steps.extend(flow.steps.iter().cloned());
            entry
                .steps
                .push(ProvenanceStep::assign(format!("assigned to {name}"), line));
        }
        entry.taint = joined;
        entry.concat_built |= flow.via_concat;
    }

    /// Evaluate the dataflow of an expression as seen from `scope`.
    pub fn flow_of(&self, expr: &Expr, scope: ScopeId) -> ExprFlow {
        match expr {
            Expr::StrLit { .. } | Expr::NumLit { .. } => ExprFlow::untainted(),
            Expr::Identifier { name, .. } => match self.lookup(scope, name) {
                Some(info) => ExprFlow {
                    taint: Some(info.taint),
                    via_concat: info.concat_built,
                    steps: info.steps.clone(),
                },
                None => ExprFlow::untainted(),
            },
            Expr::Member { span, .. } => {
                if let Some(path) = expr.member_path() {
                    if let Some(kind) = self.registry.source_for(&path) {
                        let field = source_field(&path);
                        return ExprFlow {
                            taint: Some(TaintState::Tainted(kind)),
                            via_concat: false,
                            steps: vec![ProvenanceStep::source(
                                format!("{path} ({})", kind.describe()),
                                field,
                                span.line,
                            )],
                        };
                    }
                }
                // Field access on a tainted object stays tainted
                match expr {
                    Expr::Member { object, .. } => self.flow_of(object, scope),
                    _ => ExprFlow::untainted(),
                }
            }
            Expr::Template { parts, .. } => {
                let mut flow = ExprFlow::untainted();
                for part in parts {
                    if let TemplatePart::Interp(inner) = part {
                        flow.merge(self.flow_of(inner, scope));
                    }
                }
                if flow.is_suspect() {
                    flow.via_concat = true;
                }
                flow
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let mut flow = self.flow_of(lhs, scope);
                flow.merge(self.flow_of(rhs, scope));
                if *op == crate::parsers::ast::BinOp::Add && flow.is_suspect() {
                    flow.via_concat = true;
                }
                flow
            }
            Expr::Conditional {
                then_expr,
                else_expr,
                ..
            } => {
                // Conservative union of both arms; the condition itself does
                // not flow into the value
                let mut flow = self.flow_of(then_expr, scope);
                flow.merge(self.flow_of(else_expr, scope));
                flow
            }
            Expr::Call { callee, args, span } => {
                let callee_path = callee.callee_path();

                // Call-style sources (Go frameworks): c.Query("name")
                if let Some(path) = &callee_path {
                    if let Some(kind) = self.registry.source_for(path) {
                        let field = args.first().and_then(|arg| match arg {
                            Expr::StrLit { value, .. } => Some(value.clone()),
                            _ => None,
                        });
                        return ExprFlow {
                            taint: Some(TaintState::Tainted(kind)),
                            via_concat: false,
                            steps: vec![ProvenanceStep::source(
                                format!("{path}() ({})", kind.describe()),
                                field,
                                span.line,
                            )],
                        };
                    }
                }

                let mut combined = ExprFlow::untainted();
                for arg in args {
                    combined.merge(self.flow_of(arg, scope));
                }
                // Method calls on a tainted receiver: include receiver flow
                if let Expr::Member { object, .. } = callee.as_ref() {
                    combined.merge(self.flow_of(object, scope));
                }

                if !combined.is_suspect() {
                    return ExprFlow::untainted();
                }

                let is_passthrough = callee_path
                    .as_deref()
                    .map(|p| {
                        PASSTHROUGH_METHODS
                            .iter()
                            .any(|m| crate::registry::pattern_matches(p, m))
                    })
                    .unwrap_or(false);

                if is_passthrough {
                    combined
                } else {
                    // Unrecognized call over tainted data: Unknown, flagged
                    // lower-confidence downstream
                    let mut flow = combined;
                    flow.taint = Some(TaintState::Unknown);
                    if let Some(path) = callee_path {
                        flow.steps.push(ProvenanceStep::call(path, span.line));
                    }
                    flow
                }
            }
            Expr::Object { props, .. } => {
                let mut flow = ExprFlow::untainted();
                for (_, value) in props {
                    flow.merge(self.flow_of(value, scope));
                }
                flow
            }
            Expr::Array { items, .. } => {
                let mut flow = ExprFlow::untainted();
                for item in items {
                    flow.merge(self.flow_of(item, scope));
                }
                flow
            }
            Expr::Function { .. } => ExprFlow::untainted(),
        }
    }

    /// All symbols declared directly in a scope, for rules that inspect
    /// bindings (deterministic order: sorted by name).
    pub fn symbols_in(&self, scope: ScopeId) -> Vec<&SymbolInfo> {
        let mut symbols: Vec<_> = self.scopes[scope].symbols.values().collect();
        symbols.sort_by(|a, b| a.name.cmp(&b.name));
        symbols
    }
}

/// Field name a source path exposes: `req.body.cardNumber` → `cardNumber`;
/// bare `req.body` has none.
fn source_field(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() > 2 {
        segments.last().map(|s| s.to_string())
    } else {
        None
    }
}

/// Single-pass, flow-sensitive taint tracker for one unit.
pub struct TaintTracker {
    registry: Arc<Registry>,
}

impl TaintTracker {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Analyze a unit and return its populated symbol table.
    pub fn analyze(&self, unit: &SourceUnit) -> SymbolTable {
        let mut table = SymbolTable::new(Arc::clone(&self.registry));
        self.analyze_stmts(&unit.statements, MODULE_SCOPE, &mut table);
        table
    }

    fn analyze_stmts(&self, stmts: &[Stmt], scope: ScopeId, table: &mut SymbolTable) {
        for stmt in stmts {
            self.analyze_stmt(stmt, scope, table);
        }
    }

    fn analyze_stmt(&self, stmt: &Stmt, scope: ScopeId, table: &mut SymbolTable) {
        match stmt {
            Stmt::VarDecl {
                pattern,
                init,
                span,
            } => {
                if let Some(init) = init {
                    self.enter_nested_functions(init, scope, table);
                }
                match pattern {
                    Pattern::Ident(name) => {
                        let flow = init
                            .as_ref()
                            .map(|e| table.flow_of(e, scope))
                            .unwrap_or_else(ExprFlow::untainted);
                        let mut steps = flow.steps.clone();
                        if flow.state().is_suspect() {
                            steps.push(ProvenanceStep::assign(
                                format!("bound to {name}"),
                                span.line,
                            ));
                        }
                        table.bind(
                            scope,
                            SymbolInfo {
                                name: name.clone(),
                                taint: flow.state(),
                                concat_built: flow.via_concat,
                                steps,
                                decl_line: span.line,
                            },
                        );
                    }
                    Pattern::Object(bindings) => {
                        let base = init
                            .as_ref()
                            .map(|e| table.flow_of(e, scope))
                            .unwrap_or_else(ExprFlow::untainted);
                        for (field, bound) in bindings {
                            let mut steps = base.steps.clone();
                            if base.state().is_suspect() {
                                steps.push(ProvenanceStep::source(
                                    format!("field {field} destructured into {bound}"),
                                    Some(field.clone()),
                                    span.line,
                                ));
                            }
                            table.bind(
                                scope,
                                SymbolInfo {
                                    name: bound.clone(),
                                    taint: base.state(),
                                    concat_built: base.via_concat,
                                    steps,
                                    decl_line: span.line,
                                },
                            );
                        }
                    }
                }
            }
            Stmt::Assign {
                target,
                value,
                span,
            } => {
                self.enter_nested_functions(value, scope, table);
                if let Expr::Identifier { name, .. } = target {
                    let flow = table.flow_of(value, scope);
                    table.escalate(scope, name, &flow, span.line);
                }
                // Member-target assignment (obj.prop = v) is not tracked;
                // object property taint is approximated at read time
            }
            Stmt::ExprStmt { expr, .. } => {
                self.enter_nested_functions(expr, scope, table);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.enter_nested_functions(value, scope, table);
                }
            }
            Stmt::FunctionDecl {
                id, params, body, ..
            } => {
                let child = table.push_scope(scope, *id);
                self.bind_params(params, child, table);
                self.analyze_stmts(body, child, table);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.enter_nested_functions(cond, scope, table);
                // Branches share the scope; escalation-only joins make the
                // post-merge state the conservative union of both arms
                self.analyze_stmts(then_branch, scope, table);
                if let Some(else_branch) = else_branch {
                    self.analyze_stmts(else_branch, scope, table);
                }
            }
            Stmt::Loop { body, .. } => {
                // One conservative pass; worst-case taint carries across
                // iterations because states never downgrade
                self.analyze_stmts(body, scope, table);
            }
            Stmt::Block { body, .. } => {
                self.analyze_stmts(body, scope, table);
            }
        }
    }

    fn bind_params(&self, params: &[String], scope: ScopeId, table: &mut SymbolTable) {
        for param in params {
            table.bind(
                scope,
                SymbolInfo {
                    name: param.clone(),
                    taint: TaintState::Untainted,
                    concat_built: false,
                    steps: Vec::new(),
                    decl_line: 0,
                },
            );
        }
    }

    /// Find function expressions directly inside `expr`, open their scopes,
    /// and analyze their bodies. Deeper nesting is handled recursively by
    /// the body analysis itself.
    fn enter_nested_functions(&self, expr: &Expr, scope: ScopeId, table: &mut SymbolTable) {
        match expr {
            Expr::Function {
                id, params, body, ..
            } => {
                let child = table.push_scope(scope, *id);
                self.bind_params(params, child, table);
                self.analyze_stmts(body, child, table);
            }
            Expr::Template { parts, .. } => {
                for part in parts {
                    if let TemplatePart::Interp(inner) = part {
                        self.enter_nested_functions(inner, scope, table);
                    }
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.enter_nested_functions(lhs, scope, table);
                self.enter_nested_functions(rhs, scope, table);
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                self.enter_nested_functions(cond, scope, table);
                self.enter_nested_functions(then_expr, scope, table);
                self.enter_nested_functions(else_expr, scope, table);
            }
            Expr::Member { object, .. } => self.enter_nested_functions(object, scope, table),
            Expr::Call { callee, args, .. } => {
                self.enter_nested_functions(callee, scope, table);
                for arg in args {
                    self.enter_nested_functions(arg, scope, table);
                }
            }
            Expr::Object { props, .. } => {
                for (_, value) in props {
                    self.enter_nested_functions(value, scope, table);
                }
            }
            Expr::Array { items, .. } => {
                for item in items {
                    self.enter_nested_functions(item, scope, table);
                }
            }
            Expr::Identifier { .. } | Expr::StrLit { .. } | Expr::NumLit { .. } => {}
        }
    }
}

/// Walk every call expression in a statement list in lexical order,
/// tracking the scope each call executes in.
pub fn walk_calls_in<'a>(
    stmts: &'a [Stmt],
    scope: ScopeId,
    table: &SymbolTable,
    f: &mut impl FnMut(&'a Expr, ScopeId),
) {
    for stmt in stmts {
        walk_calls_stmt(stmt, scope, table, f);
    }
}

/// Walk every call expression in a unit.
pub fn walk_calls<'a>(
    unit: &'a SourceUnit,
    table: &SymbolTable,
    f: &mut impl FnMut(&'a Expr, ScopeId),
) {
    walk_calls_in(&unit.statements, MODULE_SCOPE, table, f);
}

fn walk_calls_stmt<'a>(
    stmt: &'a Stmt,
    scope: ScopeId,
    table: &SymbolTable,
    f: &mut impl FnMut(&'a Expr, ScopeId),
) {
    match stmt {
        Stmt::VarDecl { init, .. } => {
            if let Some(init) = init {
                walk_calls_expr(init, scope, table, f);
            }
        }
        Stmt::Assign { target, value, .. } => {
            walk_calls_expr(target, scope, table, f);
            walk_calls_expr(value, scope, table, f);
        }
        Stmt::ExprStmt { expr, .. } => walk_calls_expr(expr, scope, table, f),
        Stmt::FunctionDecl { id, body, .. } => {
            let child = table.scope_for_function(*id);
            walk_calls_in(body, child, table, f);
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            walk_calls_expr(cond, scope, table, f);
            walk_calls_in(then_branch, scope, table, f);
            if let Some(else_branch) = else_branch {
                walk_calls_in(else_branch, scope, table, f);
            }
        }
        Stmt::Loop { body, .. } | Stmt::Block { body, .. } => {
            walk_calls_in(body, scope, table, f)
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                walk_calls_expr(value, scope, table, f);
            }
        }
    }
}

fn walk_calls_expr<'a>(
    expr: &'a Expr,
    scope: ScopeId,
    table: &SymbolTable,
    f: &mut impl FnMut(&'a Expr, ScopeId),
) {
    match expr {
        Expr::Call { callee, args, .. } => {
            f(expr, scope);
            walk_calls_expr(callee, scope, table, f);
            for arg in args {
                walk_calls_expr(arg, scope, table, f);
            }
        }
        Expr::Function { id, body, .. } => {
            let child = table.scope_for_function(*id);
            walk_calls_in(body, child, table, f);
        }
        Expr::Template { parts, .. } => {
            for part in parts {
                if let TemplatePart::Interp(inner) = part {
                    walk_calls_expr(inner, scope, table, f);
                }
            }
        }
        Expr::Binary { lhs, rhs, .. } => {
            walk_calls_expr(lhs, scope, table, f);
            walk_calls_expr(rhs, scope, table, f);
        }
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => {
            walk_calls_expr(cond, scope, table, f);
            walk_calls_expr(then_expr, scope, table, f);
            walk_calls_expr(else_expr, scope, table, f);
        }
        Expr::Member { object, .. } => walk_calls_expr(object, scope, table, f),
        Expr::Object { props, .. } => {
            for (_, value) in props {
                walk_calls_expr(value, scope, table, f);
            }
        }
        Expr::Array { items, .. } => {
            for item in items {
                walk_calls_expr(item, scope, table, f);
            }
        }
        Expr::Identifier { .. } | Expr::StrLit { .. } | Expr::NumLit { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse;
    use crate::registry::SourceKind;

    fn analyze(src: &str) -> (crate::parsers::SourceUnit, SymbolTable) {
        let unit = parse("test.js", src).expect("parse");
        let tracker = TaintTracker::new(Arc::new(Registry::with_default_patterns()));
        let table = tracker.analyze(&unit);
        (unit, table)
    }

    #[test]
    fn test_source_read_taints_binding() {
        let (_, table) = analyze("const ip = req.query.ip;");
        let info = table.lookup(MODULE_SCOPE, "ip").expect("symbol");
        assert_eq!(info.taint, TaintState::Tainted(SourceKind::QueryString));
        assert!(!info.concat_built);
        assert!(!info.steps.is_empty());
    }

    #[test]
    fn test_assignment_propagates() {
        let (_, table) = analyze("const a = req.body.name;\nconst b = a;\nconst c = b;");
        let info = table.lookup(MODULE_SCOPE, "c").expect("symbol");
        assert_eq!(info.taint, TaintState::Tainted(SourceKind::RequestBody));
    }

    #[test]
    fn test_template_interpolation_is_concat_built() {
        let (_, table) = analyze(
            "const name = req.body.name;\nconst q = `SELECT * FROM t WHERE n = '${name}'`;",
        );
        let info = table.lookup(MODULE_SCOPE, "q").expect("symbol");
        assert!(info.taint.is_suspect());
        assert!(info.concat_built);
    }

    #[test]
    fn test_plus_concat_is_concat_built() {
        let (_, table) = analyze(
            "const input = req.query.user;\nconst q = \"SELECT * FROM users WHERE u = '\" + input + \"'\";",
        );
        let info = table.lookup(MODULE_SCOPE, "q").expect("symbol");
        assert!(info.taint.is_suspect());
        assert!(info.concat_built);
    }

    #[test]
    fn test_untainted_literal_stays_clean() {
        let (_, table) = analyze("const q = 'SELECT * FROM users';");
        let info = table.lookup(MODULE_SCOPE, "q").expect("symbol");
        assert_eq!(info.taint, TaintState::Untainted);
    }

    #[test]
    fn test_destructuring_records_field() {
        let (_, table) = analyze("const { cardNumber, cvv } = req.body;");
        let info = table.lookup(MODULE_SCOPE, "cardNumber").expect("symbol");
        assert_eq!(info.taint, TaintState::Tainted(SourceKind::RequestBody));
        assert!(info
            .steps
            .iter()
            .any(|s| s.field.as_deref() == Some("cardNumber")));
    }

    #[test]
    fn test_unknown_call_degrades() {
        let (_, table) = analyze("const a = req.query.x;\nconst b = mystery(a);");
        let info = table.lookup(MODULE_SCOPE, "b").expect("symbol");
        assert_eq!(info.taint, TaintState::Unknown);
        assert!(info.steps.iter().any(|s| s.callee.as_deref() == Some("mystery")));
    }

    #[test]
    fn test_passthrough_preserves_taint() {
        let (_, table) = analyze("const a = req.query.x;\nconst b = a.toLowerCase();");
        let info = table.lookup(MODULE_SCOPE, "b").expect("symbol");
        assert_eq!(info.taint, TaintState::Tainted(SourceKind::QueryString));
    }

    #[test]
    fn test_handler_scope_taint() {
        let (unit, table) = analyze(
            "app.get('/ping', (req, res) => {\n  const ip = req.query.ip;\n  exec(`ping ${ip}`);\n});",
        );
        let funcs = unit.functions();
        assert_eq!(funcs.len(), 1);
        let scope = table.scope_for_function(funcs[0].id);
        assert_ne!(scope, MODULE_SCOPE);
        let info = table.lookup(scope, "ip").expect("symbol");
        assert_eq!(info.taint, TaintState::Tainted(SourceKind::QueryString));
        // not visible from module scope
        assert!(table.lookup(MODULE_SCOPE, "ip").is_none());
    }

    #[test]
    fn test_branch_taint_escapes_conservatively() {
        let (_, table) = analyze(
            "let x = 'safe';\nif (cond) { x = req.query.v; } else { x = 'still safe'; }",
        );
        let info = table.lookup(MODULE_SCOPE, "x").expect("symbol");
        // Conservative union: the tainted branch wins at the merge
        assert!(info.taint.is_suspect());
    }

    #[test]
    fn test_taint_never_downgrades() {
        let (_, table) = analyze("let x = req.body.v;\nx = 'overwritten';");
        let info = table.lookup(MODULE_SCOPE, "x").expect("symbol");
        assert!(info.taint.is_suspect());
    }

    #[test]
    fn test_go_style_source_call() {
        let unit = parse("main.go", "name := c.Query(\"name\")").expect("parse");
        let tracker = TaintTracker::new(Arc::new(Registry::with_default_patterns()));
        let table = tracker.analyze(&unit);
        let info = table.lookup(MODULE_SCOPE, "name").expect("symbol");
        assert_eq!(info.taint, TaintState::Tainted(SourceKind::QueryString));
    }

    #[test]
    fn test_walk_calls_visits_nested_scopes() {
        let (unit, table) = analyze(
            "top();\napp.get('/x', (req, res) => { inner(req.query.a); });",
        );
        let mut seen = Vec::new();
        walk_calls(&unit, &table, &mut |call, scope| {
            if let Expr::Call { callee, .. } = call {
                seen.push((callee.callee_path().unwrap_or_default(), scope));
            }
        });
        let names: Vec<_> = seen.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"top"));
        assert!(names.contains(&"inner"));
        let inner_scope = seen
            .iter()
            .find(|(n, _)| n == "inner")
            .map(|(_, s)| *s)
            .expect("inner call");
        assert_ne!(inner_scope, MODULE_SCOPE);
    }
}
