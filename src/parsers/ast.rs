//! Syntax tree for script-like source
//!
//! The tree is deliberately small: one tagged enum per statement and
//! expression form, each node owning its children exclusively and carrying
//! the source position it started at. It captures just enough structure for
//! taint tracking and sink matching, not full language semantics.

use serde::Serialize;

/// Source position (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identifier for a function body; scopes in the symbol table are keyed by
/// these. Assigned by the parser in lexical order, so ids are stable for a
/// given source text.
pub type FuncId = u32;

/// A piece of a template string: literal text or an interpolated expression.
#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(String),
    Interp(Expr),
}

/// Binding pattern on the left side of a declaration.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `const x = ...`
    Ident(String),
    /// `const { a, b: c } = ...` — pairs of (source field, bound name)
    Object(Vec<(String, String)>),
}

/// Binary operator classes. Only concatenation is tracked precisely; every
/// other operator propagates taint conservatively without the concat flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Other,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Identifier {
        name: String,
        span: Span,
    },
    /// String literal with its unquoted value
    StrLit {
        value: String,
        span: Span,
    },
    /// Numeric or other scalar literal, kept as raw text
    NumLit {
        raw: String,
        span: Span,
    },
    /// Template string with interpolated parts
    Template {
        parts: Vec<TemplatePart>,
        span: Span,
    },
    /// `a + b`, `a || b`, ...
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// `cond ? a : b`
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    /// `obj.prop` or `obj["prop"]`
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `{ key: value, ... }`
    Object {
        props: Vec<(String, Expr)>,
        span: Span,
    },
    /// `[a, b, c]`
    Array {
        items: Vec<Expr>,
        span: Span,
    },
    /// Function expression or arrow function
    Function {
        id: FuncId,
        name: Option<String>,
        params: Vec<String>,
        body: Vec<Stmt>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier { span, .. }
            | Expr::StrLit { span, .. }
            | Expr::NumLit { span, .. }
            | Expr::Template { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Member { span, .. }
            | Expr::Call { span, .. }
            | Expr::Object { span, .. }
            | Expr::Array { span, .. }
            | Expr::Function { span, .. } => *span,
        }
    }

    /// Dotted call-target path for sink/source matching: `pool.query`,
    /// `child_process.exec`, `res.header`. Returns None when the target is
    /// not a plain identifier/member chain (e.g. the result of a call).
    pub fn callee_path(&self) -> Option<String> {
        match self {
            Expr::Identifier { name, .. } => Some(name.clone()),
            Expr::Member { object, property, .. } => {
                let base = object.callee_path()?;
                Some(format!("{base}.{property}"))
            }
            _ => None,
        }
    }

    /// Full member path of this expression if it is an identifier/member
    /// chain (`req.body.username`).
    pub fn member_path(&self) -> Option<String> {
        self.callee_path()
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `const x = init;`, `let {a, b} = init;`, Go-style `x := init`
    VarDecl {
        pattern: Pattern,
        init: Option<Expr>,
        span: Span,
    },
    /// `target = value` on an already-bound name or member
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    ExprStmt {
        expr: Expr,
        span: Span,
    },
    /// `function name(params) { body }`
    FunctionDecl {
        id: FuncId,
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    /// `for`/`while` body, analyzed once with worst-case taint assumptions
    Loop {
        body: Vec<Stmt>,
        span: Span,
    },
    /// Braced block without its own binding semantics (`try`/`catch` bodies)
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::ExprStmt { span, .. }
            | Stmt::FunctionDecl { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Loop { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }
}

/// A function body reachable in a unit, with the scope it defines.
#[derive(Debug, Clone, Copy)]
pub struct FunctionRef<'a> {
    pub id: FuncId,
    pub name: Option<&'a str>,
    pub params: &'a [String],
    pub body: &'a [Stmt],
    pub span: Span,
}

/// Collect every function body in a statement list, including nested
/// function expressions inside calls and initializers. Order is lexical.
pub fn collect_functions<'a>(stmts: &'a [Stmt], out: &mut Vec<FunctionRef<'a>>) {
    for stmt in stmts {
        collect_functions_stmt(stmt, out);
    }
}

fn collect_functions_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<FunctionRef<'a>>) {
    match stmt {
        Stmt::VarDecl { init, .. } => {
            if let Some(init) = init {
                collect_functions_expr(init, out);
            }
        }
        Stmt::Assign { target, value, .. } => {
            collect_functions_expr(target, out);
            collect_functions_expr(value, out);
        }
        Stmt::ExprStmt { expr, .. } => collect_functions_expr(expr, out),
        Stmt::FunctionDecl {
            id,
            name,
            params,
            body,
            span,
        } => {
            out.push(FunctionRef {
                id: *id,
                name: Some(name.as_str()),
                params,
                body,
                span: *span,
            });
            collect_functions(body, out);
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            collect_functions_expr(cond, out);
            collect_functions(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_functions(else_branch, out);
            }
        }
        Stmt::Loop { body, .. } | Stmt::Block { body, .. } => collect_functions(body, out),
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                collect_functions_expr(value, out);
            }
        }
    }
}

fn collect_functions_expr<'a>(expr: &'a Expr, out: &mut Vec<FunctionRef<'a>>) {
    match expr {
        Expr::Function {
            id,
            name,
            params,
            body,
            span,
        } => {
            out.push(FunctionRef {
                id: *id,
                name: name.as_deref(),
                params,
                body,
                span: *span,
            });
            collect_functions(body, out);
        }
        Expr::Template { parts, .. } => {
            for part in parts {
                if let TemplatePart::Interp(inner) = part {
                    collect_functions_expr(inner, out);
                }
            }
        }
        Expr::Binary { lhs, rhs, .. } => {
            collect_functions_expr(lhs, out);
            collect_functions_expr(rhs, out);
        }
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => {
            collect_functions_expr(cond, out);
            collect_functions_expr(then_expr, out);
            collect_functions_expr(else_expr, out);
        }
        Expr::Member { object, .. } => collect_functions_expr(object, out),
        Expr::Call { callee, args, .. } => {
            collect_functions_expr(callee, out);
            for arg in args {
                collect_functions_expr(arg, out);
            }
        }
        Expr::Object { props, .. } => {
            for (_, value) in props {
                collect_functions_expr(value, out);
            }
        }
        Expr::Array { items, .. } => {
            for item in items {
                collect_functions_expr(item, out);
            }
        }
        Expr::Identifier { .. } | Expr::StrLit { .. } | Expr::NumLit { .. } => {}
    }
}
