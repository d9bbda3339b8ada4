//! Error-tolerant recursive-descent parser
//!
//! One statement at a time: a syntax error inside a statement records a
//! `Degraded` diagnostic and skips to the next statement boundary instead
//! of failing the unit. The goal is finding sources and sinks, not full
//! language-spec compliance, so unknown constructs degrade gracefully.

use crate::parsers::ast::{BinOp, Expr, FuncId, Pattern, Span, Stmt, TemplatePart};
use crate::parsers::lexer::{tokenize, Keyword, RawTemplatePart, Token, TokenKind};
use crate::parsers::{DiagnosticKind, ParseDiagnostic};

/// Statement-local syntax error; never escapes the parser.
#[derive(Debug)]
struct SyntaxError {
    message: String,
    span: Span,
}

impl SyntaxError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<ParseDiagnostic>,
    next_func_id: FuncId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            next_func_id: 0,
        }
    }

    fn with_start_id(tokens: Vec<Token>, next_func_id: FuncId) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            next_func_id,
        }
    }

    pub fn into_diagnostics(self) -> Vec<ParseDiagnostic> {
        self.diagnostics
    }

    /// Parse every top-level statement, recovering at statement boundaries.
    pub fn parse_program(&mut self) -> Vec<Stmt> {
        self.parse_statements_until(None)
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Span, SyntaxError> {
        let span = self.current_span();
        if self.eat(kind) {
            Ok(span)
        } else {
            Err(SyntaxError::new(format!("expected {what}"), span))
        }
    }

    fn fresh_func_id(&mut self) -> FuncId {
        let id = self.next_func_id;
        self.next_func_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statements_until(&mut self, terminator: Option<&TokenKind>) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&TokenKind::Semi) {}
            if self.at_end() {
                break;
            }
            if let Some(term) = terminator {
                if self.peek() == Some(term) {
                    break;
                }
            }
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.diagnostics.push(ParseDiagnostic {
                        kind: DiagnosticKind::Degraded,
                        message: err.message,
                        line: err.span.line,
                        column: err.span.column,
                    });
                    self.synchronize(terminator);
                }
            }
        }
        stmts
    }

    /// Skip to the next statement boundary: past a `;` at nesting depth 0,
    /// or up to the block terminator.
    fn synchronize(&mut self, terminator: Option<&TokenKind>) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                TokenKind::RBrace => {
                    if depth == 0 && terminator == Some(&TokenKind::RBrace) {
                        return;
                    }
                    depth = depth.saturating_sub(1);
                }
                TokenKind::Semi if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let span = self.current_span();
        match self.peek() {
            Some(TokenKind::Keyword(Keyword::Const))
            | Some(TokenKind::Keyword(Keyword::Let))
            | Some(TokenKind::Keyword(Keyword::Var)) => {
                self.bump();
                self.parse_var_decl(span)
            }
            Some(TokenKind::Keyword(Keyword::Async)) => {
                self.bump();
                self.parse_statement()
            }
            Some(TokenKind::Keyword(Keyword::Function)) => {
                self.bump();
                self.parse_function_decl(span)
            }
            Some(TokenKind::Keyword(Keyword::If)) => {
                self.bump();
                self.parse_if(span)
            }
            Some(TokenKind::Keyword(Keyword::For)) | Some(TokenKind::Keyword(Keyword::While)) => {
                self.bump();
                self.parse_loop(span)
            }
            Some(TokenKind::Keyword(Keyword::Return)) => {
                self.bump();
                let value = match self.peek() {
                    Some(TokenKind::Semi) | Some(TokenKind::RBrace) | None => None,
                    _ => Some(self.parse_expression()?),
                };
                self.eat(&TokenKind::Semi);
                Ok(Stmt::Return { value, span })
            }
            Some(TokenKind::Keyword(Keyword::Throw)) => {
                self.bump();
                let expr = self.parse_expression()?;
                self.eat(&TokenKind::Semi);
                Ok(Stmt::ExprStmt { expr, span })
            }
            Some(TokenKind::Keyword(Keyword::Try)) => {
                self.bump();
                self.parse_try(span)
            }
            Some(TokenKind::LBrace) => {
                let body = self.parse_block()?;
                Ok(Stmt::Block { body, span })
            }
            Some(_) => self.parse_expr_statement(span),
            None => Err(SyntaxError::new("unexpected end of input", span)),
        }
    }

    fn parse_var_decl(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let pattern = self.parse_pattern()?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.eat(&TokenKind::Semi);
        Ok(Stmt::VarDecl {
            pattern,
            init,
            span,
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern, SyntaxError> {
        let span = self.current_span();
        match self.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => Ok(Pattern::Ident(name)),
            Some(TokenKind::LBrace) => {
                let mut bindings = Vec::new();
                loop {
                    match self.bump().map(|t| t.kind) {
                        Some(TokenKind::Ident(field)) => {
                            // `{ field: bound }` renames the binding
                            let bound = if self.eat(&TokenKind::Colon) {
                                match self.bump().map(|t| t.kind) {
                                    Some(TokenKind::Ident(b)) => b,
                                    _ => field.clone(),
                                }
                            } else {
                                field.clone()
                            };
                            bindings.push((field, bound));
                        }
                        Some(TokenKind::Comma) | Some(TokenKind::Ellipsis) => {}
                        Some(TokenKind::RBrace) => break,
                        _ => {
                            return Err(SyntaxError::new(
                                "malformed destructuring pattern",
                                span,
                            ))
                        }
                    }
                }
                Ok(Pattern::Object(bindings))
            }
            _ => Err(SyntaxError::new("expected binding name", span)),
        }
    }

    fn parse_function_decl(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let name = match self.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => name,
            _ => return Err(SyntaxError::new("expected function name", span)),
        };
        let id = self.fresh_func_id();
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDecl {
            id,
            name,
            params,
            body,
            span,
        })
    }

    fn parse_if(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        self.expect(&TokenKind::LParen, "'(' after if")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, "')' after condition")?;
        let then_branch = self.parse_branch()?;
        let else_branch = if self.eat(&TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_branch()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            span,
        })
    }

    fn parse_branch(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.peek() == Some(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    /// `for`/`while`: the header is skipped wholesale (it may contain its
    /// own declarations and non-expression clauses); the body is analyzed
    /// once, conservatively.
    fn parse_loop(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                TokenKind::LBrace if depth == 0 => break,
                TokenKind::Semi if depth == 0 => {
                    // `for (;;)` never reaches here with depth 0; a bare
                    // semicolon means a degenerate loop statement
                    self.pos += 1;
                    return Ok(Stmt::Loop { body: vec![], span });
                }
                _ => {}
            }
            self.pos += 1;
        }
        let body = self.parse_block()?;
        Ok(Stmt::Loop { body, span })
    }

    fn parse_try(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let mut body = self.parse_block()?;
        if self.eat(&TokenKind::Keyword(Keyword::Catch)) {
            if self.eat(&TokenKind::LParen) {
                while let Some(kind) = self.peek() {
                    if kind == &TokenKind::RParen {
                        break;
                    }
                    self.pos += 1;
                }
                self.expect(&TokenKind::RParen, "')' after catch binding")?;
            }
            body.extend(self.parse_block()?);
        }
        if self.eat(&TokenKind::Keyword(Keyword::Finally)) {
            body.extend(self.parse_block()?);
        }
        Ok(Stmt::Block { body, span })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = self.parse_statements_until(Some(&TokenKind::RBrace));
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    fn parse_expr_statement(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let expr = self.parse_expression()?;
        let stmt = match self.peek() {
            Some(TokenKind::Assign) => {
                self.bump();
                let value = self.parse_expression()?;
                Stmt::Assign {
                    target: expr,
                    value,
                    span,
                }
            }
            Some(TokenKind::PlusAssign) => {
                self.bump();
                let rhs = self.parse_expression()?;
                let value = Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(expr.clone()),
                    rhs: Box::new(rhs),
                    span,
                };
                Stmt::Assign {
                    target: expr,
                    value,
                    span,
                }
            }
            _ => Stmt::ExprStmt { expr, span },
        };
        self.eat(&TokenKind::Semi);
        Ok(stmt)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.parse_binary()?;
        if let Some(TokenKind::Op(op)) = self.peek() {
            if op == "?" && self.peek_at(1) != Some(&TokenKind::Dot) {
                let span = self.current_span();
                self.bump();
                let then_expr = self.parse_conditional()?;
                self.expect(&TokenKind::Colon, "':' in conditional expression")?;
                let else_expr = self.parse_conditional()?;
                return Ok(Expr::Conditional {
                    cond: Box::new(expr),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                    span,
                });
            }
        }
        Ok(expr)
    }

    fn parse_binary(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let span = self.current_span();
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Op(run)) if run != "?" && run != "!" => BinOp::Other,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(TokenKind::Op(run)) = self.peek() {
            if run.chars().all(|c| matches!(c, '!' | '-' | '~')) {
                self.bump();
                return self.parse_unary();
            }
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, SyntaxError> {
        loop {
            let span = self.current_span();
            match self.peek() {
                Some(TokenKind::Dot) => {
                    self.bump();
                    let property = self.parse_property_name(span)?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        span,
                    };
                }
                Some(TokenKind::Op(op)) if op == "?" && self.peek_at(1) == Some(&TokenKind::Dot) => {
                    // Optional chaining `a?.b` reads like plain member access
                    self.bump();
                    self.bump();
                    let property = self.parse_property_name(span)?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        span,
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.bump();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    let property = match index {
                        Expr::StrLit { value, .. } => value,
                        _ => "<computed>".to_string(),
                    };
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        span,
                    };
                }
                Some(TokenKind::LParen) => {
                    self.bump();
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_property_name(&mut self, span: Span) -> Result<String, SyntaxError> {
        match self.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => Ok(name),
            // Keywords are valid property names: `config.new`, `obj.for`
            Some(TokenKind::Keyword(_)) => Ok("<keyword>".to_string()),
            _ => Err(SyntaxError::new("expected property name", span)),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                Some(TokenKind::RParen) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Comma) => {
                    self.bump();
                }
                Some(TokenKind::Ellipsis) => {
                    self.bump();
                    args.push(self.parse_expression()?);
                }
                Some(_) => args.push(self.parse_expression()?),
                None => {
                    return Err(SyntaxError::new(
                        "unterminated argument list",
                        self.current_span(),
                    ))
                }
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.current_span();
        match self.peek().cloned() {
            Some(TokenKind::Str(value)) => {
                self.bump();
                Ok(Expr::StrLit { value, span })
            }
            Some(TokenKind::Number(raw)) => {
                self.bump();
                Ok(Expr::NumLit { raw, span })
            }
            Some(TokenKind::Template(raw_parts)) => {
                self.bump();
                let mut parts = Vec::new();
                for part in raw_parts {
                    match part {
                        RawTemplatePart::Text(text) => parts.push(TemplatePart::Text(text)),
                        RawTemplatePart::Interp(source) => {
                            if let Some(inner) = self.parse_sub_expression(&source, span) {
                                parts.push(TemplatePart::Interp(inner));
                            }
                        }
                    }
                }
                Ok(Expr::Template { parts, span })
            }
            Some(TokenKind::Keyword(Keyword::Await)) => {
                self.bump();
                self.parse_unary()
            }
            Some(TokenKind::Keyword(Keyword::New)) => {
                self.bump();
                let callee = self.parse_primary()?;
                self.parse_postfix(callee)
            }
            Some(TokenKind::Keyword(Keyword::Async)) => {
                self.bump();
                self.parse_primary()
            }
            Some(TokenKind::Keyword(Keyword::Function)) => {
                self.bump();
                let name = match self.peek() {
                    Some(TokenKind::Ident(n)) => {
                        let n = n.clone();
                        self.bump();
                        Some(n)
                    }
                    _ => None,
                };
                let id = self.fresh_func_id();
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                Ok(Expr::Function {
                    id,
                    name,
                    params,
                    body,
                    span,
                })
            }
            Some(TokenKind::Ident(name)) => {
                if self.peek_at(1) == Some(&TokenKind::Arrow) {
                    // Single-parameter arrow: `x => ...`
                    self.bump();
                    self.bump();
                    let id = self.fresh_func_id();
                    let body = self.parse_arrow_body()?;
                    return Ok(Expr::Function {
                        id,
                        name: None,
                        params: vec![name],
                        body,
                        span,
                    });
                }
                self.bump();
                Ok(Expr::Identifier { name, span })
            }
            Some(TokenKind::LParen) => {
                if self.arrow_follows_paren_group() {
                    let id = self.fresh_func_id();
                    let params = self.parse_params()?;
                    self.expect(&TokenKind::Arrow, "'=>'")?;
                    let body = self.parse_arrow_body()?;
                    return Ok(Expr::Function {
                        id,
                        name: None,
                        params,
                        body,
                        span,
                    });
                }
                self.bump();
                let expr = self.parse_expression()?;
                // Tolerate sequence expressions: keep the first operand
                let mut depth = 0usize;
                while let Some(kind) = self.peek() {
                    match kind {
                        TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                        TokenKind::RParen if depth == 0 => break,
                        TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                            depth = depth.saturating_sub(1)
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            Some(TokenKind::LBrace) => self.parse_object_literal(span),
            Some(TokenKind::LBracket) => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        Some(TokenKind::RBracket) => {
                            self.bump();
                            break;
                        }
                        Some(TokenKind::Comma) | Some(TokenKind::Ellipsis) => {
                            self.bump();
                        }
                        Some(_) => items.push(self.parse_expression()?),
                        None => {
                            return Err(SyntaxError::new("unterminated array literal", span))
                        }
                    }
                }
                Ok(Expr::Array { items, span })
            }
            Some(other) => Err(SyntaxError::new(
                format!("unexpected token {other:?}"),
                span,
            )),
            None => Err(SyntaxError::new("unexpected end of input", span)),
        }
    }

    fn parse_object_literal(&mut self, span: Span) -> Result<Expr, SyntaxError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut props = Vec::new();
        loop {
            match self.peek().cloned() {
                Some(TokenKind::RBrace) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Comma) => {
                    self.bump();
                }
                Some(TokenKind::Ellipsis) => {
                    self.bump();
                    let value = self.parse_expression()?;
                    props.push(("<spread>".to_string(), value));
                }
                Some(TokenKind::Ident(key)) | Some(TokenKind::Str(key)) => {
                    self.bump();
                    if self.eat(&TokenKind::Colon) {
                        let value = self.parse_expression()?;
                        props.push((key, value));
                    } else if self.peek() == Some(&TokenKind::LParen) {
                        // Method shorthand: `key(params) { ... }`
                        let id = self.fresh_func_id();
                        let params = self.parse_params()?;
                        let body = self.parse_block()?;
                        props.push((
                            key.clone(),
                            Expr::Function {
                                id,
                                name: Some(key),
                                params,
                                body,
                                span,
                            },
                        ));
                    } else {
                        // Shorthand property: `{ token, user }`
                        let value = Expr::Identifier {
                            name: key.clone(),
                            span,
                        };
                        props.push((key, value));
                    }
                }
                Some(TokenKind::Number(key)) => {
                    self.bump();
                    self.expect(&TokenKind::Colon, "':' after numeric key")?;
                    let value = self.parse_expression()?;
                    props.push((key, value));
                }
                _ => {
                    return Err(SyntaxError::new(
                        "malformed object literal",
                        self.current_span(),
                    ))
                }
            }
        }
        Ok(Expr::Object { props, span })
    }

    fn parse_arrow_body(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.peek() == Some(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            let span = self.current_span();
            let value = self.parse_expression()?;
            Ok(vec![Stmt::Return {
                value: Some(value),
                span,
            }])
        }
    }

    /// Look ahead past a balanced paren group for `=>`.
    fn arrow_follows_paren_group(&self) -> bool {
        debug_assert_eq!(self.peek(), Some(&TokenKind::LParen));
        let mut depth = 0usize;
        let mut i = self.pos;
        while let Some(tok) = self.tokens.get(i) {
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i + 1).map(|t| &t.kind),
                            Some(TokenKind::Arrow)
                        );
                    }
                }
                _ => {}
            }
            i += 1;
        }
        false
    }

    /// Parameter list: identifiers are kept, everything else (type
    /// annotations, destructured params, defaults) is skipped.
    fn parse_params(&mut self) -> Result<Vec<String>, SyntaxError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        let mut depth = 0usize;
        let mut expecting_name = true;
        loop {
            match self.peek().cloned() {
                Some(TokenKind::RParen) if depth == 0 => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Comma) if depth == 0 => {
                    self.bump();
                    expecting_name = true;
                }
                Some(TokenKind::Ident(name)) if depth == 0 && expecting_name => {
                    self.bump();
                    params.push(name);
                    expecting_name = false;
                }
                Some(TokenKind::LParen) | Some(TokenKind::LBrace) | Some(TokenKind::LBracket) => {
                    self.bump();
                    depth += 1;
                }
                Some(TokenKind::RParen) | Some(TokenKind::RBrace) | Some(TokenKind::RBracket) => {
                    self.bump();
                    depth = depth.saturating_sub(1);
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    return Err(SyntaxError::new(
                        "unterminated parameter list",
                        self.current_span(),
                    ))
                }
            }
        }
        Ok(params)
    }

    /// Parse a template interpolation's raw source as an expression.
    /// Positions inside the piece are mapped onto the template's line.
    fn parse_sub_expression(&mut self, source: &str, base: Span) -> Option<Expr> {
        let mut tokens = tokenize(source);
        for tok in &mut tokens {
            if tok.span.line == 1 {
                tok.span = Span::new(base.line, base.column);
            } else {
                tok.span = Span::new(base.line + tok.span.line - 1, tok.span.column);
            }
        }
        let mut sub = Parser::with_start_id(tokens, self.next_func_id);
        let result = sub.parse_expression();
        self.next_func_id = sub.next_func_id;
        self.diagnostics.append(&mut sub.diagnostics);
        match result {
            Ok(expr) => Some(expr),
            Err(err) => {
                self.diagnostics.push(ParseDiagnostic {
                    kind: DiagnosticKind::Degraded,
                    message: format!("bad interpolation: {}", err.message),
                    line: base.line,
                    column: base.column,
                });
                None
            }
        }
    }
}
