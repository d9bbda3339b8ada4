//! Tokenizer for script-like source
//!
//! Produces a flat token stream with positions. Template literals keep
//! their interpolated expressions as raw text; the parser re-lexes those
//! pieces on demand. Comments and whitespace are dropped.

use crate::parsers::ast::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Keyword(Keyword),
    /// Quoted string literal, unescaped value
    Str(String),
    /// Template literal: alternating text and raw interpolation source
    Template(Vec<RawTemplatePart>),
    Number(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Ellipsis,
    Semi,
    Colon,
    /// `=>`
    Arrow,
    /// `=` or Go's `:=`
    Assign,
    Plus,
    /// `+=`
    PlusAssign,
    /// Any other operator run: `===`, `&&`, `<`, `?`, ...
    Op(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawTemplatePart {
    Text(String),
    /// Raw source of a `${...}` interpolation
    Interp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Const,
    Let,
    Var,
    Function,
    If,
    Else,
    Return,
    Async,
    Await,
    New,
    For,
    While,
    Try,
    Catch,
    Finally,
    Throw,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "const" => Keyword::Const,
            "let" => Keyword::Let,
            "var" => Keyword::Var,
            // Go spells it `func`
            "function" | "func" => Keyword::Function,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "return" => Keyword::Return,
            "async" => Keyword::Async,
            "await" => Keyword::Await,
            "new" => Keyword::New,
            "for" => Keyword::For,
            "while" => Keyword::While,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "finally" => Keyword::Finally,
            "throw" => Keyword::Throw,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokenize source text. Never fails: unrecognized characters are skipped.
pub fn tokenize(text: &str) -> Vec<Token> {
    Lexer::new(text).run()
}

const OP_CHARS: &[char] = &['+', '-', '*', '/', '%', '<', '>', '=', '!', '&', '|', '^', '?', '~'];

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek() {
            let span = Span::new(self.line, self.column);
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '/' => {
                    self.bump();
                    match self.peek() {
                        Some('/') => self.skip_line_comment(),
                        Some('*') => self.skip_block_comment(),
                        _ => self.read_op_run('/', span),
                    }
                }
                '\'' | '"' => {
                    let quote = c;
                    self.bump();
                    let value = self.read_string(quote);
                    self.push(TokenKind::Str(value), span);
                }
                '`' => {
                    self.bump();
                    let parts = self.read_template();
                    self.push(TokenKind::Template(parts), span);
                }
                '(' => self.single(TokenKind::LParen, span),
                ')' => self.single(TokenKind::RParen, span),
                '{' => self.single(TokenKind::LBrace, span),
                '}' => self.single(TokenKind::RBrace, span),
                '[' => self.single(TokenKind::LBracket, span),
                ']' => self.single(TokenKind::RBracket, span),
                ',' => self.single(TokenKind::Comma, span),
                ';' => self.single(TokenKind::Semi, span),
                ':' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::Assign, span);
                    } else {
                        self.push(TokenKind::Colon, span);
                    }
                }
                '.' => {
                    self.bump();
                    if self.peek() == Some('.') {
                        self.bump();
                        if self.peek() == Some('.') {
                            self.bump();
                        }
                        self.push(TokenKind::Ellipsis, span);
                    } else {
                        self.push(TokenKind::Dot, span);
                    }
                }
                c if c.is_ascii_digit() => {
                    let raw = self.read_number();
                    self.push(TokenKind::Number(raw), span);
                }
                c if is_ident_start(c) => {
                    let ident = self.read_ident();
                    let kind = match Keyword::from_ident(&ident) {
                        Some(kw) => TokenKind::Keyword(kw),
                        None => TokenKind::Ident(ident),
                    };
                    self.push(kind, span);
                }
                c if OP_CHARS.contains(&c) => {
                    self.bump();
                    self.read_op_run(c, span);
                }
                _ => {
                    // Unknown character (e.g. decorator glyphs): skip
                    self.bump();
                }
            }
        }
        self.tokens
    }

    fn single(&mut self, kind: TokenKind, span: Span) {
        self.bump();
        self.push(kind, span);
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump(); // consume '*'
        let mut prev = '\0';
        while let Some(c) = self.bump() {
            if prev == '*' && c == '/' {
                break;
            }
            prev = c;
        }
    }

    fn read_string(&mut self, quote: char) -> String {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            if c == '\\' {
                if let Some(escaped) = self.bump() {
                    value.push(escaped);
                }
            } else if c == quote || c == '\n' {
                // Unterminated strings end at the line break
                break;
            } else {
                value.push(c);
            }
        }
        value
    }

    fn read_template(&mut self) -> Vec<RawTemplatePart> {
        let mut parts = Vec::new();
        let mut text = String::new();
        while let Some(c) = self.bump() {
            if c == '\\' {
                if let Some(escaped) = self.bump() {
                    text.push(escaped);
                }
            } else if c == '`' {
                break;
            } else if c == '$' && self.peek() == Some('{') {
                self.bump(); // consume '{'
                if !text.is_empty() {
                    parts.push(RawTemplatePart::Text(std::mem::take(&mut text)));
                }
                let mut depth = 1usize;
                let mut interp = String::new();
                while let Some(ic) = self.bump() {
                    match ic {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    if depth > 0 {
                        interp.push(ic);
                    }
                }
                parts.push(RawTemplatePart::Interp(interp));
            } else {
                text.push(c);
            }
        }
        if !text.is_empty() {
            parts.push(RawTemplatePart::Text(text));
        }
        parts
    }

    fn read_number(&mut self) -> String {
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                raw.push(c);
                self.bump();
            } else {
                break;
            }
        }
        raw
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        ident
    }

    /// Read the rest of an operator run whose first char was already consumed.
    fn read_op_run(&mut self, first: char, span: Span) {
        let mut run = String::from(first);
        while let Some(c) = self.peek() {
            if OP_CHARS.contains(&c) {
                run.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match run.as_str() {
            "=" => TokenKind::Assign,
            "=>" => TokenKind::Arrow,
            "+" => TokenKind::Plus,
            "+=" => TokenKind::PlusAssign,
            _ => TokenKind::Op(run),
        };
        self.push(kind, span);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        let toks = kinds("const x = req.query.ip;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Keyword(Keyword::Const),
                TokenKind::Ident("x".to_string()),
                TokenKind::Assign,
                TokenKind::Ident("req".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("query".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("ip".to_string()),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let toks = kinds(r#"const s = 'it\'s';"#);
        assert!(toks.contains(&TokenKind::Str("it's".to_string())));
    }

    #[test]
    fn test_template_with_interpolation() {
        let toks = kinds("`SELECT * FROM users WHERE name = '${username}'`");
        match &toks[0] {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(
                    parts[1],
                    RawTemplatePart::Interp("username".to_string())
                );
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn test_template_nested_braces() {
        let toks = kinds("`v: ${JSON.stringify({a: 1})}`");
        match &toks[0] {
            TokenKind::Template(parts) => {
                assert_eq!(
                    parts[1],
                    RawTemplatePart::Interp("JSON.stringify({a: 1})".to_string())
                );
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_skipped() {
        let toks = kinds("a // line\n/* block\nstill */ b");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_arrow_and_go_assign() {
        assert_eq!(kinds("=>"), vec![TokenKind::Arrow]);
        assert_eq!(kinds(":="), vec![TokenKind::Assign]);
        assert_eq!(
            kinds("a === b"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Op("===".to_string()),
                TokenKind::Ident("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_positions_track_lines() {
        let toks = tokenize("a\n  b");
        assert_eq!(toks[0].span, Span::new(1, 1));
        assert_eq!(toks[1].span, Span::new(2, 3));
    }

    #[test]
    fn test_ellipsis() {
        assert_eq!(
            kinds("...args"),
            vec![TokenKind::Ellipsis, TokenKind::Ident("args".to_string())]
        );
    }
}
