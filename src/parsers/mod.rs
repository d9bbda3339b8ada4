//! Source parsing: tokenizer, error-tolerant parser, and the `SourceUnit`
//! handed to the taint tracker and rule engine.
//!
//! The parser targets script-like call syntax (JavaScript/TypeScript first,
//! with enough tolerance for Go-style declarations) rather than any single
//! language spec. Statement-level syntax errors degrade locally: the
//! statement is skipped and recorded as a diagnostic, and the scan goes on.

pub mod ast;
pub mod lexer;
mod parser;

use ast::{collect_functions, FunctionRef, Span, Stmt};
use lexer::{tokenize, Token};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Whole-file parse failure. Statement-level problems never produce this;
/// they become `Degraded` diagnostics on the unit instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("binary content")]
    BinaryContent,
    #[error("unsupported file type {0:?}")]
    UnsupportedExtension(String),
}

/// Diagnostic kinds attached to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A statement failed to parse and was skipped
    Degraded,
}

/// A recoverable parse problem with its location.
#[derive(Debug, Clone, Serialize)]
pub struct ParseDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Language of a source unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Language {
    JavaScript,
    TypeScript,
    Go,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Go => "Go",
            Language::Unknown => "Unknown",
        }
    }
}

/// Extensions the scanner will pick up by default.
pub fn supported_extensions() -> &'static [&'static str] {
    &["js", "jsx", "mjs", "cjs", "ts", "tsx", "go"]
}

/// A parsed source file. Immutable after parse; owns the AST, the flat
/// token list, and the source lines used for evidence snippets.
#[derive(Debug)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub language: Language,
    pub statements: Vec<Stmt>,
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<ParseDiagnostic>,
    lines: Vec<String>,
}

impl SourceUnit {
    /// The source line at a 1-indexed line number, trimmed for display.
    pub fn line_text(&self, line: u32) -> &str {
        self.lines
            .get(line.saturating_sub(1) as usize)
            .map(|l| l.trim())
            .unwrap_or("")
    }

    /// Evidence snippet for a span, capped for report size.
    pub fn snippet(&self, span: Span) -> String {
        let text = self.line_text(span.line);
        if text.chars().count() > 160 {
            let truncated: String = text.chars().take(157).collect();
            format!("{truncated}...")
        } else {
            text.to_string()
        }
    }

    /// Every function body in the unit, lexical order.
    pub fn functions(&self) -> Vec<FunctionRef<'_>> {
        let mut out = Vec::new();
        collect_functions(&self.statements, &mut out);
        out
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Parse source text into a unit.
///
/// Only whole-file problems (binary content) fail; anything else produces a
/// unit, possibly with `Degraded` diagnostics for skipped statements.
pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<SourceUnit, ParseError> {
    if text.bytes().any(|b| b == 0) {
        return Err(ParseError::BinaryContent);
    }
    let path = path.into();
    let language = Language::from_path(&path);
    let tokens = tokenize(text);
    let mut parser = parser::Parser::new(tokens.clone());
    let statements = parser.parse_program();
    let diagnostics = parser.into_diagnostics();
    Ok(SourceUnit {
        path,
        language,
        statements,
        tokens,
        diagnostics,
        lines: text.lines().map(String::from).collect(),
    })
}
