//! Weak Hardcoded Secret Detection
//!
//! String literals bound to secret-like names (`secret`, `password`,
//! `key`, `token`) that are short, low-entropy, or built from dictionary
//! words. High-entropy literals of 32+ bytes pass: they are still
//! hardcoded, but not guessable, and flagging every strong key would bury
//! the weak ones. CWE-798.

use crate::models::{Finding, Severity};
use crate::parsers::ast::{Expr, Pattern, Span, Stmt, TemplatePart};
use crate::parsers::SourceUnit;
use crate::rules::base::Rule;
use crate::taint::SymbolTable;
use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

static SECRET_NAME: OnceLock<Regex> = OnceLock::new();

fn secret_name_pattern() -> &'static Regex {
    SECRET_NAME.get_or_init(|| {
        Regex::new(r"(?i)(secret|passw(or)?d|pwd|api[-_]?key|token|credential|jwt)")
            .expect("valid regex")
    })
}

/// Common words that make a credential guessable regardless of length.
const DICTIONARY: &[&str] = &[
    "password", "secret", "admin", "letmein", "qwerty", "welcome", "changeme",
    "default", "123456", "master", "hunter", "test",
];

/// Minimum Shannon entropy (bits per char) for a literal to count as random.
const ENTROPY_THRESHOLD: f64 = 3.0;

/// Literals shorter than this are weak no matter their alphabet.
const MIN_SECRET_LEN: usize = 16;

pub struct WeakSecretRule;

impl WeakSecretRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WeakSecretRule {
    fn default() -> Self {
        Self::new()
    }
}

fn is_secret_like(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "key"
        || lower.ends_with("_key")
        || name.ends_with("Key")
        || secret_name_pattern().is_match(name)
}

/// Map common leetspeak substitutions before the dictionary check so
/// `P@ssw0rd` still reads as `password`.
fn leet_normalize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '@' | '4' => 'a',
            '3' => 'e',
            '0' => 'o',
            '1' | '!' => 'i',
            '$' | '5' => 's',
            '7' => 't',
            _ => c,
        })
        .collect()
}

fn shannon_entropy(value: &str) -> f64 {
    if value.is_empty() {
        return 0.0;
    }
    let mut counts = std::collections::HashMap::new();
    for c in value.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
    }
    let len = value.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Obvious non-secrets: sample values, templates, and stubs.
fn looks_like_placeholder(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.contains("example")
        || lower.contains("placeholder")
        || lower.contains("xxxx")
        || lower.contains("${")
        || value.len() < 4
}

fn literal_is_weak(value: &str) -> bool {
    if looks_like_placeholder(value) {
        return false;
    }
    if value.len() < MIN_SECRET_LEN {
        return true;
    }
    let normalized = leet_normalize(value);
    if DICTIONARY.iter().any(|w| normalized.contains(w)) {
        return true;
    }
    shannon_entropy(value) < ENTROPY_THRESHOLD
}

/// String literals reachable from an initializer without crossing a call:
/// direct literals plus both arms of `cond ? a : b` and `x || 'fallback'`.
fn literal_branches<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::StrLit { value, .. } => out.push(value),
        Expr::Binary { lhs, rhs, .. } => {
            literal_branches(lhs, out);
            literal_branches(rhs, out);
        }
        Expr::Conditional {
            then_expr,
            else_expr,
            ..
        } => {
            literal_branches(then_expr, out);
            literal_branches(else_expr, out);
        }
        Expr::Template { parts, .. } => {
            if parts.len() == 1 {
                if let TemplatePart::Text(text) = &parts[0] {
                    out.push(text);
                }
            }
        }
        _ => {}
    }
}

struct SecretBinding<'a> {
    name: &'a str,
    value: &'a str,
    span: Span,
}

fn collect_bindings<'a>(stmts: &'a [Stmt], out: &mut Vec<SecretBinding<'a>>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl {
                pattern: Pattern::Ident(name),
                init: Some(init),
                span,
            } => {
                collect_from_named_expr(name, init, *span, out);
                collect_bindings_expr(init, out);
            }
            Stmt::VarDecl {
                init: Some(init), ..
            } => collect_bindings_expr(init, out),
            Stmt::Assign {
                target,
                value,
                span,
            } => {
                let name = match target {
                    Expr::Identifier { name, .. } => Some(name.as_str()),
                    Expr::Member { property, .. } => Some(property.as_str()),
                    _ => None,
                };
                if let Some(name) = name {
                    collect_from_named_expr(name, value, *span, out);
                }
                collect_bindings_expr(value, out);
            }
            Stmt::ExprStmt { expr, .. } => collect_bindings_expr(expr, out),
            Stmt::FunctionDecl { body, .. } => collect_bindings(body, out),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_bindings(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_bindings(else_branch, out);
                }
            }
            Stmt::Loop { body, .. } | Stmt::Block { body, .. } => collect_bindings(body, out),
            Stmt::Return { value: Some(v), .. } => collect_bindings_expr(v, out),
            _ => {}
        }
    }
}

fn collect_bindings_expr<'a>(expr: &'a Expr, out: &mut Vec<SecretBinding<'a>>) {
    match expr {
        Expr::Object { props, .. } => {
            for (key, value) in props {
                collect_from_named_expr(key, value, value.span(), out);
                collect_bindings_expr(value, out);
            }
        }
        Expr::Call { callee, args, .. } => {
            collect_bindings_expr(callee, out);
            for arg in args {
                collect_bindings_expr(arg, out);
            }
        }
        Expr::Function { body, .. } => collect_bindings(body, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_bindings_expr(lhs, out);
            collect_bindings_expr(rhs, out);
        }
        Expr::Array { items, .. } => {
            for item in items {
                collect_bindings_expr(item, out);
            }
        }
        _ => {}
    }
}

fn collect_from_named_expr<'a>(
    name: &'a str,
    expr: &'a Expr,
    span: Span,
    out: &mut Vec<SecretBinding<'a>>,
) {
    if !is_secret_like(name) {
        return;
    }
    let mut literals = Vec::new();
    literal_branches(expr, &mut literals);
    for value in literals {
        out.push(SecretBinding { name, value, span });
    }
}

impl Rule for WeakSecretRule {
    fn id(&self) -> &'static str {
        "weak-secret"
    }

    fn description(&self) -> &'static str {
        "Hardcoded secret with low entropy or dictionary content"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn cwe(&self) -> Option<&'static str> {
        Some("CWE-798")
    }

    fn evaluate(&self, unit: &SourceUnit, _symbols: &SymbolTable) -> Result<Vec<Finding>> {
        let mut bindings = Vec::new();
        collect_bindings(&unit.statements, &mut bindings);

        let mut findings = Vec::new();
        for binding in bindings {
            if !literal_is_weak(binding.value) {
                continue;
            }
            // The message names the binding, never the value
            let finding = Finding::new(
                self.id(),
                self.severity(),
                unit.path.clone(),
                binding.span.line,
                binding.span.column,
                format!(
                    "'{}' is assigned a weak hardcoded value; use a randomly \
                     generated secret from the environment or a secrets manager",
                    binding.name
                ),
            )
            .with_snippet(unit.snippet(binding.span))
            .with_cwe("CWE-798")
            .with_confidence(0.8);
            findings.push(finding);
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse;
    use crate::registry::Registry;
    use crate::taint::TaintTracker;
    use std::sync::Arc;

    fn run(src: &str) -> Vec<Finding> {
        let unit = parse("app.js", src).expect("parse");
        let registry = Arc::new(Registry::with_default_patterns());
        let symbols = TaintTracker::new(registry).analyze(&unit);
        WeakSecretRule::new().evaluate(&unit, &symbols).expect("evaluate")
    }

    #[test]
    fn test_short_dictionary_word_fires() {
        let findings = run("const secret = 'hunter2';");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].cwe_id.as_deref(), Some("CWE-798"));
        // value never appears in the message
        assert!(!findings[0].message.contains("hunter2"));
    }

    #[test]
    fn test_long_dictionary_value_fires() {
        // Long enough, but contains a dictionary word through leetspeak
        let findings = run("const JWT_SECRET = 'my-secret-jwt-key-not-random-at-all';");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_leetspeak_password_fires() {
        let findings = run("const DB_CONFIG = { password: 'Sup3rS3cr3tP@ssw0rd!2024' };");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_high_entropy_32_bytes_is_clean() {
        let findings = run("const apiKey = 'xK9#mP2$vL8@qR5!wT3^nZ7&bJ4*hF6%';");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_non_secret_name_is_clean() {
        assert!(run("const greeting = 'hello';").is_empty());
    }

    #[test]
    fn test_placeholder_is_clean() {
        assert!(run("const apiKey = 'your-api-key-example';").is_empty());
    }

    #[test]
    fn test_entropy_math() {
        assert!(shannon_entropy("aaaaaaaa") < 1.0);
        assert!(shannon_entropy("xK9#mP2$vL8@qR5!wT3^nZ7&bJ4*hF6%") > 4.0);
    }

    #[test]
    fn test_secret_like_names() {
        assert!(is_secret_like("JWT_SECRET"));
        assert!(is_secret_like("password"));
        assert!(is_secret_like("apiKey"));
        assert!(is_secret_like("privateKey"));
        assert!(is_secret_like("authToken"));
        assert!(!is_secret_like("username"));
        assert!(!is_secret_like("monkey"));
    }
}
