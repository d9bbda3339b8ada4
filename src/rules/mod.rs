//! Vulnerability pattern rules
//!
//! Each module holds one rule targeting one vulnerability class. Rules are
//! pure predicates over `(SourceUnit, SymbolTable)`, registered on the
//! [`engine::RuleEngine`]; anything implementing [`base::Rule`] with a
//! unique id plugs in the same way.

pub mod base;
pub mod engine;

mod command_injection;
mod cors_misconfig;
mod missing_auth;
mod path_traversal;
mod sensitive_logging;
mod sql_injection;
mod ssrf;
mod unsafe_eval;
mod weak_secret;

pub use base::{Rule, RuleOutcome};
pub use engine::RuleEngine;

use crate::registry::Registry;
use std::sync::Arc;

/// Every built-in rule, in registry order. The engine's output does not
/// depend on this order.
pub fn default_rules(registry: &Arc<Registry>) -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(sql_injection::SqlInjectionRule::new(Arc::clone(registry))),
        Arc::new(command_injection::CommandInjectionRule::new(Arc::clone(registry))),
        Arc::new(path_traversal::PathTraversalRule::new(Arc::clone(registry))),
        Arc::new(ssrf::SsrfRule::new(Arc::clone(registry))),
        Arc::new(unsafe_eval::UnsafeEvalRule::new(Arc::clone(registry))),
        Arc::new(weak_secret::WeakSecretRule::new()),
        Arc::new(missing_auth::MissingAuthRule::new(Arc::clone(registry))),
        Arc::new(cors_misconfig::CorsMisconfigRule::new(Arc::clone(registry))),
        Arc::new(sensitive_logging::SensitiveLoggingRule::new(Arc::clone(registry))),
    ]
}
