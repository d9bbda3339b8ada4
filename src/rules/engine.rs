//! Rule execution engine
//!
//! Holds the registered rules and evaluates them against one unit at a
//! time. Each rule runs isolated: a panic or error inside one rule's
//! `evaluate` is caught, logged, and skips that rule for that unit only.
//! Findings are deduplicated on (rule, line, column) keeping the highest
//! confidence, then sorted severity-first, so registration order never
//! affects the output.

use crate::models::Finding;
use crate::parsers::SourceUnit;
use crate::registry::Registry;
use crate::rules::base::{Rule, RuleOutcome};
use crate::taint::SymbolTable;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cap on findings kept per unit, against pathological inputs
const MAX_FINDINGS_PER_UNIT: usize = 500;

pub struct RuleEngine {
    rules: Vec<Arc<dyn Rule>>,
    max_findings_per_unit: usize,
}

impl RuleEngine {
    /// Empty engine; register rules explicitly.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            max_findings_per_unit: MAX_FINDINGS_PER_UNIT,
        }
    }

    /// Engine loaded with every built-in rule.
    pub fn with_default_rules(registry: &Arc<Registry>) -> Self {
        let mut engine = Self::new();
        engine.register_all(crate::rules::default_rules(registry));
        engine
    }

    pub fn with_max_findings(mut self, max: usize) -> Self {
        self.max_findings_per_unit = max;
        self
    }

    /// Register a rule. Anything implementing [`Rule`] with a unique id
    /// can plug in here.
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        debug!("Registering rule: {}", rule.id());
        self.rules.push(rule);
    }

    pub fn register_all(&mut self, rules: impl IntoIterator<Item = Arc<dyn Rule>>) {
        for rule in rules {
            self.register(rule);
        }
    }

    /// Drop rules whose id is in the skip list.
    pub fn skip_rules(&mut self, ids: &[String]) {
        self.rules.retain(|r| !ids.iter().any(|id| id == r.id()));
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter()
    }

    /// Evaluate every registered rule against a unit.
    ///
    /// Returns the deduplicated, severity-sorted finding set; commutative
    /// over registration order.
    pub fn evaluate(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Vec<Finding> {
        let mut findings = Vec::new();
        for outcome in self.evaluate_detailed(unit, symbols) {
            if outcome.success {
                findings.extend(outcome.findings);
            } else if let Some(err) = &outcome.error {
                warn!(
                    "Rule {} skipped for {}: {}",
                    outcome.rule,
                    unit.path.display(),
                    err
                );
            }
        }
        dedup_findings(&mut findings);
        sort_findings(&mut findings);
        findings.truncate(self.max_findings_per_unit);
        findings
    }

    /// Evaluate returning per-rule outcomes, for diagnostics.
    pub fn evaluate_detailed(&self, unit: &SourceUnit, symbols: &SymbolTable) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .map(|rule| self.run_single_rule(rule.as_ref(), unit, symbols))
            .collect()
    }

    /// Run one rule with panic and error isolation.
    fn run_single_rule(
        &self,
        rule: &dyn Rule,
        unit: &SourceUnit,
        symbols: &SymbolTable,
    ) -> RuleOutcome {
        let name = rule.id().to_string();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rule.evaluate(unit, symbols)
        }));

        match result {
            Ok(Ok(findings)) => {
                debug!(
                    "Rule {} found {} findings in {}",
                    name,
                    findings.len(),
                    unit.path.display()
                );
                RuleOutcome::success(name, findings)
            }
            Ok(Err(e)) => RuleOutcome::failure(name, e.to_string()),
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                RuleOutcome::failure(name, format!("panic: {panic_msg}"))
            }
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicate findings sharing (rule, line, column), keeping the highest
/// confidence evidence.
fn dedup_findings(findings: &mut Vec<Finding>) {
    findings.sort_by(|a, b| {
        (a.rule.as_str(), a.line, a.column)
            .cmp(&(b.rule.as_str(), b.line, b.column))
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    findings.dedup_by(|next, kept| {
        kept.rule == next.rule && kept.line == next.line && kept.column == next.column
    });
}

/// Stable report order: severity first, then location, then rule id.
fn sort_findings(findings: &mut Vec<Finding>) {
    findings.sort_by(|a, b| {
        (Reverse(a.severity), a.line, a.column, a.rule.as_str()).cmp(&(
            Reverse(b.severity),
            b.line,
            b.column,
            b.rule.as_str(),
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::parsers::parse;
    use crate::taint::TaintTracker;
    use anyhow::Result;

    struct FixedRule {
        id: &'static str,
        severity: Severity,
        lines: Vec<u32>,
        confidence: f64,
    }

    impl Rule for FixedRule {
        fn id(&self) -> &'static str {
            self.id
        }
        fn description(&self) -> &'static str {
            "test rule"
        }
        fn severity(&self) -> Severity {
            self.severity
        }
        fn evaluate(&self, unit: &SourceUnit, _symbols: &SymbolTable) -> Result<Vec<Finding>> {
            Ok(self
                .lines
                .iter()
                .map(|&line| {
                    Finding::new(self.id, self.severity, unit.path.clone(), line, 1, "issue")
                        .with_confidence(self.confidence)
                })
                .collect())
        }
    }

    struct PanickingRule;

    impl Rule for PanickingRule {
        fn id(&self) -> &'static str {
            "panicker"
        }
        fn description(&self) -> &'static str {
            "always panics"
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn evaluate(&self, _unit: &SourceUnit, _symbols: &SymbolTable) -> Result<Vec<Finding>> {
            panic!("boom");
        }
    }

    fn unit_and_symbols() -> (SourceUnit, SymbolTable) {
        let unit = parse("t.js", "const a = 1;").expect("parse");
        let registry = Arc::new(Registry::with_default_patterns());
        let symbols = TaintTracker::new(registry).analyze(&unit);
        (unit, symbols)
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let (unit, symbols) = unit_and_symbols();
        let mut engine = RuleEngine::new();
        engine.register(Arc::new(PanickingRule));
        engine.register(Arc::new(FixedRule {
            id: "ok-rule",
            severity: Severity::High,
            lines: vec![1],
            confidence: 0.9,
        }));

        let findings = engine.evaluate(&unit, &symbols);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, "ok-rule");

        let outcomes = engine.evaluate_detailed(&unit, &symbols);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap_or("").contains("boom"));
    }

    #[test]
    fn test_registration_order_is_commutative() {
        let (unit, symbols) = unit_and_symbols();
        let rule_a = || {
            Arc::new(FixedRule {
                id: "rule-a",
                severity: Severity::High,
                lines: vec![3, 1],
                confidence: 0.8,
            }) as Arc<dyn Rule>
        };
        let rule_b = || {
            Arc::new(FixedRule {
                id: "rule-b",
                severity: Severity::Critical,
                lines: vec![2],
                confidence: 0.9,
            }) as Arc<dyn Rule>
        };

        let mut forward = RuleEngine::new();
        forward.register(rule_a());
        forward.register(rule_b());

        let mut backward = RuleEngine::new();
        backward.register(rule_b());
        backward.register(rule_a());

        let f1 = forward.evaluate(&unit, &symbols);
        let f2 = backward.evaluate(&unit, &symbols);
        let keys1: Vec<_> = f1.iter().map(|f| (f.rule.clone(), f.line)).collect();
        let keys2: Vec<_> = f2.iter().map(|f| (f.rule.clone(), f.line)).collect();
        assert_eq!(keys1, keys2);
        // Critical sorts first
        assert_eq!(f1[0].rule, "rule-b");
    }

    #[test]
    fn test_dedup_keeps_highest_confidence() {
        let (unit, symbols) = unit_and_symbols();
        let mut engine = RuleEngine::new();
        engine.register(Arc::new(FixedRule {
            id: "dup",
            severity: Severity::High,
            lines: vec![5, 5],
            confidence: 0.6,
        }));

        let findings = engine.evaluate(&unit, &symbols);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_skip_rules() {
        let mut engine = RuleEngine::new();
        engine.register(Arc::new(FixedRule {
            id: "keep",
            severity: Severity::Low,
            lines: vec![],
            confidence: 1.0,
        }));
        engine.register(Arc::new(FixedRule {
            id: "drop",
            severity: Severity::Low,
            lines: vec![],
            confidence: 1.0,
        }));
        engine.skip_rules(&["drop".to_string()]);
        assert_eq!(engine.rule_count(), 1);
        assert_eq!(engine.rules().next().map(|r| r.id()), Some("keep"));
    }
}
