//! Taint states and provenance records.

use crate::registry::SourceKind;

/// Taint state of a symbol or expression.
///
/// Within one analysis pass a state only ever escalates
/// (`Untainted` → `Unknown` → `Tainted`), never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaintState {
    Untainted,
    /// Derived from tainted data through an unrecognized call; treated as
    /// tainted for reporting, at lower confidence
    Unknown,
    Tainted(SourceKind),
}

impl TaintState {
    fn rank(&self) -> u8 {
        match self {
            TaintState::Untainted => 0,
            TaintState::Unknown => 1,
            TaintState::Tainted(_) => 2,
        }
    }

    /// Conservative union: the more tainted side wins. Used at assignment,
    /// concatenation, and control-flow merge points.
    pub fn join(self, other: TaintState) -> TaintState {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Tainted or Unknown — anything a rule should worry about.
    pub fn is_suspect(&self) -> bool {
        !matches!(self, TaintState::Untainted)
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            TaintState::Tainted(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Reporting confidence for findings at this state.
    pub fn confidence(&self) -> f64 {
        match self {
            TaintState::Tainted(_) => 0.9,
            TaintState::Unknown => 0.5,
            TaintState::Untainted => 0.0,
        }
    }
}

/// How a value moved one step along the dataflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowVia {
    /// Read directly from a taint source
    Source,
    /// Plain assignment `b = a`
    Assign,
    /// String concatenation or template interpolation
    Concat,
    /// Passed through an unrecognized call
    Call,
}

/// One step in a provenance chain from source to current binding.
#[derive(Debug, Clone)]
pub struct ProvenanceStep {
    pub description: String,
    /// Source field name, when the step reads a named field
    /// (`req.body.cardNumber` → `cardNumber`)
    pub field: Option<String>,
    /// Call target for `FlowVia::Call` steps
    pub callee: Option<String>,
    pub via: FlowVia,
    pub line: u32,
}

impl ProvenanceStep {
    pub fn source(description: impl Into<String>, field: Option<String>, line: u32) -> Self {
        Self {
            description: description.into(),
            field,
            callee: None,
            via: FlowVia::Source,
            line,
        }
    }

    pub fn assign(description: impl Into<String>, line: u32) -> Self {
        Self {
            description: description.into(),
            field: None,
            callee: None,
            via: FlowVia::Assign,
            line,
        }
    }

    pub fn concat(description: impl Into<String>, line: u32) -> Self {
        Self {
            description: description.into(),
            field: None,
            callee: None,
            via: FlowVia::Concat,
            line,
        }
    }

    pub fn call(callee: impl Into<String>, line: u32) -> Self {
        let callee = callee.into();
        Self {
            description: format!("through call {callee}()"),
            field: None,
            callee: Some(callee),
            via: FlowVia::Call,
            line,
        }
    }
}

/// A named binding with its taint state and history.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: String,
    pub taint: TaintState,
    /// Whether the value was built via concatenation/interpolation anywhere
    /// along its dataflow (SQL-injection rules key off this)
    pub concat_built: bool,
    pub steps: Vec<ProvenanceStep>,
    pub decl_line: u32,
}

/// Evaluated dataflow of an expression at a use site.
#[derive(Debug, Clone, Default)]
pub struct ExprFlow {
    pub taint: Option<TaintState>,
    pub via_concat: bool,
    pub steps: Vec<ProvenanceStep>,
}

impl ExprFlow {
    pub fn untainted() -> Self {
        Self {
            taint: Some(TaintState::Untainted),
            via_concat: false,
            steps: Vec::new(),
        }
    }

    pub fn state(&self) -> TaintState {
        self.taint.unwrap_or(TaintState::Untainted)
    }

    pub fn is_suspect(&self) -> bool {
        self.state().is_suspect()
    }

    /// Merge another flow into this one (operands of a binary op, template
    /// parts, argument lists).
    pub fn merge(&mut self, other: ExprFlow) {
        self.taint = Some(self.state().join(other.state()));
        self.via_concat |= other.via_concat;
        self.steps.extend(other.steps);
    }

    /// Source field names along the chain (`cardNumber`, `password`, ...).
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| s.field.as_deref())
    }

    /// Call targets the value passed through.
    pub fn callees(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| s.callee.as_deref())
    }

    /// Human-readable provenance chain for reporting.
    pub fn chain(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.description.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_escalates_only() {
        let tainted = TaintState::Tainted(SourceKind::QueryString);
        assert_eq!(TaintState::Untainted.join(tainted), tainted);
        assert_eq!(tainted.join(TaintState::Untainted), tainted);
        assert_eq!(TaintState::Untainted.join(TaintState::Unknown), TaintState::Unknown);
        assert_eq!(TaintState::Unknown.join(tainted), tainted);
    }

    #[test]
    fn test_join_keeps_first_source_kind() {
        let a = TaintState::Tainted(SourceKind::QueryString);
        let b = TaintState::Tainted(SourceKind::RequestBody);
        assert_eq!(a.join(b), a);
    }

    #[test]
    fn test_suspect_states() {
        assert!(!TaintState::Untainted.is_suspect());
        assert!(TaintState::Unknown.is_suspect());
        assert!(TaintState::Tainted(SourceKind::RequestBody).is_suspect());
    }

    #[test]
    fn test_flow_merge() {
        let mut flow = ExprFlow::untainted();
        let mut tainted = ExprFlow::untainted();
        tainted.taint = Some(TaintState::Tainted(SourceKind::RequestBody));
        tainted.via_concat = true;
        tainted
            .steps
            .push(ProvenanceStep::source("req.body", Some("cardNumber".into()), 3));

        flow.merge(tainted);
        assert!(flow.is_suspect());
        assert!(flow.via_concat);
        assert_eq!(flow.fields().collect::<Vec<_>>(), vec!["cardNumber"]);
    }
}
