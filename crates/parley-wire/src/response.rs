//! Typed solver answers.
//!
//! These are the values the session hands back to callers; everything the
//! layer does not interpret stays available as raw s-expression text.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Outcome of a check-sat-family command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CheckSatResult {
    Satisfiable,
    Unsatisfiable,
    /// The solver could not decide; carries its stated reason.
    Unknown(String),
}

impl CheckSatResult {
    pub fn is_satisfiable(&self) -> bool {
        matches!(self, CheckSatResult::Satisfiable)
    }

    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, CheckSatResult::Unsatisfiable)
    }

    /// One-word description for error context.
    pub fn describe(&self) -> &'static str {
        match self {
            CheckSatResult::Satisfiable => "satisfiable",
            CheckSatResult::Unsatisfiable => "unsatisfiable",
            CheckSatResult::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for CheckSatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckSatResult::Unknown(reason) if !reason.is_empty() => {
                write!(f, "unknown ({reason})")
            }
            other => f.write_str(other.describe()),
        }
    }
}

/// A decoded concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    /// Content of a string literal, escapes resolved.
    Text(String),
    /// A value this layer does not interpret, kept as raw s-expression text.
    Other(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as display text, whatever its variant.
    pub fn as_text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Other(raw) => raw.clone(),
        }
    }
}

/// Mapping from queried names to decoded values, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValueAssignment {
    values: IndexMap<String, Value>,
}

impl ValueAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Typed accessor; `None` when absent or differently typed.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Labels of the assertions (or assumptions) in an unsatisfiable core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnsatCore(Vec<String>);

impl UnsatCore {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A solver-produced proof object, opaque to this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proof(String);

impl Proof {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The solver's current assertions, as raw term text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssertionList(Vec<String>);

impl AssertionList {
    pub fn new(terms: Vec<String>) -> Self {
        Self(terms)
    }

    pub fn terms(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One decoded response, shaped by the command that elicited it.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Write-only command: nothing was read back.
    Ack,
    CheckSat(CheckSatResult),
    Values(ValueAssignment),
    Model(ValueAssignment),
    UnsatCore(UnsatCore),
    UnsatAssumptions(UnsatCore),
    Proof(Proof),
    Assertions(AssertionList),
    Info(Value),
    OptionValue(Value),
    Echo(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_sat_result_predicates() {
        assert!(CheckSatResult::Satisfiable.is_satisfiable());
        assert!(CheckSatResult::Unsatisfiable.is_unsatisfiable());
        let unknown = CheckSatResult::Unknown("timeout".into());
        assert!(!unknown.is_satisfiable());
        assert!(!unknown.is_unsatisfiable());
        assert_eq!(unknown.describe(), "unknown");
    }

    #[test]
    fn assignment_typed_getters() {
        let mut values = ValueAssignment::new();
        values.insert("x", Value::Int(42));
        values.insert("flag", Value::Bool(true));
        values.insert("w", Value::Other("#x0a".into()));

        assert_eq!(values.get_int("x"), Some(42));
        assert_eq!(values.get_bool("flag"), Some(true));
        assert_eq!(values.get_int("flag"), None);
        assert_eq!(values.get_bool("x"), None);
        assert_eq!(values.get_int("missing"), None);
        assert_eq!(values.get("w").map(Value::as_text), Some("#x0a".into()));
    }

    #[test]
    fn assignment_preserves_insertion_order() {
        let mut values = ValueAssignment::new();
        for name in ["z", "a", "m"] {
            values.insert(name, Value::Int(0));
        }
        let names: Vec<&str> = values.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn unsat_core_lookup() {
        let core = UnsatCore::new(vec!["a0".into(), "a2".into()]);
        assert!(core.contains("a0"));
        assert!(!core.contains("a1"));
        assert_eq!(core.len(), 2);
    }

    #[test]
    fn results_serialize_to_json() {
        let json = serde_json::to_string(&CheckSatResult::Unknown("memout".into())).unwrap();
        assert!(json.contains("memout"));

        let mut values = ValueAssignment::new();
        values.insert("x", Value::Int(-3));
        let json = serde_json::to_string(&values).unwrap();
        assert!(json.contains("\"x\""));
    }
}
