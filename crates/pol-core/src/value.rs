//! Dynamically typed policy values.

use std::cmp::Ordering;
use std::fmt;

use pol_common::ValueKind;

use crate::policy::Policy;

/// An unresolved pointer to another policy file.
///
/// The reference string is kept verbatim (plain path, URN, or an
/// `@`-marked indirection). Resolving it is an explicit step performed by a
/// resolver, which replaces the value in place with the loaded [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileReference {
    reference: String,
}

impl FileReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// The reference string as written.
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}

/// A single value stored in a policy.
///
/// `Undefined` is the "no value" sentinel: it is returned by conversions that
/// have nothing to offer but can never be stored in a [`Policy`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Policy(Policy),
    File(FileReference),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Policy(_) => ValueKind::Policy,
            Value::File(_) => ValueKind::FileReference,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_policy(&self) -> Option<&Policy> {
        match self {
            Value::Policy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_policy_mut(&mut self) -> Option<&mut Policy> {
        match self {
            Value::Policy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileReference> {
        match self {
            Value::File(f) => Some(f),
            _ => None,
        }
    }

    /// Order two values of the same kind.
    ///
    /// Strings compare lexically and policies by their number of top-level
    /// names. Values of different kinds, file references, and NaN doubles
    /// are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Policy(a), Value::Policy(b)) => {
                Some(a.name_count(true).cmp(&b.name_count(true)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("<undefined>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Policy(p) => write!(f, "<Policy: {} names>", p.name_count(true)),
            Value::File(r) => write!(f, "<PolicyFile: {r}>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Policy> for Value {
    fn from(p: Policy) -> Self {
        Value::Policy(p)
    }
}

impl From<FileReference> for Value {
    fn from(r: FileReference) -> Self {
        Value::File(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(Value::from(true).kind(), ValueKind::Bool);
        assert_eq!(Value::from(3).kind(), ValueKind::Int);
        assert_eq!(Value::from(3.5).kind(), ValueKind::Double);
        assert_eq!(Value::from("x").kind(), ValueKind::String);
        assert_eq!(Value::from(Policy::new()).kind(), ValueKind::Policy);
        assert_eq!(
            Value::from(FileReference::new("a.paf")).kind(),
            ValueKind::FileReference
        );
        assert!(Value::default().is_undefined());
    }

    #[test]
    fn compare_same_kind_only() {
        assert_eq!(Value::from(1).compare(&Value::from(2)), Some(Ordering::Less));
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::from(1).compare(&Value::from(1.0)), None);
        assert_eq!(Value::from(f64::NAN).compare(&Value::from(0.0)), None);
        let r = Value::from(FileReference::new("x"));
        assert_eq!(r.compare(&r), None);
    }

    #[test]
    fn policies_compare_by_name_count() {
        let mut small = Policy::new();
        small.set("a", 1).unwrap();
        let mut big = Policy::new();
        big.set("a", 1).unwrap();
        big.set("b", 2).unwrap();
        assert_eq!(
            Value::from(small).compare(&Value::from(big)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(Value::from("debug").to_string(), "\"debug\"");
        assert_eq!(Value::from(-5).to_string(), "-5");
        assert_eq!(
            Value::from(FileReference::new("@pkg:file.paf")).to_string(),
            "<PolicyFile: @pkg:file.paf>"
        );
    }
}
