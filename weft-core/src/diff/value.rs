//! Dynamic Values
//!
//! The diff engine operates on [`Value`], a dynamic record/array value
//! model independent of the dependency graph. Containers are shared
//! (`Rc<RefCell<..>>`), so values can alias and even reference themselves;
//! the comparison layer detects such cycles instead of recursing forever.
//!
//! Records preserve key insertion order, and only own string keys exist:
//! there is nothing hidden from enumeration.
//!
//! # Opaque values
//!
//! Anything that is not a plain record, list, or scalar — timestamps,
//! compiled patterns, foreign handles — is stored as [`Value::Opaque`] and
//! compared by identity only: two equal-content but distinct instances
//! compare unequal.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// A dynamic record-like value.
#[derive(Clone)]
pub enum Value {
    /// The removal sentinel used in diff deltas; also a valid value.
    Unset,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Record(Rc<RefCell<IndexMap<String, Value>>>),
    /// An opaque reference value, compared by identity only.
    Opaque(Rc<dyn Any>),
}

impl Value {
    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Build a record value. Key order is preserved.
    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )))
    }

    /// Wrap an opaque reference value.
    pub fn opaque(value: Rc<dyn Any>) -> Self {
        Value::Opaque(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value.as_str()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => f.write_str("Unset"),
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            // Containers may be cyclic; print their identity, not their
            // contents.
            Value::List(v) => write!(f, "List(@{:p})", Rc::as_ptr(v)),
            Value::Record(v) => write!(f, "Record(@{:p})", Rc::as_ptr(v)),
            Value::Opaque(v) => write!(f, "Opaque(@{:p})", Rc::as_ptr(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversions() {
        assert!(matches!(Value::from(true), Value::Bool(true)));
        assert!(matches!(Value::from(3), Value::Int(3)));
        assert!(matches!(Value::from(2.5), Value::Float(_)));
        assert!(matches!(Value::from("hi"), Value::Str(_)));
        assert!(Value::Null.is_null());
        assert!(Value::Unset.is_unset());
    }

    #[test]
    fn record_preserves_key_order() {
        let record = Value::record([("z", Value::from(1)), ("a", Value::from(2))]);
        let Value::Record(map) = record else {
            panic!("expected record")
        };
        let keys: Vec<String> = map.borrow().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn debug_of_cyclic_value_terminates() {
        let list = Rc::new(RefCell::new(Vec::new()));
        let value = Value::List(list.clone());
        list.borrow_mut().push(value.clone());
        // Identity-only formatting: no recursion into the cycle.
        let _ = format!("{value:?}");
    }
}
