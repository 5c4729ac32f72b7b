//! Structural Equality
//!
//! [`is_equal`] compares two [`Value`]s:
//!
//! - Scalars use SameValue semantics: NaN is equal to itself, and `+0.0`
//!   is distinct from `-0.0` (bit comparison).
//! - Lists compare by length and positional recursion; records by key-set
//!   equality and per-key recursion. Two containers that are the same
//!   allocation short-circuit to equal.
//! - Opaque values compare by identity only.
//!
//! # Cycle detection
//!
//! Self-referencing structures are detected with a per-call set of raw
//! pointer pairs along the current descent path. Hitting a pair twice
//! raises [`Error::Cycle`] instead of recursing forever. The set stores
//! addresses, never clones, so it does not extend any value's lifetime,
//! and it dies with the call: independent comparisons never interfere.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::Error;

use super::value::Value;

/// Pointer pair identifying one in-progress container comparison.
type PathPair = (usize, usize);

/// Structural equality over record-like values.
///
/// Raises [`Error::Cycle`] when either side reaches itself again along
/// the same descent path.
pub fn is_equal(a: &Value, b: &Value) -> Result<bool, Error> {
    let mut path = HashSet::new();
    eq_inner(a, b, &mut path)
}

fn eq_inner(a: &Value, b: &Value, path: &mut HashSet<PathPair>) -> Result<bool, Error> {
    match (a, b) {
        (Value::Unset, Value::Unset) | (Value::Null, Value::Null) => Ok(true),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        // SameValue: NaN equals NaN, +0.0 differs from -0.0.
        (Value::Float(x), Value::Float(y)) => {
            Ok((x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits())
        }
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(true);
            }
            let pair = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
            if !path.insert(pair) {
                return Err(Error::Cycle("value"));
            }
            let result = (|| {
                let (x, y) = (x.borrow(), y.borrow());
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (xv, yv) in x.iter().zip(y.iter()) {
                    if !eq_inner(xv, yv, path)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })();
            path.remove(&pair);
            result
        }
        (Value::Record(x), Value::Record(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(true);
            }
            let pair = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
            if !path.insert(pair) {
                return Err(Error::Cycle("value"));
            }
            let result = (|| {
                let (x, y) = (x.borrow(), y.borrow());
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (key, xv) in x.iter() {
                    let Some(yv) = y.get(key) else {
                        return Ok(false);
                    };
                    if !eq_inner(xv, yv, path)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })();
            path.remove(&pair);
            result
        }
        (Value::Opaque(x), Value::Opaque(y)) => Ok(Rc::ptr_eq(x, y)),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn scalars_use_same_value_semantics() {
        assert!(is_equal(&Value::from(1), &Value::from(1)).unwrap());
        assert!(!is_equal(&Value::from(1), &Value::from(2)).unwrap());

        // NaN is equal to itself.
        assert!(is_equal(&Value::from(f64::NAN), &Value::from(f64::NAN)).unwrap());
        // Signed zeros are distinct.
        assert!(!is_equal(&Value::from(0.0), &Value::from(-0.0)).unwrap());

        assert!(is_equal(&Value::Null, &Value::Null).unwrap());
        assert!(!is_equal(&Value::Null, &Value::from(0)).unwrap());
    }

    #[test]
    fn lists_compare_length_and_positions() {
        let a = Value::list([Value::from(1), Value::from(2)]);
        let b = Value::list([Value::from(1), Value::from(2)]);
        let c = Value::list([Value::from(2), Value::from(1)]);
        let d = Value::list([Value::from(1)]);

        assert!(is_equal(&a, &b).unwrap());
        assert!(!is_equal(&a, &c).unwrap());
        assert!(!is_equal(&a, &d).unwrap());
    }

    #[test]
    fn records_compare_key_sets_and_values() {
        let a = Value::record([("x", Value::from(1)), ("y", Value::from(2))]);
        // Key order does not matter, membership does.
        let b = Value::record([("y", Value::from(2)), ("x", Value::from(1))]);
        let c = Value::record([("x", Value::from(1)), ("z", Value::from(2))]);

        assert!(is_equal(&a, &b).unwrap());
        assert!(!is_equal(&a, &c).unwrap());
    }

    #[test]
    fn nested_structures_recurse() {
        let a = Value::record([("items", Value::list([Value::from("a"), Value::from("b")]))]);
        let b = Value::record([("items", Value::list([Value::from("a"), Value::from("b")]))]);
        let c = Value::record([("items", Value::list([Value::from("a"), Value::from("c")]))]);

        assert!(is_equal(&a, &b).unwrap());
        assert!(!is_equal(&a, &c).unwrap());
    }

    #[test]
    fn opaque_values_compare_by_identity() {
        let one = Rc::new("2026-08-06T00:00:00Z".to_string());
        let twin = Rc::new("2026-08-06T00:00:00Z".to_string());

        let a = Value::opaque(one.clone());
        let b = Value::opaque(one);
        let c = Value::opaque(twin);

        assert!(is_equal(&a, &b).unwrap());
        // Equal content, distinct instance: unequal.
        assert!(!is_equal(&a, &c).unwrap());
    }

    #[test]
    fn shared_container_short_circuits() {
        let shared = Value::list([Value::from(1)]);
        assert!(is_equal(&shared, &shared.clone()).unwrap());
    }

    #[test]
    fn self_referencing_values_raise_a_cycle() {
        let make_cyclic = || {
            let map = Rc::new(RefCell::new(indexmap::IndexMap::new()));
            let value = Value::Record(map.clone());
            map.borrow_mut().insert("me".to_string(), value.clone());
            value
        };

        let a = make_cyclic();
        let b = make_cyclic();
        assert_eq!(is_equal(&a, &b), Err(Error::Cycle("value")));

        // The path set is per call: a fresh comparison still works.
        assert!(is_equal(&Value::from(1), &Value::from(1)).unwrap());
    }

    #[test]
    fn cycle_against_finite_structure_terminates() {
        let list = Rc::new(RefCell::new(Vec::new()));
        let cyclic = Value::List(list.clone());
        list.borrow_mut().push(cyclic.clone());

        let finite = Value::list([Value::list([Value::from(1)])]);
        // Depth is bounded by the finite side; no error, just unequal.
        assert!(!is_equal(&cyclic, &finite).unwrap());
    }
}
