//! Reconciliation Deltas
//!
//! [`diff`] computes the minimal add/change/remove delta between two
//! record-like values. Higher layers apply these deltas to keep derived
//! collections and listeners in sync with minimal work.
//!
//! # Normalization
//!
//! Lists are normalized to index-keyed records ("0", "1", ...), so one
//! delta shape covers both. Inputs that are neither records nor lists
//! degrade gracefully instead of erroring: a non-keyed side contributes an
//! empty key set, which means everything on the other side becomes an
//! addition or a removal, and two non-keyed inputs always report no
//! change. This "no crash, minimal information" policy is deliberate.

use indexmap::IndexMap;

use crate::error::Error;

use super::equal::is_equal;
use super::value::Value;

/// The delta between two record-like values.
///
/// Removed keys map to the [`Value::Unset`] sentinel.
#[derive(Debug, Default)]
pub struct Delta {
    /// Whether any of the three maps is non-empty.
    pub changed: bool,
    /// Keys present only in the new value.
    pub add: IndexMap<String, Value>,
    /// Keys present in both whose values differ.
    pub change: IndexMap<String, Value>,
    /// Keys present only in the old value, mapped to [`Value::Unset`].
    pub remove: IndexMap<String, Value>,
}

/// Snapshot a value's own enumerable entries. Non-keyed values contribute
/// nothing.
fn entries(value: &Value) -> IndexMap<String, Value> {
    match value {
        Value::Record(map) => map.borrow().clone(),
        Value::List(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item.clone()))
            .collect(),
        _ => IndexMap::new(),
    }
}

/// Compute the add/change/remove delta from `old` to `new`.
///
/// Raises [`Error::Cycle`] only when a per-key comparison descends into a
/// self-referencing structure; shape mismatches never error.
pub fn diff(old: &Value, new: &Value) -> Result<Delta, Error> {
    let old_entries = entries(old);
    let new_entries = entries(new);

    let mut delta = Delta::default();

    for (key, new_value) in &new_entries {
        match old_entries.get(key) {
            None => {
                delta.add.insert(key.clone(), new_value.clone());
            }
            Some(old_value) => {
                if !is_equal(old_value, new_value)? {
                    delta.change.insert(key.clone(), new_value.clone());
                }
            }
        }
    }

    for key in old_entries.keys() {
        if !new_entries.contains_key(key) {
            delta.remove.insert(key.clone(), Value::Unset);
        }
    }

    delta.changed =
        !delta.add.is_empty() || !delta.change.is_empty() || !delta.remove.is_empty();
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn identical_records_yield_an_empty_delta() {
        let record = Value::record([
            ("a", Value::from(1)),
            ("b", Value::from("hello")),
        ]);

        // Same reference.
        let delta = diff(&record, &record.clone()).unwrap();
        assert!(!delta.changed);
        assert!(delta.add.is_empty() && delta.change.is_empty() && delta.remove.is_empty());

        // Structurally identical.
        let twin = Value::record([
            ("a", Value::from(1)),
            ("b", Value::from("hello")),
        ]);
        let delta = diff(&record, &twin).unwrap();
        assert!(!delta.changed);
    }

    #[test]
    fn delta_splits_add_change_remove() {
        let old = Value::record([
            ("a", Value::from(1)),
            ("b", Value::from("hello")),
            ("c", Value::from(true)),
        ]);
        let new = Value::record([
            ("a", Value::from(2)),
            ("d", Value::from("new")),
            ("c", Value::from(true)),
        ]);

        let delta = diff(&old, &new).unwrap();
        assert!(delta.changed);

        assert_eq!(delta.add.len(), 1);
        assert!(matches!(delta.add.get("d"), Some(Value::Str(s)) if &**s == "new"));

        assert_eq!(delta.change.len(), 1);
        assert!(matches!(delta.change.get("a"), Some(Value::Int(2))));

        assert_eq!(delta.remove.len(), 1);
        assert!(matches!(delta.remove.get("b"), Some(Value::Unset)));
    }

    #[test]
    fn lists_diff_by_index() {
        let old = Value::list([Value::from(1), Value::from(2), Value::from(3)]);
        let new = Value::list([Value::from(1), Value::from(9)]);

        let delta = diff(&old, &new).unwrap();
        assert!(delta.changed);
        assert!(delta.add.is_empty());
        assert!(matches!(delta.change.get("1"), Some(Value::Int(9))));
        assert!(matches!(delta.remove.get("2"), Some(Value::Unset)));
    }

    #[test]
    fn non_keyed_old_value_makes_everything_an_addition() {
        let new = Value::record([("a", Value::from(1))]);

        let delta = diff(&Value::from(5), &new).unwrap();
        assert!(delta.changed);
        assert_eq!(delta.add.len(), 1);
        assert!(delta.change.is_empty() && delta.remove.is_empty());
    }

    #[test]
    fn non_keyed_new_value_makes_everything_a_removal() {
        let old = Value::record([("a", Value::from(1))]);

        let delta = diff(&old, &Value::Null).unwrap();
        assert!(delta.changed);
        assert_eq!(delta.remove.len(), 1);
        assert!(delta.add.is_empty() && delta.change.is_empty());
    }

    #[test]
    fn two_non_keyed_inputs_report_no_change() {
        // Identical scalars: no change.
        assert!(!diff(&Value::from(1), &Value::from(1)).unwrap().changed);
        // Different scalars contribute no keys either: still no change.
        assert!(!diff(&Value::from(1), &Value::from(2)).unwrap().changed);
    }

    #[test]
    fn self_referencing_inputs_raise_a_cycle() {
        let make_cyclic = || {
            let map = Rc::new(RefCell::new(indexmap::IndexMap::new()));
            let value = Value::Record(map.clone());
            map.borrow_mut().insert("me".to_string(), value.clone());
            value
        };

        assert_eq!(
            diff(&make_cyclic(), &make_cyclic()).unwrap_err(),
            Error::Cycle("value")
        );
    }

    #[test]
    fn diff_of_cyclic_value_with_itself_is_empty() {
        let map = Rc::new(RefCell::new(indexmap::IndexMap::new()));
        let value = Value::Record(map.clone());
        map.borrow_mut().insert("me".to_string(), value.clone());

        // Per-key comparison hits the shared allocation fast path.
        let delta = diff(&value, &value.clone()).unwrap();
        assert!(!delta.changed);
    }
}
