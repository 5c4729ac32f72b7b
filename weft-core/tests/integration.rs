//! Integration Tests for the Reactive Runtime
//!
//! These tests verify the cross-cutting guarantees of the engine: glitch-
//! free propagation across shared dependencies, batch coalescing, async
//! supersession, ownership teardown, and the diff engine's delta shape.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_core::{
    batch, create_scope, diff, is_equal, on_cleanup, unown, Effect, Error, Memo, Sensor, Slot,
    State, Task, Value,
};

/// One write through a diamond (two memos sharing a source, one sink
/// reading both) recomputes the tail exactly once.
#[test]
fn diamond_recomputes_tail_once_per_write() {
    let tail_runs = Rc::new(Cell::new(0));
    let x = State::new(1);

    let a = Memo::new(move || x.get());
    let b = Memo::new(move || x.get());
    let tail = Memo::new({
        let tail_runs = tail_runs.clone();
        move || {
            tail_runs.set(tail_runs.get() + 1);
            a.get().unwrap() + b.get().unwrap()
        }
    });

    assert_eq!(tail.get().unwrap(), 2);
    assert_eq!(tail_runs.get(), 1);

    x.set(5).unwrap();
    assert_eq!(tail.get().unwrap(), 10);
    assert_eq!(tail_runs.get(), 2);
}

/// The diamond guarantee holds at any depth: a tower of diamonds still
/// recomputes each layer once per write.
#[test]
fn stacked_diamonds_recompute_each_layer_once() {
    let total_runs = Rc::new(Cell::new(0));
    let x = State::new(1_i64);

    let mut tip = Memo::new(move || x.get());
    for _ in 0..4 {
        let left = {
            let prev = tip;
            Memo::new(move || prev.get().unwrap())
        };
        let right = {
            let prev = tip;
            Memo::new(move || prev.get().unwrap())
        };
        tip = Memo::new({
            let total_runs = total_runs.clone();
            move || {
                total_runs.set(total_runs.get() + 1);
                left.get().unwrap().max(right.get().unwrap())
            }
        });
    }

    assert_eq!(tip.get().unwrap(), 1);
    assert_eq!(total_runs.get(), 4);

    x.set(2).unwrap();
    assert_eq!(tip.get().unwrap(), 2);
    // Each of the four joining layers ran exactly once more.
    assert_eq!(total_runs.get(), 8);
}

/// An effect wired through a diamond runs once per flush, not once per
/// path.
#[test]
fn diamond_effect_runs_once_per_write() {
    let effect_runs = Rc::new(Cell::new(0));
    let x = State::new(1);

    let a = Memo::new(move || x.get() + 1);
    let b = Memo::new(move || x.get() + 2);
    let _effect = Effect::new({
        let effect_runs = effect_runs.clone();
        move || {
            a.get().unwrap();
            b.get().unwrap();
            effect_runs.set(effect_runs.get() + 1);
        }
    });
    assert_eq!(effect_runs.get(), 1);

    x.set(7).unwrap();
    assert_eq!(effect_runs.get(), 2);
}

/// Ten writes inside a batch flush once: the effect runs exactly twice
/// across the whole program and observes only the final value.
#[test]
fn batch_coalesces_writes_into_one_flush() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let count = State::new(0);

    let _effect = Effect::new({
        let seen = seen.clone();
        move || seen.borrow_mut().push(count.get())
    });

    batch(|| {
        for i in 1..=10 {
            count.set(i).unwrap();
        }
    });

    assert_eq!(*seen.borrow(), vec![0, 10]);
}

/// Nested batches are transparent: only the outermost exit flushes.
#[test]
fn nested_batches_flush_once() {
    let runs = Rc::new(Cell::new(0));
    let a = State::new(0);
    let b = State::new(0);

    let _effect = Effect::new({
        let runs = runs.clone();
        move || {
            a.get();
            b.get();
            runs.set(runs.get() + 1);
        }
    });
    assert_eq!(runs.get(), 1);

    batch(|| {
        a.set(1).unwrap();
        batch(|| {
            b.set(1).unwrap();
        });
        a.set(2).unwrap();
    });
    assert_eq!(runs.get(), 2);
}

/// Writes that settle back to an equal value propagate nothing.
#[test]
fn equality_bailout_stops_propagation() {
    let runs = Rc::new(Cell::new(0));
    let x = State::new(2);

    let parity = Memo::new(move || x.get() % 2);
    let _effect = Effect::new({
        let runs = runs.clone();
        move || {
            parity.get().unwrap();
            runs.set(runs.get() + 1);
        }
    });
    assert_eq!(runs.get(), 1);

    // Parity unchanged: the memo recomputes, the effect must not.
    x.set(4).unwrap();
    assert_eq!(runs.get(), 1);

    x.set(5).unwrap();
    assert_eq!(runs.get(), 2);
}

/// A task superseded by rapid writes applies exactly one result: the one
/// computed from the last input.
#[tokio::test]
async fn task_supersession_applies_last_input_only() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let inputs_seen = Rc::new(RefCell::new(Vec::new()));
            let applied = Rc::new(RefCell::new(Vec::new()));
            let input = State::new(0);

            let task = Task::new(-1, {
                let inputs_seen = inputs_seen.clone();
                move |_token| {
                    let v = input.get();
                    inputs_seen.borrow_mut().push(v);
                    async move {
                        tokio::task::yield_now().await;
                        v * 100
                    }
                }
            });

            let _watcher = Effect::new({
                let applied = applied.clone();
                move || applied.borrow_mut().push(task.get().unwrap_or(-1))
            });

            // Three writes before anything settles.
            input.set(1).unwrap();
            input.set(2).unwrap();
            input.set(3).unwrap();

            for _ in 0..8 {
                tokio::task::yield_now().await;
            }

            // The computation ran once per distinct input...
            assert_eq!(*inputs_seen.borrow(), vec![0, 1, 2, 3]);
            // ...but only the last input's result ever applied.
            assert_eq!(task.get().unwrap(), 300);
            assert_eq!(*applied.borrow(), vec![-1, 300]);
        })
        .await;
}

/// Two watchers of one sensor share one activation; the stop hook runs
/// only after both watchers are gone.
#[test]
fn sensor_activation_is_ref_counted() {
    let starts = Rc::new(Cell::new(0));
    let stops = Rc::new(Cell::new(0));

    let sensor = Sensor::new(0, {
        let starts = starts.clone();
        let stops = stops.clone();
        move |_setter| {
            starts.set(starts.get() + 1);
            let stops = stops.clone();
            move || stops.set(stops.get() + 1)
        }
    });

    let first = Effect::new(move || {
        sensor.get();
    });
    let second = Effect::new(move || {
        sensor.get();
    });
    assert_eq!((starts.get(), stops.get()), (1, 0));

    first.dispose();
    assert_eq!((starts.get(), stops.get()), (1, 0));

    second.dispose();
    assert_eq!((starts.get(), stops.get()), (1, 1));
}

/// Disposing a scope tears down its effects and runs cleanups depth-first,
/// cleanups before children.
#[test]
fn scope_disposal_is_ordered_and_complete() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let count = State::new(0);
    let runs = Rc::new(Cell::new(0));

    let (_, scope) = create_scope({
        let order = order.clone();
        let runs = runs.clone();
        move || {
            on_cleanup({
                let order = order.clone();
                move || order.borrow_mut().push("scope cleanup")
            });
            let _effect = Effect::new({
                let order = order.clone();
                let runs = runs.clone();
                move || {
                    count.get();
                    runs.set(runs.get() + 1);
                    on_cleanup({
                        let order = order.clone();
                        move || order.borrow_mut().push("effect cleanup")
                    });
                }
            });
        }
    });
    assert_eq!(runs.get(), 1);

    scope.dispose();
    assert_eq!(*order.borrow(), vec!["scope cleanup", "effect cleanup"]);

    // The effect is dead: further writes do nothing.
    count.set(5).unwrap();
    assert_eq!(runs.get(), 1);
}

/// `unown` detaches creations from the enclosing scope but still returns
/// their disposers.
#[test]
fn unown_survives_enclosing_disposal() {
    let runs = Rc::new(Cell::new(0));
    let count = State::new(0);

    let mut detached = None;
    let (_, scope) = create_scope(|| {
        detached = Some(unown(|| {
            Effect::new({
                let runs = runs.clone();
                move || {
                    count.get();
                    runs.set(runs.get() + 1);
                }
            })
        }));
    });

    scope.dispose();

    // The detached effect still reacts after the scope died.
    count.set(1).unwrap();
    assert_eq!(runs.get(), 2);

    detached.expect("created").dispose();
    count.set(2).unwrap();
    assert_eq!(runs.get(), 2);
}

/// A slot keeps its downstream subscription across `replace`.
#[test]
fn slot_replace_reroutes_downstream() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let first = State::new(1);
    let second = State::new(100);
    let slot = Slot::of(first);

    let _effect = Effect::new({
        let seen = seen.clone();
        move || seen.borrow_mut().push(slot.get().unwrap_or(-1))
    });

    slot.replace(second);
    second.set(200).unwrap();
    first.set(2).unwrap();

    assert_eq!(*seen.borrow(), vec![1, 100, 200]);
}

/// diff(o, o) is empty for any record or list, shared or structurally
/// identical.
#[test]
fn diff_identity_is_empty() {
    let record = Value::record([
        ("name", Value::from("weft")),
        ("tags", Value::list([Value::from("a"), Value::from("b")])),
        ("size", Value::from(3)),
    ]);
    let delta = diff(&record, &record.clone()).unwrap();
    assert!(!delta.changed);

    let list = Value::list([Value::from(1), Value::from(2)]);
    let twin = Value::list([Value::from(1), Value::from(2)]);
    let delta = diff(&list, &twin).unwrap();
    assert!(!delta.changed);
    assert!(delta.add.is_empty() && delta.change.is_empty() && delta.remove.is_empty());
}

/// The canonical delta shape: add / change / remove split with the unset
/// sentinel marking removals.
#[test]
fn diff_delta_shape() {
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
    assert!(matches!(delta.add.get("d"), Some(Value::Str(s)) if &**s == "new"));
    assert!(matches!(delta.change.get("a"), Some(Value::Int(2))));
    assert!(matches!(delta.remove.get("b"), Some(Value::Unset)));
    assert_eq!(
        (delta.add.len(), delta.change.len(), delta.remove.len()),
        (1, 1, 1)
    );
}

/// Both diff and is_equal refuse self-referencing structures with the
/// circular-dependency error instead of overflowing.
#[test]
fn diff_and_is_equal_detect_cycles() {
    let make_cyclic = || {
        let value = Value::record([("me", Value::Null)]);
        if let Value::Record(map) = value.clone() {
            map.borrow_mut().insert("me".to_string(), value.clone());
        }
        value
    };

    let a = make_cyclic();
    let b = make_cyclic();

    assert_eq!(is_equal(&a, &b), Err(Error::Cycle("value")));
    assert_eq!(diff(&a, &b).unwrap_err(), Error::Cycle("value"));
}

/// A failing memo re-raises its cached error to every reader until a
/// source change lets it recover; unrelated sinks are unaffected.
#[test]
fn computation_errors_stay_local_and_recover() {
    let input = State::new(0);

    let failing = Memo::fallible(move || {
        let v = input.get();
        if v == 0 {
            Err(Error::computation("empty input"))
        } else {
            Ok(v * 2)
        }
    });

    // A sibling sink reading the same source is unaffected.
    let sibling = Memo::new(move || input.get() + 1);

    assert!(failing.get().is_err());
    assert_eq!(sibling.get().unwrap(), 1);

    // A reader that guards the failing dependency recovers on its own.
    let guarded = Memo::new(move || failing.get().unwrap_or(-1));
    assert_eq!(guarded.get().unwrap(), -1);

    input.set(3).unwrap();
    assert_eq!(failing.get().unwrap(), 6);
    assert_eq!(guarded.get().unwrap(), 6);
    assert_eq!(sibling.get().unwrap(), 4);
}
