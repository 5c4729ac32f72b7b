//! Reactive Primitives
//!
//! This module implements the node types of the reactive system and the
//! runtime that coordinates them.
//!
//! # Concepts
//!
//! ## States
//!
//! A [`State`] is a container for mutable state, the only node kind a
//! caller can write to directly. Reading it inside a tracked computation
//! registers a dependency; writing it marks dependents for recomputation.
//!
//! ## Memos and Tasks
//!
//! A [`Memo`] is a cached synchronous computation; it re-evaluates lazily,
//! on read, and only when one of its sources actually changed value. A
//! [`Task`] is its asynchronous sibling: its computation builds a future,
//! reads never block (they return the last settled value), and a
//! superseded in-flight computation is cancelled and its result discarded.
//!
//! ## Effects, Scopes, Sensors, Slots
//!
//! An [`Effect`] is a side-effecting leaf that runs when its dependencies
//! change, coalesced through the flush scheduler. Scopes
//! ([`create_scope`]) and effects own what is created under them and tear
//! it down depth-first. A [`Sensor`] wraps an external resource that is
//! only active while someone watches it. A [`Slot`] is a fixed
//! subscription point whose backing signal can be swapped without breaking
//! downstream links.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: the runtime keeps a stack of
//! evaluation frames, and reading any node links it to the frame on top.
//! This approach (sometimes called "transparent reactivity") is used by
//! SolidJS, Vue 3, and Leptos. The typed handles in this module are thin
//! `Copy` wrappers over arena IDs; values are stored type-erased in the
//! graph and downcast at the API boundary.

pub(crate) mod context;
mod effect;
mod memo;
pub(crate) mod owner;
pub(crate) mod runtime;
mod sensor;
mod slot;
mod state;
pub(crate) mod task;

pub use effect::Effect;
pub use memo::Memo;
pub use owner::{create_scope, on_cleanup, unown, ScopeHandle};
pub use runtime::{batch, untrack};
pub use sensor::{Sensor, SensorSetter};
pub use slot::{Slot, SlotSource};
pub use state::State;
pub use task::{CancelToken, Task};

use std::any::Any;
use std::rc::Rc;

use crate::graph::node::{AnyValue, EqualsFn, GuardFn};

/// Erase a typed value for arena storage.
pub(crate) fn erase<T: 'static>(value: T) -> AnyValue {
    Rc::new(value)
}

/// Downcast an arena value back to its typed form.
///
/// The type is fixed per node at construction, so a mismatch is a bug in
/// this crate, not a caller error.
pub(crate) fn downcast<T: Clone + 'static>(value: AnyValue) -> T {
    value
        .downcast_ref::<T>()
        .cloned()
        .expect("node value type mismatch")
}

/// Erase a typed equality predicate.
pub(crate) fn erase_equals<T: 'static>(equals: impl Fn(&T, &T) -> bool + 'static) -> EqualsFn {
    Rc::new(move |a: &dyn Any, b: &dyn Any| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => equals(a, b),
            _ => false,
        }
    })
}

/// Erase a typed write validator.
pub(crate) fn erase_guard<T: 'static>(
    guard: impl Fn(&T) -> Result<(), crate::error::Error> + 'static,
) -> GuardFn {
    Rc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
        Some(value) => guard(value),
        None => Err(crate::error::Error::InvalidValue),
    })
}
