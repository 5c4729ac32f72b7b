//! Weft Core
//!
//! This crate provides the core runtime for the Weft fine-grained
//! reactive system. It implements:
//!
//! - Reactive primitives (states, memos, tasks, effects, sensors, slots)
//! - The dependency graph engine: edge tracking, dirty propagation,
//!   pull-based recomputation, batching and flushing
//! - Ownership-scoped cleanup
//! - The structural diff/equality engine for record-like values
//!
//! It is the substrate a UI or data-flow layer is built on, not a UI layer
//! itself.
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `graph`: the node/edge arena, flag propagation, and the flush
//!   scheduler
//! - `reactive`: the typed node handles and the runtime that coordinates
//!   them
//! - `diff`: structural equality and add/change/remove deltas, independent
//!   of the graph
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{batch, Effect, Memo, State};
//!
//! let count = State::new(0);
//! let doubled = Memo::new(move || count.get() * 2);
//!
//! Effect::new(move || {
//!     println!("count: {}, doubled: {}", count.get(), doubled.get().unwrap());
//! });
//!
//! batch(|| {
//!     count.set(1).unwrap();
//!     count.set(2).unwrap();
//! });
//! // The effect ran twice in total: once at creation, once after the
//! // batch, observing the final value only.
//! ```
//!
//! # Threading
//!
//! Evaluation is single-threaded and cooperative: the runtime lives in a
//! thread-local, reads and writes never suspend, and the only concurrent
//! work is a task's future body, which re-enters the graph solely through
//! its settlement on the same thread.

pub mod diff;
pub mod graph;
pub mod reactive;

mod error;

pub use diff::{diff, is_equal, Delta, Value};
pub use error::Error;
pub use graph::NodeKind;
pub use reactive::{
    batch, create_scope, on_cleanup, unown, untrack, CancelToken, Effect, Memo, ScopeHandle,
    Sensor, SensorSetter, Slot, SlotSource, State, Task,
};
