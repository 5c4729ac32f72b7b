//! The single public error type for the crate.
//!
//! Every fallible operation in the graph, reactive, and diff layers surfaces
//! failures through [`Error`]. All errors are raised synchronously at the
//! triggering call and never leave the graph in a state needing repair.

use std::rc::Rc;

use thiserror::Error;

/// The single public error enum (spec §9).
///
/// `Clone + PartialEq` so callers and tests can compare error values
/// directly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A cycle was detected while descending into a value or recomputing a
    /// node. The payload names the kind of cycle (`"value"`, `"memo"`, …).
    #[error("cycle detected in {0}")]
    Cycle(&'static str),

    /// A write was rejected by a state's validation guard.
    #[error("invalid value")]
    InvalidValue,

    /// A null value was written to, or read from, a non-null state.
    #[error("null value")]
    NullValue,

    /// A value was read before it was set, or a slot was accessed while empty.
    #[error("value is unset")]
    Unset,

    /// A write was attempted through a read-only backing (memo, task, sensor).
    #[error("write to read-only value")]
    ReadOnlyWrite,

    /// A computation (memo body or task future) failed with a message.
    #[error("computation failed: {0}")]
    Computation(Rc<str>),
}

impl Error {
    /// Construct a [`Error::Computation`] from any string-like message.
    pub fn computation(msg: impl Into<Rc<str>>) -> Self {
        Error::Computation(msg.into())
    }
}
