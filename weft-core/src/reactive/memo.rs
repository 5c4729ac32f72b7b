//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the
//!    result, linking every source it reads.
//!
//! 2. When a source changes, the memo is flagged by push-propagation but
//!    nothing runs: memos are lazy.
//!
//! 3. On the next access, the memo refreshes its sources and compares
//!    their versions against the versions it last saw. Only a real value
//!    change triggers recomputation.
//!
//! 4. A recomputation whose result equals the previous one keeps the old
//!    value, so downstream sinks bail out of their own recomputation.
//!
//! # Errors
//!
//! [`Memo::get`] surfaces two failure classes: a circular dependency
//! (reading the memo from inside its own computation) and a cached
//! computation failure from [`Memo::fallible`], which is re-raised from
//! every read until a source change triggers a real recomputation.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::Error;
use crate::graph::node::{AnyValue, Computation, EqualsFn, Node, NodeId, NodeKind};
use crate::reactive::{downcast, erase, erase_equals, runtime};

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let count = State::new(2);
/// let doubled = Memo::new(move || count.get() * 2);
/// assert_eq!(doubled.get()?, 4);
/// ```
pub struct Memo<T: 'static> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + PartialEq + 'static> Memo<T> {
    /// Create a memo. The computation does not run until first access.
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self::build(move || Ok(erase(f())), erase_equals(|a: &T, b: &T| a == b))
    }

    /// Create a memo whose computation can fail. The error is cached on
    /// the node and re-raised from every read until the memo recomputes.
    pub fn fallible(f: impl Fn() -> Result<T, Error> + 'static) -> Self {
        Self::build(
            move || f().map(erase),
            erase_equals(|a: &T, b: &T| a == b),
        )
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Create a memo with a custom result equality function.
    pub fn with_equals(
        f: impl Fn() -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        Self::build(move || Ok(erase(f())), erase_equals(equals))
    }

    fn build(f: impl Fn() -> Result<AnyValue, Error> + 'static, equals: EqualsFn) -> Self {
        let mut node = Node::new(NodeKind::Memo);
        node.compute = Some(Computation::Sync(Rc::new(f)));
        node.equals = Some(equals);
        Self {
            id: runtime::create_node(node, None),
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Get the memo's value, recomputing if a source actually changed.
    ///
    /// Registers a dependency when called inside a tracked computation.
    pub fn get(&self) -> Result<T, Error> {
        runtime::read(self.id).map(downcast)
    }

    /// Get the memo's value without registering a dependency. Still
    /// refreshes, so the value is current.
    pub fn get_untracked(&self) -> Result<T, Error> {
        runtime::peek(self.id).map(downcast)
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Memo<T> {}
