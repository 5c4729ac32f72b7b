//! State Implementation
//!
//! A State is the fundamental writable primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How States Work
//!
//! 1. When a state is read within a tracked computation (memo, task,
//!    effect), the read links the state to that computation.
//!
//! 2. When the state's value changes, a dirty flag is propagated to every
//!    transitive dependent, and due effects are queued for the next flush.
//!
//! 3. A write whose value equals the current one (under the state's
//!    equality function) is a no-op: nothing propagates.
//!
//! # Handles
//!
//! `State<T>` is a `Copy` handle over an arena node. Cloning the handle
//! shares the underlying cell. The node lives until the owner it was
//! created under is disposed; reading through a handle after that panics,
//! while [`State::try_get`] returns `None`.

use std::marker::PhantomData;

use crate::diff::Value;
use crate::error::Error;
use crate::graph::node::{Node, NodeId, NodeKind};
use crate::reactive::{downcast, erase, erase_equals, erase_guard, runtime};

/// A reactive value cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = State::new(0);
///
/// // Read the value (tracked inside computations).
/// let value = count.get();
///
/// // Update the value (notifies dependents).
/// count.set(5)?;
/// ```
pub struct State<T: 'static> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + PartialEq + 'static> State<T> {
    /// Create a state with the given initial value, compared with
    /// `PartialEq` on writes.
    pub fn new(value: T) -> Self {
        Self::with_equals(value, |a, b| a == b)
    }

    /// Create a state whose writes are validated by `guard`.
    ///
    /// The initial value is validated here: a rejection raises
    /// [`Error::InvalidValue`] at this call and nothing enters the graph.
    pub fn guarded(value: T, guard: impl Fn(&T) -> bool + 'static) -> Result<Self, Error> {
        if !guard(&value) {
            return Err(Error::InvalidValue);
        }
        let mut node = Self::node(value, |a: &T, b: &T| a == b);
        node.guard = Some(erase_guard(move |v: &T| {
            if guard(v) {
                Ok(())
            } else {
                Err(Error::InvalidValue)
            }
        }));
        Ok(Self::from_node(node))
    }
}

impl<T: Clone + 'static> State<T> {
    /// Create a state with a custom equality function, for value types
    /// without a usable `PartialEq`.
    pub fn with_equals(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self::from_node(Self::node(value, equals))
    }

    fn node(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Node {
        let mut node = Node::new(NodeKind::State);
        node.value = Some(erase(value));
        node.equals = Some(erase_equals(equals));
        node
    }

    fn from_node(node: Node) -> Self {
        Self {
            id: runtime::create_node(node, None),
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, registering a dependency when called inside
    /// a tracked computation.
    ///
    /// # Panics
    ///
    /// Panics if the state's owner has been disposed. Use [`State::try_get`]
    /// for a non-panicking read.
    pub fn get(&self) -> T {
        match runtime::read(self.id) {
            Ok(value) => downcast(value),
            Err(_) => panic!("state read after its owner was disposed"),
        }
    }

    /// Get the current value, or `None` if the state has been disposed.
    pub fn try_get(&self) -> Option<T> {
        runtime::read(self.id).ok().map(downcast)
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        match runtime::peek(self.id) {
            Ok(value) => downcast(value),
            Err(_) => panic!("state read after its owner was disposed"),
        }
    }

    /// Set a new value and notify dependents.
    ///
    /// A value equal to the current one (under the state's equality
    /// function) is a no-op. A guarded state raises the guard's error and
    /// leaves the current value in place.
    pub fn set(&self, value: T) -> Result<(), Error> {
        runtime::write(self.id, erase(value))
    }

    /// Update the value through a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), Error> {
        let next = f(&self.get_untracked());
        self.set(next)
    }
}

impl State<Value> {
    /// A dynamic-value state that rejects [`Value::Null`] at construction
    /// and on every write, raising [`Error::NullValue`].
    pub fn non_null(value: Value) -> Result<Self, Error> {
        if value.is_null() {
            return Err(Error::NullValue);
        }
        let mut node = Self::node(value, |a: &Value, b: &Value| {
            crate::diff::is_equal(a, b).unwrap_or(false)
        });
        node.guard = Some(erase_guard(|v: &Value| {
            if v.is_null() {
                Err(Error::NullValue)
            } else {
                Ok(())
            }
        }));
        Ok(Self::from_node(node))
    }
}

impl<T: 'static> Clone for State<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for State<T> {}

impl<T: Clone + std::fmt::Debug + 'static> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("value", &self.try_get())
            .finish()
    }
}
