//! Slot Implementation
//!
//! A Slot is a fixed subscription point that delegates to a swappable
//! backing signal. Downstream sinks subscribe to the slot once; replacing
//! the backing signal re-routes them without breaking a single edge.
//!
//! # Composition
//!
//! The slot is built from two existing primitives: a backing cell holding
//! the current [`SlotSource`] (compared by node identity, so replacing a
//! signal with itself is a no-op) and a view memo that reads through it.
//! Swapping the backing cell dirties the view; its next evaluation links
//! the new source and trims the edge to the old one.
//!
//! # Errors
//!
//! - Reading an empty slot raises [`Error::Unset`], cached on the view
//!   until a backing signal is installed.
//! - Writing through a backing that is not a [`State`] raises
//!   [`Error::ReadOnlyWrite`]; writing an empty slot raises
//!   [`Error::Unset`]. Both are raised synchronously at the write call.

use crate::error::Error;
use crate::graph::node::NodeId;
use crate::reactive::{Memo, Sensor, State, Task};

/// The signal kinds a slot can delegate to.
pub enum SlotSource<T: 'static> {
    State(State<T>),
    Memo(Memo<T>),
    Task(Task<T>),
    Sensor(Sensor<T>),
}

impl<T: Clone + 'static> SlotSource<T> {
    fn node_id(&self) -> NodeId {
        match self {
            SlotSource::State(s) => s.id(),
            SlotSource::Memo(m) => m.id(),
            SlotSource::Task(t) => t.id(),
            SlotSource::Sensor(s) => s.id(),
        }
    }

    fn read(&self) -> Result<T, Error> {
        match self {
            SlotSource::State(s) => Ok(s.get()),
            SlotSource::Memo(m) => m.get(),
            SlotSource::Task(t) => t.get(),
            SlotSource::Sensor(s) => Ok(s.get()),
        }
    }
}

impl<T: 'static> Clone for SlotSource<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for SlotSource<T> {}

impl<T: 'static> From<State<T>> for SlotSource<T> {
    fn from(value: State<T>) -> Self {
        SlotSource::State(value)
    }
}

impl<T: 'static> From<Memo<T>> for SlotSource<T> {
    fn from(value: Memo<T>) -> Self {
        SlotSource::Memo(value)
    }
}

impl<T: 'static> From<Task<T>> for SlotSource<T> {
    fn from(value: Task<T>) -> Self {
        SlotSource::Task(value)
    }
}

impl<T: 'static> From<Sensor<T>> for SlotSource<T> {
    fn from(value: Sensor<T>) -> Self {
        SlotSource::Sensor(value)
    }
}

/// A delegating subscription point.
///
/// # Example
///
/// ```rust,ignore
/// let slot = Slot::of(State::new(1));
/// let doubled = Memo::new(move || slot.get().map(|v| v * 2));
///
/// slot.replace(State::new(21)); // downstream keeps its subscription
/// ```
pub struct Slot<T: Clone + PartialEq + 'static> {
    backing: State<Option<SlotSource<T>>>,
    view: Memo<T>,
}

impl<T: Clone + PartialEq + 'static> Slot<T> {
    /// Create an empty slot. Reads raise [`Error::Unset`] until a backing
    /// signal is installed with [`Slot::replace`].
    pub fn new() -> Self {
        Self::with_backing(None)
    }

    /// Create a slot delegating to the given signal.
    pub fn of(source: impl Into<SlotSource<T>>) -> Self {
        Self::with_backing(Some(source.into()))
    }

    fn with_backing(source: Option<SlotSource<T>>) -> Self {
        let backing = State::with_equals(source, |a, b| match (a, b) {
            (Some(a), Some(b)) => a.node_id() == b.node_id(),
            (None, None) => true,
            _ => false,
        });
        let view = Memo::fallible(move || match backing.get() {
            Some(source) => source.read(),
            None => Err(Error::Unset),
        });
        Self { backing, view }
    }

    /// Read through the current backing signal. Registers a dependency on
    /// the slot itself, which survives backing replacement.
    pub fn get(&self) -> Result<T, Error> {
        self.view.get()
    }

    /// Untracked read through the current backing signal.
    pub fn get_untracked(&self) -> Result<T, Error> {
        self.view.get_untracked()
    }

    /// Write through to the backing signal.
    ///
    /// Raises [`Error::ReadOnlyWrite`] when the backing is not writable
    /// (memo, task, sensor) and [`Error::Unset`] when the slot is empty.
    pub fn set(&self, value: T) -> Result<(), Error> {
        match self.backing.get_untracked() {
            Some(SlotSource::State(state)) => state.set(value),
            Some(_) => Err(Error::ReadOnlyWrite),
            None => Err(Error::Unset),
        }
    }

    /// Swap the backing signal. Downstream subscriptions to the slot are
    /// untouched; they see the new signal's value on their next run.
    /// Replacing a signal with itself is a no-op.
    pub fn replace(&self, source: impl Into<SlotSource<T>>) {
        let _ = self.backing.set(Some(source.into()));
    }

    /// The current backing signal, if any.
    pub fn current(&self) -> Option<SlotSource<T>> {
        self.backing.get_untracked()
    }
}

impl<T: Clone + PartialEq + 'static> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + 'static> Clone for Slot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Clone + PartialEq + 'static> Copy for Slot<T> {}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::reactive::Effect;

    #[test]
    fn empty_slot_reads_raise_unset() {
        let slot: Slot<i32> = Slot::new();
        assert_eq!(slot.get(), Err(Error::Unset));
        assert!(slot.current().is_none());
    }

    #[test]
    fn slot_delegates_reads_and_writes() {
        let inner = State::new(5);
        let slot = Slot::of(inner);

        assert_eq!(slot.get().unwrap(), 5);

        slot.set(9).unwrap();
        assert_eq!(inner.get(), 9);
        assert_eq!(slot.get().unwrap(), 9);
    }

    #[test]
    fn writing_through_a_readonly_backing_fails() {
        let doubled = Memo::new(|| 2);
        let slot = Slot::of(doubled);

        assert_eq!(slot.get().unwrap(), 2);
        assert_eq!(slot.set(5), Err(Error::ReadOnlyWrite));
    }

    #[test]
    fn writing_an_empty_slot_fails() {
        let slot: Slot<i32> = Slot::new();
        assert_eq!(slot.set(1), Err(Error::Unset));
    }

    #[test]
    fn replace_keeps_downstream_subscriptions() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first = State::new(1);
        let slot = Slot::of(first);

        let _effect = Effect::new({
            let seen = seen.clone();
            move || seen.borrow_mut().push(slot.get().unwrap_or(-1))
        });
        assert_eq!(*seen.borrow(), vec![1]);

        // Swap the backing signal: the effect re-runs through the same
        // subscription point.
        let second = State::new(10);
        slot.replace(second);
        assert_eq!(*seen.borrow(), vec![1, 10]);

        // Writes to the old backing no longer reach the effect.
        first.set(2).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 10]);

        second.set(20).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 10, 20]);
    }

    #[test]
    fn replacing_with_the_same_signal_is_a_noop() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let inner = State::new(1);
        let slot = Slot::of(inner);

        let _effect = Effect::new({
            let seen = seen.clone();
            move || seen.borrow_mut().push(slot.get().unwrap_or(-1))
        });

        slot.replace(inner);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn slot_recovers_after_backing_installation() {
        let slot: Slot<i32> = Slot::new();
        assert_eq!(slot.get(), Err(Error::Unset));

        slot.replace(State::new(42));
        assert_eq!(slot.get().unwrap(), 42);
    }
}
