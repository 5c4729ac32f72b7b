//! Task Implementation
//!
//! A Task behaves like a memo whose computation is asynchronous. Its
//! closure receives a cancellation token and returns a future; the closure
//! body runs synchronously under dependency tracking, the future runs in
//! the background via `tokio::task::spawn_local`.
//!
//! # Supersession
//!
//! Each recomputation cancels the previous in-flight token before
//! installing a new one. When a future settles, its result is applied only
//! if its token is still the node's current token and was not cancelled;
//! anything else is discarded entirely, errors included. Rapid successive
//! source changes therefore apply exactly one result: the one computed
//! from the most recent input.
//!
//! # Reads never block
//!
//! [`Task::get`] immediately returns the last settled value, or the
//! initial value before anything has settled, while a computation is still
//! in flight. [`Task::is_pending`] reports whether one is.
//!
//! # Cancellation is cooperative
//!
//! The runtime only guarantees that it cancels the token before starting a
//! superseding computation and before disposing the node. A long-running
//! future that wants to stop early must observe
//! [`CancelToken::is_cancelled`] itself.
//!
//! # Tracking caveat
//!
//! Reads are tracked in the synchronous closure body that builds the
//! future. Reads inside the future after its first suspension point are
//! not tracked; capture the values you need before going async.
//!
//! Futures are spawned with `tokio::task::spawn_local`, so tasks require a
//! current-thread tokio runtime inside a `LocalSet` context.

use std::cell::Cell;
use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;

use futures_util::FutureExt;

use crate::error::Error;
use crate::graph::node::{AnyValue, Computation, EqualsFn, Node, NodeId, NodeKind, TaskSlot};
use crate::reactive::{downcast, erase, erase_equals, runtime};

/// Cooperative cancellation token handed to a task's computation.
///
/// Cloning shares the token. The runtime cancels it when the computation
/// is superseded, aborted, or its node disposed; the future observes the
/// flag to stop early.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    /// Whether the computation holding this token has been superseded or
    /// aborted.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Identity comparison: a settlement applies only when its token is
    /// the node's current one.
    pub(crate) fn same(&self, other: &CancelToken) -> bool {
        Rc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

/// A cancellable asynchronous computation.
///
/// # Example
///
/// ```rust,ignore
/// let query = State::new("weft".to_string());
/// let results = Task::new(Vec::new(), move |token| {
///     let q = query.get(); // tracked: runs again when the query changes
///     async move {
///         if token.is_cancelled() {
///             return Vec::new();
///         }
///         search(&q).await
///     }
/// });
/// ```
pub struct Task<T: 'static> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + PartialEq + 'static> Task<T> {
    /// Create a task and start its first computation. `initial` is what
    /// reads return until the first settlement.
    pub fn new<F, Fut>(initial: T, f: F) -> Self
    where
        F: Fn(CancelToken) -> Fut + 'static,
        Fut: Future<Output = T> + 'static,
    {
        Self::build(
            initial,
            move |token| {
                let fut = f(token);
                async move { Ok(erase(fut.await)) }.boxed_local()
            },
            erase_equals(|a: &T, b: &T| a == b),
        )
    }

    /// Create a task whose computation can fail. A failure from the
    /// current (uncancelled) computation is cached and re-raised from
    /// every read until the task recomputes; a failure from a superseded
    /// or cancelled computation is swallowed.
    pub fn fallible<F, Fut>(initial: T, f: F) -> Self
    where
        F: Fn(CancelToken) -> Fut + 'static,
        Fut: Future<Output = Result<T, Error>> + 'static,
    {
        Self::build(
            initial,
            move |token| {
                let fut = f(token);
                async move { fut.await.map(erase) }.boxed_local()
            },
            erase_equals(|a: &T, b: &T| a == b),
        )
    }
}

impl<T: Clone + 'static> Task<T> {
    /// Create a task with a custom result equality function.
    pub fn with_equals<F, Fut>(
        initial: T,
        f: F,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self
    where
        F: Fn(CancelToken) -> Fut + 'static,
        Fut: Future<Output = T> + 'static,
    {
        Self::build(
            initial,
            move |token| {
                let fut = f(token);
                async move { Ok(erase(fut.await)) }.boxed_local()
            },
            erase_equals(equals),
        )
    }

    fn build(
        initial: T,
        f: impl Fn(CancelToken) -> futures_util::future::LocalBoxFuture<'static, Result<AnyValue, Error>>
            + 'static,
        equals: EqualsFn,
    ) -> Self {
        let mut node = Node::new(NodeKind::Task);
        node.value = Some(erase(initial));
        node.compute = Some(Computation::Async(Rc::new(f)));
        node.equals = Some(equals);
        node.task = Some(TaskSlot::default());
        let id = runtime::create_node(node, None);
        // Kick off the first computation; reads see `initial` meanwhile.
        let _ = runtime::refresh(id);
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Get the last settled value (or the initial value before the first
    /// settlement). Never blocks; a dirty task starts its superseding
    /// computation in the background and still returns immediately.
    pub fn get(&self) -> Result<T, Error> {
        runtime::read(self.id).map(downcast)
    }

    /// Untracked, non-starting read of the last settled value.
    pub fn get_untracked(&self) -> Result<T, Error> {
        runtime::peek(self.id).map(downcast)
    }

    /// Whether a computation is currently in flight.
    pub fn is_pending(&self) -> bool {
        runtime::with(|rt| {
            rt.store
                .get(self.id)
                .and_then(|n| n.task.as_ref())
                .is_some_and(|slot| slot.token.is_some())
        })
    }

    /// Cancel the in-flight computation, if any. Its settlement will be
    /// discarded; the last settled value stays readable.
    pub fn abort(&self) {
        let token = runtime::with(|rt| {
            rt.store
                .get_mut(self.id)?
                .task
                .as_mut()?
                .token
                .take()
        });
        if let Some(token) = token {
            token.cancel();
        }
    }
}

impl<T: 'static> Clone for Task<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Task<T> {}
