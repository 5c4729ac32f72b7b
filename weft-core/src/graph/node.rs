//! Graph Nodes and Edges
//!
//! This module defines the data records that live in the dependency graph:
//! nodes (sources and sinks) and the edges that link them.
//!
//! # Nodes
//!
//! A node is a source (it can be read), a sink (it reads other nodes), or
//! both: memos and tasks are sinks to their dependencies and sources to
//! their own dependents. The node record carries everything the engine
//! needs to decide whether work is due:
//!
//! - a `flag` (clean / relink / dirty) set by push-propagation,
//! - a `version` bumped on every observable change, which sinks compare
//!   against the version they last saw to skip recomputation,
//! - an `evaluating` bit, which doubles as the cycle detector: re-entering
//!   a node whose bit is set is the definition of a circular dependency.
//!
//! # Edges
//!
//! Every edge is a member of exactly two doubly-linked lists at once: the
//! owning sink's source list (what it currently depends on) and the owning
//! source's sink list (who currently depends on it). An edge never exists
//! in one list without the other, and removal from both is a single O(1)
//! operation given the four list pointers. Edges also record the evaluation
//! pass that last confirmed them; edges not re-confirmed during a sink's
//! latest run are trimmed afterwards, which is how dynamic dependencies
//! (branches that stop reading a source) leave the graph without a separate
//! mark-sweep pass.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::LocalBoxFuture;

use crate::error::Error;
use crate::reactive::owner::OwnerId;
use crate::reactive::task::CancelToken;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unique identifier for an edge in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EdgeId(u64);

impl EdgeId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Work state of a node, ordered by strength.
///
/// Propagation never downgrades: a wave only touches nodes whose current
/// flag is weaker than the wave's flag, which is what bounds a wave to
/// visiting each reachable sink at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Flag {
    /// The node's cached state is up to date.
    Clean,
    /// A source recomputed to an equal value; the node should re-check its
    /// sources' versions on next read, but they may all be unchanged.
    Relink,
    /// A source changed value; the node must re-check and likely recompute.
    Dirty,
}

/// The kind of node. Used for dispatch and for naming nodes in
/// circular-dependency errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A directly writable value cell.
    State,
    /// A cached synchronous computation.
    Memo,
    /// A cancellable asynchronous computation.
    Task,
    /// A side-effecting leaf.
    Effect,
    /// A source fed by an external callback while watched.
    Sensor,
}

impl NodeKind {
    /// Whether push-propagation should enqueue this node for the next
    /// flush rather than wait for a pull.
    pub(crate) fn is_eager(self) -> bool {
        matches!(self, NodeKind::Effect | NodeKind::Task)
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            NodeKind::State => "state",
            NodeKind::Memo => "memo",
            NodeKind::Task => "task",
            NodeKind::Effect => "effect",
            NodeKind::Sensor => "sensor",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-erased cached value.
pub(crate) type AnyValue = Rc<dyn Any>;

/// Type-erased equality predicate over cached values.
pub(crate) type EqualsFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Type-erased write validator. Returns the error to raise when the value
/// is rejected, so a guard can distinguish invalid from null.
pub(crate) type GuardFn = Rc<dyn Fn(&dyn Any) -> Result<(), Error>>;

/// Type-erased synchronous computation.
pub(crate) type SyncFn = Rc<dyn Fn() -> Result<AnyValue, Error>>;

/// Type-erased asynchronous computation: called synchronously (reads in the
/// call body are tracked), returns the future to run in the background.
pub(crate) type AsyncFn =
    Rc<dyn Fn(CancelToken) -> LocalBoxFuture<'static, Result<AnyValue, Error>>>;

/// A sink's computation, split by shape at construction rather than
/// detected at runtime.
#[derive(Clone)]
pub(crate) enum Computation {
    Sync(SyncFn),
    Async(AsyncFn),
}

/// External-resource hooks carried by sensor nodes.
pub(crate) struct SensorHooks {
    /// Runs on the 0 -> 1 watcher transition. Receives the node so the
    /// typed layer can hand the callback a setter; returns the stop hook.
    pub start: Rc<dyn Fn(NodeId) -> Box<dyn FnOnce()>>,
    /// The stop hook returned by the last activation, present while active.
    pub stop: Option<Box<dyn FnOnce()>>,
    /// Whether the sensor is currently activated.
    pub active: bool,
}

/// Cancellation bookkeeping carried by task nodes.
#[derive(Default)]
pub(crate) struct TaskSlot {
    /// Token of the in-flight computation, if any. A settling computation
    /// whose token is no longer stored here has been superseded and its
    /// result is discarded.
    pub token: Option<CancelToken>,
}

/// A node in the dependency graph.
pub(crate) struct Node {
    pub kind: NodeKind,
    pub flag: Flag,
    /// Set for the duration of the node's own recomputation; finding it
    /// already set on entry is the cycle detector.
    pub evaluating: bool,
    /// Whether the computation has run at least once. Tasks carry an
    /// initial value before their first run, so value presence alone
    /// cannot answer this.
    pub ran: bool,
    /// Bumped on every observable change (value change, new cached error,
    /// or error recovery). Sinks compare this against the version recorded
    /// on their edge to decide whether this source "actually changed".
    pub version: u64,
    pub value: Option<AnyValue>,
    /// Cached computation failure, re-raised from every read until the
    /// node next recomputes.
    pub error: Option<Error>,
    pub compute: Option<Computation>,
    pub equals: Option<EqualsFn>,
    pub guard: Option<GuardFn>,
    /// Source list: edges where this node is the sink.
    pub first_in: Option<EdgeId>,
    pub last_in: Option<EdgeId>,
    /// Sink list: edges where this node is the source.
    pub first_out: Option<EdgeId>,
    pub last_out: Option<EdgeId>,
    /// Number of edges in the sink list; drives sensor activation.
    pub watchers: usize,
    /// The owner this node was created under (for effects, their own
    /// owner). Restored as the active owner during recomputation.
    pub owner: Option<OwnerId>,
    pub sensor: Option<SensorHooks>,
    pub task: Option<TaskSlot>,
}

impl Node {
    /// Create a node of the given kind. Sources start clean; sinks start
    /// dirty so their first read computes.
    pub(crate) fn new(kind: NodeKind) -> Self {
        let flag = match kind {
            NodeKind::State | NodeKind::Sensor => Flag::Clean,
            NodeKind::Memo | NodeKind::Task | NodeKind::Effect => Flag::Dirty,
        };
        Self {
            kind,
            flag,
            evaluating: false,
            ran: false,
            version: 0,
            value: None,
            error: None,
            compute: None,
            equals: None,
            guard: None,
            first_in: None,
            last_in: None,
            first_out: None,
            last_out: None,
            watchers: 0,
            owner: None,
            sensor: None,
            task: None,
        }
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.flag == Flag::Clean
    }

    /// Raise the flag to at least `flag`. Returns false when the node was
    /// already at that strength or stronger (the wave must not re-visit).
    pub(crate) fn raise(&mut self, flag: Flag) -> bool {
        if self.flag >= flag {
            return false;
        }
        self.flag = flag;
        true
    }
}

/// A tracked read relationship between one source and one sink.
pub(crate) struct Edge {
    pub source: NodeId,
    pub sink: NodeId,
    /// The source's version when the sink last read it.
    pub seen_version: u64,
    /// The evaluation pass that last confirmed this edge. Edges whose pass
    /// is stale after a run are trimmed.
    pub pass: u64,
    /// Position in the sink's source list.
    pub prev_in: Option<EdgeId>,
    pub next_in: Option<EdgeId>,
    /// Position in the source's sink list.
    pub prev_out: Option<EdgeId>,
    pub next_out: Option<EdgeId>,
}
