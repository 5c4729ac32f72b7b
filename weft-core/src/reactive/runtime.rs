//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects states, memos,
//! tasks, effects, and sensors. It owns the graph arena, the scheduler,
//! the owner tree, and the evaluation stack.
//!
//! # How It Works
//!
//! 1. When a node is created, it is inserted into the arena and adopted by
//!    the active owner.
//!
//! 2. When a source is read during an evaluation, the runtime links it to
//!    the sink at the top of the frame stack, reusing the edge from the
//!    same read position of the previous run where possible.
//!
//! 3. When a source's value changes, the runtime flood-fills a dirty flag
//!    to every transitively dependent sink and enqueues reached effects
//!    and tasks. Memos stay lazy; they recompute on next read.
//!
//! 4. Reads pull: a flagged sink first refreshes its sources, recomputes
//!    only if one of them actually changed value, and short-circuits
//!    downstream propagation when its own result is unchanged.
//!
//! # Threading
//!
//! The whole runtime is a thread-local. Evaluation is single-threaded and
//! run-to-completion; the only logically concurrent work is a task's
//! future body, which re-enters the graph exclusively through its
//! settlement on the same thread. Nothing here locks because nothing ever
//! executes concurrently with the graph.
//!
//! # Borrow discipline
//!
//! User closures (computations, equality predicates, guards, sensor and
//! cleanup hooks) are never invoked while the runtime is borrowed; every
//! helper clones the closure handle out, releases the borrow, and calls.

use std::cell::RefCell;
use std::collections::HashMap;

use smallvec::SmallVec;

use crate::error::Error;
use crate::graph::node::{AnyValue, Computation, Flag, Node, NodeId, NodeKind};
use crate::graph::scheduler::Scheduler;
use crate::graph::store::GraphStore;
use crate::reactive::context::{BatchGuard, EvalGuard, Frame, UntrackGuard};
use crate::reactive::owner::{self, OwnerId, OwnerRec};
use crate::reactive::task::CancelToken;

/// The per-thread reactive runtime.
pub(crate) struct Runtime {
    pub store: GraphStore,
    pub sched: Scheduler,
    pub owners: HashMap<OwnerId, OwnerRec>,
    pub frames: Vec<Frame>,
    pub active_owner: Option<OwnerId>,
    pass: u64,
}

impl Runtime {
    fn new() -> Self {
        Self {
            store: GraphStore::default(),
            sched: Scheduler::default(),
            owners: HashMap::new(),
            frames: Vec::new(),
            active_owner: None,
            pass: 0,
        }
    }

    fn next_pass(&mut self) -> u64 {
        self.pass += 1;
        self.pass
    }
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Run `f` with exclusive access to the runtime. Never call user code from
/// inside `f`.
pub(crate) fn with<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

// ---------------------------------------------------------------------------
// Node lifecycle
// ---------------------------------------------------------------------------

/// Insert a node, attach it to the active owner, and return its handle.
///
/// `own_owner` overrides the attachment target for nodes that bring their
/// own owner (effects): the node becomes that owner's anchor instead.
pub(crate) fn create_node(mut node: Node, own_owner: Option<OwnerId>) -> NodeId {
    let (id, owner) = with(|rt| {
        node.owner = own_owner.or(rt.active_owner);
        let owner = node.owner;
        (rt.store.insert(node), owner)
    });
    match (own_owner, owner) {
        (Some(own), _) => owner::set_anchor(own, id),
        (None, Some(owner)) => owner::adopt_node(owner, id),
        _ => {}
    }
    id
}

/// Detach a node from the graph: sever its edges, drop it from the
/// pending set, cancel its in-flight token, and stop its sensor hook.
pub(crate) fn dispose_node(id: NodeId) {
    let (released, stop, token) = with(|rt| {
        let released = rt.store.sever(id);
        rt.sched.forget(id);
        let mut stop = None;
        let mut token = None;
        if let Some(mut node) = rt.store.remove(id) {
            if let Some(hooks) = node.sensor.as_mut() {
                if hooks.active {
                    stop = hooks.stop.take();
                }
            }
            if let Some(slot) = node.task.as_mut() {
                token = slot.token.take();
            }
        }
        (released, stop, token)
    });
    if let Some(token) = token {
        token.cancel();
    }
    if let Some(stop) = stop {
        stop();
    }
    deactivate_sensors(released);
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Tracked read: refresh the node, link it to the evaluating sink, and
/// return its value or re-raise its cached error.
pub(crate) fn read(id: NodeId) -> Result<AnyValue, Error> {
    let refreshed = refresh(id);
    track(id);
    refreshed?;
    fetch(id)
}

/// Untracked read: refresh the node but create no edge.
pub(crate) fn peek(id: NodeId) -> Result<AnyValue, Error> {
    refresh(id)?;
    fetch(id)
}

fn fetch(id: NodeId) -> Result<AnyValue, Error> {
    with(|rt| {
        let node = rt.store.get(id).ok_or(Error::Unset)?;
        if let Some(err) = &node.error {
            return Err(err.clone());
        }
        node.value.clone().ok_or(Error::Unset)
    })
}

/// Link `source` to the sink at the top of the frame stack, if any.
///
/// An edge sitting at the same position of the sink's previous source list
/// is reused; repeated reads of one source within a pass are deduplicated
/// through the frame's linked list.
fn track(source: NodeId) {
    let activated = with(|rt| {
        let Some(frame) = rt.frames.last_mut() else {
            return None;
        };
        let Some(sink) = frame.sink else {
            return None;
        };
        if frame.linked.contains(&source) {
            return None;
        }

        if let Some(cursor) = frame.cursor {
            let reuse = rt
                .store
                .edge(cursor)
                .filter(|edge| edge.source == source)
                .map(|edge| edge.next_in);
            if let Some(next) = reuse {
                let version = rt.store.get(source).map(|n| n.version).unwrap_or(0);
                let pass = frame.pass;
                frame.cursor = next;
                frame.linked.push(source);
                if let Some(edge) = rt.store.edge_mut(cursor) {
                    edge.pass = pass;
                    edge.seen_version = version;
                }
                return None;
            }
        }

        let pass = frame.pass;
        frame.linked.push(source);
        match rt.store.link(source, sink, pass) {
            Some((_, true)) if rt.store.kind_of(source) == Some(NodeKind::Sensor) => Some(source),
            _ => None,
        }
    });
    if let Some(sensor) = activated {
        activate_sensor(sensor);
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a source node: guard check, equality check, store, propagate,
/// flush if no batch is open.
pub(crate) fn write(id: NodeId, value: AnyValue) -> Result<(), Error> {
    let guard = with(|rt| rt.store.get(id).and_then(|n| n.guard.clone()));
    if let Some(guard) = guard {
        guard(value.as_ref())?;
    }

    let compare = with(|rt| {
        let node = rt.store.get(id).ok_or(Error::Unset)?;
        Ok(node
            .value
            .clone()
            .zip(node.equals.clone()))
    })?;
    if let Some((old, equals)) = compare {
        if equals(old.as_ref(), value.as_ref()) {
            return Ok(());
        }
    }

    with(|rt| {
        if let Some(node) = rt.store.get_mut(id) {
            node.value = Some(value);
            node.version += 1;
        }
        let eager = rt.store.propagate(id, Flag::Dirty);
        for &sink in &eager {
            rt.sched.enqueue(sink);
        }
    });
    flush_if_due();
    Ok(())
}

// ---------------------------------------------------------------------------
// Refresh (pull)
// ---------------------------------------------------------------------------

/// Bring a node up to date.
///
/// Sources are refreshed first; the node recomputes only if one of them
/// actually changed value since this node last read it (compared through
/// versions, not mere touches). Re-entering a node that is already
/// evaluating raises the circular-dependency error; the rest of the graph
/// is unaffected and the node keeps its prior value.
pub(crate) fn refresh(id: NodeId) -> Result<(), Error> {
    let Some((kind, flag, evaluating, ran)) = with(|rt| {
        rt.store
            .get(id)
            .map(|n| (n.kind, n.flag, n.evaluating, n.ran))
    }) else {
        return Err(Error::Unset);
    };

    if evaluating {
        return Err(Error::Cycle(kind.name()));
    }
    if matches!(kind, NodeKind::State | NodeKind::Sensor) {
        return Ok(());
    }
    if flag == Flag::Clean && ran {
        return Ok(());
    }

    // The evaluating bit covers the source sweep as well as the
    // computation itself, so a cyclic edge shape surfaces as a cycle
    // error instead of unbounded recursion.
    with(|rt| {
        if let Some(node) = rt.store.get_mut(id) {
            node.evaluating = true;
        }
    });
    let mut guard = EvaluatingGuard { id, armed: true };

    let sources = with(|rt| rt.store.sources_of(id));
    let mut changed = !ran;
    for &(_, source, seen) in &sources {
        // A source's cached failure stays on the source; its version bump
        // is what forces this node to re-run and observe it.
        let _ = refresh(source);
        let version = with(|rt| rt.store.get(source).map(|n| n.version)).unwrap_or(seen);
        if version != seen {
            changed = true;
        }
    }

    if !changed {
        with(|rt| {
            if let Some(node) = rt.store.get_mut(id) {
                node.flag = Flag::Clean;
            }
        });
        return Ok(());
    }

    // From here the evaluation guard owns the bit.
    guard.armed = false;
    recompute(id, kind)
}

/// Clears the evaluating bit if the source sweep unwinds before the
/// computation takes over.
struct EvaluatingGuard {
    id: NodeId,
    armed: bool,
}

impl Drop for EvaluatingGuard {
    fn drop(&mut self) {
        if self.armed {
            with(|rt| {
                if let Some(node) = rt.store.get_mut(self.id) {
                    node.evaluating = false;
                }
            });
        }
    }
}

/// Re-run a sink's computation under a fresh tracking pass.
fn recompute(id: NodeId, kind: NodeKind) -> Result<(), Error> {
    let Some((compute, node_owner)) = with(|rt| {
        let node = rt.store.get_mut(id)?;
        let Some(compute) = node.compute.clone() else {
            node.evaluating = false;
            return None;
        };
        node.evaluating = true;
        node.ran = true;
        // Consume the flag before running, so a write that lands during
        // the evaluation re-dirties the node instead of being lost.
        node.flag = Flag::Clean;
        Some((compute, node.owner))
    }) else {
        return Err(Error::Unset);
    };

    // An effect owns what its previous run created; tear that down first.
    if kind == NodeKind::Effect {
        if let Some(owner) = node_owner {
            owner::reset(owner);
        }
    }

    let pass = with(|rt| {
        let pass = rt.next_pass();
        let cursor = rt.store.get(id).and_then(|n| n.first_in);
        let prev_owner = rt.active_owner;
        rt.frames.push(Frame::tracking(id, pass, cursor, prev_owner));
        rt.active_owner = node_owner;
        pass
    });
    let guard = EvalGuard::new(id, pass);

    match compute {
        Computation::Sync(f) => {
            let result = f();
            guard.finish();
            settle(id, result)
        }
        Computation::Async(f) => {
            let token = with(|rt| {
                let node = rt.store.get_mut(id)?;
                let slot = node.task.get_or_insert_with(Default::default);
                if let Some(old) = slot.token.take() {
                    old.cancel();
                }
                let token = CancelToken::new();
                slot.token = Some(token.clone());
                Some(token)
            });
            let Some(token) = token else {
                guard.finish();
                return Err(Error::Unset);
            };
            // Reads in the closure body are tracked; the returned future
            // runs outside the graph until it settles.
            let future = f(token.clone());
            guard.finish();
            tokio::task::spawn_local(async move {
                let result = future.await;
                settle_async(id, token, result);
            });
            Ok(())
        }
    }
}

/// Close an evaluation: trim unconfirmed edges, clear the evaluating bit,
/// pop the frame, restore the owner. Called through [`EvalGuard`] on every
/// exit path.
pub(crate) fn end_eval(id: NodeId, pass: u64) {
    let released = with(|rt| {
        if let Some(frame) = rt.frames.pop() {
            rt.active_owner = frame.prev_owner;
        }
        let released = rt.store.trim(id, pass);
        if let Some(node) = rt.store.get_mut(id) {
            node.evaluating = false;
        }
        released
    });
    deactivate_sensors(released);
}

/// Apply a completed computation to its node.
fn settle(id: NodeId, result: Result<AnyValue, Error>) -> Result<(), Error> {
    match result {
        Ok(value) => {
            let (old, equals, had_error) = with(|rt| {
                rt.store
                    .get(id)
                    .map(|n| (n.value.clone(), n.equals.clone(), n.error.is_some()))
            })
            .unwrap_or((None, None, false));

            // Recovering from a cached error is an observable change even
            // when the value itself is back to what it was.
            let same = !had_error
                && match (&old, &equals) {
                    (Some(old), Some(equals)) => equals(old.as_ref(), value.as_ref()),
                    _ => false,
                };

            with(|rt| {
                if let Some(node) = rt.store.get_mut(id) {
                    node.error = None;
                    if !same {
                        node.value = Some(value);
                        node.version += 1;
                    }
                }
                // An equal result keeps the old value but still floods one
                // relink wave, so watchers that memoized on this node can
                // re-check their other sources.
                let flag = if same { Flag::Relink } else { Flag::Dirty };
                let eager = rt.store.propagate(id, flag);
                for &sink in &eager {
                    rt.sched.enqueue(sink);
                }
            });
            Ok(())
        }
        Err(err) => {
            with(|rt| {
                if let Some(node) = rt.store.get_mut(id) {
                    node.error = Some(err.clone());
                    node.version += 1;
                }
                let eager = rt.store.propagate(id, Flag::Dirty);
                for &sink in &eager {
                    rt.sched.enqueue(sink);
                }
            });
            Err(err)
        }
    }
}

/// Apply an asynchronous settlement, discarding it entirely when the
/// computation was superseded or cancelled in flight.
pub(crate) fn settle_async(id: NodeId, token: CancelToken, result: Result<AnyValue, Error>) {
    let current = with(|rt| {
        let node = rt.store.get_mut(id)?;
        let slot = node.task.as_mut()?;
        let is_current = slot
            .token
            .as_ref()
            .is_some_and(|t| t.same(&token) && !token.is_cancelled());
        if is_current {
            slot.token = None;
        }
        Some(is_current)
    });
    if current != Some(true) {
        tracing::trace!(node = ?id, "discarding superseded task settlement");
        return;
    }
    let _ = settle(id, result);
    flush_if_due();
}

// ---------------------------------------------------------------------------
// Scheduler driving
// ---------------------------------------------------------------------------

/// Group writes: effects triggered inside run once, after the outermost
/// batch exits. Nesting is transparent.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with(|rt| rt.sched.enter_batch());
    let _guard = BatchGuard;
    f()
}

pub(crate) fn exit_batch() {
    let outermost = with(|rt| rt.sched.exit_batch());
    if outermost {
        flush_if_due();
    }
}

/// Read without creating dependency edges. Ownership attachment is
/// untouched; the tracking suspension ends when `f` returns or panics.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    with(|rt| {
        let prev_owner = rt.active_owner;
        rt.frames.push(Frame::untracked(prev_owner));
    });
    let _guard = UntrackGuard;
    f()
}

pub(crate) fn pop_frame() {
    with(|rt| {
        if let Some(frame) = rt.frames.pop() {
            rt.active_owner = frame.prev_owner;
        }
    });
}

pub(crate) fn set_active_owner(owner: Option<OwnerId>) -> Option<OwnerId> {
    with(|rt| std::mem::replace(&mut rt.active_owner, owner))
}

/// Flush when due: pending work, no open batch, no running flush, and not
/// inside an evaluation (the end of the outermost synchronous extent).
pub(crate) fn flush_if_due() {
    let due = with(|rt| rt.sched.should_flush() && rt.frames.iter().all(|f| f.sink.is_none()));
    if due {
        flush();
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        with(|rt| rt.sched.end_flush());
    }
}

/// Drain the pending set in waves. Every pending sink runs at most once
/// per wave; writes performed by running effects start the next wave.
fn flush() {
    if !with(|rt| rt.sched.begin_flush()) {
        return;
    }
    let _guard = FlushGuard;
    loop {
        let wave = with(|rt| rt.sched.take_wave());
        if wave.is_empty() {
            break;
        }
        tracing::debug!(count = wave.len(), "flush wave");
        for id in wave {
            let due = with(|rt| rt.store.get(id).map(|n| !n.is_clean()).unwrap_or(false));
            if !due {
                continue;
            }
            if let Err(err) = refresh(id) {
                // Effects have no read to re-raise from; tasks and memos
                // surface their cached error on the next get().
                if with(|rt| rt.store.kind_of(id)) == Some(NodeKind::Effect) {
                    tracing::error!(error = %err, "effect run failed");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor activation
// ---------------------------------------------------------------------------

/// Run a sensor's start hook on its 0 -> 1 watcher transition.
fn activate_sensor(id: NodeId) {
    let start = with(|rt| {
        let node = rt.store.get_mut(id)?;
        let hooks = node.sensor.as_mut()?;
        if hooks.active {
            return None;
        }
        hooks.active = true;
        Some(hooks.start.clone())
    });
    let Some(start) = start else {
        return;
    };
    tracing::trace!(node = ?id, "sensor start");
    let stop = start(id);
    let orphaned = with(|rt| {
        match rt.store.get_mut(id).and_then(|n| n.sensor.as_mut()) {
            Some(hooks) => {
                hooks.stop = Some(stop);
                None
            }
            // The sensor was disposed while starting: stop it right away.
            None => Some(stop),
        }
    });
    if let Some(stop) = orphaned {
        stop();
    }
}

/// Run stop hooks for sensors whose last watcher disappeared.
pub(crate) fn deactivate_sensors(ids: SmallVec<[NodeId; 4]>) {
    for id in ids {
        let stop = with(|rt| {
            let node = rt.store.get_mut(id)?;
            if node.watchers > 0 {
                return None;
            }
            let hooks = node.sensor.as_mut()?;
            if !hooks.active {
                return None;
            }
            hooks.active = false;
            hooks.stop.take()
        });
        if let Some(stop) = stop {
            tracing::trace!(node = ?id, "sensor stop");
            stop();
        }
    }
}
