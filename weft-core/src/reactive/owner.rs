//! Ownership and Cleanup
//!
//! Scopes and effects are owners: they hold cleanup callbacks, child
//! owners, and the nodes created while they were active. Disposing an
//! owner tears all of that down, depth-first, exactly once.
//!
//! # Attachment
//!
//! Creating a scope or effect while another owner is active attaches it as
//! a child, so disposing an outer scope disposes every descendant. The
//! [`unown`] escape hatch runs a callback with ownership suspended:
//! anything created inside is not attached to the enclosing owner and must
//! be disposed through its own disposer. The previous owner is restored on
//! every exit path, including panics.
//!
//! # Disposal order
//!
//! For each owner: cleanups run first, then children are disposed
//! depth-first, then the owner's nodes are detached from the graph.
//! Disposal is idempotent; a second call is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::node::NodeId;
use crate::reactive::context::UnownGuard;
use crate::reactive::runtime;

/// Unique identifier for an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An owner record in the runtime's owner arena.
#[derive(Default)]
pub(crate) struct OwnerRec {
    pub parent: Option<OwnerId>,
    pub children: Vec<OwnerId>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    /// Nodes created while this owner was active. Torn down on disposal
    /// and on an effect's re-run reset.
    pub nodes: Vec<NodeId>,
    /// The node the owner exists for (an effect's own sink). Unlike
    /// `nodes`, the anchor survives re-run resets and is only torn down by
    /// full disposal.
    pub anchor: Option<NodeId>,
    pub disposed: bool,
}

/// Disposer for a scope created with [`create_scope`].
///
/// Dropping the handle does nothing; the scope lives until `dispose` is
/// called (or an ancestor owner is disposed).
#[derive(Debug, Clone, Copy)]
pub struct ScopeHandle {
    id: OwnerId,
}

impl ScopeHandle {
    /// Dispose the scope: cleanups, then child owners depth-first, then
    /// graph edges. Safe to call more than once.
    pub fn dispose(&self) {
        dispose(self.id);
    }
}

/// Run `f` inside a new owner scope and return its result together with
/// the scope's disposer.
///
/// Effects and scopes created inside attach to the new scope and are torn
/// down with it.
pub fn create_scope<T>(f: impl FnOnce() -> T) -> (T, ScopeHandle) {
    let id = create();
    let prev = runtime::set_active_owner(Some(id));
    let _guard = UnownGuard::new(prev);
    let out = f();
    (out, ScopeHandle { id })
}

/// Register a cleanup on the active owner. It runs when the owner is
/// disposed, or (for effects) before the next re-run.
///
/// Outside any owner the callback is dropped with a warning: there is
/// nothing to hook it to.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    let registered = runtime::with(|rt| {
        let Some(owner) = rt.active_owner else {
            return false;
        };
        if let Some(rec) = rt.owners.get_mut(&owner) {
            rec.cleanups.push(Box::new(f));
            true
        } else {
            false
        }
    });
    if !registered {
        tracing::warn!("on_cleanup called outside an owner; callback dropped");
    }
}

/// Run `f` with ownership tracking suspended.
///
/// Scopes and effects created inside are not attached to the enclosing
/// owner; their own disposers are still returned to the caller and must be
/// used. Dependency tracking is unaffected. The previous owner is restored
/// even if `f` panics.
pub fn unown<T>(f: impl FnOnce() -> T) -> T {
    let prev = runtime::set_active_owner(None);
    let _guard = UnownGuard::new(prev);
    f()
}

/// Create an owner record attached to the active owner (detached when no
/// owner is active, as inside `unown`).
pub(crate) fn create() -> OwnerId {
    runtime::with(|rt| {
        let id = OwnerId::next();
        let parent = rt.active_owner;
        rt.owners.insert(
            id,
            OwnerRec {
                parent,
                ..OwnerRec::default()
            },
        );
        if let Some(parent) = parent {
            if let Some(rec) = rt.owners.get_mut(&parent) {
                rec.children.push(id);
            }
        }
        id
    })
}

/// Register a node created under `owner` for teardown.
pub(crate) fn adopt_node(owner: OwnerId, node: NodeId) {
    runtime::with(|rt| {
        if let Some(rec) = rt.owners.get_mut(&owner) {
            rec.nodes.push(node);
        }
    });
}

/// Pin an owner's anchor node (the effect sink the owner exists for).
pub(crate) fn set_anchor(owner: OwnerId, node: NodeId) {
    runtime::with(|rt| {
        if let Some(rec) = rt.owners.get_mut(&owner) {
            rec.anchor = Some(node);
        }
    });
}

/// Reset an owner between effect runs: run its cleanups, dispose its
/// children and run-created nodes, keep the owner and its anchor alive.
pub(crate) fn reset(id: OwnerId) {
    let taken = runtime::with(|rt| {
        rt.owners.get_mut(&id).map(|rec| {
            (
                std::mem::take(&mut rec.cleanups),
                std::mem::take(&mut rec.children),
                std::mem::take(&mut rec.nodes),
            )
        })
    });
    let Some((cleanups, children, nodes)) = taken else {
        return;
    };
    for cleanup in cleanups {
        cleanup();
    }
    for child in children {
        dispose(child);
    }
    for node in nodes {
        runtime::dispose_node(node);
    }
}

/// Fully dispose an owner: cleanups, children depth-first, then node and
/// edge teardown. Idempotent.
pub(crate) fn dispose(id: OwnerId) {
    let taken = runtime::with(|rt| {
        let rec = rt.owners.get_mut(&id)?;
        if rec.disposed {
            return None;
        }
        rec.disposed = true;
        Some((
            std::mem::take(&mut rec.cleanups),
            std::mem::take(&mut rec.children),
            std::mem::take(&mut rec.nodes),
            rec.anchor.take(),
            rec.parent,
        ))
    });
    let Some((cleanups, children, nodes, anchor, parent)) = taken else {
        return;
    };

    for cleanup in cleanups {
        cleanup();
    }
    for child in children {
        dispose(child);
    }
    for node in nodes {
        runtime::dispose_node(node);
    }
    if let Some(anchor) = anchor {
        runtime::dispose_node(anchor);
    }

    runtime::with(|rt| {
        rt.owners.remove(&id);
        if let Some(parent) = parent {
            if let Some(rec) = rt.owners.get_mut(&parent) {
                rec.children.retain(|c| *c != id);
            }
        }
    });
}
