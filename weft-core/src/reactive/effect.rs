//! Effect Implementation
//!
//! An Effect is a side-effecting leaf that runs whenever its dependencies
//! change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately to establish its initial
//!    dependencies.
//!
//! 2. When a dependency changes, the effect is enqueued in the scheduler's
//!    pending set rather than run inline; the next flush runs it once,
//!    however many writes marked it.
//!
//! 3. Each run tracks dependencies afresh; sources the new run did not
//!    read are trimmed and no longer re-trigger the effect.
//!
//! # Ownership and cleanup
//!
//! Every effect is an owner. Cleanups registered during a run (via
//! [`on_cleanup`](crate::reactive::on_cleanup)) execute before the next
//! run and at disposal, and scopes or effects created inside a run are
//! disposed before the next run. Creating an effect while another owner is
//! active attaches it as a child, so disposing the outer scope disposes
//! the effect too.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (recompute on read); effects are eager (run per flush
//!   while dirty).
//! - A memo's failure is re-raised from its reads; an effect has no reads,
//!   so a failing run (a circular dependency) is logged instead.

use std::rc::Rc;

use crate::graph::node::{Computation, Node, NodeKind};
use crate::reactive::{erase, owner, runtime};

/// A side-effecting computation that runs when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = State::new(0);
///
/// let effect = Effect::new(move || {
///     println!("count is {}", count.get());
/// });
///
/// count.set(5)?; // prints "count is 5" at the next flush
/// effect.dispose();
/// ```
#[derive(Clone, Copy)]
pub struct Effect {
    owner: owner::OwnerId,
}

impl Effect {
    /// Create an effect and run it immediately.
    pub fn new(f: impl Fn() + 'static) -> Self {
        let own = owner::create();
        let mut node = Node::new(NodeKind::Effect);
        node.compute = Some(Computation::Sync(Rc::new(move || {
            f();
            Ok(erase(()))
        })));
        let id = runtime::create_node(node, Some(own));

        if let Err(err) = runtime::refresh(id) {
            tracing::error!(error = %err, "effect run failed");
        }
        Self { owner: own }
    }

    /// Dispose the effect: run its cleanups, dispose everything its runs
    /// created, and detach it from the graph. Safe to call more than once.
    pub fn dispose(&self) {
        owner::dispose(self.owner);
    }

    /// Whether the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        runtime::with(|rt| !rt.owners.contains_key(&self.owner))
    }
}
