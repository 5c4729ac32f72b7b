//! Evaluation Context
//!
//! The context tracks which sink is currently evaluating. This enables
//! automatic dependency tracking: when a source is read, the engine links
//! it to the sink at the top of the frame stack.
//!
//! # Frames
//!
//! Entering a computation pushes a frame carrying:
//!
//! - the evaluating sink (or `None` for an `untrack` window),
//! - the evaluation pass number, used to confirm or trim edges,
//! - a cursor into the sink's previous source list, so an edge read in the
//!   same position as last time is reused instead of re-allocated,
//! - the list of sources already linked this pass, so repeated reads of
//!   one source create one edge,
//! - the owner that was active before the frame, restored on pop.
//!
//! # Guards
//!
//! Every context change is paired with a guard whose `Drop` restores the
//! previous state, so a panicking or erroring computation can never leak a
//! stale frame, a stale owner, or a stuck `evaluating` bit.

use smallvec::SmallVec;

use crate::graph::node::{EdgeId, NodeId};
use crate::reactive::owner::OwnerId;
use crate::reactive::runtime;

/// One entry of the evaluation stack.
pub(crate) struct Frame {
    /// The sink collecting dependencies, or `None` inside `untrack`.
    pub sink: Option<NodeId>,
    /// The pass number stamped onto every edge confirmed by this run.
    pub pass: u64,
    /// Next candidate for positional edge reuse in the sink's old source
    /// list.
    pub cursor: Option<EdgeId>,
    /// Sources already linked during this pass.
    pub linked: SmallVec<[NodeId; 8]>,
    /// Owner to restore when the frame pops.
    pub prev_owner: Option<OwnerId>,
}

impl Frame {
    pub fn tracking(
        sink: NodeId,
        pass: u64,
        cursor: Option<EdgeId>,
        prev_owner: Option<OwnerId>,
    ) -> Self {
        Self {
            sink: Some(sink),
            pass,
            cursor,
            linked: SmallVec::new(),
            prev_owner,
        }
    }

    pub fn untracked(prev_owner: Option<OwnerId>) -> Self {
        Self {
            sink: None,
            pass: 0,
            cursor: None,
            linked: SmallVec::new(),
            prev_owner,
        }
    }
}

/// Guard for a full evaluation: pops the frame, trims edges that were not
/// re-established, clears the `evaluating` bit, and restores the previous
/// owner. Runs on every exit path, including panics.
pub(crate) struct EvalGuard {
    node: NodeId,
    pass: u64,
    done: bool,
}

impl EvalGuard {
    pub fn new(node: NodeId, pass: u64) -> Self {
        Self {
            node,
            pass,
            done: false,
        }
    }

    /// Finish the evaluation explicitly (the normal path).
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        runtime::end_eval(self.node, self.pass);
    }
}

impl Drop for EvalGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Guard for an `untrack` window: pops the non-tracking frame and restores
/// the owner it saved.
pub(crate) struct UntrackGuard;

impl Drop for UntrackGuard {
    fn drop(&mut self) {
        runtime::pop_frame();
    }
}

/// Guard for an `unown` window: restores the suspended owner.
pub(crate) struct UnownGuard {
    prev: Option<OwnerId>,
}

impl UnownGuard {
    pub fn new(prev: Option<OwnerId>) -> Self {
        Self { prev }
    }
}

impl Drop for UnownGuard {
    fn drop(&mut self) {
        runtime::set_active_owner(self.prev);
    }
}

/// Guard for a batch level: closing the outermost level triggers a flush.
pub(crate) struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        runtime::exit_batch();
    }
}
