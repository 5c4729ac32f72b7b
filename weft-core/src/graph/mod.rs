//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between sources (writable values) and sinks (derived computations).
//!
//! # Overview
//!
//! The graph is a directed graph where nodes are reactive values and an
//! edge records that one node read another during its latest evaluation.
//! When a source changes, a flag is flood-filled to every transitively
//! dependent sink (push); sinks bring themselves up to date lazily when
//! read (pull), recomputing only if a source's version moved past the
//! version recorded on the connecting edge.
//!
//! # Design Decisions
//!
//! 1. Nodes and edges live in a central arena indexed by ID, so removal
//!    and reuse are explicit and cannot produce dangling references.
//!
//! 2. Each edge belongs to two doubly-linked lists at once (the sink's
//!    source list and the source's sink list), making both directions
//!    walkable and single-edge removal O(1).
//!
//! 3. Effects are not run during propagation. They are collected into the
//!    scheduler's pending set and drained by a coalesced flush, so a batch
//!    of writes runs each due effect once.

pub(crate) mod node;
pub(crate) mod scheduler;
pub(crate) mod store;

pub use node::{NodeId, NodeKind};
