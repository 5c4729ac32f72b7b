//! Graph Store
//!
//! The store is the arena that owns every node and edge, indexed by ID for
//! O(1) lookup. Nodes and edges reference each other only through IDs, so
//! removal and reuse are explicit and can never produce a dangling
//! reference.
//!
//! # Edge bookkeeping
//!
//! `link` appends an edge to the tail of both of its lists (the sink's
//! source list, in read order, and the source's sink list) and records the
//! source's current version on the edge. `unlink` removes the edge from
//! both lists in O(1) by splicing the four neighbour pointers. `trim`
//! removes every source-list edge that was not re-confirmed by the given
//! evaluation pass, which is how a sink sheds dependencies it stopped
//! reading.
//!
//! # Propagation
//!
//! `propagate` flood-fills a flag from a changed node to all transitively
//! dependent sinks with a breadth-first traversal. A sink whose flag is
//! already at the wave's strength (or stronger) is never re-visited, which
//! bounds a wave to O(edges) and guarantees that a diamond-shaped
//! dependency marks its tail exactly once per wave. Eagerly scheduled
//! sinks (effects and tasks) reached by a wave are returned so the
//! scheduler can enqueue them.

use std::collections::{HashMap, VecDeque};

use smallvec::SmallVec;

use super::node::{Edge, EdgeId, Flag, Node, NodeId, NodeKind};

/// One entry of a sink's source list: the edge, its source, and the
/// source's version when the sink last read it.
pub(crate) type SourceEntry = (EdgeId, NodeId, u64);

/// The arena of nodes and edges.
#[derive(Default)]
pub(crate) struct GraphStore {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
}

impl GraphStore {
    /// Add a node to the graph, returning its handle.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId::next();
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node record. The caller must sever its edges first.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    /// Link `sink` to `source`: append an edge at the tail of the sink's
    /// source list and the source's sink list, recording the source's
    /// current version. Returns the edge and whether this was the
    /// source's 0 -> 1 watcher transition.
    pub fn link(&mut self, source: NodeId, sink: NodeId, pass: u64) -> Option<(EdgeId, bool)> {
        let seen_version = self.nodes.get(&source)?.version;
        if !self.nodes.contains_key(&sink) {
            return None;
        }
        let id = EdgeId::next();

        let sink_node = self.nodes.get_mut(&sink)?;
        let prev_in = sink_node.last_in;
        sink_node.last_in = Some(id);
        if sink_node.first_in.is_none() {
            sink_node.first_in = Some(id);
        }
        if let Some(prev) = prev_in {
            if let Some(edge) = self.edges.get_mut(&prev) {
                edge.next_in = Some(id);
            }
        }

        let source_node = self.nodes.get_mut(&source)?;
        let prev_out = source_node.last_out;
        source_node.last_out = Some(id);
        if source_node.first_out.is_none() {
            source_node.first_out = Some(id);
        }
        source_node.watchers += 1;
        let first_watcher = source_node.watchers == 1;
        if let Some(prev) = prev_out {
            if let Some(edge) = self.edges.get_mut(&prev) {
                edge.next_out = Some(id);
            }
        }

        self.edges.insert(
            id,
            Edge {
                source,
                sink,
                seen_version,
                pass,
                prev_in,
                next_in: None,
                prev_out,
                next_out: None,
            },
        );
        Some((id, first_watcher))
    }

    /// Remove an edge from both of its lists in O(1). Returns the source
    /// and whether this was the source's 1 -> 0 watcher transition.
    pub fn unlink(&mut self, id: EdgeId) -> Option<(NodeId, bool)> {
        let edge = self.edges.remove(&id)?;

        match edge.prev_in {
            Some(prev) => {
                if let Some(e) = self.edges.get_mut(&prev) {
                    e.next_in = edge.next_in;
                }
            }
            None => {
                if let Some(n) = self.nodes.get_mut(&edge.sink) {
                    n.first_in = edge.next_in;
                }
            }
        }
        match edge.next_in {
            Some(next) => {
                if let Some(e) = self.edges.get_mut(&next) {
                    e.prev_in = edge.prev_in;
                }
            }
            None => {
                if let Some(n) = self.nodes.get_mut(&edge.sink) {
                    n.last_in = edge.prev_in;
                }
            }
        }

        match edge.prev_out {
            Some(prev) => {
                if let Some(e) = self.edges.get_mut(&prev) {
                    e.next_out = edge.next_out;
                }
            }
            None => {
                if let Some(n) = self.nodes.get_mut(&edge.source) {
                    n.first_out = edge.next_out;
                }
            }
        }
        match edge.next_out {
            Some(next) => {
                if let Some(e) = self.edges.get_mut(&next) {
                    e.prev_out = edge.prev_out;
                }
            }
            None => {
                if let Some(n) = self.nodes.get_mut(&edge.source) {
                    n.last_out = edge.prev_out;
                }
            }
        }

        let mut last_gone = false;
        if let Some(source) = self.nodes.get_mut(&edge.source) {
            source.watchers = source.watchers.saturating_sub(1);
            last_gone = source.watchers == 0;
        }
        Some((edge.source, last_gone))
    }

    /// Walk a sink's source list in read order.
    pub fn sources_of(&self, sink: NodeId) -> SmallVec<[SourceEntry; 8]> {
        let mut out = SmallVec::new();
        let mut cursor = self.nodes.get(&sink).and_then(|n| n.first_in);
        while let Some(id) = cursor {
            let Some(edge) = self.edges.get(&id) else { break };
            out.push((id, edge.source, edge.seen_version));
            cursor = edge.next_in;
        }
        out
    }

    /// Collect the sinks in a source's sink list.
    fn sinks_of(&self, source: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut out = SmallVec::new();
        let mut cursor = self.nodes.get(&source).and_then(|n| n.first_out);
        while let Some(id) = cursor {
            let Some(edge) = self.edges.get(&id) else { break };
            out.push(edge.sink);
            cursor = edge.next_out;
        }
        out
    }

    /// Remove every source-list edge of `sink` that was not re-confirmed
    /// by evaluation pass `pass`. Returns the sensor sources whose last
    /// watcher disappeared, so the caller can run their stop hooks.
    pub fn trim(&mut self, sink: NodeId, pass: u64) -> SmallVec<[NodeId; 4]> {
        let stale: SmallVec<[EdgeId; 8]> = {
            let mut out = SmallVec::new();
            let mut cursor = self.nodes.get(&sink).and_then(|n| n.first_in);
            while let Some(id) = cursor {
                let Some(edge) = self.edges.get(&id) else { break };
                if edge.pass != pass {
                    out.push(id);
                }
                cursor = edge.next_in;
            }
            out
        };

        let mut released = SmallVec::new();
        for id in stale {
            if let Some((source, last_gone)) = self.unlink(id) {
                if last_gone && self.kind_of(source) == Some(NodeKind::Sensor) {
                    released.push(source);
                }
            }
        }
        released
    }

    /// Remove every edge touching `node`, in both directions. Returns the
    /// sensor sources released by the teardown.
    pub fn sever(&mut self, node: NodeId) -> SmallVec<[NodeId; 4]> {
        let mut all: SmallVec<[EdgeId; 8]> = SmallVec::new();
        let mut cursor = self.nodes.get(&node).and_then(|n| n.first_in);
        while let Some(id) = cursor {
            cursor = self.edges.get(&id).and_then(|e| e.next_in);
            all.push(id);
        }
        let mut cursor = self.nodes.get(&node).and_then(|n| n.first_out);
        while let Some(id) = cursor {
            cursor = self.edges.get(&id).and_then(|e| e.next_out);
            all.push(id);
        }

        let mut released = SmallVec::new();
        for id in all {
            if let Some((source, last_gone)) = self.unlink(id) {
                if source != node
                    && last_gone
                    && self.kind_of(source) == Some(NodeKind::Sensor)
                {
                    released.push(source);
                }
            }
        }
        released
    }

    pub fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|n| n.kind)
    }

    /// Flood-fill `flag` from `from` to all transitively dependent sinks.
    ///
    /// Breadth-first; a sink already at the wave's strength is never
    /// re-visited. Returns the eager sinks (effects, tasks) newly marked
    /// by this wave so they can be enqueued for the next flush.
    pub fn propagate(&mut self, from: NodeId, flag: Flag) -> SmallVec<[NodeId; 4]> {
        let mut eager = SmallVec::new();
        let mut queue: VecDeque<NodeId> = self.sinks_of(from).into_iter().collect();

        while let Some(sink_id) = queue.pop_front() {
            let Some(node) = self.nodes.get_mut(&sink_id) else {
                continue;
            };
            if !node.raise(flag) {
                continue;
            }
            if node.kind.is_eager() {
                eager.push(sink_id);
            }
            tracing::trace!(node = ?sink_id, ?flag, "marked");
            for next in self.sinks_of(sink_id) {
                queue.push_back(next);
            }
        }
        eager
    }
}
