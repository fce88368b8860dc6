//! All-pairs reachability under one relation.
//!
//! Rows are dense bitsets, one per source node. Each row is filled by an
//! explicit-stack depth-first search that uses the row itself as the visited
//! set, so every target is expanded at most once per source.

use invmc_model::{EventGraph, EventType, NodeId, Relation};
use std::fmt;

pub struct TransitiveClosure {
    relation: Relation,
    /// Event type whose nodes were left out, if any.
    excluded: Option<EventType>,
    node_count: usize,
    words: usize,
    rows: Vec<u64>,
}

impl TransitiveClosure {
    /// Reachability over every node of the graph.
    pub fn new<G: EventGraph>(graph: &G, relation: &Relation) -> Self {
        Self::build(graph, relation, None)
    }

    /// Reachability over paths that never touch a node of type `excluded`.
    /// Excluded nodes are neither sources nor targets.
    pub fn excluding<G: EventGraph>(graph: &G, relation: &Relation, excluded: &EventType) -> Self {
        Self::build(graph, relation, Some(excluded))
    }

    fn build<G: EventGraph>(graph: &G, relation: &Relation, excluded: Option<&EventType>) -> Self {
        let node_count = graph.node_count();
        let words = node_count.div_ceil(64);
        let allowed: Vec<bool> = graph
            .nodes()
            .map(|n| excluded.is_none_or(|e| graph.event_type(n) != e))
            .collect();

        let mut rows = vec![0u64; node_count * words];
        let mut stack = Vec::new();
        for source in graph.nodes().filter(|n| allowed[n.index()]) {
            let row = &mut rows[source.index() * words..(source.index() + 1) * words];
            stack.push(source);
            while let Some(node) = stack.pop() {
                for edge in graph.successors(node, relation) {
                    let t = edge.target.index();
                    if !allowed[t] || row[t / 64] & (1 << (t % 64)) != 0 {
                        continue;
                    }
                    row[t / 64] |= 1 << (t % 64);
                    stack.push(edge.target);
                }
            }
        }

        Self {
            relation: relation.clone(),
            excluded: excluded.cloned(),
            node_count,
            words,
            rows,
        }
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn excluded(&self) -> Option<&EventType> {
        self.excluded.as_ref()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    fn row(&self, from: NodeId) -> &[u64] {
        let start = from.index() * self.words;
        &self.rows[start..start + self.words]
    }

    /// Whether a path of at least one edge leads from `from` to `to`.
    #[inline]
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        if from.index() >= self.node_count || to.index() >= self.node_count {
            return false;
        }
        let t = to.index();
        self.row(from)[t / 64] & (1 << (t % 64)) != 0
    }

    /// Targets reachable from `from`, in node order.
    pub fn reachable_from(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let row: &[u64] = if from.index() < self.node_count {
            self.row(from)
        } else {
            &[]
        };
        row.iter().enumerate().flat_map(|(w, &bits)| {
            (0..64)
                .filter(move |b| bits & (1 << b) != 0)
                .map(move |b| NodeId::from_index(w * 64 + b))
        })
    }

    /// Number of reachable `(from, to)` pairs.
    pub fn pair_count(&self) -> usize {
        self.rows.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Same reachability relation over the same nodes.
    pub fn is_equal(&self, other: &TransitiveClosure) -> bool {
        self.node_count == other.node_count && self.rows == other.rows
    }
}

impl fmt::Debug for TransitiveClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for n in 0..self.node_count {
            let from = NodeId::from_index(n);
            map.entry(&from, &self.reachable_from(from).collect::<Vec<_>>());
        }
        map.finish()
    }
}
