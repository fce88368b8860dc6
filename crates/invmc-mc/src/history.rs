//! Persistent history chains.
//!
//! A chain is a backward-linked list of visited graph nodes. Extending a chain
//! allocates one node pointing at the existing prefix, so any number of
//! tracing state sets can share a prefix without copying it. Nodes are never
//! mutated after creation.

use invmc_model::{NodeId, Time};
use std::fmt;
use std::sync::Arc;

/// One visited node plus a link to the path that led to it.
pub struct HistoryNode {
    node: NodeId,
    /// Delta of the edge that entered `node` (None for the first node or an
    /// untimed edge).
    via: Option<Time>,
    predecessor: Option<HistoryChain>,
    len: usize,
}

impl HistoryNode {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Drop for HistoryNode {
    // Unlink iteratively; a recursive drop of a long uniquely-owned chain
    // would exhaust the stack.
    fn drop(&mut self) {
        let mut next = self.predecessor.take();
        while let Some(chain) = next {
            match Arc::try_unwrap(chain.0) {
                Ok(mut node) => next = node.predecessor.take(),
                Err(_) => break,
            }
        }
    }
}

/// Shared handle to the last node of a path.
#[derive(Clone)]
pub struct HistoryChain(Arc<HistoryNode>);

#[allow(clippy::len_without_is_empty)]
impl HistoryChain {
    /// A length-1 chain starting at `node`.
    pub fn root(node: NodeId) -> Self {
        HistoryChain(Arc::new(HistoryNode {
            node,
            via: None,
            predecessor: None,
            len: 1,
        }))
    }

    /// A new chain that visits `node` after this one.
    pub fn extend(&self, node: NodeId, via: Option<Time>) -> Self {
        HistoryChain(Arc::new(HistoryNode {
            node,
            via,
            predecessor: Some(self.clone()),
            len: self.0.len + 1,
        }))
    }

    /// Number of nodes on the path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len
    }

    /// The most recently visited node.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.0.node
    }

    pub fn predecessor(&self) -> Option<&HistoryChain> {
        self.0.predecessor.as_ref()
    }

    pub fn ptr_eq(&self, other: &HistoryChain) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Walks from the newest node back to the root.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryNode> {
        std::iter::successors(Some(&*self.0), |n| n.predecessor.as_ref().map(|c| &*c.0))
    }

    /// Visited nodes in order, root first.
    pub fn to_path(&self) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = self.iter().map(HistoryNode::node).collect();
        path.reverse();
        path
    }

    /// Visited nodes with entering deltas, root first.
    pub fn to_steps(&self) -> Vec<(NodeId, Option<Time>)> {
        let mut steps: Vec<(NodeId, Option<Time>)> =
            self.iter().map(|n| (n.node, n.via.clone())).collect();
        steps.reverse();
        steps
    }
}

impl fmt::Debug for HistoryChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_path()).finish()
    }
}
