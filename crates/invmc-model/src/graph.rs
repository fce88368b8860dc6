//! Event graphs: typed nodes joined by relation-labelled, optionally timed
//! transitions.

use crate::error::{GraphError, GraphResult};
use crate::time::Time;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// Relation used when none is given.
pub const DEFAULT_RELATION: &str = "t";

/// Label identifying an event kind.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Arc<str>);

impl EventType {
    pub fn new(name: impl AsRef<str>) -> Self {
        EventType(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        EventType::new(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        EventType(Arc::from(name))
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a relation labelling transitions.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relation(Arc<str>);

impl Relation {
    pub fn new(name: impl AsRef<str>) -> Self {
        Relation(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        &*self.0 == DEFAULT_RELATION
    }
}

impl Default for Relation {
    fn default() -> Self {
        Relation::new(DEFAULT_RELATION)
    }
}

impl From<&str> for Relation {
    fn from(name: &str) -> Self {
        Relation::new(name)
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dense node index. Nodes are numbered `0..node_count()` and this order is
/// the stable iteration order used for reproducible counterexamples.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Outgoing edge of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub target: NodeId,
    pub relation: Relation,
    /// Time elapsed between the source event and the target event.
    pub delta: Option<Time>,
}

/// Read-only view of an event graph consumed by the checkers.
pub trait EventGraph {
    fn node_count(&self) -> usize;

    fn event_type(&self, node: NodeId) -> &EventType;

    fn is_initial(&self, node: NodeId) -> bool;

    fn is_terminal(&self, node: NodeId) -> bool;

    /// All outgoing transitions of `node`, across relations.
    fn transitions(&self, node: NodeId) -> &[Transition];

    fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count()).map(NodeId::from_index)
    }

    fn initial_nodes(&self) -> impl Iterator<Item = NodeId> {
        self.nodes().filter(move |&n| self.is_initial(n))
    }

    /// Outgoing transitions of `node` labelled with `relation`.
    fn successors<'a>(
        &'a self,
        node: NodeId,
        relation: &'a Relation,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions(node)
            .iter()
            .filter(move |t| &t.relation == relation)
    }

    fn contains_event(&self, event: &EventType) -> bool {
        self.nodes().any(|n| self.event_type(n) == event)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    event: EventType,
    initial: bool,
    terminal: bool,
    transitions: Vec<Transition>,
}

/// Adjacency-list event graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<NodeData>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, event: impl Into<EventType>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeData {
            event: event.into(),
            initial: false,
            terminal: false,
            transitions: Vec::new(),
        });
        id
    }

    fn node_mut(&mut self, node: NodeId) -> GraphResult<&mut NodeData> {
        self.nodes
            .get_mut(node.index())
            .ok_or(GraphError::UnknownNode(node))
    }

    pub fn set_initial(&mut self, node: NodeId, initial: bool) -> GraphResult<()> {
        self.node_mut(node)?.initial = initial;
        Ok(())
    }

    pub fn set_terminal(&mut self, node: NodeId, terminal: bool) -> GraphResult<()> {
        self.node_mut(node)?.terminal = terminal;
        Ok(())
    }

    pub fn add_transition(
        &mut self,
        from: NodeId,
        to: NodeId,
        relation: impl Into<Relation>,
        delta: Option<Time>,
    ) -> GraphResult<()> {
        if to.index() >= self.nodes.len() {
            return Err(GraphError::UnknownNode(to));
        }
        self.node_mut(from)?.transitions.push(Transition {
            target: to,
            relation: relation.into(),
            delta,
        });
        Ok(())
    }

    /// A single trace `e0 -> e1 -> ...` on the default relation, first node
    /// initial and last node terminal.
    pub fn linear<S: AsRef<str>>(events: &[S]) -> Self {
        let timed: Vec<(&str, Option<Time>)> =
            events.iter().map(|e| (e.as_ref(), None)).collect();
        Self::linear_timed(&timed)
    }

    /// Like [`Graph::linear`], with the delta of the edge entering each node.
    /// The first node's delta is ignored.
    pub fn linear_timed(events: &[(&str, Option<Time>)]) -> Self {
        let mut graph = Graph::new();
        let mut prev: Option<NodeId> = None;
        for (event, delta) in events {
            let node = graph.add_node(*event);
            match prev {
                None => graph.nodes[node.index()].initial = true,
                Some(p) => graph.nodes[p.index()].transitions.push(Transition {
                    target: node,
                    relation: Relation::default(),
                    delta: delta.clone(),
                }),
            }
            prev = Some(node);
        }
        if let Some(last) = prev {
            graph.nodes[last.index()].terminal = true;
        }
        graph
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.transitions.len()).sum()
    }
}

impl EventGraph for Graph {
    #[inline]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn event_type(&self, node: NodeId) -> &EventType {
        &self.nodes[node.index()].event
    }

    #[inline]
    fn is_initial(&self, node: NodeId) -> bool {
        self.nodes[node.index()].initial
    }

    #[inline]
    fn is_terminal(&self, node: NodeId) -> bool {
        self.nodes[node.index()].terminal
    }

    #[inline]
    fn transitions(&self, node: NodeId) -> &[Transition] {
        &self.nodes[node.index()].transitions
    }
}

/// Builds a [`Graph`] from string node keys, as used by external loaders.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
    keys: AHashMap<String, NodeId>,
    names: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(
        &mut self,
        key: &str,
        event: impl Into<EventType>,
        initial: bool,
        terminal: bool,
    ) -> GraphResult<NodeId> {
        if self.keys.contains_key(key) {
            return Err(GraphError::DuplicateKey(key.to_string()));
        }
        let id = self.graph.add_node(event);
        self.graph.set_initial(id, initial)?;
        self.graph.set_terminal(id, terminal)?;
        self.keys.insert(key.to_string(), id);
        self.names.push(key.to_string());
        Ok(id)
    }

    pub fn lookup(&self, key: &str) -> GraphResult<NodeId> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| GraphError::UnknownKey(key.to_string()))
    }

    pub fn edge(
        &mut self,
        from: &str,
        to: &str,
        relation: impl Into<Relation>,
        delta: Option<Time>,
    ) -> GraphResult<()> {
        let from = self.lookup(from)?;
        let to = self.lookup(to)?;
        self.graph.add_transition(from, to, relation, delta)
    }

    /// Finishes the graph; the returned names are indexed by `NodeId::index`.
    pub fn build(self) -> (Graph, Vec<String>) {
        (self.graph, self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_graph_flags() {
        let g = Graph::linear(&["a", "x", "b"]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(g.is_initial(NodeId::from_index(0)));
        assert!(!g.is_initial(NodeId::from_index(1)));
        assert!(g.is_terminal(NodeId::from_index(2)));
        assert_eq!(g.initial_nodes().count(), 1);
        assert!(g.contains_event(&EventType::new("x")));
        assert!(!g.contains_event(&EventType::new("y")));
    }

    #[test]
    fn test_successors_filter_by_relation() {
        let mut g = Graph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_node("c");
        g.add_transition(a, b, "t", None).unwrap();
        g.add_transition(a, c, "other", Some(Time::Integer(2))).unwrap();
        let t = Relation::default();
        let targets: Vec<NodeId> = g.successors(a, &t).map(|tr| tr.target).collect();
        assert_eq!(targets, vec![b]);
        assert_eq!(g.transitions(a).len(), 2);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut g = Graph::new();
        let a = g.add_node("a");
        let err = g
            .add_transition(a, NodeId::from_index(7), "t", None)
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownNode(NodeId::from_index(7)));
    }

    #[test]
    fn test_builder_keys() {
        let mut builder = GraphBuilder::new();
        builder.node("first", "a", true, false).unwrap();
        builder.node("second", "b", false, true).unwrap();
        assert_eq!(
            builder.node("first", "c", false, false).unwrap_err(),
            GraphError::DuplicateKey("first".into())
        );
        builder.edge("first", "second", "t", None).unwrap();
        assert!(builder.edge("first", "nope", "t", None).is_err());
        let (graph, names) = builder.build();
        assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(graph.edge_count(), 1);
    }
}
