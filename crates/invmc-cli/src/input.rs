//! JSON graph descriptions.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "n0", "event": "request", "initial": true },
//!     { "id": "n1", "event": "response", "terminal": true }
//!   ],
//!   "edges": [{ "from": "n0", "to": "n1", "delta": 4 }],
//!   "invariants": ["request AFby<=5 response"]
//! }
//! ```
//!
//! `relation` defaults to `t`. A delta is an integer, a float or an array of
//! integers (vector time).

use invmc_model::{Graph, GraphBuilder, GraphResult, Time, DEFAULT_RELATION};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphFile {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub invariants: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub id: String,
    pub event: String,
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub terminal: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    #[serde(default = "default_relation")]
    pub relation: String,
    #[serde(default)]
    pub delta: Option<DeltaSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeltaSpec {
    Integer(i64),
    Float(f64),
    Vector(Vec<i64>),
}

impl From<DeltaSpec> for Time {
    fn from(delta: DeltaSpec) -> Self {
        match delta {
            DeltaSpec::Integer(n) => Time::Integer(n),
            DeltaSpec::Float(x) => Time::Float(x),
            DeltaSpec::Vector(v) => Time::vector(v),
        }
    }
}

fn default_relation() -> String {
    DEFAULT_RELATION.to_string()
}

/// A loaded graph plus the node keys, indexed by `NodeId::index`.
pub struct LoadedGraph {
    pub graph: Graph,
    pub names: Vec<String>,
    pub invariants: Vec<String>,
}

impl GraphFile {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn into_graph(self) -> GraphResult<LoadedGraph> {
        let mut builder = GraphBuilder::new();
        for node in &self.nodes {
            builder.node(&node.id, node.event.as_str(), node.initial, node.terminal)?;
        }
        for edge in self.edges {
            builder.edge(
                &edge.from,
                &edge.to,
                edge.relation.as_str(),
                edge.delta.map(Time::from),
            )?;
        }
        let (graph, names) = builder.build();
        Ok(LoadedGraph {
            graph,
            names,
            invariants: self.invariants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invmc_model::{EventGraph, GraphError, NodeId, Relation};

    #[test]
    fn test_load_defaults() {
        let text = r#"{
            "nodes": [
                {"id": "s", "event": "a", "initial": true},
                {"id": "e", "event": "b", "terminal": true}
            ],
            "edges": [{"from": "s", "to": "e"}]
        }"#;
        let loaded = GraphFile::from_json(text).unwrap().into_graph().unwrap();
        let s = NodeId::from_index(0);
        assert_eq!(loaded.names, vec!["s", "e"]);
        assert!(loaded.graph.is_initial(s));
        assert!(loaded.graph.is_terminal(NodeId::from_index(1)));
        let rel = Relation::default();
        let edge = loaded.graph.successors(s, &rel).next().unwrap();
        assert_eq!(edge.delta, None);
        assert!(loaded.invariants.is_empty());
    }

    #[test]
    fn test_delta_kinds() {
        let text = r#"{
            "nodes": [
                {"id": "0", "event": "a"},
                {"id": "1", "event": "b"}
            ],
            "edges": [
                {"from": "0", "to": "1", "delta": 3},
                {"from": "0", "to": "1", "relation": "f", "delta": 1.5},
                {"from": "0", "to": "1", "relation": "v", "delta": [1, 0, 2]}
            ]
        }"#;
        let loaded = GraphFile::from_json(text).unwrap().into_graph().unwrap();
        let deltas: Vec<Option<Time>> = ["t", "f", "v"]
            .iter()
            .map(|r| {
                loaded
                    .graph
                    .successors(NodeId::from_index(0), &Relation::new(r))
                    .next()
                    .unwrap()
                    .delta
                    .clone()
            })
            .collect();
        assert_eq!(
            deltas,
            vec![
                Some(Time::Integer(3)),
                Some(Time::Float(1.5)),
                Some(Time::vector([1, 0, 2])),
            ]
        );
    }

    #[test]
    fn test_unknown_edge_endpoint() {
        let text = r#"{"nodes": [{"id": "x", "event": "a"}], "edges": [{"from": "x", "to": "y"}]}"#;
        let err = GraphFile::from_json(text).unwrap().into_graph().err().unwrap();
        assert_eq!(err, GraphError::UnknownKey("y".to_string()));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let text = r#"{"nodes": [{"id": "x", "event": "a", "start": true}]}"#;
        assert!(GraphFile::from_json(text).is_err());
    }
}
