//! Closure-based verdicts for untimed invariants.
//!
//! Each untimed kind reduces to a reachability question:
//!
//! - never-followed-by: some `a` reachable from an initial node reaches a `b`.
//! - always-precedes: a `b` is reachable from an initial node along a path
//!   that contains no `a`, both endpoints included.
//! - always-followed-by: from some reachable `a`, a terminal node is reached
//!   without passing a node that is `b` but not `a`.

use crate::closure::TransitiveClosure;
use ahash::AHashSet;
use dashmap::DashMap;
use invmc_model::{EventGraph, EventType, Invariant, InvariantKind, NodeId, Relation};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClosureKey {
    pub relation: Relation,
    pub excluded: Option<EventType>,
}

/// Closures of one graph, shared between concurrent checks.
#[derive(Default)]
pub struct ClosureCache {
    closures: DashMap<ClosureKey, Arc<TransitiveClosure>>,
}

impl ClosureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The closure for `key`, built on first use. Callers must always pass
    /// the same graph.
    pub fn get_or_build<G: EventGraph>(&self, graph: &G, key: ClosureKey) -> Arc<TransitiveClosure> {
        if let Some(hit) = self.closures.get(&key) {
            debug!(relation = %key.relation, excluded = ?key.excluded, "closure cache hit");
            return Arc::clone(hit.value());
        }
        debug!(relation = %key.relation, excluded = ?key.excluded, "building closure");
        let built = Arc::new(match &key.excluded {
            Some(e) => TransitiveClosure::excluding(graph, &key.relation, e),
            None => TransitiveClosure::new(graph, &key.relation),
        });
        // Another thread may have finished the same closure first.
        Arc::clone(self.closures.entry(key).or_insert(built).value())
    }

    pub fn len(&self) -> usize {
        self.closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.is_empty()
    }
}

/// Nodes that lie on some path from an initial node, initial nodes included.
fn initially_reachable<G: EventGraph>(graph: &G, full: &TransitiveClosure) -> AHashSet<NodeId> {
    let mut reached = AHashSet::new();
    for init in graph.initial_nodes() {
        reached.insert(init);
        reached.extend(full.reachable_from(init));
    }
    reached
}

/// Decides an untimed invariant by reachability. Returns `true` when the
/// invariant is violated.
pub fn closure_violates<G: EventGraph>(
    graph: &G,
    invariant: &Invariant,
    cache: &ClosureCache,
) -> bool {
    debug_assert!(!invariant.is_timed());
    let relation = invariant.relation.clone();
    let (a, b) = (&invariant.a, &invariant.b);
    let is = |n: NodeId, e: &EventType| graph.event_type(n) == e;

    match invariant.kind {
        InvariantKind::NeverFollowedBy => {
            let full = cache.get_or_build(graph, ClosureKey { relation, excluded: None });
            initially_reachable(graph, &full)
                .into_iter()
                .filter(|&x| is(x, a))
                .any(|x| full.reachable_from(x).any(|y| is(y, b)))
        }
        InvariantKind::AlwaysPrecedes => {
            let without_a = cache.get_or_build(
                graph,
                ClosureKey {
                    relation,
                    excluded: Some(a.clone()),
                },
            );
            graph.initial_nodes().filter(|&x| !is(x, a)).any(|x| {
                is(x, b) || without_a.reachable_from(x).any(|y| is(y, b))
            })
        }
        InvariantKind::AlwaysFollowedBy => {
            let full = cache.get_or_build(
                graph,
                ClosureKey {
                    relation: relation.clone(),
                    excluded: None,
                },
            );
            // A node that is both `a` and `b` keeps the obligation open.
            let excluded = (a != b).then(|| b.clone());
            let open = cache.get_or_build(
                graph,
                ClosureKey {
                    relation: relation.clone(),
                    excluded: excluded.clone(),
                },
            );
            let passes = |n: NodeId| excluded.as_ref().is_none_or(|e| !is(n, e));
            let ends_open = |s: NodeId| {
                passes(s)
                    && (graph.is_terminal(s)
                        || open.reachable_from(s).any(|t| graph.is_terminal(t)))
            };
            initially_reachable(graph, &full)
                .into_iter()
                .filter(|&x| is(x, a))
                .any(|x| {
                    graph.is_terminal(x)
                        || graph.successors(x, &relation).any(|e| ends_open(e.target))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invmc_model::Graph;

    fn violated(graph: &Graph, inv: &Invariant) -> bool {
        closure_violates(graph, inv, &ClosureCache::new())
    }

    #[test]
    fn test_linear_traces() {
        let missing_b = Graph::linear(&["a", "x", "y", "z"]);
        let with_b = Graph::linear(&["a", "x", "y", "b"]);
        let afby = Invariant::always_followed_by("a", "b");
        assert!(violated(&missing_b, &afby));
        assert!(!violated(&with_b, &afby));

        let nfby = Invariant::never_followed_by("a", "b");
        assert!(violated(&with_b, &nfby));
        assert!(!violated(&missing_b, &nfby));

        let ap = Invariant::always_precedes("a", "b");
        assert!(!violated(&with_b, &ap));
        assert!(violated(&Graph::linear(&["x", "b", "a"]), &ap));
        assert!(violated(&Graph::linear(&["b"]), &ap));
    }

    #[test]
    fn test_same_event_followed_by() {
        // Every `a` needs a later `a`; the last one never gets it.
        let graph = Graph::linear(&["a", "x", "a"]);
        assert!(violated(&graph, &Invariant::always_followed_by("a", "a")));
        assert!(violated(&graph, &Invariant::never_followed_by("a", "a")));
        assert!(!violated(&graph, &Invariant::always_precedes("a", "a")));
    }

    #[test]
    fn test_unreachable_a_is_ignored() {
        let mut graph = Graph::linear(&["x", "b"]);
        let a = graph.add_node("a");
        let y = graph.add_node("y");
        graph.add_transition(a, y, "t", None).unwrap();
        graph.set_terminal(y, true).unwrap();
        assert!(!violated(&graph, &Invariant::always_followed_by("a", "b")));
    }

    #[test]
    fn test_cache_reuses_closures() {
        let graph = Graph::linear(&["a", "x", "b"]);
        let cache = ClosureCache::new();
        let afby = Invariant::always_followed_by("a", "b");
        assert!(!closure_violates(&graph, &afby, &cache));
        assert_eq!(cache.len(), 2);
        assert!(closure_violates(&graph, &Invariant::never_followed_by("a", "b"), &cache));
        assert_eq!(cache.len(), 2);
        let key = ClosureKey {
            relation: Relation::default(),
            excluded: None,
        };
        assert!(Arc::ptr_eq(
            &cache.get_or_build(&graph, key.clone()),
            &cache.get_or_build(&graph, key)
        ));
    }
}
