//! Reference oracle for the invariant checker.
//!
//! Decides invariants by enumerating every path of a small graph and reading
//! each invariant directly off the path, with no automaton involved.

use invmc_mc::{CheckConfig, CheckOutcome, CheckResult, Explorer};
use invmc_model::{
    BoundDirection, EventGraph, Graph, Invariant, InvariantKind, NodeId, Relation, Time,
    TimeResult,
};
use proptest::prelude::*;
use rand::Rng;
use std::cmp::Ordering;
use std::ops::ControlFlow;

/// A path as visited nodes, each with the delta of the edge that entered it.
pub type Steps = [(NodeId, Option<Time>)];

pub fn check(
    graph: &Graph,
    invariant: &Invariant,
    config: CheckConfig,
) -> CheckResult<CheckOutcome> {
    Explorer::new(graph, invariant, config)?.check()
}

/// Sequential, unlimited configuration used by the property tests.
pub fn test_config() -> CheckConfig {
    CheckConfig {
        parallel: false,
        max_iterations: 1_000_000,
        ..CheckConfig::default()
    }
}

/// Whether `steps` starts at an initial node and follows edges of `relation`
/// with exactly the recorded deltas.
pub fn is_path<G: EventGraph>(graph: &G, relation: &Relation, steps: &Steps) -> bool {
    let Some(((first, _), rest)) = steps.split_first() else {
        return false;
    };
    if first.index() >= graph.node_count() || !graph.is_initial(*first) {
        return false;
    }
    let mut prev = *first;
    for (node, delta) in rest {
        let found = graph
            .successors(prev, relation)
            .any(|t| t.target == *node && &t.delta == delta);
        if !found {
            return false;
        }
        prev = *node;
    }
    true
}

/// Time elapsed between positions `from` and `to` of the path.
fn elapsed(steps: &Steps, from: usize, to: usize) -> TimeResult<Time> {
    steps[from + 1..=to]
        .iter()
        .try_fold(Time::Zero, |acc, (_, d)| acc.try_add(d.as_ref().unwrap_or(&Time::Zero)))
}

fn exceeds(t: &Time, bound: &Time) -> TimeResult<bool> {
    Ok(t.try_cmp(bound)? == Ordering::Greater)
}

fn short_of(t: &Time, bound: &Time) -> TimeResult<bool> {
    Ok(t.try_cmp(bound)? == Ordering::Less)
}

/// Whether the path, or one of its prefixes, violates the invariant.
pub fn violates<G: EventGraph>(graph: &G, invariant: &Invariant, steps: &Steps) -> TimeResult<bool> {
    let is_a = |i: usize| graph.event_type(steps[i].0) == &invariant.a;
    let is_b = |i: usize| graph.event_type(steps[i].0) == &invariant.b;
    let terminal = |i: usize| graph.is_terminal(steps[i].0);
    let n = steps.len();

    match (invariant.kind, &invariant.bound) {
        (InvariantKind::NeverFollowedBy, _) => {
            Ok((0..n).any(|i| is_a(i) && (i + 1..n).any(is_b)))
        }
        (InvariantKind::AlwaysPrecedes, None) => {
            Ok((0..n).any(|j| is_b(j) && !(0..=j).any(is_a)))
        }
        (InvariantKind::AlwaysFollowedBy, None) => Ok((0..n).any(|i| {
            is_a(i) && (i..n).any(|m| terminal(m) && !(i + 1..=m).any(is_b))
        })),
        (InvariantKind::AlwaysPrecedes, Some(bound)) => {
            for j in (0..n).filter(|&j| is_b(j) && !is_a(j)) {
                let mut earlier = (0..j).filter(|&i| is_a(i));
                let anchor = match bound.direction {
                    BoundDirection::Upper => earlier.next_back(),
                    BoundDirection::Lower => earlier.next(),
                };
                let Some(i) = anchor else { return Ok(true) };
                let t = elapsed(steps, i, j)?;
                let late = match bound.direction {
                    BoundDirection::Upper => exceeds(&t, &bound.value)?,
                    BoundDirection::Lower => short_of(&t, &bound.value)?,
                };
                if late {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (InvariantKind::AlwaysFollowedBy, Some(bound)) => {
            for i in (0..n).filter(|&i| is_a(i)) {
                let answer = (i + 1..n).find(|&j| is_b(j));
                let open_until = answer.unwrap_or(n);
                if (i..open_until).any(terminal) {
                    return Ok(true);
                }
                match (answer, bound.direction) {
                    (Some(j), BoundDirection::Upper) => {
                        if exceeds(&elapsed(steps, i, j)?, &bound.value)? {
                            return Ok(true);
                        }
                    }
                    (Some(j), BoundDirection::Lower) => {
                        if short_of(&elapsed(steps, i, j)?, &bound.value)? {
                            return Ok(true);
                        }
                    }
                    (None, BoundDirection::Upper) => {
                        for m in i + 1..n {
                            if exceeds(&elapsed(steps, i, m)?, &bound.value)? {
                                return Ok(true);
                            }
                        }
                    }
                    (None, BoundDirection::Lower) => {}
                }
            }
            Ok(false)
        }
    }
}

/// What [`for_each_path`] does after visiting a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Visit the extensions of this path.
    Descend,
    /// Skip the extensions of this path.
    Prune,
    /// End the enumeration.
    Stop,
}

/// Calls `visit` on every path of at most `max_len` nodes that starts at an
/// initial node, each path before its extensions.
pub fn for_each_path<G, F>(graph: &G, relation: &Relation, max_len: usize, mut visit: F)
where
    G: EventGraph,
    F: FnMut(&Steps) -> Walk,
{
    fn walk<G: EventGraph, F: FnMut(&Steps) -> Walk>(
        graph: &G,
        relation: &Relation,
        max_len: usize,
        path: &mut Vec<(NodeId, Option<Time>)>,
        visit: &mut F,
    ) -> ControlFlow<()> {
        match visit(path) {
            Walk::Stop => return ControlFlow::Break(()),
            Walk::Prune => return ControlFlow::Continue(()),
            Walk::Descend => {}
        }
        if path.len() >= max_len {
            return ControlFlow::Continue(());
        }
        let Some(&(last, _)) = path.last() else {
            return ControlFlow::Continue(());
        };
        for t in graph.successors(last, relation) {
            path.push((t.target, t.delta.clone()));
            let flow = walk(graph, relation, max_len, path, visit);
            path.pop();
            flow?;
        }
        ControlFlow::Continue(())
    }

    if max_len == 0 {
        return;
    }
    let mut path = Vec::with_capacity(max_len);
    for init in graph.initial_nodes() {
        path.push((init, None));
        let flow = walk(graph, relation, max_len, &mut path, &mut visit);
        path.pop();
        if flow.is_break() {
            return;
        }
    }
}

/// Length of the shortest violating path with at most `max_len` nodes.
pub fn shortest_violation<G: EventGraph>(
    graph: &G,
    invariant: &Invariant,
    max_len: usize,
) -> TimeResult<Option<usize>> {
    let mut best: Option<usize> = None;
    let mut error = None;
    for_each_path(graph, &invariant.relation, max_len, |steps| {
        if best.is_some_and(|b| steps.len() >= b) {
            return Walk::Prune;
        }
        match violates(graph, invariant, steps) {
            Ok(true) => {
                best = Some(steps.len());
                Walk::Prune
            }
            Ok(false) => Walk::Descend,
            Err(e) => {
                error = Some(e);
                Walk::Stop
            }
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(best),
    }
}

/// Path length within which the shortest untimed violation must appear: one
/// visit per pair of graph node and automaton state.
pub fn path_bound(graph: &Graph) -> usize {
    graph.node_count() * 3 + 1
}

pub const EVENTS: [&str; 3] = ["a", "b", "c"];

/// Random graph over [`EVENTS`]. Node 0 is always initial; every edge is on
/// the default relation and carries an integer delta when `timed`.
pub fn random_graph<R: Rng>(rng: &mut R, nodes: usize, edges: usize, timed: bool) -> Graph {
    let mut graph = Graph::new();
    for _ in 0..nodes {
        graph.add_node(EVENTS[rng.gen_range(0..EVENTS.len())]);
    }
    for i in 0..nodes {
        let node = NodeId::from_index(i);
        graph
            .set_initial(node, i == 0 || rng.gen_bool(0.2))
            .expect("generated id in range");
        graph
            .set_terminal(node, rng.gen_bool(0.3))
            .expect("generated id in range");
    }
    for _ in 0..edges {
        let from = NodeId::from_index(rng.gen_range(0..nodes));
        let to = NodeId::from_index(rng.gen_range(0..nodes));
        let delta = timed.then(|| Time::Integer(rng.gen_range(0..4)));
        graph
            .add_transition(from, to, Relation::default(), delta)
            .expect("generated id in range");
    }
    graph
}

/// Shape of a generated graph, kept separate from [`Graph`] so proptest can
/// shrink it.
#[derive(Debug, Clone)]
pub struct GraphShape {
    pub events: Vec<usize>,
    pub initial: Vec<bool>,
    pub terminal: Vec<bool>,
    pub edges: Vec<(usize, usize, i64)>,
    pub timed: bool,
}

impl GraphShape {
    pub fn build(&self) -> Graph {
        let mut graph = Graph::new();
        for &e in &self.events {
            graph.add_node(EVENTS[e % EVENTS.len()]);
        }
        let n = self.events.len();
        for i in 0..n {
            let node = NodeId::from_index(i);
            graph
                .set_initial(node, i == 0 || self.initial[i])
                .expect("generated id in range");
            graph
                .set_terminal(node, self.terminal[i])
                .expect("generated id in range");
        }
        for &(from, to, delta) in &self.edges {
            let delta = self.timed.then_some(Time::Integer(delta));
            graph
                .add_transition(
                    NodeId::from_index(from % n),
                    NodeId::from_index(to % n),
                    Relation::default(),
                    delta,
                )
                .expect("generated id in range");
        }
        graph
    }
}

pub fn arb_graph(max_nodes: usize, timed: bool) -> impl Strategy<Value = GraphShape> {
    (1..=max_nodes).prop_flat_map(move |n| {
        (
            prop::collection::vec(0..EVENTS.len(), n),
            prop::collection::vec(prop::bool::weighted(0.2), n),
            prop::collection::vec(prop::bool::weighted(0.3), n),
            prop::collection::vec((0..n, 0..n, 0i64..4), 0..=n + 2),
        )
            .prop_map(move |(events, initial, terminal, edges)| GraphShape {
                events,
                initial,
                terminal,
                edges,
                timed,
            })
    })
}

pub fn arb_kind() -> impl Strategy<Value = InvariantKind> {
    prop_oneof![
        Just(InvariantKind::AlwaysFollowedBy),
        Just(InvariantKind::NeverFollowedBy),
        Just(InvariantKind::AlwaysPrecedes),
    ]
}

pub fn arb_untimed_invariant() -> impl Strategy<Value = Invariant> {
    (arb_kind(), 0..EVENTS.len(), 0..EVENTS.len())
        .prop_map(|(kind, a, b)| Invariant::new(kind, EVENTS[a], EVENTS[b]))
}

/// Time-bounded always-followed-by or always-precedes.
pub fn arb_timed_invariant() -> impl Strategy<Value = Invariant> {
    (any::<bool>(), any::<bool>(), 0..EVENTS.len(), 0..EVENTS.len(), 0i64..7).prop_map(
        |(follows, upper, a, b, bound)| {
            let kind = if follows {
                InvariantKind::AlwaysFollowedBy
            } else {
                InvariantKind::AlwaysPrecedes
            };
            let inv = Invariant::new(kind, EVENTS[a], EVENTS[b]);
            if upper {
                inv.with_upper_bound(bound)
            } else {
                inv.with_lower_bound(bound)
            }
        },
    )
}

/// Whether the invariant names no event of the graph, in which case checking
/// must fail with a validation error.
pub fn names_absent_events(graph: &Graph, invariant: &Invariant) -> bool {
    !graph.contains_event(&invariant.a) && !graph.contains_event(&invariant.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(graph: &Graph) -> Vec<(NodeId, Option<Time>)> {
        let mut out = Vec::new();
        for_each_path(graph, &Relation::default(), 10, |s| {
            if s.len() > out.len() {
                out = s.to_vec();
            }
            Walk::Descend
        });
        out
    }

    #[test]
    fn test_oracle_on_linear_traces() {
        let g = Graph::linear(&["a", "x", "b"]);
        let path = steps(&g);
        assert!(is_path(&g, &Relation::default(), &path));
        assert!(!violates(&g, &Invariant::always_followed_by("a", "b"), &path).unwrap());
        assert!(violates(&g, &Invariant::never_followed_by("a", "b"), &path).unwrap());
        assert!(violates(&g, &Invariant::always_precedes("b", "a"), &path).unwrap());
        assert_eq!(
            shortest_violation(&g, &Invariant::never_followed_by("a", "b"), 5).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_oracle_time_bounds() {
        let g = Graph::linear_timed(&[
            ("a", None),
            ("x", Some(Time::Integer(2))),
            ("b", Some(Time::Integer(1))),
        ]);
        let path = steps(&g);
        let ap = |b: i64| Invariant::always_precedes("a", "b").with_upper_bound(b);
        assert!(!violates(&g, &ap(3), &path).unwrap());
        assert!(violates(&g, &ap(2), &path).unwrap());
        let lower = Invariant::always_followed_by("a", "b").with_lower_bound(4);
        assert!(violates(&g, &lower, &path).unwrap());
    }

    #[test]
    fn test_shape_builds_every_edge() {
        let shape = GraphShape {
            events: vec![0, 1],
            initial: vec![false, true],
            terminal: vec![false, true],
            edges: vec![(0, 1, 2), (3, 2, 0), (1, 1, 1)],
            timed: true,
        };
        let g = shape.build();
        assert_eq!(g.edge_count(), 3);
        assert!(g.is_initial(NodeId::from_index(0)));
        assert!(g.is_initial(NodeId::from_index(1)));
        assert!(g.is_terminal(NodeId::from_index(1)));
        let wrapped = g.successors(NodeId::from_index(1), &Relation::default()).count();
        assert_eq!(wrapped, 2);
    }

    #[test]
    fn test_is_path_rejects_detours() {
        let g = Graph::linear(&["a", "x", "b"]);
        let bogus = vec![(NodeId::from_index(0), None), (NodeId::from_index(2), None)];
        assert!(!is_path(&g, &Relation::default(), &bogus));
        assert!(!is_path(&g, &Relation::default(), &[]));
    }
}
