//! Worklist fixpoint explorer.
//!
//! Propagates tracing state sets along the edges of one relation until no
//! node's set changes, then reads the verdict off the failure slots.

use crate::automaton::{Automaton, Letter};
use crate::history::HistoryChain;
use crate::tracing_set::TracingStateSet;
use invmc_model::{EventGraph, Invariant, InvariantError, NodeId, Time, TimeError, Transition};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Invariant checking error. These are never verdicts: a check that errors
/// says nothing about whether the invariant holds.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid invariant: {0}")]
    Invariant(#[from] InvariantError),

    #[error("time error on edge {from} -> {to}: {source}")]
    Time {
        from: NodeId,
        to: NodeId,
        #[source]
        source: TimeError,
    },

    #[error("edge {from} -> {to} has no time delta but the invariant is time-bounded")]
    MissingTimeDelta { from: NodeId, to: NodeId },

    #[error("backends disagree on '{invariant}': automaton says {automaton}, closure says {closure}")]
    Disagreement {
        invariant: String,
        automaton: &'static str,
        closure: &'static str,
    },
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Which algorithm decides an invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Fixpoint exploration with tracing state sets.
    #[default]
    Automaton,
    /// Transitive closure reachability. Untimed invariants only; timed ones
    /// are handed to the automaton backend.
    Closure,
    /// Run both on untimed invariants and fail on disagreement.
    CrossCheck,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Automaton => "automaton",
            Backend::Closure => "closure",
            Backend::CrossCheck => "cross-check",
        })
    }
}

/// Configuration for invariant checking.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub backend: Backend,
    /// Maximum number of worklist pops per invariant (0 = unlimited).
    pub max_iterations: usize,
    /// Maximum wall-clock seconds per invariant (0 = unlimited).
    pub max_time_secs: u64,
    /// Check the invariants of a set in parallel.
    pub parallel: bool,
    /// Number of threads for parallel checking (0 = use all available).
    pub num_threads: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Automaton,
            max_iterations: 0,
            max_time_secs: 0,
            parallel: true,
            num_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReason {
    Iterations,
    Time,
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitReason::Iterations => write!(f, "iteration limit reached"),
            LimitReason::Time => write!(f, "time limit reached"),
        }
    }
}

/// A path from an initial node that drives the automaton into its failure
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct Counterexample {
    /// Visited nodes with the delta of the edge that entered each one.
    steps: Vec<(NodeId, Option<Time>)>,
}

#[allow(clippy::len_without_is_empty)]
impl Counterexample {
    pub fn from_chain(chain: &HistoryChain) -> Self {
        Self {
            steps: chain.to_steps(),
        }
    }

    pub fn steps(&self) -> &[(NodeId, Option<Time>)] {
        &self.steps
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.steps.iter().map(|(n, _)| *n).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `a -> x -(+3)-> b`, with edge deltas where present.
    pub fn render<G: EventGraph>(&self, graph: &G) -> String {
        self.render_with(|node| graph.event_type(node).to_string())
    }

    /// Like [`render`](Self::render), with each node written by `label`.
    pub fn render_with(&self, mut label: impl FnMut(NodeId) -> String) -> String {
        let mut out = String::new();
        for (i, (node, delta)) in self.steps.iter().enumerate() {
            if i > 0 {
                match delta {
                    Some(d) => out.push_str(&format!(" -(+{})-> ", d)),
                    None => out.push_str(" -> "),
                }
            }
            out.push_str(&label(*node));
        }
        out
    }
}

/// Result of checking one invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// No path reaches the failure state.
    Holds { iterations: usize },
    /// Some path reaches the failure state. The closure backend decides
    /// without building a witness.
    Violated {
        counterexample: Option<Counterexample>,
        iterations: usize,
    },
    /// Exploration stopped before convergence without finding a violation.
    Inconclusive {
        reason: LimitReason,
        iterations: usize,
    },
}

impl CheckOutcome {
    pub fn is_violated(&self) -> bool {
        matches!(self, CheckOutcome::Violated { .. })
    }

    pub fn holds(&self) -> bool {
        matches!(self, CheckOutcome::Holds { .. })
    }

    pub fn counterexample(&self) -> Option<&Counterexample> {
        match self {
            CheckOutcome::Violated { counterexample, .. } => counterexample.as_ref(),
            _ => None,
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            CheckOutcome::Holds { iterations }
            | CheckOutcome::Violated { iterations, .. }
            | CheckOutcome::Inconclusive { iterations, .. } => *iterations,
        }
    }

    /// Short verdict name used in logs and errors.
    pub fn verdict(&self) -> &'static str {
        match self {
            CheckOutcome::Holds { .. } => "holds",
            CheckOutcome::Violated { .. } => "violated",
            CheckOutcome::Inconclusive { .. } => "inconclusive",
        }
    }
}

/// Per-node state sets after exploration.
pub struct Fixpoint<'a> {
    sets: Vec<TracingStateSet<'a>>,
    iterations: usize,
    limit: Option<LimitReason>,
}

impl<'a> Fixpoint<'a> {
    pub fn set(&self, node: NodeId) -> &TracingStateSet<'a> {
        &self.sets[node.index()]
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Set when exploration stopped early.
    pub fn limit(&self) -> Option<LimitReason> {
        self.limit
    }

    /// Shortest failure witness, ties broken by the lowest node index.
    pub fn shortest_failpath(&self) -> Option<&HistoryChain> {
        self.sets
            .iter()
            .enumerate()
            .filter_map(|(i, set)| set.failpath().map(|chain| (chain.len(), i, chain)))
            .min_by_key(|&(len, i, _)| (len, i))
            .map(|(_, _, chain)| chain)
    }

    /// A witness found before a limit was hit is still reported as a violation.
    pub fn outcome(&self) -> CheckOutcome {
        let iterations = self.iterations;
        match (self.shortest_failpath(), self.limit) {
            (Some(chain), _) => CheckOutcome::Violated {
                counterexample: Some(Counterexample::from_chain(chain)),
                iterations,
            },
            (None, Some(reason)) => CheckOutcome::Inconclusive { reason, iterations },
            (None, None) => CheckOutcome::Holds { iterations },
        }
    }
}

/// Fixpoint explorer for a single invariant over one graph.
pub struct Explorer<'g, G: EventGraph> {
    graph: &'g G,
    invariant: &'g Invariant,
    automaton: Automaton,
    /// Letter of every node, indexed by `NodeId`.
    letters: Vec<Letter>,
    config: CheckConfig,
}

impl<'g, G: EventGraph> Explorer<'g, G> {
    /// Validates the invariant against the graph before anything is explored.
    pub fn new(graph: &'g G, invariant: &'g Invariant, config: CheckConfig) -> CheckResult<Self> {
        invariant.validate(graph)?;
        let automaton = Automaton::for_invariant(invariant);
        let letters = graph
            .nodes()
            .map(|n| Letter::classify(graph, n, &invariant.a, &invariant.b))
            .collect();
        Ok(Self {
            graph,
            invariant,
            automaton,
            letters,
            config,
        })
    }

    pub fn check(&self) -> CheckResult<CheckOutcome> {
        info!(
            invariant = %self.invariant,
            nodes = self.graph.node_count(),
            timed = self.automaton.is_timed(),
            "exploring"
        );
        let fixpoint = self.explore()?;
        let outcome = fixpoint.outcome();
        info!(
            invariant = %self.invariant,
            iterations = outcome.iterations(),
            verdict = outcome.verdict(),
            "exploration finished"
        );
        Ok(outcome)
    }

    fn letter(&self, node: NodeId) -> Letter {
        self.letters[node.index()]
    }

    /// Delta to feed the automaton for an edge. Timed invariants need a
    /// non-negative delta on every edge they traverse.
    fn edge_delta<'t>(&self, from: NodeId, edge: &'t Transition) -> CheckResult<Option<&'t Time>> {
        if !self.automaton.is_timed() {
            return Ok(edge.delta.as_ref());
        }
        let Some(delta) = edge.delta.as_ref() else {
            return Err(CheckError::MissingTimeDelta {
                from,
                to: edge.target,
            });
        };
        delta.check_non_negative().map_err(|source| CheckError::Time {
            from,
            to: edge.target,
            source,
        })?;
        Ok(Some(delta))
    }

    fn propagate<'s>(
        &'s self,
        from: NodeId,
        source: &TracingStateSet<'s>,
        edge: &Transition,
    ) -> CheckResult<TracingStateSet<'s>> {
        let delta = self.edge_delta(from, edge)?;
        let to = edge.target;
        source
            .transition(to, self.letter(to), delta)
            .map_err(|source| CheckError::Time { from, to, source })
    }

    fn past_deadline(deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs the worklist to convergence or until a limit is hit.
    pub fn explore(&self) -> CheckResult<Fixpoint<'_>> {
        let n = self.graph.node_count();
        let relation = &self.invariant.relation;
        let deadline = (self.config.max_time_secs > 0)
            .then(|| Instant::now() + Duration::from_secs(self.config.max_time_secs));

        let mut sets: Vec<TracingStateSet<'_>> =
            (0..n).map(|_| TracingStateSet::new(&self.automaton)).collect();
        let mut queued = vec![false; n];
        let mut worklist = VecDeque::new();

        for node in self.graph.initial_nodes() {
            sets[node.index()]
                .set_initial(node, self.letter(node))
                .map_err(|source| CheckError::Time {
                    from: node,
                    to: node,
                    source,
                })?;
            queued[node.index()] = true;
            worklist.push_back(node);
        }
        debug!(initial = worklist.len(), relation = %relation, "seeded worklist");

        let mut iterations = 0usize;
        let mut limit = None;
        while let Some(node) = worklist.pop_front() {
            queued[node.index()] = false;

            if self.config.max_iterations > 0 && iterations >= self.config.max_iterations {
                info!(iterations, "reached iteration limit");
                limit = Some(LimitReason::Iterations);
                break;
            }
            if iterations % 1024 == 0 && Self::past_deadline(deadline) {
                info!(iterations, "reached time limit");
                limit = Some(LimitReason::Time);
                break;
            }
            iterations += 1;
            trace!(node = %node, queue = worklist.len(), "propagating");

            let source = sets[node.index()].clone();
            for edge in self.graph.successors(node, relation) {
                let proposed = self.propagate(node, &source, edge)?;
                let target = &mut sets[edge.target.index()];
                let grew = !proposed.is_subset(target);
                let improved = target
                    .merge_with(&proposed)
                    .map_err(|source| CheckError::Time {
                        from: node,
                        to: edge.target,
                        source,
                    })?;
                if (grew || improved) && !queued[edge.target.index()] {
                    queued[edge.target.index()] = true;
                    worklist.push_back(edge.target);
                }
            }
        }

        Ok(Fixpoint {
            sets,
            iterations,
            limit,
        })
    }

    /// Re-propagates every edge of a converged fixpoint and reports whether
    /// any state set would still change.
    pub fn verify_fixpoint<'s>(&'s self, fixpoint: &Fixpoint<'s>) -> CheckResult<bool> {
        let relation = &self.invariant.relation;
        for node in self.graph.nodes() {
            let source = fixpoint.set(node);
            if source.is_empty() {
                continue;
            }
            for edge in self.graph.successors(node, relation) {
                let proposed = self.propagate(node, source, edge)?;
                let mut target = fixpoint.set(edge.target).clone();
                if !proposed.is_subset(&target) {
                    debug!(from = %node, to = %edge.target, "successor would gain a state");
                    return Ok(false);
                }
                let improved = target
                    .merge_with(&proposed)
                    .map_err(|source| CheckError::Time {
                        from: node,
                        to: edge.target,
                        source,
                    })?;
                if improved {
                    debug!(from = %node, to = %edge.target, "successor would improve a witness");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
