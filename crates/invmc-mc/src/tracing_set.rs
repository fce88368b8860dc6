//! Tracing state sets.
//!
//! A tracing state set records, for one graph node, which automaton states are
//! reachable at that node and the history chains that reach each of them.
//! Untimed states keep only their shortest chain. Timed states also carry a
//! clock, so each state keeps a frontier of (chain, clock) pairs: a pair is
//! dropped only when another pair has a chain that is no longer and a clock
//! that is no further from violating the bound. Clocks saturate, so every
//! frontier stays finite.

use crate::automaton::{Automaton, Clock, Letter, StateId};
use crate::history::HistoryChain;
use invmc_model::{NodeId, Time, TimeResult};
use smallvec::SmallVec;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct Slot {
    chain: HistoryChain,
    clock: Clock,
}

/// Pairs for one automaton state, shortest chain first.
type Frontier = Vec<Slot>;

#[derive(Debug, Clone)]
pub struct TracingStateSet<'a> {
    automaton: &'a Automaton,
    slots: SmallVec<[Frontier; 4]>,
}

impl<'a> TracingStateSet<'a> {
    /// A set with no reached states.
    pub fn new(automaton: &'a Automaton) -> Self {
        Self {
            automaton,
            slots: std::iter::repeat_with(Frontier::new)
                .take(automaton.state_count())
                .collect(),
        }
    }

    /// The set at an initial node: a single length-1 chain.
    pub fn initial(automaton: &'a Automaton, node: NodeId, letter: Letter) -> TimeResult<Self> {
        let mut set = Self::new(automaton);
        set.set_initial(node, letter)?;
        Ok(set)
    }

    /// Adds the state reached by starting a path at `node`.
    pub fn set_initial(&mut self, node: NodeId, letter: Letter) -> TimeResult<bool> {
        let (state, clock) = self.automaton.initial(letter)?;
        self.offer(state, HistoryChain::root(node), clock)
    }

    /// The set at `node` after every chain here takes an edge into it.
    pub fn transition(
        &self,
        node: NodeId,
        letter: Letter,
        delta: Option<&Time>,
    ) -> TimeResult<TracingStateSet<'a>> {
        let mut next = Self::new(self.automaton);
        let elapsed = delta.unwrap_or(&Time::Zero);
        for (index, frontier) in self.slots.iter().enumerate() {
            for slot in frontier {
                let (to, clock) =
                    self.automaton
                        .step(StateId::from_index(index), &slot.clock, letter, elapsed)?;
                next.offer(to, slot.chain.extend(node, delta.cloned()), clock)?;
            }
        }
        Ok(next)
    }

    /// Folds `other` into this set. Returns whether any pair was added.
    pub fn merge_with(&mut self, other: &TracingStateSet<'a>) -> TimeResult<bool> {
        debug_assert!(std::ptr::eq(self.automaton, other.automaton));
        let mut changed = false;
        for (index, frontier) in other.slots.iter().enumerate() {
            for slot in frontier {
                changed |= self.offer(
                    StateId::from_index(index),
                    slot.chain.clone(),
                    slot.clock.clone(),
                )?;
            }
        }
        Ok(changed)
    }

    /// Whether `(x, cx)` is at least as good as `(y, cy)`: no longer and no
    /// further from violating.
    fn beats(
        &self,
        x: &HistoryChain,
        cx: &Clock,
        y: &HistoryChain,
        cy: &Clock,
    ) -> TimeResult<bool> {
        Ok(x.len() <= y.len() && self.automaton.severity(cx, cy)? != Ordering::Less)
    }

    fn offer(&mut self, state: StateId, chain: HistoryChain, clock: Clock) -> TimeResult<bool> {
        let frontier = &self.slots[state.index()];
        let mut beaten: SmallVec<[bool; 4]> = SmallVec::with_capacity(frontier.len());
        for existing in frontier {
            if self.beats(&existing.chain, &existing.clock, &chain, &clock)? {
                return Ok(false);
            }
            beaten.push(self.beats(&chain, &clock, &existing.chain, &existing.clock)?);
        }

        let frontier = &mut self.slots[state.index()];
        let mut beaten = beaten.into_iter();
        frontier.retain(|_| !beaten.next().unwrap_or(false));
        let at = frontier.partition_point(|s| s.chain.len() <= chain.len());
        frontier.insert(at, Slot { chain, clock });
        Ok(true)
    }

    /// Whether every state reached here is also reached in `other`.
    pub fn is_subset(&self, other: &TracingStateSet<'_>) -> bool {
        self.slots
            .iter()
            .zip(other.slots.iter())
            .all(|(mine, theirs)| mine.is_empty() || !theirs.is_empty())
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.slots.get(state.index()).is_some_and(|f| !f.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }

    /// Reached states in index order.
    pub fn reached(&self) -> impl Iterator<Item = StateId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_empty())
            .map(|(i, _)| StateId::from_index(i))
    }

    /// Shortest chain reaching `state`.
    pub fn chain(&self, state: StateId) -> Option<&HistoryChain> {
        self.slots
            .get(state.index())
            .and_then(|f| f.first())
            .map(|s| &s.chain)
    }

    /// Clock carried by the shortest chain reaching `state`.
    pub fn clock(&self, state: StateId) -> Option<&Clock> {
        self.slots
            .get(state.index())
            .and_then(|f| f.first())
            .map(|s| &s.clock)
    }

    /// The shortest witness chain for the failure state, if it was reached.
    pub fn failpath(&self) -> Option<&HistoryChain> {
        self.chain(self.automaton.failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invmc_model::Invariant;

    const OTHER: Letter = Letter { is_a: false, is_b: false, terminal: false };
    const A: Letter = Letter { is_a: true, is_b: false, terminal: false };
    const B: Letter = Letter { is_a: false, is_b: true, terminal: false };

    fn n(i: usize) -> NodeId {
        NodeId::from_index(i)
    }

    fn s(i: usize) -> StateId {
        StateId::from_index(i)
    }

    #[test]
    fn test_transition_extends_chains() {
        let ap = Automaton::AlwaysPrecedes;
        let set = TracingStateSet::initial(&ap, n(0), OTHER).unwrap();
        let next = set.transition(n(4), B, None).unwrap();
        assert!(next.contains(ap.failure()));
        assert_eq!(next.failpath().unwrap().to_path(), vec![n(0), n(4)]);
        assert!(!set.contains(ap.failure()));
    }

    #[test]
    fn test_merge_keeps_shorter_chain() {
        let nfby = Automaton::NeverFollowedBy;
        let short = TracingStateSet::initial(&nfby, n(0), A).unwrap();
        let long = TracingStateSet::initial(&nfby, n(1), OTHER)
            .unwrap()
            .transition(n(2), A, None)
            .unwrap();

        let mut merged = long.clone();
        assert!(merged.merge_with(&short).unwrap());
        assert_eq!(merged.chain(s(1)).unwrap().len(), 1);

        // Merging the longer one back is not an improvement.
        assert!(!merged.merge_with(&long).unwrap());
        assert_eq!(merged.chain(s(1)).unwrap().to_path(), vec![n(0)]);
    }

    #[test]
    fn test_merge_equal_length_keeps_existing() {
        let nfby = Automaton::NeverFollowedBy;
        let mut left = TracingStateSet::initial(&nfby, n(0), A).unwrap();
        let right = TracingStateSet::initial(&nfby, n(1), A).unwrap();
        assert!(!left.merge_with(&right).unwrap());
        assert_eq!(left.chain(s(1)).unwrap().node(), n(0));
    }

    #[test]
    fn test_subset() {
        let ap = Automaton::AlwaysPrecedes;
        let idle = TracingStateSet::initial(&ap, n(0), OTHER).unwrap();
        let mut both = TracingStateSet::initial(&ap, n(1), A).unwrap();
        assert!(!idle.is_subset(&both));
        both.merge_with(&idle).unwrap();
        assert!(idle.is_subset(&both));
        assert!(both.is_subset(&both));
        assert!(TracingStateSet::new(&ap).is_subset(&idle));
        assert_eq!(both.reached().collect::<Vec<_>>(), vec![s(0), s(1)]);
    }

    #[test]
    fn test_later_clock_replaces_equal_length_chain() {
        let ap = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_upper_bound(10));
        let early = TracingStateSet::initial(&ap, n(0), A).unwrap();
        let late = TracingStateSet::initial(&ap, n(1), A)
            .unwrap()
            .transition(n(2), OTHER, Some(&Time::Integer(4)))
            .unwrap();
        // A restarted window is no worse than the one already pending.
        let mut at_seen = early.clone();
        let advanced = late.transition(n(3), A, Some(&Time::Integer(0))).unwrap();
        assert!(!at_seen.merge_with(&advanced).unwrap());

        let mut at_matched = late.clone();
        let quick = early.transition(n(2), OTHER, Some(&Time::Integer(1))).unwrap();
        assert!(!at_matched.merge_with(&quick).unwrap());
        assert_eq!(at_matched.clock(s(2)), Some(&Clock::Running(Time::Integer(4))));

        let mut reversed = quick.clone();
        assert!(reversed.merge_with(&late).unwrap());
        assert_eq!(reversed.chain(s(2)).unwrap().to_path(), vec![n(1), n(2)]);
    }

    #[test]
    fn test_shorter_chain_with_milder_clock_is_kept() {
        let ap = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_upper_bound(10));
        let quick = TracingStateSet::initial(&ap, n(0), A)
            .unwrap()
            .transition(n(2), OTHER, Some(&Time::Integer(1)))
            .unwrap();
        let late = TracingStateSet::initial(&ap, n(1), A)
            .unwrap()
            .transition(n(2), OTHER, Some(&Time::Integer(4)))
            .unwrap();
        let slow = late.transition(n(2), OTHER, Some(&Time::Integer(0))).unwrap();

        let mut merged = quick.clone();
        assert!(merged.merge_with(&slow).unwrap());
        assert_eq!(merged.slots[2].len(), 2);
        assert_eq!(merged.chain(s(2)).unwrap().len(), 2);
        assert_eq!(merged.clock(s(2)), Some(&Clock::Running(Time::Integer(1))));

        // Same length as `quick` and a later clock: both older pairs go.
        assert!(merged.merge_with(&late).unwrap());
        assert_eq!(merged.slots[2].len(), 1);
        assert_eq!(merged.chain(s(2)).unwrap().to_path(), vec![n(1), n(2)]);
        assert!(!merged.merge_with(&slow).unwrap());
    }

    #[test]
    fn test_upper_precedes_bound_edges() {
        let ap = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_upper_bound(5));
        let start = TracingStateSet::initial(&ap, n(0), A).unwrap();

        let on_time = start.transition(n(1), B, Some(&Time::Integer(5))).unwrap();
        assert!(on_time.failpath().is_none());
        assert_eq!(on_time.clock(s(2)), Some(&Clock::Running(Time::Integer(5))));

        let late = start.transition(n(1), B, Some(&Time::Integer(6))).unwrap();
        let path = late.failpath().unwrap();
        assert_eq!(path.to_path(), vec![n(0), n(1)]);
        assert_eq!(path.to_steps()[1].1, Some(Time::Integer(6)));
    }

    #[test]
    fn test_mismatched_delta_kind_is_an_error() {
        let ap = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_upper_bound(5));
        let start = TracingStateSet::initial(&ap, n(0), A).unwrap();
        assert!(start.transition(n(1), OTHER, Some(&Time::Float(1.0))).is_err());
    }
}
