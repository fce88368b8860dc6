//! Invariant automata.
//!
//! Each invariant kind is a small deterministic automaton over letters that
//! say whether a node's event is the invariant's `a`, its `b`, and whether the
//! node is terminal. The last state of every automaton is its failure state,
//! which is absorbing. Timed kinds attach a [`Clock`] to the states that wait
//! on a time window.
//!
//! Time flows along edges: entering a node first advances the clock by the
//! edge delta, then the node's letter is applied. An `a` node starts a clock
//! at zero. Clocks saturate once they cross the bound threshold (`> bound`
//! for upper bounds, `>= bound` for lower bounds), which keeps the set of
//! distinct clock values finite on cyclic graphs.

use invmc_model::{
    BoundDirection, EventGraph, EventType, Invariant, InvariantKind, NodeId, Time, TimeResult,
};
use std::cmp::Ordering;

/// Classification of one graph node relative to an invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Letter {
    pub is_a: bool,
    pub is_b: bool,
    pub terminal: bool,
}

impl Letter {
    pub fn classify<G: EventGraph>(graph: &G, node: NodeId, a: &EventType, b: &EventType) -> Self {
        let event = graph.event_type(node);
        Letter {
            is_a: event == a,
            is_b: event == b,
            terminal: graph.is_terminal(node),
        }
    }
}

/// Automaton state index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u8);

impl StateId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        StateId(index as u8)
    }
}

const S0: StateId = StateId(0);
const S1: StateId = StateId(1);
const S2: StateId = StateId(2);
const S3: StateId = StateId(3);

/// Elapsed time tracked by a timed state.
#[derive(Debug, Clone, PartialEq)]
pub enum Clock {
    /// The state carries no clock.
    Idle,
    /// Time since the reference `a` event, still short of the threshold.
    Running(Time),
    /// Past the threshold: over the bound (upper) or at least the bound (lower).
    Saturated,
}

/// A time window attached to a timed automaton.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub bound: Time,
    pub direction: BoundDirection,
}

impl Window {
    fn settle(&self, elapsed: Time) -> TimeResult<Clock> {
        let ord = elapsed.try_cmp(&self.bound)?;
        let saturated = match self.direction {
            BoundDirection::Upper => ord == Ordering::Greater,
            BoundDirection::Lower => ord != Ordering::Less,
        };
        Ok(if saturated {
            Clock::Saturated
        } else {
            Clock::Running(elapsed)
        })
    }

    fn start(&self) -> TimeResult<Clock> {
        self.settle(Time::Zero)
    }

    fn advance(&self, clock: &Clock, delta: &Time) -> TimeResult<Clock> {
        match clock {
            Clock::Running(t) => self.settle(t.try_add(delta)?),
            other => Ok(other.clone()),
        }
    }

    /// Whether a `b` arriving with this clock satisfies the window.
    fn met(&self, clock: &Clock) -> bool {
        match self.direction {
            BoundDirection::Upper => matches!(clock, Clock::Running(_)),
            BoundDirection::Lower => matches!(clock, Clock::Saturated),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Automaton {
    /// 0: nothing pending, 1: `a` pending, 2: failure (trace ended while pending).
    AlwaysFollowedBy,
    /// 0: no `a` yet, 1: `a` seen, 2: failure (`b` after `a`).
    NeverFollowedBy,
    /// 0: no `a` yet, 1: `a` seen, 2: failure (`b` before any `a`).
    AlwaysPrecedes,
    /// 0: nothing pending, 1: `a` pending with clock, 2: failure.
    TimedFollowedBy(Window),
    /// 0: neither seen, 1: `a` seen, 2: matched within window, 3: failure.
    TimedPrecedes(Window),
}

impl Automaton {
    pub fn for_invariant(invariant: &Invariant) -> Self {
        let window = invariant.bound.as_ref().map(|b| Window {
            bound: b.value.clone(),
            direction: b.direction,
        });
        match (invariant.kind, window) {
            (InvariantKind::AlwaysFollowedBy, None) => Automaton::AlwaysFollowedBy,
            (InvariantKind::AlwaysFollowedBy, Some(w)) => Automaton::TimedFollowedBy(w),
            (InvariantKind::AlwaysPrecedes, None) => Automaton::AlwaysPrecedes,
            (InvariantKind::AlwaysPrecedes, Some(w)) => Automaton::TimedPrecedes(w),
            // Validation rejects bounded never-followed-by before we get here.
            (InvariantKind::NeverFollowedBy, _) => Automaton::NeverFollowedBy,
        }
    }

    pub fn state_count(&self) -> usize {
        match self {
            Automaton::TimedPrecedes(_) => 4,
            _ => 3,
        }
    }

    pub fn failure(&self) -> StateId {
        StateId::from_index(self.state_count() - 1)
    }

    pub fn is_timed(&self) -> bool {
        self.window().is_some()
    }

    pub fn window(&self) -> Option<&Window> {
        match self {
            Automaton::TimedFollowedBy(w) | Automaton::TimedPrecedes(w) => Some(w),
            _ => None,
        }
    }

    /// State and clock after reading the first node of a path.
    pub fn initial(&self, letter: Letter) -> TimeResult<(StateId, Clock)> {
        self.apply(S0, Clock::Idle, letter)
    }

    /// State and clock after entering a node through an edge with `delta`.
    pub fn step(
        &self,
        from: StateId,
        clock: &Clock,
        letter: Letter,
        delta: &Time,
    ) -> TimeResult<(StateId, Clock)> {
        let clock = match self.window() {
            Some(w) => w.advance(clock, delta)?,
            None => clock.clone(),
        };
        self.apply(from, clock, letter)
    }

    fn apply(&self, from: StateId, clock: Clock, l: Letter) -> TimeResult<(StateId, Clock)> {
        let fail = self.failure();
        let (to, clock) = match self {
            Automaton::AlwaysFollowedBy => {
                let to = match from {
                    S0 if l.is_a => S1,
                    S0 => S0,
                    S1 if l.is_a => S1,
                    S1 if l.is_b => S0,
                    S1 => S1,
                    S2 => S2,
                    _ => unreachable!("AFby state {:?}", from),
                };
                (to, Clock::Idle)
            }
            Automaton::NeverFollowedBy => {
                let to = match from {
                    S0 if l.is_a => S1,
                    S0 => S0,
                    S1 if l.is_b => S2,
                    S1 => S1,
                    S2 => S2,
                    _ => unreachable!("NFby state {:?}", from),
                };
                (to, Clock::Idle)
            }
            Automaton::AlwaysPrecedes => {
                let to = match from {
                    S0 if l.is_a => S1,
                    S0 if l.is_b => S2,
                    S0 => S0,
                    S1 => S1,
                    S2 => S2,
                    _ => unreachable!("AP state {:?}", from),
                };
                (to, Clock::Idle)
            }
            Automaton::TimedFollowedBy(w) => match from {
                S0 if l.is_a => (S1, w.start()?),
                S0 => (S0, Clock::Idle),
                S1 if l.is_b => {
                    if !w.met(&clock) {
                        (S2, Clock::Idle)
                    } else if l.is_a {
                        (S1, w.start()?)
                    } else {
                        (S0, Clock::Idle)
                    }
                }
                S1 if w.direction == BoundDirection::Upper && clock == Clock::Saturated => {
                    (S2, Clock::Idle)
                }
                S1 if l.is_a => match w.direction {
                    // The oldest pending `a` is the first to run out of time.
                    BoundDirection::Upper => (S1, clock),
                    // The newest `a` is the one a quick `b` would violate.
                    BoundDirection::Lower => (S1, w.start()?),
                },
                S1 => (S1, clock),
                S2 => (S2, Clock::Idle),
                _ => unreachable!("timed AFby state {:?}", from),
            },
            Automaton::TimedPrecedes(w) => match from {
                S0 if l.is_a => (S1, w.start()?),
                S0 if l.is_b => (S3, Clock::Idle),
                S0 => (S0, Clock::Idle),
                S1 | S2 if l.is_a => match w.direction {
                    // Measure from the latest `a`.
                    BoundDirection::Upper => (S1, w.start()?),
                    // Measure from the earliest `a`.
                    BoundDirection::Lower => (from, clock),
                },
                S1 | S2 if l.is_b => {
                    if w.met(&clock) {
                        (S2, clock)
                    } else {
                        (S3, Clock::Idle)
                    }
                }
                S1 | S2 => (S2, clock),
                S3 => (S3, Clock::Idle),
                _ => unreachable!("timed AP state {:?}", from),
            },
        };

        // A trace may not end with an `a` still waiting for its `b`.
        let to = match self {
            Automaton::AlwaysFollowedBy | Automaton::TimedFollowedBy(_) if to == S1 && l.terminal => {
                return Ok((fail, Clock::Idle));
            }
            _ => to,
        };
        debug_assert!(to.index() < self.state_count());
        Ok((to, clock))
    }

    /// Orders two clocks held by the same state; `Greater` means `a` is
    /// closer to violating the bound than `b`.
    pub fn severity(&self, a: &Clock, b: &Clock) -> TimeResult<Ordering> {
        let Some(w) = self.window() else {
            return Ok(Ordering::Equal);
        };
        let ord = match (a, b) {
            (Clock::Idle, Clock::Idle) | (Clock::Saturated, Clock::Saturated) => Ordering::Equal,
            (Clock::Running(x), Clock::Running(y)) => x.try_cmp(y)?,
            (Clock::Saturated, Clock::Running(_)) => Ordering::Greater,
            (Clock::Running(_), Clock::Saturated) => Ordering::Less,
            (Clock::Idle, _) | (_, Clock::Idle) => {
                unreachable!("state holds both idle and running clocks: {:?} vs {:?}", a, b)
            }
        };
        Ok(match w.direction {
            BoundDirection::Upper => ord,
            BoundDirection::Lower => ord.reverse(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OTHER: Letter = Letter { is_a: false, is_b: false, terminal: false };
    const A: Letter = Letter { is_a: true, is_b: false, terminal: false };
    const B: Letter = Letter { is_a: false, is_b: true, terminal: false };
    const END: Letter = Letter { is_a: false, is_b: false, terminal: true };

    fn run(automaton: &Automaton, letters: &[(Letter, i64)]) -> (StateId, Clock) {
        let (mut state, mut clock) = automaton.initial(letters[0].0).unwrap();
        for &(letter, delta) in &letters[1..] {
            let next = automaton.step(state, &clock, letter, &Time::Integer(delta)).unwrap();
            state = next.0;
            clock = next.1;
        }
        (state, clock)
    }

    #[test]
    fn test_always_followed_by_fails_at_terminal() {
        let afby = Automaton::AlwaysFollowedBy;
        assert_eq!(run(&afby, &[(A, 0), (OTHER, 0), (END, 0)]).0, afby.failure());
        assert_eq!(run(&afby, &[(A, 0), (B, 0), (END, 0)]).0, S0);
        // A terminal `a` is itself left pending.
        let a_end = Letter { terminal: true, ..A };
        assert_eq!(run(&afby, &[(a_end, 0)]).0, afby.failure());
    }

    #[test]
    fn test_never_followed_by_with_same_event() {
        let nfby = Automaton::NeverFollowedBy;
        let ab = Letter { is_a: true, is_b: true, terminal: false };
        assert_eq!(run(&nfby, &[(ab, 0)]).0, S1);
        assert_eq!(run(&nfby, &[(ab, 0), (OTHER, 0), (ab, 0)]).0, nfby.failure());
    }

    #[test]
    fn test_always_precedes() {
        let ap = Automaton::AlwaysPrecedes;
        assert_eq!(run(&ap, &[(B, 0)]).0, ap.failure());
        assert_eq!(run(&ap, &[(OTHER, 0), (A, 0), (B, 0)]).0, S1);
        assert_eq!(run(&ap, &[(OTHER, 0), (B, 0), (A, 0)]).0, ap.failure());
    }

    #[test]
    fn test_upper_precedes_window_edges() {
        let ap = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_upper_bound(3));
        // `b` exactly at the bound is within it.
        let (state, clock) = run(&ap, &[(A, 0), (OTHER, 1), (B, 2)]);
        assert_eq!(state, S2);
        assert_eq!(clock, Clock::Running(Time::Integer(3)));
        // One unit past is a violation.
        assert_eq!(run(&ap, &[(A, 0), (OTHER, 1), (B, 3)]).0, S3);
        // A fresh `a` restarts the window.
        assert_eq!(run(&ap, &[(A, 0), (OTHER, 5), (A, 0), (B, 2)]).0, S2);
    }

    #[test]
    fn test_lower_precedes_measures_from_first_a() {
        let ap = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_lower_bound(3));
        assert_eq!(run(&ap, &[(A, 0), (B, 2)]).0, S3);
        assert_eq!(run(&ap, &[(A, 0), (A, 2), (B, 1)]).0, S2);
        assert_eq!(run(&ap, &[(A, 0), (B, 3)]), (S2, Clock::Saturated));
    }

    #[test]
    fn test_upper_followed_by_fails_eagerly() {
        let afby = Automaton::for_invariant(
            &Invariant::always_followed_by("a", "b").with_upper_bound(2),
        );
        assert_eq!(run(&afby, &[(A, 0), (OTHER, 1), (B, 1)]).0, S0);
        assert_eq!(run(&afby, &[(A, 0), (OTHER, 3)]).0, afby.failure());
        assert_eq!(run(&afby, &[(A, 0), (A, 2), (OTHER, 1)]).0, afby.failure());
        // Running out of time on a repeated `a` fails just the same.
        assert_eq!(run(&afby, &[(A, 0), (A, 3)]).0, afby.failure());
    }

    #[test]
    fn test_lower_followed_by_rejects_early_b() {
        let afby = Automaton::for_invariant(
            &Invariant::always_followed_by("a", "b").with_lower_bound(2),
        );
        assert_eq!(run(&afby, &[(A, 0), (B, 1)]).0, afby.failure());
        assert_eq!(run(&afby, &[(A, 0), (OTHER, 1), (B, 1)]).0, S0);
        assert_eq!(run(&afby, &[(A, 0), (OTHER, 2), (A, 0), (B, 1)]).0, afby.failure());
    }

    #[test]
    fn test_severity_direction() {
        let upper = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_upper_bound(5));
        let lower = Automaton::for_invariant(&Invariant::always_precedes("a", "b").with_lower_bound(5));
        let one = Clock::Running(Time::Integer(1));
        let two = Clock::Running(Time::Integer(2));
        assert_eq!(upper.severity(&two, &one).unwrap(), Ordering::Greater);
        assert_eq!(lower.severity(&two, &one).unwrap(), Ordering::Less);
        assert_eq!(upper.severity(&Clock::Saturated, &two).unwrap(), Ordering::Greater);
        assert_eq!(lower.severity(&Clock::Saturated, &two).unwrap(), Ordering::Less);
    }
}
