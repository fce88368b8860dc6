//! Backend dispatch for a single invariant.

use crate::explorer::{Backend, CheckConfig, CheckError, CheckOutcome, CheckResult, Explorer};
use crate::relational::{closure_violates, ClosureCache};
use invmc_model::{EventGraph, Invariant};
use tracing::{debug, error};

/// Checks one invariant with the backend named in `config`.
///
/// `cache` must only ever have seen `graph`.
pub fn check_invariant<G: EventGraph>(
    graph: &G,
    invariant: &Invariant,
    config: &CheckConfig,
    cache: &ClosureCache,
) -> CheckResult<CheckOutcome> {
    match config.backend {
        Backend::Automaton => Explorer::new(graph, invariant, config.clone())?.check(),
        Backend::Closure | Backend::CrossCheck if invariant.is_timed() => {
            debug!(invariant = %invariant, backend = %config.backend, "time-bounded invariant, using automaton");
            Explorer::new(graph, invariant, config.clone())?.check()
        }
        Backend::Closure => {
            invariant.validate(graph)?;
            Ok(closure_outcome(closure_violates(graph, invariant, cache)))
        }
        Backend::CrossCheck => {
            let automaton = Explorer::new(graph, invariant, config.clone())?.check()?;
            if let CheckOutcome::Inconclusive { .. } = automaton {
                return Ok(automaton);
            }
            let closure = closure_outcome(closure_violates(graph, invariant, cache));
            if automaton.is_violated() != closure.is_violated() {
                error!(
                    invariant = %invariant,
                    automaton = automaton.verdict(),
                    closure = closure.verdict(),
                    "backends disagree"
                );
                return Err(CheckError::Disagreement {
                    invariant: invariant.to_string(),
                    automaton: automaton.verdict(),
                    closure: closure.verdict(),
                });
            }
            Ok(automaton)
        }
    }
}

fn closure_outcome(violated: bool) -> CheckOutcome {
    if violated {
        CheckOutcome::Violated {
            counterexample: None,
            iterations: 0,
        }
    } else {
        CheckOutcome::Holds { iterations: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invmc_model::{Graph, Time};

    fn config(backend: Backend) -> CheckConfig {
        CheckConfig {
            backend,
            ..CheckConfig::default()
        }
    }

    #[test]
    fn test_closure_backend_has_no_witness() {
        let graph = Graph::linear(&["a", "x", "b"]);
        let inv = Invariant::never_followed_by("a", "b");
        let outcome =
            check_invariant(&graph, &inv, &config(Backend::Closure), &ClosureCache::new()).unwrap();
        assert!(outcome.is_violated());
        assert!(outcome.counterexample().is_none());
    }

    #[test]
    fn test_cross_check_returns_witness() {
        let graph = Graph::linear(&["x", "b", "a"]);
        let inv = Invariant::always_precedes("a", "b");
        let outcome = check_invariant(&graph, &inv, &config(Backend::CrossCheck), &ClosureCache::new())
            .unwrap();
        assert_eq!(outcome.counterexample().unwrap().len(), 2);
    }

    #[test]
    fn test_timed_invariant_falls_back_to_automaton() {
        let graph = Graph::linear_timed(&[("a", None), ("b", Some(Time::Integer(4)))]);
        let inv = Invariant::always_precedes("a", "b").with_upper_bound(3);
        let cache = ClosureCache::new();
        let outcome = check_invariant(&graph, &inv, &config(Backend::Closure), &cache).unwrap();
        assert!(outcome.counterexample().is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_closure_backend_validates() {
        let graph = Graph::linear(&["x"]);
        let inv = Invariant::always_precedes("a", "b");
        let err = check_invariant(&graph, &inv, &config(Backend::Closure), &ClosureCache::new())
            .unwrap_err();
        assert!(matches!(err, CheckError::Invariant(_)));
    }
}
