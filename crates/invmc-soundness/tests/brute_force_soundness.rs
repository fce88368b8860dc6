//! The explorer against the path-enumeration oracle.
//!
//! Untimed invariants: the verdict must match the oracle exactly and the
//! counterexample must be as short as the oracle's shortest violation.
//! Time-bounded invariants: every reported counterexample must replay as a
//! violation no longer than any other violating path, and "holds" must
//! survive enumeration up to the same bound.

use invmc_mc::{CheckError, CheckOutcome};
use invmc_model::Graph;
use invmc_soundness::{
    arb_graph, arb_timed_invariant, arb_untimed_invariant, check, is_path, names_absent_events,
    path_bound, shortest_violation, test_config, violates,
};
use proptest::prelude::*;

fn outcome_or_skip(graph: &Graph, inv: &invmc_model::Invariant) -> Option<CheckOutcome> {
    match check(graph, inv, test_config()) {
        Ok(outcome) => Some(outcome),
        Err(CheckError::Invariant(_)) => {
            assert!(names_absent_events(graph, inv), "{} rejected unexpectedly", inv);
            None
        }
        Err(e) => panic!("check of {} failed: {}", inv, e),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        // Override in CI with PROPTEST_CASES env var.
        cases: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn untimed_verdicts_match_oracle(shape in arb_graph(5, false), inv in arb_untimed_invariant()) {
        let graph = shape.build();
        let Some(outcome) = outcome_or_skip(&graph, &inv) else { return Ok(()) };
        let oracle = shortest_violation(&graph, &inv, path_bound(&graph)).unwrap();

        match (&outcome, oracle) {
            (CheckOutcome::Holds { .. }, None) => {}
            (CheckOutcome::Violated { counterexample: Some(cex), .. }, Some(shortest)) => {
                prop_assert!(is_path(&graph, &inv.relation, cex.steps()), "not a path: {:?}", cex);
                prop_assert!(violates(&graph, &inv, cex.steps()).unwrap());
                prop_assert_eq!(cex.len(), shortest, "counterexample is not minimal");
            }
            (outcome, oracle) => {
                prop_assert!(false, "{}: engine {:?}, oracle {:?} on {:?}", inv, outcome, oracle, shape);
            }
        }
    }

    #[test]
    fn timed_verdicts_are_sound(shape in arb_graph(4, true), inv in arb_timed_invariant()) {
        let graph = shape.build();
        let Some(outcome) = outcome_or_skip(&graph, &inv) else { return Ok(()) };

        match &outcome {
            CheckOutcome::Violated { counterexample: Some(cex), .. } => {
                prop_assert!(is_path(&graph, &inv.relation, cex.steps()), "not a path: {:?}", cex);
                prop_assert!(
                    violates(&graph, &inv, cex.steps()).unwrap(),
                    "{}: counterexample {} does not violate",
                    inv,
                    cex.render(&graph)
                );
                let shortest = shortest_violation(&graph, &inv, cex.len()).unwrap();
                prop_assert_eq!(shortest, Some(cex.len()), "counterexample is not minimal");
            }
            CheckOutcome::Holds { .. } => {
                let found = shortest_violation(&graph, &inv, path_bound(&graph)).unwrap();
                prop_assert!(found.is_none(), "{} holds but oracle found {:?} on {:?}", inv, found, shape);
            }
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }
}
