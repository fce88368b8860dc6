//! A converged fixpoint is stable under another round of propagation, and
//! exploring twice gives the same answer.

use invmc_mc::{CheckConfig, Explorer};
use invmc_soundness::{arb_graph, arb_timed_invariant, arb_untimed_invariant, test_config};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        // Override in CI with PROPTEST_CASES env var.
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn untimed_fixpoint_is_stable(shape in arb_graph(8, false), inv in arb_untimed_invariant()) {
        let graph = shape.build();
        let Ok(explorer) = Explorer::new(&graph, &inv, test_config()) else { return Ok(()) };
        let fixpoint = explorer.explore().unwrap();
        prop_assert!(fixpoint.limit().is_none());
        prop_assert!(explorer.verify_fixpoint(&fixpoint).unwrap(), "{} on {:?}", inv, shape);
        let again = explorer.explore().unwrap();
        prop_assert_eq!(fixpoint.outcome(), again.outcome());
    }

    #[test]
    fn timed_fixpoint_is_stable(shape in arb_graph(6, true), inv in arb_timed_invariant()) {
        let graph = shape.build();
        let Ok(explorer) = Explorer::new(&graph, &inv, test_config()) else { return Ok(()) };
        let fixpoint = explorer.explore().unwrap();
        prop_assert!(explorer.verify_fixpoint(&fixpoint).unwrap(), "{} on {:?}", inv, shape);
    }

    #[test]
    fn tiny_iteration_limit_never_claims_holds(shape in arb_graph(8, false), inv in arb_untimed_invariant()) {
        let graph = shape.build();
        let config = CheckConfig { max_iterations: 1, ..test_config() };
        let Ok(limited) = Explorer::new(&graph, &inv, config) else { return Ok(()) };
        let full = Explorer::new(&graph, &inv, test_config()).unwrap().check().unwrap();
        let outcome = limited.check().unwrap();
        if outcome.holds() {
            prop_assert!(full.holds());
        }
    }
}
