#![no_main]
use invmc_mc::{CheckConfig, Explorer};
use invmc_model::{EventGraph, Graph, Invariant, NodeId, Time};
use libfuzzer_sys::fuzz_target;

const EVENTS: [&str; 3] = ["a", "b", "c"];

fuzz_target!(|data: &[u8]| {
    let Some((&pick, rest)) = data.split_first() else {
        return;
    };
    let Some((&count, rest)) = rest.split_first() else {
        return;
    };
    let nodes = 1 + count as usize % 6;
    if rest.len() < nodes {
        return;
    }
    let (flags, edges) = rest.split_at(nodes);

    let mut graph = Graph::new();
    for (i, &f) in flags.iter().enumerate() {
        let id = graph.add_node(EVENTS[f as usize % 3]);
        let _ = graph.set_initial(id, i == 0 || f & 0x10 != 0);
        let _ = graph.set_terminal(id, f & 0x20 != 0);
    }
    for triple in edges.chunks_exact(3).take(16) {
        let from = NodeId::from_index(triple[0] as usize % nodes);
        let to = NodeId::from_index(triple[1] as usize % nodes);
        let delta = Time::Integer(i64::from(triple[2] % 8));
        let _ = graph.add_transition(from, to, "t", Some(delta));
    }

    let bound = i64::from(pick % 7);
    let base = if pick & 0x40 != 0 {
        Invariant::always_precedes("a", "b")
    } else {
        Invariant::always_followed_by("a", "b")
    };
    let invariant = if pick & 0x80 != 0 {
        base.with_lower_bound(bound)
    } else {
        base.with_upper_bound(bound)
    };

    let config = CheckConfig {
        parallel: false,
        max_iterations: 10_000,
        ..CheckConfig::default()
    };
    let Ok(explorer) = Explorer::new(&graph, &invariant, config) else {
        return;
    };
    let Ok(outcome) = explorer.check() else {
        return;
    };
    if let Some(cx) = outcome.counterexample() {
        let steps = cx.steps();
        assert!(graph.is_initial(steps[0].0));
        for w in steps.windows(2) {
            let (from, to) = (w[0].0, w[1].0);
            assert!(graph
                .transitions(from)
                .iter()
                .any(|t| t.target == to && t.delta == w[1].1));
        }
    }
});
