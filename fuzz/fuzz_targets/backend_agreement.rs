#![no_main]
use invmc_mc::{check_invariant, Backend, CheckConfig, CheckError, ClosureCache};
use invmc_model::{EventGraph, Graph, Invariant, InvariantKind, NodeId};
use libfuzzer_sys::fuzz_target;

const EVENTS: [&str; 3] = ["a", "b", "c"];

/// First byte picks the invariant, the next picks the node count, one byte
/// per node sets event and flags, and the rest are edge pairs.
fn decode(data: &[u8]) -> Option<(Graph, Invariant)> {
    let (&pick, rest) = data.split_first()?;
    let (&count, rest) = rest.split_first()?;
    let nodes = 1 + count as usize % 8;
    if rest.len() < nodes {
        return None;
    }
    let (flags, edges) = rest.split_at(nodes);

    let mut graph = Graph::new();
    for (i, &f) in flags.iter().enumerate() {
        let id = graph.add_node(EVENTS[f as usize % 3]);
        graph.set_initial(id, i == 0 || f & 0x10 != 0).ok()?;
        graph.set_terminal(id, f & 0x20 != 0).ok()?;
    }
    for pair in edges.chunks_exact(2).take(24) {
        let from = NodeId::from_index(pair[0] as usize % nodes);
        let to = NodeId::from_index(pair[1] as usize % nodes);
        graph.add_transition(from, to, "t", None).ok()?;
    }

    let kind = match pick % 3 {
        0 => InvariantKind::AlwaysFollowedBy,
        1 => InvariantKind::NeverFollowedBy,
        _ => InvariantKind::AlwaysPrecedes,
    };
    let a = EVENTS[(pick / 3) as usize % 3];
    let b = EVENTS[(pick / 9) as usize % 3];
    Some((graph, Invariant::new(kind, a, b)))
}

fuzz_target!(|data: &[u8]| {
    let Some((graph, invariant)) = decode(data) else {
        return;
    };
    let config = CheckConfig {
        backend: Backend::CrossCheck,
        parallel: false,
        max_time_secs: 2,
        ..CheckConfig::default()
    };
    match check_invariant(&graph, &invariant, &config, &ClosureCache::new()) {
        Err(e @ CheckError::Disagreement { .. }) => panic!("{}", e),
        Ok(outcome) => {
            if let Some(cx) = outcome.counterexample() {
                let nodes = cx.nodes();
                assert!(graph.is_initial(nodes[0]));
                for w in nodes.windows(2) {
                    assert!(graph.transitions(w[0]).iter().any(|t| t.target == w[1]));
                }
            }
        }
        Err(_) => {}
    }
});
