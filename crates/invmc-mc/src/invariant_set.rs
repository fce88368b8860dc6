//! Checking many invariants against one graph.

use crate::check::check_invariant;
use crate::explorer::{CheckConfig, CheckOutcome, CheckResult, Counterexample};
use crate::relational::ClosureCache;
use invmc_model::{EventGraph, Invariant};
use rayon::prelude::*;
use tracing::{debug, info};

/// Invariants in insertion order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct InvariantSet {
    invariants: Vec<Invariant>,
}

/// Result for one invariant of a set.
#[derive(Debug)]
pub struct InvariantReport {
    pub invariant: Invariant,
    pub result: CheckResult<CheckOutcome>,
}

/// A violated invariant and its witness, if the backend produced one.
#[derive(Debug, Clone)]
pub struct Violation {
    pub invariant: Invariant,
    pub counterexample: Option<Counterexample>,
}

impl InvariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `invariant` unless an equal one is present. Returns whether it was
    /// added.
    pub fn add(&mut self, invariant: Invariant) -> bool {
        if self.contains(&invariant) {
            return false;
        }
        self.invariants.push(invariant);
        true
    }

    pub fn contains(&self, invariant: &Invariant) -> bool {
        self.invariants.iter().any(|i| i == invariant)
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Invariant> {
        self.invariants.iter()
    }

    /// Equal as sets, ignoring order.
    pub fn same_invariants(&self, other: &InvariantSet) -> bool {
        self.len() == other.len() && self.iter().all(|i| other.contains(i))
    }

    /// Checks every invariant; one report per invariant, in set order. An
    /// error in one check leaves the others untouched.
    pub fn check_all<G: EventGraph + Sync>(
        &self,
        graph: &G,
        config: &CheckConfig,
    ) -> Vec<InvariantReport> {
        if config.parallel && config.num_threads > 0 {
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_threads)
                .build_global()
            {
                debug!(error = %e, "thread pool already initialized, using existing pool");
            }
        }

        info!(
            invariants = self.len(),
            backend = %config.backend,
            parallel = config.parallel,
            threads = if config.num_threads > 0 {
                config.num_threads
            } else {
                rayon::current_num_threads()
            },
            "checking invariant set"
        );

        let cache = ClosureCache::new();
        let check = |invariant: &Invariant| InvariantReport {
            invariant: invariant.clone(),
            result: check_invariant(graph, invariant, config, &cache),
        };
        let reports: Vec<InvariantReport> = if config.parallel {
            self.invariants.par_iter().map(check).collect()
        } else {
            self.invariants.iter().map(check).collect()
        };

        let violated = reports
            .iter()
            .filter(|r| matches!(&r.result, Ok(o) if o.is_violated()))
            .count();
        let failed = reports.iter().filter(|r| r.result.is_err()).count();
        info!(violated, failed, closures = cache.len(), "invariant set checked");
        reports
    }

    /// The violated invariants with their witnesses. The first check error
    /// is returned instead.
    pub fn counter_examples<G: EventGraph + Sync>(
        &self,
        graph: &G,
        config: &CheckConfig,
    ) -> CheckResult<Vec<Violation>> {
        let mut violations = Vec::new();
        for report in self.check_all(graph, config) {
            if let CheckOutcome::Violated { counterexample, .. } = report.result? {
                violations.push(Violation {
                    invariant: report.invariant,
                    counterexample,
                });
            }
        }
        Ok(violations)
    }
}

impl FromIterator<Invariant> for InvariantSet {
    fn from_iter<I: IntoIterator<Item = Invariant>>(iter: I) -> Self {
        let mut set = InvariantSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Invariant> for InvariantSet {
    fn extend<I: IntoIterator<Item = Invariant>>(&mut self, iter: I) {
        for invariant in iter {
            self.add(invariant);
        }
    }
}

impl<'a> IntoIterator for &'a InvariantSet {
    type Item = &'a Invariant;
    type IntoIter = std::slice::Iter<'a, Invariant>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
