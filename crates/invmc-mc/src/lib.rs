//! Explicit-state checker for temporal invariants over event graphs.

pub mod automaton;
pub mod check;
pub mod closure;
pub mod explorer;
pub mod history;
pub mod invariant_set;
pub mod relational;
pub mod tracing_set;

pub use automaton::{Automaton, Clock, Letter, StateId};
pub use check::check_invariant;
pub use closure::TransitiveClosure;
pub use explorer::{
    Backend, CheckConfig, CheckError, CheckOutcome, CheckResult, Counterexample, Explorer,
    Fixpoint, LimitReason,
};
pub use history::{HistoryChain, HistoryNode};
pub use invariant_set::{InvariantReport, InvariantSet, Violation};
pub use relational::{closure_violates, ClosureCache, ClosureKey};
pub use tracing_set::TracingStateSet;
