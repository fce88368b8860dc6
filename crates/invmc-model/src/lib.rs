//! Data model for temporal invariant checking: event graphs, time values and
//! invariant descriptors.

pub mod error;
pub mod graph;
pub mod invariant;
pub mod time;

pub use error::{
    GraphError, GraphResult, InvariantError, InvariantResult, TimeError, TimeResult,
};
pub use graph::{
    EventGraph, EventType, Graph, GraphBuilder, NodeId, Relation, Transition, DEFAULT_RELATION,
};
pub use invariant::{BoundDirection, Invariant, InvariantKind, TimeBound};
pub use time::{Time, TimeKind};
