//! Error types for the event graph data model.

use crate::graph::NodeId;
use crate::time::TimeKind;
use thiserror::Error;

/// A time value could not be added or compared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("cannot combine {left} time with {right} time")]
    MismatchedKinds { left: TimeKind, right: TimeKind },

    #[error("vector time dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("vector times {left} and {right} are concurrent and cannot be ordered")]
    Incomparable { left: String, right: String },

    #[error("time value is not a number")]
    NotANumber,

    #[error("time delta {value} is negative")]
    Negative { value: String },

    #[error("integer time overflow")]
    Overflow,

    #[error("invalid time literal '{text}'")]
    Parse { text: String },
}

pub type TimeResult<T> = Result<T, TimeError>;

/// An invariant descriptor that cannot be checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("neither '{a}' nor '{b}' occurs in the graph")]
    UnknownEvents { a: String, b: String },

    #[error("{kind} invariants do not take a time bound")]
    UnsupportedBound { kind: &'static str },

    #[error("invalid time bound: {source}")]
    InvalidBound {
        #[source]
        source: TimeError,
    },

    #[error("{bound} time bound does not match the {delta} delta on edge {from} -> {to}")]
    MismatchedBoundKind {
        bound: TimeKind,
        delta: TimeKind,
        from: NodeId,
        to: NodeId,
    },

    #[error("invalid invariant syntax: {message}")]
    Syntax {
        message: String,
        offset: usize,
        len: usize,
    },
}

impl InvariantError {
    /// Byte range of a syntax error within the parsed text.
    pub fn span(&self) -> Option<(usize, usize)> {
        match self {
            InvariantError::Syntax { offset, len, .. } => Some((*offset, *len)),
            _ => None,
        }
    }
}

pub type InvariantResult<T> = Result<T, InvariantError>;

/// Graph construction error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown node key '{0}'")]
    UnknownKey(String),

    #[error("duplicate node key '{0}'")]
    DuplicateKey(String),
}

pub type GraphResult<T> = Result<T, GraphError>;
