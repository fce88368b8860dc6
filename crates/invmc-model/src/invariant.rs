//! Temporal invariant descriptors.
//!
//! Textual form: `[relation] a OP b` where the relation prefix is optional
//! and `OP` is one of `AFby`, `NFby`, `AP`, optionally suffixed by a bound
//! such as `AFby<=5` (upper) or `AP>=2.5` (lower).

use crate::error::{InvariantError, InvariantResult};
use crate::graph::{EventGraph, EventType, Relation};
use crate::time::Time;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvariantKind {
    /// Every `a` is eventually followed by a `b` before the trace ends.
    AlwaysFollowedBy,
    /// No `a` is ever followed by a `b`.
    NeverFollowedBy,
    /// Every `b` is preceded by an `a`.
    AlwaysPrecedes,
}

impl InvariantKind {
    pub fn short_name(self) -> &'static str {
        match self {
            InvariantKind::AlwaysFollowedBy => "AFby",
            InvariantKind::NeverFollowedBy => "NFby",
            InvariantKind::AlwaysPrecedes => "AP",
        }
    }

    pub fn supports_bound(self) -> bool {
        !matches!(self, InvariantKind::NeverFollowedBy)
    }

    fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "AFby" => Some(InvariantKind::AlwaysFollowedBy),
            "NFby" => Some(InvariantKind::NeverFollowedBy),
            "AP" => Some(InvariantKind::AlwaysPrecedes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundDirection {
    /// Elapsed time must not exceed the bound.
    Upper,
    /// Elapsed time must reach at least the bound.
    Lower,
}

impl BoundDirection {
    pub fn symbol(self) -> &'static str {
        match self {
            BoundDirection::Upper => "<=",
            BoundDirection::Lower => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBound {
    pub value: Time,
    pub direction: BoundDirection,
}

/// A binary temporal invariant over one relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invariant {
    pub kind: InvariantKind,
    pub a: EventType,
    pub b: EventType,
    pub relation: Relation,
    pub bound: Option<TimeBound>,
}

impl Invariant {
    pub fn new(kind: InvariantKind, a: impl Into<EventType>, b: impl Into<EventType>) -> Self {
        Self {
            kind,
            a: a.into(),
            b: b.into(),
            relation: Relation::default(),
            bound: None,
        }
    }

    pub fn always_followed_by(a: impl Into<EventType>, b: impl Into<EventType>) -> Self {
        Self::new(InvariantKind::AlwaysFollowedBy, a, b)
    }

    pub fn never_followed_by(a: impl Into<EventType>, b: impl Into<EventType>) -> Self {
        Self::new(InvariantKind::NeverFollowedBy, a, b)
    }

    pub fn always_precedes(a: impl Into<EventType>, b: impl Into<EventType>) -> Self {
        Self::new(InvariantKind::AlwaysPrecedes, a, b)
    }

    pub fn with_relation(mut self, relation: impl Into<Relation>) -> Self {
        self.relation = relation.into();
        self
    }

    pub fn with_upper_bound(mut self, value: impl Into<Time>) -> Self {
        self.bound = Some(TimeBound {
            value: value.into(),
            direction: BoundDirection::Upper,
        });
        self
    }

    pub fn with_lower_bound(mut self, value: impl Into<Time>) -> Self {
        self.bound = Some(TimeBound {
            value: value.into(),
            direction: BoundDirection::Lower,
        });
        self
    }

    pub fn is_timed(&self) -> bool {
        self.bound.is_some()
    }

    /// Checks the descriptor before any traversal.
    pub fn validate<G: EventGraph>(&self, graph: &G) -> InvariantResult<()> {
        if let Some(bound) = &self.bound {
            if !self.kind.supports_bound() {
                return Err(InvariantError::UnsupportedBound {
                    kind: self.kind.short_name(),
                });
            }
            bound
                .value
                .check_non_negative()
                .map_err(|source| InvariantError::InvalidBound { source })?;
            self.check_delta_kinds(graph, bound)?;
        }
        if !graph.contains_event(&self.a) && !graph.contains_event(&self.b) {
            return Err(InvariantError::UnknownEvents {
                a: self.a.to_string(),
                b: self.b.to_string(),
            });
        }
        Ok(())
    }

    /// Every delta on the invariant's relation must be of the bound's kind.
    fn check_delta_kinds<G: EventGraph>(
        &self,
        graph: &G,
        bound: &TimeBound,
    ) -> InvariantResult<()> {
        let kind = bound.value.kind();
        for from in graph.nodes() {
            for edge in graph.successors(from, &self.relation) {
                let Some(delta) = &edge.delta else { continue };
                if !kind.is_compatible(delta.kind()) {
                    return Err(InvariantError::MismatchedBoundKind {
                        bound: kind,
                        delta: delta.kind(),
                        from,
                        to: edge.target,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.relation.is_default() {
            write!(f, "[{}] ", self.relation)?;
        }
        write!(f, "{} {}", self.a, self.kind.short_name())?;
        if let Some(bound) = &self.bound {
            write!(f, "{}{}", bound.direction.symbol(), bound.value)?;
        }
        write!(f, " {}", self.b)
    }
}

/// Splits on whitespace, keeping byte offsets for error spans.
fn tokens(s: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(st)) => {
                out.push((st, &s[st..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        out.push((st, &s[st..]));
    }
    out
}

fn syntax_error(message: impl Into<String>, offset: usize, len: usize) -> InvariantError {
    InvariantError::Syntax {
        message: message.into(),
        offset,
        len: len.max(1),
    }
}

impl FromStr for Invariant {
    type Err = InvariantError;

    fn from_str(s: &str) -> InvariantResult<Self> {
        let mut toks = tokens(s);
        let mut relation = Relation::default();
        if let Some(&(offset, first)) = toks.first() {
            if let Some(rest) = first.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| syntax_error("malformed relation prefix", offset, first.len()))?;
                relation = Relation::new(name);
                toks.remove(0);
            }
        }
        if toks.len() != 3 {
            let offset = toks.get(3).map(|t| t.0).unwrap_or(s.len());
            return Err(syntax_error(
                format!("expected 'a OP b', found {} tokens", toks.len()),
                offset,
                1,
            ));
        }
        let (_, a) = toks[0];
        let (op_offset, op) = toks[1];
        let (_, b) = toks[2];

        let split = op.find(['<', '>']).unwrap_or(op.len());
        let (name, bound_text) = op.split_at(split);
        let kind = InvariantKind::from_short_name(name).ok_or_else(|| {
            syntax_error(
                format!("unknown operator '{}' (expected AFby, NFby or AP)", name),
                op_offset,
                name.len(),
            )
        })?;

        let mut invariant = Invariant::new(kind, a, b).with_relation(relation);
        if !bound_text.is_empty() {
            let (direction, value_text) = if let Some(v) = bound_text.strip_prefix("<=") {
                (BoundDirection::Upper, v)
            } else if let Some(v) = bound_text.strip_prefix(">=") {
                (BoundDirection::Lower, v)
            } else {
                return Err(syntax_error(
                    "bound must start with '<=' or '>='",
                    op_offset + split,
                    bound_text.len(),
                ));
            };
            let value = value_text.parse::<Time>().map_err(|e| {
                syntax_error(e.to_string(), op_offset + split + 2, value_text.len())
            })?;
            if !kind.supports_bound() {
                return Err(InvariantError::UnsupportedBound {
                    kind: kind.short_name(),
                });
            }
            invariant.bound = Some(TimeBound { value, direction });
        }
        Ok(invariant)
    }
}
