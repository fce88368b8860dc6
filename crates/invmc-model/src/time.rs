//! Time values carried by transitions and invariant bounds.
//!
//! A time value is either a scalar duration (integer or floating point) or a
//! vector-time distance. `Zero` is dimensionless and acts as the identity for
//! every kind, so accumulators can start from it before the first delta tells
//! us which kind a graph uses.

use crate::error::{TimeError, TimeResult};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Components of a vector time.
pub type VectorComponents = SmallVec<[i64; 4]>;

/// An additive, ordered time value.
#[derive(Debug, Clone, PartialEq)]
pub enum Time {
    Zero,
    Integer(i64),
    Float(f64),
    Vector(VectorComponents),
}

/// The kind of a time value, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Zero,
    Integer,
    Float,
    Vector(usize),
}

impl TimeKind {
    /// Whether values of the two kinds can be added and compared. Zero goes
    /// with every kind; vector dimensions are checked value by value.
    pub fn is_compatible(self, other: TimeKind) -> bool {
        match (self, other) {
            (TimeKind::Zero, _) | (_, TimeKind::Zero) => true,
            (TimeKind::Vector(_), TimeKind::Vector(_)) => true,
            (left, right) => left == right,
        }
    }
}

impl fmt::Display for TimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeKind::Zero => write!(f, "zero"),
            TimeKind::Integer => write!(f, "integer"),
            TimeKind::Float => write!(f, "float"),
            TimeKind::Vector(n) => write!(f, "{}-dimensional vector", n),
        }
    }
}

impl Default for Time {
    fn default() -> Self {
        Time::Zero
    }
}

impl Time {
    pub fn vector(components: impl IntoIterator<Item = i64>) -> Self {
        Time::Vector(components.into_iter().collect())
    }

    pub fn kind(&self) -> TimeKind {
        match self {
            Time::Zero => TimeKind::Zero,
            Time::Integer(_) => TimeKind::Integer,
            Time::Float(_) => TimeKind::Float,
            Time::Vector(v) => TimeKind::Vector(v.len()),
        }
    }

    /// Sum of two time values of the same kind.
    pub fn try_add(&self, other: &Time) -> TimeResult<Time> {
        match (self, other) {
            (Time::Zero, t) | (t, Time::Zero) => Ok(t.clone()),
            (Time::Integer(a), Time::Integer(b)) => {
                a.checked_add(*b).map(Time::Integer).ok_or(TimeError::Overflow)
            }
            (Time::Float(a), Time::Float(b)) => {
                let sum = a + b;
                if sum.is_nan() {
                    Err(TimeError::NotANumber)
                } else {
                    Ok(Time::Float(sum))
                }
            }
            (Time::Vector(a), Time::Vector(b)) => {
                if a.len() != b.len() {
                    return Err(TimeError::DimensionMismatch {
                        left: a.len(),
                        right: b.len(),
                    });
                }
                let mut sum = VectorComponents::with_capacity(a.len());
                for (x, y) in a.iter().zip(b.iter()) {
                    sum.push(x.checked_add(*y).ok_or(TimeError::Overflow)?);
                }
                Ok(Time::Vector(sum))
            }
            _ => Err(TimeError::MismatchedKinds {
                left: self.kind(),
                right: other.kind(),
            }),
        }
    }

    /// Total comparison. Vector times are ordered componentwise and fail
    /// when neither dominates the other.
    pub fn try_cmp(&self, other: &Time) -> TimeResult<Ordering> {
        match (self, other) {
            (Time::Zero, Time::Zero) => Ok(Ordering::Equal),
            (Time::Integer(a), Time::Integer(b)) => Ok(a.cmp(b)),
            (Time::Zero, Time::Integer(b)) => Ok(0.cmp(b)),
            (Time::Integer(a), Time::Zero) => Ok(a.cmp(&0)),
            (Time::Float(a), Time::Float(b)) => cmp_floats(*a, *b),
            (Time::Zero, Time::Float(b)) => cmp_floats(0.0, *b),
            (Time::Float(a), Time::Zero) => cmp_floats(*a, 0.0),
            (Time::Vector(a), Time::Vector(b)) => {
                if a.len() != b.len() {
                    return Err(TimeError::DimensionMismatch {
                        left: a.len(),
                        right: b.len(),
                    });
                }
                self.cmp_components(other, a.iter().copied().zip(b.iter().copied()))
            }
            (Time::Zero, Time::Vector(b)) => {
                self.cmp_components(other, b.iter().map(|&y| (0, y)))
            }
            (Time::Vector(a), Time::Zero) => {
                self.cmp_components(other, a.iter().map(|&x| (x, 0)))
            }
            _ => Err(TimeError::MismatchedKinds {
                left: self.kind(),
                right: other.kind(),
            }),
        }
    }

    fn cmp_components(
        &self,
        other: &Time,
        pairs: impl Iterator<Item = (i64, i64)>,
    ) -> TimeResult<Ordering> {
        let mut result = Ordering::Equal;
        for (x, y) in pairs {
            match (result, x.cmp(&y)) {
                (_, Ordering::Equal) => {}
                (Ordering::Equal, o) => result = o,
                (r, o) if r == o => {}
                _ => {
                    return Err(TimeError::Incomparable {
                        left: self.to_string(),
                        right: other.to_string(),
                    })
                }
            }
        }
        Ok(result)
    }

    /// Rejects values that cannot be used as a transition delta or a bound.
    pub fn check_non_negative(&self) -> TimeResult<()> {
        let negative = match self {
            Time::Zero => false,
            Time::Integer(n) => *n < 0,
            Time::Float(x) => {
                if x.is_nan() {
                    return Err(TimeError::NotANumber);
                }
                *x < 0.0
            }
            Time::Vector(v) => v.iter().any(|&c| c < 0),
        };
        if negative {
            Err(TimeError::Negative {
                value: self.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn cmp_floats(a: f64, b: f64) -> TimeResult<Ordering> {
    a.partial_cmp(&b).ok_or(TimeError::NotANumber)
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Time::Zero => write!(f, "0"),
            Time::Integer(n) => write!(f, "{}", n),
            Time::Float(x) => write!(f, "{}", x),
            Time::Vector(v) => {
                write!(f, "(")?;
                for (i, c) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl FromStr for Time {
    type Err = TimeError;

    /// Parses `5`, `2.5` or `(1,0,3)`.
    fn from_str(s: &str) -> TimeResult<Self> {
        let text = s.trim();
        let parse_err = || TimeError::Parse {
            text: text.to_string(),
        };
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            let components = inner
                .split(',')
                .map(|c| c.trim().parse::<i64>().map_err(|_| parse_err()))
                .collect::<TimeResult<VectorComponents>>()?;
            return Ok(Time::Vector(components));
        }
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Time::Integer(n));
        }
        match text.parse::<f64>() {
            Ok(x) if !x.is_nan() => Ok(Time::Float(x)),
            _ => Err(parse_err()),
        }
    }
}

impl From<i64> for Time {
    fn from(n: i64) -> Self {
        Time::Integer(n)
    }
}

impl From<i32> for Time {
    fn from(n: i32) -> Self {
        Time::Integer(n.into())
    }
}

impl From<f64> for Time {
    fn from(x: f64) -> Self {
        Time::Float(x)
    }
}
