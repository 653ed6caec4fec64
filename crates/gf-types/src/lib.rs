#![forbid(unsafe_code)]

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared element type of a typed array or frame column.
///
/// An array's tag is fixed at creation and never changes. `Object` marks a
/// column that stores dynamic [`Cell`] values of any variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int,
    Long,
    Double,
    Utf8,
    Object,
}

impl DataType {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Double)
    }
}

/// A dynamically typed scalar value.
///
/// There is no `Object` variant: an `Object`-tagged array stores `Cell`s of
/// any variant, so `Cell` itself is the dynamic value. `Null` is the missing
/// marker for every tag except `Double`, whose sentinel is NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Utf8(String),
}

impl Cell {
    /// The tag of this value, or `None` for `Null`.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DataType::Bool),
            Self::Int(_) => Some(DataType::Int),
            Self::Long(_) => Some(DataType::Long),
            Self::Double(_) => Some(DataType::Double),
            Self::Utf8(_) => Some(DataType::Utf8),
        }
    }

    /// True for `Null` and for a NaN double.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Double(v) => v.is_nan(),
            _ => false,
        }
    }

    /// The missing sentinel for a given tag: NaN for `Double`, `Null` otherwise.
    #[must_use]
    pub fn null_for(data_type: DataType) -> Self {
        match data_type {
            DataType::Double => Self::Double(f64::NAN),
            _ => Self::Null,
        }
    }

    /// Widening numeric read. `Null` reads as NaN (the double missing sentinel).
    pub fn as_double(&self) -> Result<f64, TypeError> {
        match self {
            Self::Null => Ok(f64::NAN),
            Self::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Self::Int(v) => Ok(f64::from(*v)),
            Self::Long(v) => Ok(*v as f64),
            Self::Double(v) => Ok(*v),
            Self::Utf8(_) => Err(TypeError::NonNumeric {
                found: DataType::Utf8,
            }),
        }
    }

    /// Widening integer read: `Int` and `Long` only. Doubles never narrow.
    pub fn as_long(&self) -> Result<i64, TypeError> {
        match self {
            Self::Int(v) => Ok(i64::from(*v)),
            Self::Long(v) => Ok(*v),
            Self::Null => Err(TypeError::MissingValue),
            other => Err(TypeError::Mismatch {
                expected: DataType::Long,
                found: other.data_type().unwrap_or(DataType::Object),
            }),
        }
    }

    /// Equality that treats NaN as equal to NaN (missing == missing).
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Double(a), Self::Double(b)) => (a.is_nan() && b.is_nan()) || (a == b),
            (Self::Null, Self::Double(v)) | (Self::Double(v), Self::Null) => v.is_nan(),
            _ => self == other,
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

/// The accepted numeric promotions: `int → long → double`, read and write
/// paths alike. Reflexive. Narrowing is never implicit anywhere.
#[must_use]
pub fn widens_to(from: DataType, to: DataType) -> bool {
    use DataType::{Double, Int, Long};
    match (from, to) {
        (a, b) if a == b => true,
        (Int, Long) | (Int, Double) | (Long, Double) => true,
        _ => false,
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    Mismatch { expected: DataType, found: DataType },
    #[error("value of type {found:?} is not numeric")]
    NonNumeric { found: DataType },
    #[error("value is missing")]
    MissingValue,
    #[error("tolerance must be strictly positive, got {value}")]
    InvalidTolerance { value: f64 },
}

/// Approximate double comparison with a relative-or-absolute tolerance.
///
/// Two finite values are equal iff
/// `|x - y| <= max(abs_tol, min(|x|, |y|) * rel_tol)`.
///
/// Non-finite values follow the IEEE convention used by total ordering:
/// NaN equals NaN and is greater than every other value, including positive
/// infinity. This is the single equality rule every numeric comparison in
/// the workspace goes through, not a test-only helper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceComparator {
    abs_tol: f64,
    rel_tol: f64,
}

impl ToleranceComparator {
    pub const DEFAULT_TOLERANCE: f64 = 1.0e-12;

    /// The process-wide default comparator. Immutable, constructed once.
    pub const DEFAULT: Self = Self {
        abs_tol: Self::DEFAULT_TOLERANCE,
        rel_tol: Self::DEFAULT_TOLERANCE,
    };

    /// A comparator with explicit tolerances. Both must be strictly positive.
    pub fn with_tolerance(abs_tol: f64, rel_tol: f64) -> Result<Self, TypeError> {
        if !(abs_tol > 0.0) {
            return Err(TypeError::InvalidTolerance { value: abs_tol });
        }
        if !(rel_tol > 0.0) {
            return Err(TypeError::InvalidTolerance { value: rel_tol });
        }
        Ok(Self { abs_tol, rel_tol })
    }

    #[must_use]
    pub fn abs_tol(&self) -> f64 {
        self.abs_tol
    }

    #[must_use]
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }

    #[must_use]
    pub fn equals(&self, x: f64, y: f64) -> bool {
        self.compare(x, y) == Ordering::Equal
    }

    #[must_use]
    pub fn compare(&self, x: f64, y: f64) -> Ordering {
        if x.is_finite() && y.is_finite() {
            return self.compare_finite(x, y);
        }
        // NaN sorts above everything, NaN == NaN; infinities order naturally.
        match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        }
    }

    fn compare_finite(&self, x: f64, y: f64) -> Ordering {
        let tol = self.abs_tol.max(x.abs().min(y.abs()) * self.rel_tol);
        let diff = x - y;
        if diff < -tol {
            Ordering::Less
        } else if diff > tol {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}
