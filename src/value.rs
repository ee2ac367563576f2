//! A typed tagged union so callers don't have to reach into an untyped result blob (Design Notes §9).
//!
//! Every select/fetch/aggregate/join operator publishes one of these into the client
//! context. Aggregates widen by matching on the input variant (§4.8).

use std::fmt;

/// Element type of a [`TypedVec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    I32,
    I64,
    F32,
    F64,
}

/// A homogeneous, immutable-once-published vector of one of the four element types.
///
/// Position vectors (row indices into a column) are represented as `TypedVec::I64`,
/// per §4.6's "the emitted position vector has element type int64".
#[derive(Debug, Clone)]
pub enum TypedVec {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TypedVec {
    /// Number of tuples (elements) held.
    pub fn len(&self) -> usize {
        match self {
            TypedVec::I32(v) => v.len(),
            TypedVec::I64(v) => v.len(),
            TypedVec::F32(v) => v.len(),
            TypedVec::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element type tag.
    pub fn element_type(&self) -> ElementType {
        match self {
            TypedVec::I32(_) => ElementType::I32,
            TypedVec::I64(_) => ElementType::I64,
            TypedVec::F32(_) => ElementType::F32,
            TypedVec::F64(_) => ElementType::F64,
        }
    }

    /// View this vector as a position vector (`i64` row indices), if it is one.
    pub fn as_positions(&self) -> Option<&[i64]> {
        match self {
            TypedVec::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Format element `i` the way `print` formats a column of a tuple (§6.1).
    pub fn format_at(&self, i: usize) -> String {
        match self {
            TypedVec::I32(v) => v[i].to_string(),
            TypedVec::I64(v) => v[i].to_string(),
            TypedVec::F32(v) => format!("{:.2}", v[i]),
            TypedVec::F64(v) => format!("{:.2}", v[i]),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
        };
        write!(f, "{s}")
    }
}
