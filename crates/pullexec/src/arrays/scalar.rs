use std::cmp::Ordering;
use std::fmt;

use pullexec_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use super::datatype::DataType;

/// A single value in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

/// A row is an ordered list of values matching a row descriptor.
pub type Row = Vec<ScalarValue>;

impl ScalarValue {
    /// Data type of this value, None for NULL.
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(DataType::Boolean),
            Self::Int64(_) => Some(DataType::Int64),
            Self::Float64(_) => Some(DataType::Float64),
            Self::Utf8(_) => Some(DataType::Utf8),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// If this value may be stored in a slot of the given type.
    pub fn fits_type(&self, datatype: DataType) -> bool {
        match self.datatype() {
            Some(dt) => dt == datatype,
            None => true,
        }
    }

    /// Approximate number of bytes used by this value, including any heap
    /// allocation.
    pub fn size_bytes(&self) -> usize {
        let heap = match self {
            Self::Utf8(s) => s.len(),
            _ => 0,
        };
        std::mem::size_of::<Self>() + heap
    }

    /// Compare two non-null values.
    ///
    /// Returns Ok(None) if the values are unordered (NaN). Numeric values of
    /// differing types are compared as f64.
    pub fn try_compare(&self, other: &ScalarValue) -> Result<Option<Ordering>> {
        Ok(match (self, other) {
            (Self::Int64(a), Self::Int64(b)) => Some(a.cmp(b)),
            (Self::Float64(a), Self::Float64(b)) => a.partial_cmp(b),
            (Self::Int64(a), Self::Float64(b)) => (*a as f64).partial_cmp(b),
            (Self::Float64(a), Self::Int64(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Utf8(a), Self::Utf8(b)) => Some(a.cmp(b)),
            (a, b) => {
                return Err(DbError::new("Cannot compare values")
                    .with_field("left", a)
                    .with_field("right", b));
            }
        })
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_mixed_numeric() {
        let ord = ScalarValue::Int64(3)
            .try_compare(&ScalarValue::Float64(3.5))
            .unwrap();
        assert_eq!(Some(Ordering::Less), ord);
    }

    #[test]
    fn compare_nan_unordered() {
        let ord = ScalarValue::Float64(f64::NAN)
            .try_compare(&ScalarValue::Float64(1.0))
            .unwrap();
        assert_eq!(None, ord);
    }

    #[test]
    fn compare_mismatched_errors() {
        ScalarValue::Utf8("a".to_string())
            .try_compare(&ScalarValue::Int64(1))
            .unwrap_err();
    }
}
