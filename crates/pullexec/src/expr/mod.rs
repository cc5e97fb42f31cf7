//! Physical expressions evaluated against single rows.

pub mod codegen;
pub mod conjuncts;

use std::cmp::Ordering;
use std::fmt;

use pullexec_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::plan::descriptors::RowDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOperator {
    /// Apply the operator to the result of comparing two non-null values.
    ///
    /// Unordered values (NaN) only satisfy `NotEq`.
    pub fn apply(&self, ord: Option<Ordering>) -> bool {
        let ord = match ord {
            Some(ord) => ord,
            None => return matches!(self, Self::NotEq),
        };

        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::NotEq => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::LtEq => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::GtEq => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConjunctionOperator {
    And,
    Or,
}

impl fmt::Display for ConjunctionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// An expression over a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhysicalScalarExpression {
    Column {
        idx: usize,
    },
    Literal {
        value: ScalarValue,
    },
    Comparison {
        op: ComparisonOperator,
        left: Box<PhysicalScalarExpression>,
        right: Box<PhysicalScalarExpression>,
    },
    IsNull {
        input: Box<PhysicalScalarExpression>,
    },
    Not {
        input: Box<PhysicalScalarExpression>,
    },
    Conjunction {
        op: ConjunctionOperator,
        inputs: Vec<PhysicalScalarExpression>,
    },
    /// Substring match on a string input.
    Contains {
        input: Box<PhysicalScalarExpression>,
        pattern: String,
    },
}

impl PhysicalScalarExpression {
    pub fn column(idx: usize) -> Self {
        Self::Column { idx }
    }

    pub fn literal(value: ScalarValue) -> Self {
        Self::Literal { value }
    }

    pub fn compare(
        op: ComparisonOperator,
        left: PhysicalScalarExpression,
        right: PhysicalScalarExpression,
    ) -> Self {
        Self::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_null(input: PhysicalScalarExpression) -> Self {
        Self::IsNull {
            input: Box::new(input),
        }
    }

    pub fn not(input: PhysicalScalarExpression) -> Self {
        Self::Not {
            input: Box::new(input),
        }
    }

    pub fn and(inputs: impl IntoIterator<Item = PhysicalScalarExpression>) -> Self {
        Self::Conjunction {
            op: ConjunctionOperator::And,
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn or(inputs: impl IntoIterator<Item = PhysicalScalarExpression>) -> Self {
        Self::Conjunction {
            op: ConjunctionOperator::Or,
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn contains(input: PhysicalScalarExpression, pattern: impl Into<String>) -> Self {
        Self::Contains {
            input: Box::new(input),
            pattern: pattern.into(),
        }
    }

    /// Resolve the output type of this expression against a row layout.
    ///
    /// Returns Ok(None) for expressions that are always NULL. Errors with an
    /// initialization error if the expression doesn't fit the row.
    pub fn return_type(&self, row_desc: &RowDescriptor) -> Result<Option<DataType>> {
        match self {
            Self::Column { idx } => match row_desc.column_type(*idx) {
                Some(datatype) => Ok(Some(datatype)),
                None => Err(DbError::initialization("Column reference out of bounds")
                    .with_field("idx", idx)
                    .with_field("num_columns", row_desc.num_columns())),
            },
            Self::Literal { value } => Ok(value.datatype()),
            Self::Comparison { left, right, .. } => {
                let left_type = left.return_type(row_desc)?;
                let right_type = right.return_type(row_desc)?;
                if let (Some(l), Some(r)) = (left_type, right_type) {
                    if !l.is_comparable_with(&r) {
                        return Err(DbError::initialization("Cannot compare types")
                            .with_field("left", l)
                            .with_field("right", r));
                    }
                }
                Ok(Some(DataType::Boolean))
            }
            Self::IsNull { input } => {
                input.return_type(row_desc)?;
                Ok(Some(DataType::Boolean))
            }
            Self::Not { input } => {
                expect_type(input.return_type(row_desc)?, DataType::Boolean, "NOT")?;
                Ok(Some(DataType::Boolean))
            }
            Self::Conjunction { op, inputs } => {
                if inputs.is_empty() {
                    return Err(DbError::initialization("Conjunction requires inputs")
                        .with_field("op", op));
                }
                for input in inputs {
                    expect_type(input.return_type(row_desc)?, DataType::Boolean, "conjunction")?;
                }
                Ok(Some(DataType::Boolean))
            }
            Self::Contains { input, .. } => {
                expect_type(input.return_type(row_desc)?, DataType::Utf8, "contains")?;
                Ok(Some(DataType::Boolean))
            }
        }
    }

    /// Evaluate this expression on a row.
    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        match self {
            Self::Column { idx } => row.get(*idx).cloned().ok_or_else(|| {
                DbError::new("Column reference out of bounds")
                    .with_field("idx", idx)
                    .with_field("row_len", row.len())
            }),
            Self::Literal { value } => Ok(value.clone()),
            Self::Comparison { op, left, right } => {
                let left = left.eval(row)?;
                let right = right.eval(row)?;
                if left.is_null() || right.is_null() {
                    return Ok(ScalarValue::Null);
                }
                let ord = left.try_compare(&right)?;
                Ok(ScalarValue::Boolean(op.apply(ord)))
            }
            Self::IsNull { input } => Ok(ScalarValue::Boolean(input.eval(row)?.is_null())),
            Self::Not { input } => match input.eval(row)? {
                ScalarValue::Boolean(b) => Ok(ScalarValue::Boolean(!b)),
                ScalarValue::Null => Ok(ScalarValue::Null),
                other => Err(not_boolean(&other)),
            },
            Self::Conjunction { op, inputs } => {
                // SQL three-valued logic. The deciding value (false for AND,
                // true for OR) short-circuits.
                let decisive = matches!(op, ConjunctionOperator::Or);
                let mut saw_null = false;
                for input in inputs {
                    match input.eval(row)? {
                        ScalarValue::Boolean(b) if b == decisive => {
                            return Ok(ScalarValue::Boolean(decisive));
                        }
                        ScalarValue::Boolean(_) => (),
                        ScalarValue::Null => saw_null = true,
                        other => return Err(not_boolean(&other)),
                    }
                }
                if saw_null {
                    Ok(ScalarValue::Null)
                } else {
                    Ok(ScalarValue::Boolean(!decisive))
                }
            }
            Self::Contains { input, pattern } => match input.eval(row)? {
                ScalarValue::Utf8(s) => Ok(ScalarValue::Boolean(s.contains(pattern.as_str()))),
                ScalarValue::Null => Ok(ScalarValue::Null),
                other => Err(DbError::new("Expected string value").with_field("value", other)),
            },
        }
    }
}

fn expect_type(got: Option<DataType>, want: DataType, context: &str) -> Result<()> {
    match got {
        Some(got) if got != want => Err(DbError::initialization("Unexpected input type")
            .with_field("context", context)
            .with_field("expected", want)
            .with_field("got", got)),
        _ => Ok(()),
    }
}

fn not_boolean(value: &ScalarValue) -> DbError {
    DbError::new("Expected boolean value").with_field("value", value)
}

impl fmt::Display for PhysicalScalarExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { idx } => write!(f, "#{idx}"),
            Self::Literal { value } => match value {
                ScalarValue::Utf8(s) => write!(f, "'{s}'"),
                other => write!(f, "{other}"),
            },
            Self::Comparison { op, left, right } => write!(f, "{left} {op} {right}"),
            Self::IsNull { input } => write!(f, "{input} IS NULL"),
            Self::Not { input } => write!(f, "NOT({input})"),
            Self::Conjunction { op, inputs } => {
                write!(f, "(")?;
                for (idx, input) in inputs.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " {op} ")?;
                    }
                    write!(f, "{input}")?;
                }
                write!(f, ")")
            }
            Self::Contains { input, pattern } => write!(f, "contains({input}, '{pattern}')"),
        }
    }
}
