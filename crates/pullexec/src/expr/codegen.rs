//! Compiled evaluation of conjuncts.
//!
//! A compiler turns a list of conjuncts into a single function with the
//! predicates baked in. Compiled functions must produce exactly the same
//! result as interpreted evaluation, including NULL handling and short
//! circuiting order. Compilers return None for anything they can't handle,
//! and callers fall back to interpreted evaluation.

use std::fmt;

use pullexec_error::{DbError, Result};

use super::{ComparisonOperator, ConjunctionOperator, PhysicalScalarExpression};
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::plan::descriptors::RowDescriptor;

/// Signature of a compiled conjunct list.
pub type CompiledPredicateFn = dyn Fn(&[ScalarValue]) -> Result<bool> + Send + Sync;

/// Backend for producing compiled conjunct evaluation functions.
pub trait ConjunctCompiler: fmt::Debug + Send + Sync {
    /// Compile conjuncts for rows described by `row_desc`.
    ///
    /// Returns None if any conjunct isn't supported.
    fn compile(
        &self,
        conjuncts: &[PhysicalScalarExpression],
        row_desc: &RowDescriptor,
    ) -> Option<CompiledConjuncts>;
}

pub struct CompiledConjuncts {
    num_conjuncts: usize,
    func: Box<CompiledPredicateFn>,
}

impl CompiledConjuncts {
    pub fn new(num_conjuncts: usize, func: Box<CompiledPredicateFn>) -> Self {
        CompiledConjuncts {
            num_conjuncts,
            func,
        }
    }

    pub fn num_conjuncts(&self) -> usize {
        self.num_conjuncts
    }

    /// Call the compiled function.
    ///
    /// Takes the conjunct slice to stay call compatible with interpreted
    /// evaluation. The slice is ignored.
    pub fn call(&self, _conjuncts: &[PhysicalScalarExpression], row: &[ScalarValue]) -> Result<bool> {
        (self.func)(row)
    }
}

impl fmt::Debug for CompiledConjuncts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledConjuncts")
            .field("num_conjuncts", &self.num_conjuncts)
            .finish_non_exhaustive()
    }
}

/// Boolean expression compiled to a closure. None represents NULL.
type BoolFn = Box<dyn Fn(&[ScalarValue]) -> Result<Option<bool>> + Send + Sync>;
type IntFn = Box<dyn Fn(&[ScalarValue]) -> Result<Option<i64>> + Send + Sync>;
type FloatFn = Box<dyn Fn(&[ScalarValue]) -> Result<Option<f64>> + Send + Sync>;

/// Compiler producing nested closures specialized on column types and
/// literal values.
///
/// Supports boolean logic and comparisons over numeric and boolean columns
/// and literals. String expressions are not supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureCompiler;

impl ConjunctCompiler for ClosureCompiler {
    fn compile(
        &self,
        conjuncts: &[PhysicalScalarExpression],
        row_desc: &RowDescriptor,
    ) -> Option<CompiledConjuncts> {
        let preds = conjuncts
            .iter()
            .map(|c| compile_bool(c, row_desc))
            .collect::<Option<Vec<_>>>()?;

        let func = Box::new(move |row: &[ScalarValue]| -> Result<bool> {
            for pred in &preds {
                if pred(row)? != Some(true) {
                    return Ok(false);
                }
            }
            Ok(true)
        });

        Some(CompiledConjuncts::new(conjuncts.len(), func))
    }
}

fn type_of(expr: &PhysicalScalarExpression, row_desc: &RowDescriptor) -> Option<Option<DataType>> {
    expr.return_type(row_desc).ok()
}

fn mismatch(idx: usize, value: &ScalarValue) -> DbError {
    DbError::new("Unexpected value in compiled predicate")
        .with_field("column", idx)
        .with_field("value", value)
}

fn out_of_bounds(idx: usize, len: usize) -> DbError {
    DbError::new("Column reference out of bounds")
        .with_field("idx", idx)
        .with_field("row_len", len)
}

fn compile_bool(expr: &PhysicalScalarExpression, row_desc: &RowDescriptor) -> Option<BoolFn> {
    match expr {
        PhysicalScalarExpression::Column { idx } => {
            if row_desc.column_type(*idx)? != DataType::Boolean {
                return None;
            }
            let idx = *idx;
            Some(Box::new(move |row: &[ScalarValue]| match row.get(idx) {
                Some(ScalarValue::Boolean(b)) => Ok(Some(*b)),
                Some(ScalarValue::Null) => Ok(None),
                Some(other) => Err(mismatch(idx, other)),
                None => Err(out_of_bounds(idx, row.len())),
            }))
        }
        PhysicalScalarExpression::Literal { value } => {
            let v = match value {
                ScalarValue::Boolean(b) => Some(*b),
                ScalarValue::Null => None,
                _ => return None,
            };
            Some(Box::new(move |_: &[ScalarValue]| -> Result<Option<bool>> { Ok(v) }))
        }
        PhysicalScalarExpression::Comparison { op, left, right } => {
            compile_comparison(*op, left, right, row_desc)
        }
        PhysicalScalarExpression::IsNull { input } => match input.as_ref() {
            PhysicalScalarExpression::Column { idx } => {
                row_desc.column_type(*idx)?;
                let idx = *idx;
                Some(Box::new(move |row: &[ScalarValue]| match row.get(idx) {
                    Some(v) => Ok(Some(v.is_null())),
                    None => Err(out_of_bounds(idx, row.len())),
                }))
            }
            PhysicalScalarExpression::Literal { value } => {
                let v = value.is_null();
                Some(Box::new(move |_: &[ScalarValue]| -> Result<Option<bool>> {
                    Ok(Some(v))
                }))
            }
            other => {
                let inner = compile_bool(other, row_desc)?;
                Some(Box::new(move |row: &[ScalarValue]| -> Result<Option<bool>> {
                    Ok(Some(inner(row)?.is_none()))
                }))
            }
        },
        PhysicalScalarExpression::Not { input } => {
            let inner = compile_bool(input, row_desc)?;
            Some(Box::new(move |row: &[ScalarValue]| -> Result<Option<bool>> {
                Ok(inner(row)?.map(|b| !b))
            }))
        }
        PhysicalScalarExpression::Conjunction { op, inputs } => {
            if inputs.is_empty() {
                return None;
            }
            let inputs = inputs
                .iter()
                .map(|input| compile_bool(input, row_desc))
                .collect::<Option<Vec<_>>>()?;
            let decisive = matches!(op, ConjunctionOperator::Or);

            Some(Box::new(move |row: &[ScalarValue]| -> Result<Option<bool>> {
                let mut saw_null = false;
                for input in &inputs {
                    match input(row)? {
                        Some(b) if b == decisive => return Ok(Some(decisive)),
                        Some(_) => (),
                        None => saw_null = true,
                    }
                }
                if saw_null { Ok(None) } else { Ok(Some(!decisive)) }
            }))
        }
        PhysicalScalarExpression::Contains { .. } => None,
    }
}

fn compile_comparison(
    op: ComparisonOperator,
    left: &PhysicalScalarExpression,
    right: &PhysicalScalarExpression,
    row_desc: &RowDescriptor,
) -> Option<BoolFn> {
    let left_type = type_of(left, row_desc)?;
    let right_type = type_of(right, row_desc)?;

    let is_int = |t: Option<DataType>| matches!(t, None | Some(DataType::Int64));
    let is_num = |t: Option<DataType>| t.is_none_or(|t| t.is_numeric());
    let is_bool = |t: Option<DataType>| matches!(t, None | Some(DataType::Boolean));

    if is_int(left_type) && is_int(right_type) {
        let l = compile_int(left, row_desc)?;
        let r = compile_int(right, row_desc)?;
        return Some(Box::new(move |row: &[ScalarValue]| -> Result<Option<bool>> {
            let l = l(row)?;
            let r = r(row)?;
            Ok(match (l, r) {
                (Some(l), Some(r)) => Some(op.apply(Some(l.cmp(&r)))),
                _ => None,
            })
        }));
    }

    if is_num(left_type) && is_num(right_type) {
        let l = compile_float(left, row_desc)?;
        let r = compile_float(right, row_desc)?;
        return Some(Box::new(move |row: &[ScalarValue]| -> Result<Option<bool>> {
            let l = l(row)?;
            let r = r(row)?;
            Ok(match (l, r) {
                (Some(l), Some(r)) => Some(op.apply(l.partial_cmp(&r))),
                _ => None,
            })
        }));
    }

    if is_bool(left_type) && is_bool(right_type) {
        let l = compile_bool(left, row_desc)?;
        let r = compile_bool(right, row_desc)?;
        return Some(Box::new(move |row: &[ScalarValue]| -> Result<Option<bool>> {
            let l = l(row)?;
            let r = r(row)?;
            Ok(match (l, r) {
                (Some(l), Some(r)) => Some(op.apply(Some(l.cmp(&r)))),
                _ => None,
            })
        }));
    }

    None
}

fn compile_int(expr: &PhysicalScalarExpression, row_desc: &RowDescriptor) -> Option<IntFn> {
    match expr {
        PhysicalScalarExpression::Column { idx } => {
            if row_desc.column_type(*idx)? != DataType::Int64 {
                return None;
            }
            let idx = *idx;
            Some(Box::new(move |row: &[ScalarValue]| match row.get(idx) {
                Some(ScalarValue::Int64(v)) => Ok(Some(*v)),
                Some(ScalarValue::Null) => Ok(None),
                Some(other) => Err(mismatch(idx, other)),
                None => Err(out_of_bounds(idx, row.len())),
            }))
        }
        PhysicalScalarExpression::Literal { value } => {
            let v = match value {
                ScalarValue::Int64(v) => Some(*v),
                ScalarValue::Null => None,
                _ => return None,
            };
            Some(Box::new(move |_: &[ScalarValue]| -> Result<Option<i64>> { Ok(v) }))
        }
        _ => None,
    }
}

fn compile_float(expr: &PhysicalScalarExpression, row_desc: &RowDescriptor) -> Option<FloatFn> {
    match expr {
        PhysicalScalarExpression::Column { idx } => {
            if !row_desc.column_type(*idx)?.is_numeric() {
                return None;
            }
            let idx = *idx;
            Some(Box::new(move |row: &[ScalarValue]| match row.get(idx) {
                Some(ScalarValue::Float64(v)) => Ok(Some(*v)),
                Some(ScalarValue::Int64(v)) => Ok(Some(*v as f64)),
                Some(ScalarValue::Null) => Ok(None),
                Some(other) => Err(mismatch(idx, other)),
                None => Err(out_of_bounds(idx, row.len())),
            }))
        }
        PhysicalScalarExpression::Literal { value } => {
            let v = match value {
                ScalarValue::Float64(v) => Some(*v),
                ScalarValue::Int64(v) => Some(*v as f64),
                ScalarValue::Null => None,
                _ => return None,
            };
            Some(Box::new(move |_: &[ScalarValue]| -> Result<Option<f64>> { Ok(v) }))
        }
        _ => None,
    }
}
