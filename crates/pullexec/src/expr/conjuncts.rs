//! Evaluation of conjunct lists.
//!
//! A row passes a list of conjuncts only if every conjunct evaluates to true.
//! NULL is treated as false. Evaluation follows list order and stops at the
//! first conjunct that doesn't pass.

use pullexec_error::{DbError, Result};
use tracing::debug;

use super::PhysicalScalarExpression;
use super::codegen::{CompiledConjuncts, ConjunctCompiler};
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;
use crate::plan::descriptors::RowDescriptor;

/// A boolean-valued predicate over a single row.
pub trait Conjunct {
    /// Evaluate the predicate, returning if the row passes.
    fn eval_predicate(&self, row: &[ScalarValue]) -> Result<bool>;
}

impl Conjunct for PhysicalScalarExpression {
    fn eval_predicate(&self, row: &[ScalarValue]) -> Result<bool> {
        match self.eval(row)? {
            ScalarValue::Boolean(b) => Ok(b),
            ScalarValue::Null => Ok(false),
            other => Err(DbError::new("Conjunct did not evaluate to a boolean")
                .with_field("conjunct", self)
                .with_field("value", other)),
        }
    }
}

/// Evaluate conjuncts over a row, returning true if all pass.
///
/// An empty list passes every row.
pub fn eval_conjuncts<C: Conjunct>(conjuncts: &[C], row: &[ScalarValue]) -> Result<bool> {
    for conjunct in conjuncts {
        if !conjunct.eval_predicate(row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolve conjuncts against the row they'll be evaluated on.
pub fn prepare_conjuncts(
    conjuncts: &[PhysicalScalarExpression],
    row_desc: &RowDescriptor,
) -> Result<()> {
    for conjunct in conjuncts {
        match conjunct.return_type(row_desc)? {
            Some(DataType::Boolean) | None => (),
            Some(other) => {
                return Err(DbError::initialization("Conjunct must return a boolean")
                    .with_field("conjunct", conjunct)
                    .with_field("return_type", other));
            }
        }
    }
    Ok(())
}

/// Evaluator selected once per node for its conjuncts.
///
/// Both arms take the same inputs and produce the same result. The compiled
/// arm ignores the conjunct slice since its predicates are baked in.
#[derive(Debug, Default)]
pub enum ConjunctEvaluator {
    #[default]
    Interpreted,
    Compiled(CompiledConjuncts),
}

impl ConjunctEvaluator {
    /// Pick an evaluator for the conjuncts.
    ///
    /// Falls back to the interpreted evaluator if no compiler is available or
    /// the compiler doesn't support the conjuncts.
    pub fn select(
        compiler: Option<&dyn ConjunctCompiler>,
        conjuncts: &[PhysicalScalarExpression],
        row_desc: &RowDescriptor,
    ) -> Self {
        if conjuncts.is_empty() {
            return ConjunctEvaluator::Interpreted;
        }

        let compiler = match compiler {
            Some(compiler) => compiler,
            None => return ConjunctEvaluator::Interpreted,
        };

        match compiler.compile(conjuncts, row_desc) {
            Some(compiled) => ConjunctEvaluator::Compiled(compiled),
            None => {
                debug!(
                    num_conjuncts = conjuncts.len(),
                    "conjuncts not supported by compiler, using interpreted evaluation"
                );
                ConjunctEvaluator::Interpreted
            }
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self, Self::Compiled(_))
    }

    pub fn eval(&self, conjuncts: &[PhysicalScalarExpression], row: &[ScalarValue]) -> Result<bool> {
        match self {
            Self::Interpreted => eval_conjuncts(conjuncts, row),
            Self::Compiled(compiled) => compiled.call(conjuncts, row),
        }
    }
}
