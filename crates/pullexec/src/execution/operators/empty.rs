use pullexec_error::{DbError, Result};

use super::ExecOperator;
use crate::arrays::row_batch::RowBatch;
use crate::execution::context::ExecContext;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

/// Operator that emits no rows, but knows its output row.
#[derive(Debug, Default)]
pub struct PhysicalEmpty;

impl ExecOperator for PhysicalEmpty {
    fn operator_name(&self) -> &'static str {
        "Empty"
    }

    fn prepare(&mut self, cx: &mut ExecContext) -> Result<()> {
        if cx.num_children() != 0 {
            return Err(DbError::initialization("Empty cannot have children"));
        }
        Ok(())
    }

    fn open(&mut self, _cx: &mut ExecContext) -> Result<()> {
        Ok(())
    }

    fn get_next(&mut self, _cx: &mut ExecContext, _batch: &mut RowBatch) -> Result<bool> {
        Ok(true)
    }
}

impl Explainable for PhysicalEmpty {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Empty")
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::{EventLog, build_test_tree, drain, empty_desc, test_state};

    #[test]
    fn produces_no_rows() {
        let log = EventLog::default();
        let mut tree = build_test_tree(&[empty_desc(0)], &log).unwrap();
        let state = test_state();

        let out = drain(&mut tree, &state).unwrap();
        assert!(out.rows.is_empty());
        assert_eq!(vec![(0, true)], out.calls);
        tree.close(&state).unwrap();
    }
}
