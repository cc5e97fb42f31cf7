use pullexec_error::{DbError, Result};

use super::ExecOperator;
use crate::arrays::row_batch::RowBatch;
use crate::arrays::scalar::Row;
use crate::execution::context::ExecContext;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

/// Filters rows from a single child using the node's conjuncts.
///
/// Memory attached to the child's batches is handed over to the output batch
/// once every row from that child batch has been emitted.
#[derive(Debug)]
pub struct PhysicalSelect {
    child_batch: Option<RowBatch>,
    pending: std::vec::IntoIter<Row>,
    child_eos: bool,
}

impl Default for PhysicalSelect {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalSelect {
    pub fn new() -> Self {
        PhysicalSelect {
            child_batch: None,
            pending: Vec::new().into_iter(),
            child_eos: false,
        }
    }
}

impl ExecOperator for PhysicalSelect {
    fn operator_name(&self) -> &'static str {
        "Select"
    }

    fn prepare(&mut self, cx: &mut ExecContext) -> Result<()> {
        if cx.num_children() != 1 {
            return Err(DbError::initialization("Select requires exactly one child")
                .with_field("num_children", cx.num_children()));
        }
        let child_desc = cx.child_row_desc(0)?;
        if !child_desc.layout_equals(cx.row_desc()) {
            return Err(DbError::initialization("Select row does not match child row")
                .with_field("row", cx.row_desc())
                .with_field("child_row", child_desc));
        }
        Ok(())
    }

    fn open(&mut self, cx: &mut ExecContext) -> Result<()> {
        self.child_batch = Some(RowBatch::new(cx.batch_size()));
        self.pending = Vec::new().into_iter();
        self.child_eos = false;
        cx.open_child(0)
    }

    fn get_next(&mut self, cx: &mut ExecContext, batch: &mut RowBatch) -> Result<bool> {
        let child_batch = self
            .child_batch
            .as_mut()
            .ok_or_else(|| DbError::new("Select not opened"))?;

        loop {
            while !batch.at_capacity() {
                let row = match self.pending.next() {
                    Some(row) => row,
                    None => break,
                };
                if cx.eval_conjuncts(&row)? {
                    batch.push_row(row)?;
                }
            }

            if !self.pending.as_slice().is_empty() {
                // Output full, remaining rows go out on the next call.
                return Ok(false);
            }

            child_batch.transfer_resource_ownership(batch);
            if self.child_eos {
                return Ok(true);
            }
            if batch.at_capacity() {
                return Ok(false);
            }

            cx.check_cancelled()?;
            child_batch.reset();
            self.child_eos = cx.get_next_child(0, child_batch)?;
            self.pending = child_batch.take_rows().into_iter();
        }
    }

    fn close(&mut self, _cx: &mut ExecContext) -> Result<()> {
        self.child_batch = None;
        self.pending = Vec::new().into_iter();
        Ok(())
    }
}

impl Explainable for PhysicalSelect {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Select")
    }
}

#[cfg(test)]
mod tests {
    use pullexec_error::ErrorKind;

    use super::*;
    use crate::arrays::scalar::ScalarValue;
    use crate::plan::descriptors::TupleId;
    use crate::testutil::{
        EventLog,
        InstrumentedParams,
        build_test_tree,
        col_gt,
        drain,
        instrumented_desc,
        memory_scan_desc,
        select_desc,
        test_rows,
        test_state,
        test_state_with_batch_size,
    };

    #[test]
    fn filters_with_limit() {
        let log = EventLog::default();
        let mut tree = build_test_tree(
            &[
                select_desc(0, [col_gt(5)]).with_limit(3),
                memory_scan_desc(1, test_rows(20)),
            ],
            &log,
        )
        .unwrap();
        let state = test_state();

        let out = drain(&mut tree, &state).unwrap();
        assert_eq!(vec![(3, true)], out.calls);
        assert_eq!(
            vec![
                ScalarValue::Int64(6),
                ScalarValue::Int64(7),
                ScalarValue::Int64(8)
            ],
            out.rows.iter().map(|r| r[0].clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn filters_across_small_batches() {
        let log = EventLog::default();
        let mut tree = build_test_tree(
            &[
                select_desc(0, [col_gt(2)]),
                memory_scan_desc(1, test_rows(9)),
            ],
            &log,
        )
        .unwrap();
        let state = test_state_with_batch_size(4);

        let out = drain(&mut tree, &state).unwrap();
        assert_eq!(6, out.rows.len());
        assert_eq!(test_rows(9)[3..].to_vec(), out.rows);
        for (num_rows, _) in &out.calls {
            assert!(*num_rows <= 4);
        }
        assert!(out.calls.last().unwrap().1);
    }

    #[test]
    fn transfers_child_memory() {
        let log = EventLog::default();
        let params = InstrumentedParams {
            num_rows: 3,
            attach_bytes: 16,
            ..Default::default()
        };
        let mut tree = build_test_tree(
            &[select_desc(0, []), instrumented_desc(1, 0, params)],
            &log,
        )
        .unwrap();
        let state = test_state();

        tree.prepare(&state).unwrap();
        tree.open(&state).unwrap();
        let mut batch = RowBatch::new(state.batch_size());
        let eos = tree.get_next(&state, &mut batch).unwrap();

        assert!(eos);
        assert_eq!(3, batch.num_rows());
        assert_eq!(16, batch.tuple_data_pool().total_bytes());
        tree.close(&state).unwrap();
    }

    #[test]
    fn mismatched_child_row_fails_prepare() {
        let log = EventLog::default();
        let mut tree = build_test_tree(
            &[
                select_desc(0, []).with_row_tuples([TupleId(0), TupleId(0)]),
                memory_scan_desc(1, test_rows(1)),
            ],
            &log,
        )
        .unwrap();
        let state = test_state();

        let err = tree.prepare(&state).unwrap_err();
        assert_eq!(ErrorKind::Initialization, err.kind());
    }

    #[test]
    fn child_error_propagates() {
        let log = EventLog::default();
        let params = InstrumentedParams {
            fail_get_next: true,
            ..Default::default()
        };
        let mut tree = build_test_tree(
            &[select_desc(0, []), instrumented_desc(1, 0, params)],
            &log,
        )
        .unwrap();
        let state = test_state();

        let err = drain(&mut tree, &state).unwrap_err();
        assert_eq!("injected get next failure", err.get_msg());
        tree.close(&state).unwrap();
        assert_eq!(1, log.count("close 1"));
    }
}
