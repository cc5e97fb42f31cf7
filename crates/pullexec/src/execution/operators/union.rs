use pullexec_error::{DbError, Result};

use super::ExecOperator;
use crate::arrays::row_batch::RowBatch;
use crate::arrays::scalar::Row;
use crate::execution::context::ExecContext;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

/// Concatenates the output of all children, in child order.
///
/// Children are opened when reached and closed as soon as they're drained.
#[derive(Debug)]
pub struct PhysicalUnion {
    child_batch: Option<RowBatch>,
    pending: std::vec::IntoIter<Row>,
    current_child: usize,
    child_opened: bool,
    child_eos: bool,
}

impl Default for PhysicalUnion {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalUnion {
    pub fn new() -> Self {
        PhysicalUnion {
            child_batch: None,
            pending: Vec::new().into_iter(),
            current_child: 0,
            child_opened: false,
            child_eos: false,
        }
    }
}

impl ExecOperator for PhysicalUnion {
    fn operator_name(&self) -> &'static str {
        "Union"
    }

    fn prepare(&mut self, cx: &mut ExecContext) -> Result<()> {
        if cx.num_children() == 0 {
            return Err(DbError::initialization("Union requires at least one child"));
        }
        for idx in 0..cx.num_children() {
            let child_desc = cx.child_row_desc(idx)?;
            if !child_desc.layout_equals(cx.row_desc()) {
                return Err(DbError::initialization("Union child row does not match")
                    .with_field("child_idx", idx)
                    .with_field("row", cx.row_desc())
                    .with_field("child_row", child_desc));
            }
        }
        Ok(())
    }

    fn open(&mut self, cx: &mut ExecContext) -> Result<()> {
        self.child_batch = Some(RowBatch::new(cx.batch_size()));
        self.pending = Vec::new().into_iter();
        self.current_child = 0;
        self.child_opened = false;
        self.child_eos = false;
        Ok(())
    }

    fn get_next(&mut self, cx: &mut ExecContext, batch: &mut RowBatch) -> Result<bool> {
        let child_batch = self
            .child_batch
            .as_mut()
            .ok_or_else(|| DbError::new("Union not opened"))?;

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
                return Ok(false);
            }

            child_batch.transfer_resource_ownership(batch);
            if self.child_eos {
                cx.close_child(self.current_child)?;
                self.current_child += 1;
                self.child_opened = false;
                self.child_eos = false;
            }
            if self.current_child >= cx.num_children() {
                return Ok(true);
            }
            if batch.at_capacity() {
                return Ok(false);
            }

            if !self.child_opened {
                cx.open_child(self.current_child)?;
                self.child_opened = true;
            }

            cx.check_cancelled()?;
            child_batch.reset();
            self.child_eos = cx.get_next_child(self.current_child, child_batch)?;
            self.pending = child_batch.take_rows().into_iter();
        }
    }

    fn close(&mut self, _cx: &mut ExecContext) -> Result<()> {
        self.child_batch = None;
        self.pending = Vec::new().into_iter();
        Ok(())
    }
}

impl Explainable for PhysicalUnion {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Union")
    }
}
