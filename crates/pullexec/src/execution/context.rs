use pullexec_error::{DbError, Result};

use super::node::{NodeBase, NodeHandle};
use super::tree::TreeView;
use crate::arrays::row_batch::RowBatch;
use crate::arrays::scalar::ScalarValue;
use crate::plan::descriptors::RowDescriptor;
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::state::RuntimeState;

/// Everything an operator may touch while running a lifecycle method.
///
/// Children are addressed by their position in the node's child list.
#[derive(Debug)]
pub struct ExecContext<'a> {
    state: &'a RuntimeState,
    base: &'a NodeBase,
    subtree: TreeView<'a>,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(state: &'a RuntimeState, base: &'a NodeBase, subtree: TreeView<'a>) -> Self {
        ExecContext {
            state,
            base,
            subtree,
        }
    }

    pub(crate) fn into_subtree(self) -> TreeView<'a> {
        self.subtree
    }

    pub fn state(&self) -> &RuntimeState {
        self.state
    }

    pub fn base(&self) -> &NodeBase {
        self.base
    }

    pub fn node_id(&self) -> u32 {
        self.base.id()
    }

    pub fn row_desc(&self) -> &RowDescriptor {
        self.base.row_desc()
    }

    pub fn batch_size(&self) -> usize {
        self.state.batch_size()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.state.check_cancelled()
    }

    /// Evaluate this node's conjuncts against a row using the evaluator
    /// selected during prepare.
    pub fn eval_conjuncts(&self, row: &[ScalarValue]) -> Result<bool> {
        self.base.evaluator().eval(self.base.conjuncts(), row)
    }

    pub fn reached_limit(&self) -> bool {
        self.base.reached_limit()
    }

    pub fn mem_tracker(&self) -> Result<&MemTracker> {
        self.base.mem_tracker().ok_or_else(|| {
            DbError::new("Memory tracker requested before prepare")
                .with_field("node_id", self.base.id())
        })
    }

    pub fn num_children(&self) -> usize {
        self.base.children().len()
    }

    fn child(&self, idx: usize) -> Result<NodeHandle> {
        self.base.children().get(idx).copied().ok_or_else(|| {
            DbError::new("Missing child")
                .with_field("node_id", self.base.id())
                .with_field("child_idx", idx)
        })
    }

    pub fn child_row_desc(&self, idx: usize) -> Result<&RowDescriptor> {
        let child = self.child(idx)?;
        Ok(self.subtree.node(child)?.base.row_desc())
    }

    pub fn open_child(&mut self, idx: usize) -> Result<()> {
        let child = self.child(idx)?;
        self.subtree.open(self.state, child)
    }

    /// Pull the next batch from a child, returning true at end of stream.
    pub fn get_next_child(&mut self, idx: usize, batch: &mut RowBatch) -> Result<bool> {
        let child = self.child(idx)?;
        self.subtree.get_next(self.state, child, batch)
    }

    pub fn close_child(&mut self, idx: usize) -> Result<()> {
        let child = self.child(idx)?;
        self.subtree.close(self.state, child)
    }
}
