use pullexec_error::Result;
use tracing::{debug, info};

use super::builder::{NodeFactory, build_tree};
use super::node::NodeHandle;
use super::sink::DataSink;
use super::tree::ExecTree;
use crate::arrays::row_batch::RowBatch;
use crate::config::execution::ExecutionConfig;
use crate::plan::QueryPlan;
use crate::runtime::profile::ProfileSnapshot;
use crate::runtime::state::{CancellationHandle, RuntimeState};

/// Drives a single query's tree from the root and feeds a sink.
#[derive(Debug)]
pub struct QueryExecutor {
    state: RuntimeState,
    tree: ExecTree,
}

impl QueryExecutor {
    pub fn new(tree: ExecTree, state: RuntimeState) -> Self {
        QueryExecutor { state, tree }
    }

    /// Build the tree for a plan using the provided factory.
    pub fn try_new(
        plan: &QueryPlan,
        factory: &dyn NodeFactory,
        config: ExecutionConfig,
    ) -> Result<Self> {
        let state = RuntimeState::new(config)?;
        let tree = build_tree(plan, factory)?;
        Ok(Self::new(tree, state))
    }

    pub fn tree(&self) -> &ExecTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ExecTree {
        &mut self.tree
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.state.cancellation_handle()
    }

    /// Data source nodes for the scheduler to assign work to.
    pub fn scan_sources(&self) -> Vec<NodeHandle> {
        self.tree.collect_scan_sources()
    }

    /// Run the tree to completion, sending every batch to the sink.
    ///
    /// The tree is always closed and the sink always finalized. The first
    /// error from execution, close, or finalize is returned.
    pub fn execute(&mut self, sink: &mut dyn DataSink) -> Result<()> {
        let query_id = self.state.query_id();
        info!(%query_id, num_nodes = self.tree.num_nodes(), "executing query");

        let result = self.run(sink);
        let close_result = self.tree.close(&self.state);
        let finalize_result = sink.finalize();

        let result = result.and(close_result).and(finalize_result);
        match &result {
            Ok(()) => debug!(%query_id, "query completed"),
            Err(e) => debug!(%query_id, %e, "query failed"),
        }

        result
    }

    fn run(&mut self, sink: &mut dyn DataSink) -> Result<()> {
        self.tree.prepare(&self.state)?;
        self.tree.open(&self.state)?;

        loop {
            let mut batch = RowBatch::new(self.state.batch_size());
            let eos = self.tree.get_next(&self.state, &mut batch)?;
            if !batch.is_empty() {
                sink.send(batch)?;
            }
            if eos {
                return Ok(());
            }
        }
    }

    pub fn profile_snapshot(&self) -> ProfileSnapshot {
        self.state.profile().snapshot()
    }
}
