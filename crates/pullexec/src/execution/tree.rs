use pullexec_error::{DbError, Result};
use tracing::{debug, trace, warn};

use super::context::ExecContext;
use super::node::{ExecNode, NodeBase, NodeCounters, NodeHandle, NodeLifecycle};
use super::operators::{ExecOperator, ScanSource};
use crate::arrays::row_batch::RowBatch;
use crate::explain::explainable::ExplainConfig;
use crate::explain::node::ExplainNode;
use crate::expr::conjuncts::{ConjunctEvaluator, prepare_conjuncts};
use crate::runtime::profile::ScopedTimer;
use crate::runtime::state::RuntimeState;

/// An execution tree.
///
/// Nodes live in a single list in depth-first pre-order. The root is the
/// first node and every node's subtree directly follows it. Nodes are never
/// moved or freed individually; the whole list is dropped with the tree.
#[derive(Debug)]
pub struct ExecTree {
    nodes: Vec<ExecNode>,
}

impl ExecTree {
    pub(crate) fn new(nodes: Vec<ExecNode>) -> Self {
        ExecTree { nodes }
    }

    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&ExecNode> {
        self.nodes.get(handle.0)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut ExecNode> {
        self.nodes.get_mut(handle.0)
    }

    /// Iterate all nodes in depth-first pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &ExecNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeHandle(idx), node))
    }

    fn view(&mut self) -> TreeView<'_> {
        TreeView {
            offset: 0,
            nodes: &mut self.nodes,
        }
    }

    /// Prepare every node in the tree.
    ///
    /// The root's profile is attached beneath the query profile.
    pub fn prepare(&mut self, state: &RuntimeState) -> Result<()> {
        let root = self.root();
        self.view().prepare(state, root)?;
        if let Some(node) = self.node(root) {
            state.profile().add_child(node.base.profile.clone());
        }
        Ok(())
    }

    pub fn open(&mut self, state: &RuntimeState) -> Result<()> {
        let root = self.root();
        self.view().open(state, root)
    }

    /// Pull the next batch of rows from the root, returning true once the
    /// root will produce no more rows.
    pub fn get_next(&mut self, state: &RuntimeState, batch: &mut RowBatch) -> Result<bool> {
        let root = self.root();
        self.view().get_next(state, root, batch)
    }

    /// Close every node in the tree. Safe to call more than once.
    pub fn close(&mut self, state: &RuntimeState) -> Result<()> {
        let root = self.root();
        self.view().close(state, root)
    }

    /// Collect all nodes acting as data sources in depth-first order.
    pub fn collect_scan_sources(&self) -> Vec<NodeHandle> {
        // Pre-order storage means a linear pass is a depth-first traversal.
        self.iter()
            .filter(|(_, node)| node.operator.is_scan_source())
            .map(|(handle, _)| handle)
            .collect()
    }

    pub fn scan_source_mut(&mut self, handle: NodeHandle) -> Option<&mut dyn ScanSource> {
        self.nodes.get_mut(handle.0)?.operator.as_scan_source_mut()
    }

    pub fn explain(&self, conf: ExplainConfig) -> ExplainNode {
        ExplainNode::from_tree(self, conf)
    }

    /// Render the tree as indented text, one line per node.
    pub fn debug_string(&self) -> String {
        self.explain(ExplainConfig::default()).render()
    }
}

/// Mutable view over a contiguous run of nodes.
///
/// Splitting a node off the front of its own view yields a view holding
/// the node's entire subtree, letting an operator drive its children while
/// holding a mutable reference to itself.
#[derive(Debug)]
pub struct TreeView<'a> {
    /// Handle of the first node in `nodes`.
    offset: usize,
    nodes: &'a mut [ExecNode],
}

impl TreeView<'_> {
    fn local_index(&self, handle: NodeHandle) -> Result<usize> {
        handle
            .0
            .checked_sub(self.offset)
            .filter(|idx| *idx < self.nodes.len())
            .ok_or_else(|| DbError::new("Node handle outside of subtree").with_field("handle", handle))
    }

    pub(crate) fn node(&self, handle: NodeHandle) -> Result<&ExecNode> {
        let idx = self.local_index(handle)?;
        Ok(&self.nodes[idx])
    }

    fn split(&mut self, handle: NodeHandle) -> Result<(&mut ExecNode, TreeView<'_>)> {
        let idx = self.local_index(handle)?;
        let (head, tail) = self.nodes.split_at_mut(idx + 1);
        let subtree = TreeView {
            offset: handle.0 + 1,
            nodes: tail,
        };
        Ok((&mut head[idx], subtree))
    }

    /// Prepare a node and all of its children.
    ///
    /// Children are prepared before conjuncts are resolved and before the
    /// operator's own prepare so operators can validate against their
    /// children's schemas.
    pub(crate) fn prepare(&mut self, state: &RuntimeState, handle: NodeHandle) -> Result<()> {
        let (node, mut subtree) = self.split(handle)?;
        if node.lifecycle != NodeLifecycle::Unprepared {
            return Err(DbError::initialization("Node prepared more than once")
                .with_field("node_id", node.base.id)
                .with_field("state", node.lifecycle));
        }

        for &child in &node.base.children {
            subtree.prepare(state, child)?;
        }

        let ExecNode {
            base,
            operator,
            lifecycle,
        } = node;

        prepare_conjuncts(&base.conjuncts, &base.row_desc)
            .map_err(|e| e.with_field("node_id", base.id))?;
        base.evaluator =
            ConjunctEvaluator::select(state.conjunct_compiler(), &base.conjuncts, &base.row_desc);
        if !base.conjuncts.is_empty() {
            let codegen = if base.evaluator.is_compiled() {
                "compiled"
            } else {
                "interpreted"
            };
            base.profile.add_info_string("Conjuncts", codegen);
        }

        base.counters = Some(NodeCounters::register(&base.profile));
        for &child in &base.children {
            base.profile.add_child(subtree.node(child)?.base.profile.clone());
        }

        let mut cx = ExecContext::new(state, base, subtree);
        operator
            .prepare(&mut cx)
            .map_err(|e| e.with_field("node_id", base.id))?;
        *lifecycle = NodeLifecycle::Prepared;

        debug!(
            node_id = base.id,
            operator = operator.operator_name(),
            compiled = base.evaluator.is_compiled(),
            "prepared node"
        );

        Ok(())
    }

    pub(crate) fn open(&mut self, state: &RuntimeState, handle: NodeHandle) -> Result<()> {
        let (node, subtree) = self.split(handle)?;
        match node.lifecycle {
            NodeLifecycle::Prepared | NodeLifecycle::Closed => (),
            other => {
                return Err(DbError::new("Cannot open node")
                    .with_field("node_id", node.base.id)
                    .with_field("state", other));
            }
        }
        state.check_cancelled()?;

        let ExecNode {
            base,
            operator,
            lifecycle,
        } = node;

        base.reset_rows_returned();
        // Marked open before delegating so a failed open still gets cleaned
        // up by close.
        *lifecycle = NodeLifecycle::Opened;

        debug!(node_id = base.id, operator = operator.operator_name(), "opening node");

        let _timer = base.counters.as_ref().map(|c| ScopedTimer::new(&c.total_time));
        let mut cx = ExecContext::new(state, base, subtree);
        operator.open(&mut cx)
    }

    /// Pull rows from a node into `batch`, enforcing the node's limit.
    pub(crate) fn get_next(
        &mut self,
        state: &RuntimeState,
        handle: NodeHandle,
        batch: &mut RowBatch,
    ) -> Result<bool> {
        let (node, subtree) = self.split(handle)?;
        if node.lifecycle != NodeLifecycle::Opened {
            return Err(DbError::new("Node not open")
                .with_field("node_id", node.base.id)
                .with_field("state", node.lifecycle));
        }
        state.check_cancelled()?;

        let ExecNode { base, operator, .. } = node;
        if base.reached_limit() {
            return Ok(true);
        }

        let start = batch.num_rows();
        let mut eos = {
            let _timer = base.counters.as_ref().map(|c| ScopedTimer::new(&c.total_time));
            let mut cx = ExecContext::new(state, base, subtree);
            operator.get_next(&mut cx, batch)?
        };

        let mut num_rows = batch.num_rows().saturating_sub(start);
        if let Some(remaining) = base.remaining_limit() {
            if num_rows as u64 >= remaining {
                num_rows = remaining as usize;
                batch.truncate(start + num_rows);
                eos = true;
            }
        }
        base.record_rows_returned(num_rows as u64);

        trace!(node_id = base.id, num_rows, eos, "get next");

        Ok(eos)
    }

    /// Close a node and all of its children.
    ///
    /// Every child is closed even if the operator's own close or an earlier
    /// child fails. The first error is returned.
    pub(crate) fn close(&mut self, state: &RuntimeState, handle: NodeHandle) -> Result<()> {
        let (node, mut subtree) = self.split(handle)?;
        match node.lifecycle {
            NodeLifecycle::Closed => return Ok(()),
            // A prepare that failed partway leaves prepared children beneath
            // an unprepared parent.
            NodeLifecycle::Unprepared => {
                return subtree.close_children(state, &node.base, Ok(()));
            }
            NodeLifecycle::Prepared | NodeLifecycle::Opened => (),
        }

        let ExecNode {
            base,
            operator,
            lifecycle,
        } = node;
        *lifecycle = NodeLifecycle::Closed;

        let mut cx = ExecContext::new(state, base, subtree);
        let mut result = operator
            .close(&mut cx)
            .map_err(|e| e.with_field("node_id", base.id));

        let mut subtree = cx.into_subtree();
        let result = subtree.close_children(state, base, result);

        if let Some(counters) = &base.counters {
            let released = counters.mem_tracker.release_all();
            debug!(
                node_id = base.id,
                operator = operator.operator_name(),
                rows_returned = counters.rows_returned.value(),
                peak_memory = counters.peak_memory.value(),
                released,
                "closed node"
            );
        }

        result
    }

    /// Close every child of `base`, keeping the first error seen.
    fn close_children(
        &mut self,
        state: &RuntimeState,
        base: &NodeBase,
        mut result: Result<()>,
    ) -> Result<()> {
        for &child in &base.children {
            if let Err(e) = self.close(state, child) {
                if result.is_ok() {
                    result = Err(e);
                } else {
                    warn!(node_id = base.id, %e, "additional error closing child");
                }
            }
        }
        result
    }
}
