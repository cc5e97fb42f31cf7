//! Reconstructs execution trees from depth-first serialized plans.

use std::fmt::Debug;

use hashbrown::HashSet;
use pullexec_error::{DbError, Result};
use tracing::debug;

use super::node::{ExecNode, NodeBase, NodeHandle};
use super::operators::empty::PhysicalEmpty;
use super::operators::memory_scan::{MemoryScanParams, PhysicalMemoryScan};
use super::operators::select::PhysicalSelect;
use super::operators::union::PhysicalUnion;
use super::operators::{ExecOperator, PhysicalOperator};
use super::tree::ExecTree;
use crate::plan::descriptors::{DescriptorTable, RowDescriptor};
use crate::plan::{PlanNodeDescriptor, QueryPlan};

/// Creates the operator for a plan node based on its type tag.
pub trait NodeFactory: Debug {
    /// Create an operator for the descriptor.
    ///
    /// Unrecognized node types must produce a corrupt plan error.
    fn create_operator(
        &self,
        desc: &PlanNodeDescriptor,
        row_desc: &RowDescriptor,
    ) -> Result<PhysicalOperator>;
}

/// Factory for the operators built into this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNodeFactory;

impl NodeFactory for DefaultNodeFactory {
    fn create_operator(
        &self,
        desc: &PlanNodeDescriptor,
        _row_desc: &RowDescriptor,
    ) -> Result<PhysicalOperator> {
        let operator = match desc.node_type.as_str() {
            "memory_scan" => {
                let params: MemoryScanParams = desc.decode_params()?;
                PhysicalOperator::MemoryScan(PhysicalMemoryScan::new(params.rows))
            }
            "select" => PhysicalOperator::Select(PhysicalSelect::new()),
            "union" => PhysicalOperator::Union(PhysicalUnion::new()),
            "empty" => PhysicalOperator::Empty(PhysicalEmpty),
            other => {
                return Err(DbError::corrupt_plan("Unrecognized node type")
                    .with_field("node_id", desc.node_id)
                    .with_field("node_type", other));
            }
        };
        Ok(operator)
    }
}

/// Build an execution tree for a plan.
pub fn build_tree(plan: &QueryPlan, factory: &dyn NodeFactory) -> Result<ExecTree> {
    build_tree_from_nodes(&plan.nodes, &plan.desc_tbl, factory)
}

/// Build an execution tree from nodes in depth-first pre-order.
///
/// Each descriptor's declared children are the subtrees immediately
/// following it. Nothing is returned unless the entire list is consumed by
/// exactly one tree.
pub fn build_tree_from_nodes(
    nodes: &[PlanNodeDescriptor],
    desc_tbl: &DescriptorTable,
    factory: &dyn NodeFactory,
) -> Result<ExecTree> {
    if nodes.is_empty() {
        return Err(DbError::corrupt_plan("Plan contains no nodes"));
    }

    let mut exec_nodes: Vec<ExecNode> = Vec::with_capacity(nodes.len());
    let mut seen_ids = HashSet::with_capacity(nodes.len());
    // Nodes still waiting on children, with the number of children left.
    let mut parents: Vec<(usize, usize)> = Vec::new();

    for (idx, desc) in nodes.iter().enumerate() {
        if idx > 0 && parents.is_empty() {
            return Err(DbError::corrupt_plan("Plan has nodes after the root subtree")
                .with_field("node_id", desc.node_id)
                .with_field("remaining", nodes.len() - idx));
        }
        if !seen_ids.insert(desc.node_id) {
            return Err(DbError::corrupt_plan("Duplicate node id").with_field("node_id", desc.node_id));
        }

        let node = create_node(desc, desc_tbl, factory)?;

        if let Some((parent, remaining)) = parents.last_mut() {
            exec_nodes[*parent].base.children.push(NodeHandle(idx));
            *remaining -= 1;
        }
        exec_nodes.push(node);

        if desc.num_children > 0 {
            parents.push((idx, desc.num_children));
        }
        while matches!(parents.last(), Some((_, 0))) {
            parents.pop();
        }
    }

    if let Some((parent, remaining)) = parents.last() {
        return Err(
            DbError::corrupt_plan("Plan ended before all declared children were found")
                .with_field("node_id", nodes[*parent].node_id)
                .with_field("missing_children", remaining),
        );
    }

    debug!(num_nodes = exec_nodes.len(), "built execution tree");

    Ok(ExecTree::new(exec_nodes))
}

fn create_node(
    desc: &PlanNodeDescriptor,
    desc_tbl: &DescriptorTable,
    factory: &dyn NodeFactory,
) -> Result<ExecNode> {
    let limit = desc.decoded_limit()?;
    let row_desc = desc_tbl
        .row_descriptor(&desc.row_tuples)
        .map_err(|e| e.with_field("node_id", desc.node_id))?;
    let operator = factory.create_operator(desc, &row_desc)?;

    let base = NodeBase::new(
        desc.node_id,
        desc.node_type.clone(),
        operator.operator_name(),
        desc.conjuncts.clone(),
        row_desc,
        limit,
    );

    Ok(ExecNode::new(base, operator))
}
