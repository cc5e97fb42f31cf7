//! Helpers for building plans and driving trees in tests.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use pullexec_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use crate::arrays::datatype::DataType;
use crate::arrays::row_batch::RowBatch;
use crate::arrays::scalar::{Row, ScalarValue};
use crate::config::execution::ExecutionConfig;
use crate::execution::builder::{DefaultNodeFactory, NodeFactory, build_tree_from_nodes};
use crate::execution::context::ExecContext;
use crate::execution::operators::{ExecOperator, PhysicalOperator};
use crate::execution::tree::ExecTree;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::PhysicalScalarExpression;
use crate::plan::PlanNodeDescriptor;
use crate::plan::descriptors::{DescriptorTable, RowDescriptor, TupleDescriptor, TupleId};
use crate::runtime::state::RuntimeState;

/// Tuple with an Int64 column followed by a Utf8 column.
pub const TEST_TUPLE: TupleId = TupleId(0);

pub fn test_desc_tbl() -> DescriptorTable {
    DescriptorTable::new([TupleDescriptor {
        id: TEST_TUPLE,
        slot_types: vec![DataType::Int64, DataType::Utf8],
    }])
}

/// Rows `(i, "row{i}")` for i in `0..n`.
pub fn test_rows(n: i64) -> Vec<Row> {
    (0..n)
        .map(|i| vec![ScalarValue::Int64(i), ScalarValue::Utf8(format!("row{i}"))])
        .collect()
}

pub fn memory_scan_desc(node_id: u32, rows: Vec<Row>) -> PlanNodeDescriptor {
    PlanNodeDescriptor::new(node_id, "memory_scan", 0)
        .with_row_tuples([TEST_TUPLE])
        .with_params(serde_json::json!({ "rows": rows }))
}

pub fn select_desc(
    node_id: u32,
    conjuncts: impl IntoIterator<Item = PhysicalScalarExpression>,
) -> PlanNodeDescriptor {
    PlanNodeDescriptor::new(node_id, "select", 1)
        .with_row_tuples([TEST_TUPLE])
        .with_conjuncts(conjuncts)
}

pub fn union_desc(node_id: u32, num_children: usize) -> PlanNodeDescriptor {
    PlanNodeDescriptor::new(node_id, "union", num_children).with_row_tuples([TEST_TUPLE])
}

pub fn empty_desc(node_id: u32) -> PlanNodeDescriptor {
    PlanNodeDescriptor::new(node_id, "empty", 0).with_row_tuples([TEST_TUPLE])
}

pub fn instrumented_desc(
    node_id: u32,
    num_children: usize,
    params: InstrumentedParams,
) -> PlanNodeDescriptor {
    PlanNodeDescriptor::new(node_id, "instrumented", num_children)
        .with_row_tuples([TEST_TUPLE])
        .with_params(serde_json::to_value(params).unwrap())
}

/// Conjunct `#0 > value`.
pub fn col_gt(value: i64) -> PhysicalScalarExpression {
    PhysicalScalarExpression::compare(
        crate::expr::ComparisonOperator::Gt,
        PhysicalScalarExpression::column(0),
        PhysicalScalarExpression::literal(ScalarValue::Int64(value)),
    )
}

pub fn test_state() -> RuntimeState {
    RuntimeState::new(ExecutionConfig::default()).unwrap()
}

pub fn test_state_with_batch_size(batch_size: usize) -> RuntimeState {
    RuntimeState::new(ExecutionConfig {
        batch_size,
        ..Default::default()
    })
    .unwrap()
}

/// Build a tree with the default test descriptor table.
pub fn build_test_tree(nodes: &[PlanNodeDescriptor], log: &EventLog) -> Result<ExecTree> {
    build_tree_from_nodes(nodes, &test_desc_tbl(), &TestNodeFactory::new(log.clone()))
}

#[derive(Debug, Default)]
pub struct DrainOutput {
    pub rows: Vec<Row>,
    /// Rows returned and the end of stream flag for each call.
    pub calls: Vec<(usize, bool)>,
}

/// Prepare and open the tree, then pull from the root until end of stream.
pub fn drain(tree: &mut ExecTree, state: &RuntimeState) -> Result<DrainOutput> {
    tree.prepare(state)?;
    pull_all(tree, state)
}

/// Open an already prepared tree and pull until end of stream.
pub fn pull_all(tree: &mut ExecTree, state: &RuntimeState) -> Result<DrainOutput> {
    tree.open(state)?;
    let mut out = DrainOutput::default();
    loop {
        let mut batch = RowBatch::new(state.batch_size());
        let eos = tree.get_next(state, &mut batch)?;
        out.calls.push((batch.num_rows(), eos));
        out.rows.extend(batch.take_rows());
        if eos {
            return Ok(out);
        }
    }
}

/// Shared log of lifecycle events recorded by instrumented operators.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == event).count()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InstrumentedParams {
    #[serde(default)]
    pub num_rows: usize,
    /// Bytes attached to each output batch's pool.
    #[serde(default)]
    pub attach_bytes: usize,
    #[serde(default)]
    pub fail_open: bool,
    #[serde(default)]
    pub fail_get_next: bool,
    #[serde(default)]
    pub fail_close: bool,
}

/// Operator recording its lifecycle calls, with injectable failures.
///
/// Opens all of its children on open but never reads from them.
#[derive(Debug)]
pub struct InstrumentedOperator {
    node_id: u32,
    params: InstrumentedParams,
    log: EventLog,
    emitted: usize,
}

impl ExecOperator for InstrumentedOperator {
    fn operator_name(&self) -> &'static str {
        "Instrumented"
    }

    fn open(&mut self, cx: &mut ExecContext) -> Result<()> {
        self.log.record(format!("open {}", self.node_id));
        self.emitted = 0;
        if self.params.fail_open {
            return Err(DbError::new("injected open failure"));
        }
        for idx in 0..cx.num_children() {
            cx.open_child(idx)?;
        }
        Ok(())
    }

    fn get_next(&mut self, cx: &mut ExecContext, batch: &mut RowBatch) -> Result<bool> {
        if self.params.fail_get_next {
            return Err(DbError::new("injected get next failure"));
        }
        cx.check_cancelled()?;
        while self.emitted < self.params.num_rows && !batch.at_capacity() {
            let i = self.emitted as i64;
            batch.push_row(vec![ScalarValue::Int64(i), ScalarValue::Utf8(format!("row{i}"))])?;
            self.emitted += 1;
        }
        if self.params.attach_bytes > 0 {
            batch
                .tuple_data_pool_mut()
                .attach(Bytes::from(vec![0; self.params.attach_bytes]));
        }
        Ok(self.emitted >= self.params.num_rows)
    }

    fn close(&mut self, _cx: &mut ExecContext) -> Result<()> {
        self.log.record(format!("close {}", self.node_id));
        if self.params.fail_close {
            return Err(DbError::new("injected close failure").with_field("node_id", self.node_id));
        }
        Ok(())
    }
}

impl Explainable for InstrumentedOperator {
    fn explain_entry(&self, _conf: ExplainConfig) -> ExplainEntry {
        ExplainEntry::new("Instrumented")
    }
}

/// Factory adding `instrumented` nodes on top of the default operators.
#[derive(Debug, Default)]
pub struct TestNodeFactory {
    log: EventLog,
}

impl TestNodeFactory {
    pub fn new(log: EventLog) -> Self {
        TestNodeFactory { log }
    }
}

impl NodeFactory for TestNodeFactory {
    fn create_operator(
        &self,
        desc: &PlanNodeDescriptor,
        row_desc: &RowDescriptor,
    ) -> Result<PhysicalOperator> {
        if desc.node_type == "instrumented" {
            let params = desc.decode_params()?;
            return Ok(PhysicalOperator::Dyn(Box::new(InstrumentedOperator {
                node_id: desc.node_id,
                params,
                log: self.log.clone(),
                emitted: 0,
            })));
        }
        DefaultNodeFactory.create_operator(desc, row_desc)
    }
}
