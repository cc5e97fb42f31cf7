use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::operators::PhysicalOperator;
use crate::expr::PhysicalScalarExpression;
use crate::expr::conjuncts::ConjunctEvaluator;
use crate::plan::descriptors::RowDescriptor;
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::profile::{Counter, CounterUnit, RuntimeProfile};

pub const ROWS_RETURNED_COUNTER: &str = "RowsReturned";
pub const PEAK_MEMORY_COUNTER: &str = "PeakMemoryUsage";
pub const TOTAL_TIME_COUNTER: &str = "TotalTime";

/// Handle to a node within an execution tree.
///
/// Handles are positions in the tree's pre-order node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) usize);

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a node.
///
/// `Unprepared -> Prepared -> Opened <-> Closed`. A prepared node that was
/// never opened may be closed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycle {
    Unprepared,
    Prepared,
    Opened,
    Closed,
}

impl fmt::Display for NodeLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unprepared => write!(f, "unprepared"),
            Self::Prepared => write!(f, "prepared"),
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Counters registered when a node is prepared.
#[derive(Debug)]
pub struct NodeCounters {
    pub rows_returned: Arc<Counter>,
    pub peak_memory: Arc<Counter>,
    pub total_time: Arc<Counter>,
    pub mem_tracker: MemTracker,
}

impl NodeCounters {
    pub(crate) fn register(profile: &RuntimeProfile) -> Self {
        let peak_memory = profile.add_counter(PEAK_MEMORY_COUNTER, CounterUnit::Bytes);
        NodeCounters {
            rows_returned: profile.add_counter(ROWS_RETURNED_COUNTER, CounterUnit::Unit),
            total_time: profile.add_counter(TOTAL_TIME_COUNTER, CounterUnit::TimeNs),
            mem_tracker: MemTracker::new(peak_memory.clone()),
            peak_memory,
        }
    }
}

/// State shared by every operator regardless of its type.
#[derive(Debug)]
pub struct NodeBase {
    pub(crate) id: u32,
    pub(crate) node_type: String,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) conjuncts: Vec<PhysicalScalarExpression>,
    pub(crate) evaluator: ConjunctEvaluator,
    pub(crate) row_desc: RowDescriptor,
    pub(crate) limit: Option<u64>,
    /// Rows returned since the last open. Used for enforcing the limit.
    pub(crate) num_rows_returned: AtomicU64,
    pub(crate) profile: Arc<RuntimeProfile>,
    pub(crate) counters: Option<NodeCounters>,
}

impl NodeBase {
    pub fn new(
        id: u32,
        node_type: impl Into<String>,
        operator_name: &str,
        conjuncts: Vec<PhysicalScalarExpression>,
        row_desc: RowDescriptor,
        limit: Option<u64>,
    ) -> Self {
        NodeBase {
            id,
            node_type: node_type.into(),
            children: Vec::new(),
            conjuncts,
            evaluator: ConjunctEvaluator::Interpreted,
            row_desc,
            limit,
            num_rows_returned: AtomicU64::new(0),
            profile: Arc::new(RuntimeProfile::new(format!("{operator_name} (id={id})"))),
            counters: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn conjuncts(&self) -> &[PhysicalScalarExpression] {
        &self.conjuncts
    }

    pub fn evaluator(&self) -> &ConjunctEvaluator {
        &self.evaluator
    }

    pub fn row_desc(&self) -> &RowDescriptor {
        &self.row_desc
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Rows returned since the node was last opened.
    pub fn rows_returned(&self) -> u64 {
        self.num_rows_returned.load(Ordering::Relaxed)
    }

    pub fn reached_limit(&self) -> bool {
        match self.limit {
            Some(limit) => self.rows_returned() >= limit,
            None => false,
        }
    }

    /// Number of rows that may still be returned before hitting the limit.
    pub fn remaining_limit(&self) -> Option<u64> {
        self.limit
            .map(|limit| limit.saturating_sub(self.rows_returned()))
    }

    pub fn runtime_profile(&self) -> &Arc<RuntimeProfile> {
        &self.profile
    }

    /// Counters, available once the node is prepared.
    pub fn counters(&self) -> Option<&NodeCounters> {
        self.counters.as_ref()
    }

    pub fn memory_used_counter(&self) -> Option<&Arc<Counter>> {
        self.counters.as_ref().map(|c| &c.peak_memory)
    }

    pub fn mem_tracker(&self) -> Option<&MemTracker> {
        self.counters.as_ref().map(|c| &c.mem_tracker)
    }

    pub(crate) fn record_rows_returned(&self, num_rows: u64) {
        self.num_rows_returned.fetch_add(num_rows, Ordering::Relaxed);
        if let Some(counters) = &self.counters {
            counters.rows_returned.add(num_rows as i64);
        }
    }

    pub(crate) fn reset_rows_returned(&self) {
        self.num_rows_returned.store(0, Ordering::Relaxed);
    }
}

/// A single operator in an execution tree.
#[derive(Debug)]
pub struct ExecNode {
    pub(crate) base: NodeBase,
    pub(crate) operator: PhysicalOperator,
    pub(crate) lifecycle: NodeLifecycle,
}

impl ExecNode {
    pub fn new(base: NodeBase, operator: PhysicalOperator) -> Self {
        ExecNode {
            base,
            operator,
            lifecycle: NodeLifecycle::Unprepared,
        }
    }

    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    pub fn operator(&self) -> &PhysicalOperator {
        &self.operator
    }

    pub fn operator_mut(&mut self) -> &mut PhysicalOperator {
        &mut self.operator
    }

    pub fn lifecycle(&self) -> NodeLifecycle {
        self.lifecycle
    }
}
