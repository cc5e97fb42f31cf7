//! Operator implementations and the trait every operator implements.

pub mod empty;
pub mod memory_scan;
pub mod select;
pub mod union;

use std::fmt::Debug;

use empty::PhysicalEmpty;
use memory_scan::PhysicalMemoryScan;
use pullexec_error::Result;
use select::PhysicalSelect;
use serde::{Deserialize, Serialize};
use union::PhysicalUnion;

use super::context::ExecContext;
use crate::arrays::row_batch::RowBatch;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

/// Operator-specific behavior of a node.
///
/// The tree wraps each call with the shared bookkeeping (lifecycle checks,
/// conjunct preparation, counters, limit enforcement), so implementations
/// only deal with producing rows.
pub trait ExecOperator: Explainable + Debug + Send {
    /// Name used for profiles and explain output.
    fn operator_name(&self) -> &'static str;

    /// Called once after children are prepared and conjuncts resolved.
    ///
    /// Operators validate their schema against their children here.
    fn prepare(&mut self, _cx: &mut ExecContext) -> Result<()> {
        Ok(())
    }

    /// Per-invocation setup. Operators open the children they read from.
    fn open(&mut self, cx: &mut ExecContext) -> Result<()>;

    /// Append up to the batch's remaining capacity worth of rows, returning
    /// true once no more rows will be produced.
    ///
    /// Rows appended past the node's limit are discarded by the caller.
    fn get_next(&mut self, cx: &mut ExecContext, batch: &mut RowBatch) -> Result<bool>;

    /// Release resources acquired since the last open.
    ///
    /// Children are closed by the tree after this returns.
    fn close(&mut self, _cx: &mut ExecContext) -> Result<()> {
        Ok(())
    }

    /// If this operator reads from a data source the scheduler assigns work
    /// to.
    fn is_scan_source(&self) -> bool {
        false
    }

    fn as_scan_source_mut(&mut self) -> Option<&mut dyn ScanSource> {
        None
    }
}

/// A contiguous range of input assigned to a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRange {
    pub offset: usize,
    pub len: usize,
}

impl ScanRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Operators that read from a data source.
pub trait ScanSource {
    /// Total number of input units (e.g. rows) the source covers.
    fn input_len(&self) -> usize;

    /// Restrict the source to the given ranges. Must be called before open.
    fn set_scan_ranges(&mut self, ranges: Vec<ScanRange>) -> Result<()>;

    fn scan_ranges(&self) -> &[ScanRange];
}

#[derive(Debug)]
pub enum PhysicalOperator {
    MemoryScan(PhysicalMemoryScan),
    Select(PhysicalSelect),
    Union(PhysicalUnion),
    Empty(PhysicalEmpty),
    /// Operators provided outside this crate.
    Dyn(Box<dyn ExecOperator>),
}

impl ExecOperator for PhysicalOperator {
    fn operator_name(&self) -> &'static str {
        match self {
            Self::MemoryScan(op) => op.operator_name(),
            Self::Select(op) => op.operator_name(),
            Self::Union(op) => op.operator_name(),
            Self::Empty(op) => op.operator_name(),
            Self::Dyn(op) => op.operator_name(),
        }
    }

    fn prepare(&mut self, cx: &mut ExecContext) -> Result<()> {
        match self {
            Self::MemoryScan(op) => op.prepare(cx),
            Self::Select(op) => op.prepare(cx),
            Self::Union(op) => op.prepare(cx),
            Self::Empty(op) => op.prepare(cx),
            Self::Dyn(op) => op.prepare(cx),
        }
    }

    fn open(&mut self, cx: &mut ExecContext) -> Result<()> {
        match self {
            Self::MemoryScan(op) => op.open(cx),
            Self::Select(op) => op.open(cx),
            Self::Union(op) => op.open(cx),
            Self::Empty(op) => op.open(cx),
            Self::Dyn(op) => op.open(cx),
        }
    }

    fn get_next(&mut self, cx: &mut ExecContext, batch: &mut RowBatch) -> Result<bool> {
        match self {
            Self::MemoryScan(op) => op.get_next(cx, batch),
            Self::Select(op) => op.get_next(cx, batch),
            Self::Union(op) => op.get_next(cx, batch),
            Self::Empty(op) => op.get_next(cx, batch),
            Self::Dyn(op) => op.get_next(cx, batch),
        }
    }

    fn close(&mut self, cx: &mut ExecContext) -> Result<()> {
        match self {
            Self::MemoryScan(op) => op.close(cx),
            Self::Select(op) => op.close(cx),
            Self::Union(op) => op.close(cx),
            Self::Empty(op) => op.close(cx),
            Self::Dyn(op) => op.close(cx),
        }
    }

    fn is_scan_source(&self) -> bool {
        match self {
            Self::MemoryScan(op) => op.is_scan_source(),
            Self::Select(op) => op.is_scan_source(),
            Self::Union(op) => op.is_scan_source(),
            Self::Empty(op) => op.is_scan_source(),
            Self::Dyn(op) => op.is_scan_source(),
        }
    }

    fn as_scan_source_mut(&mut self) -> Option<&mut dyn ScanSource> {
        match self {
            Self::MemoryScan(op) => op.as_scan_source_mut(),
            Self::Select(op) => op.as_scan_source_mut(),
            Self::Union(op) => op.as_scan_source_mut(),
            Self::Empty(op) => op.as_scan_source_mut(),
            Self::Dyn(op) => op.as_scan_source_mut(),
        }
    }
}

impl Explainable for PhysicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        match self {
            Self::MemoryScan(op) => op.explain_entry(conf),
            Self::Select(op) => op.explain_entry(conf),
            Self::Union(op) => op.explain_entry(conf),
            Self::Empty(op) => op.explain_entry(conf),
            Self::Dyn(op) => op.explain_entry(conf),
        }
    }
}
