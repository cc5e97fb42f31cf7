use std::fmt::Debug;

use pullexec_error::{DbError, Result};

use crate::arrays::row_batch::RowBatch;
use crate::arrays::scalar::Row;
use crate::arrays::tuple_data_pool::TupleDataPool;

/// Destination for batches produced by the root of a tree.
///
/// Batches are handed over by value along with any memory attached to
/// their pools.
pub trait DataSink: Debug {
    fn send(&mut self, batch: RowBatch) -> Result<()>;

    /// Called once after the tree has been closed, whether or not execution
    /// succeeded.
    fn finalize(&mut self) -> Result<()>;
}

/// Sink collecting every row in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    rows: Vec<Row>,
    num_batches: usize,
    /// Memory backing the collected rows.
    pool: TupleDataPool,
    finalized: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn retained_bytes(&self) -> usize {
        self.pool.total_bytes()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl DataSink for CollectingSink {
    fn send(&mut self, mut batch: RowBatch) -> Result<()> {
        if self.finalized {
            return Err(DbError::new("Cannot send to a finalized sink"));
        }
        self.num_batches += 1;
        self.pool.acquire_data(batch.tuple_data_pool_mut());
        self.rows.extend(batch.take_rows());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}
