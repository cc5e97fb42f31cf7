use pullexec_error::{DbError, Result};

use super::scalar::Row;
use super::tuple_data_pool::TupleDataPool;

/// Bounded, reusable carrier of rows between adjacent operators.
///
/// A producer must never assume a batch it wrote to survives past the
/// caller's next request for rows. The caller may reset or drop the batch
/// (including everything attached to its pool) at any point after GetNext
/// returns.
#[derive(Debug)]
pub struct RowBatch {
    rows: Vec<Row>,
    capacity: usize,
    tuple_data_pool: TupleDataPool,
}

impl RowBatch {
    pub fn new(capacity: usize) -> Self {
        RowBatch {
            rows: Vec::with_capacity(capacity),
            capacity,
            tuple_data_pool: TupleDataPool::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn at_capacity(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    /// Number of rows that can still be appended.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.rows.len())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    /// Append a row, erroring if the batch is full.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if self.at_capacity() {
            return Err(DbError::new("Row batch at capacity").with_field("capacity", self.capacity));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Drop all rows past `num_rows`.
    pub fn truncate(&mut self, num_rows: usize) {
        self.rows.truncate(num_rows);
    }

    /// Take the rows out of the batch, leaving it empty.
    ///
    /// The tuple data pool is left as-is.
    pub fn take_rows(&mut self) -> Vec<Row> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.capacity))
    }

    pub fn tuple_data_pool(&self) -> &TupleDataPool {
        &self.tuple_data_pool
    }

    pub fn tuple_data_pool_mut(&mut self) -> &mut TupleDataPool {
        &mut self.tuple_data_pool
    }

    /// Transfer ownership of this batch's auxiliary memory to `dest`.
    pub fn transfer_resource_ownership(&mut self, dest: &mut RowBatch) {
        dest.tuple_data_pool.acquire_data(&mut self.tuple_data_pool);
    }

    /// Clear rows and release attached memory so the batch can be reused.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.tuple_data_pool.clear();
    }
}
