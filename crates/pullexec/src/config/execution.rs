use pullexec_error::{DbError, Result};

/// Default number of rows a batch may hold.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Configuration for driving an operator tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Capacity of row batches created by the driver and by operators for
    /// pulling from their children.
    pub batch_size: usize,
    /// If we should try to compile conjuncts when a code generation backend
    /// is available.
    pub enable_codegen: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            enable_codegen: true,
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DbError::initialization("Batch size must be greater than zero"));
        }
        Ok(())
    }
}
