use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pullexec_error::{DbError, Result};
use uuid::Uuid;

use super::profile::RuntimeProfile;
use crate::config::execution::ExecutionConfig;
use crate::expr::codegen::{ClosureCompiler, ConjunctCompiler};

/// Cloneable handle for requesting cancellation of a running query.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Per-query state shared by every node in an execution tree.
pub struct RuntimeState {
    query_id: Uuid,
    config: ExecutionConfig,
    cancel: CancellationHandle,
    compiler: Option<Arc<dyn ConjunctCompiler>>,
    profile: Arc<RuntimeProfile>,
}

impl RuntimeState {
    pub fn new(config: ExecutionConfig) -> Result<Self> {
        config.validate()?;
        let query_id = Uuid::new_v4();

        Ok(RuntimeState {
            query_id,
            config,
            cancel: CancellationHandle::default(),
            compiler: Some(Arc::new(ClosureCompiler)),
            profile: Arc::new(RuntimeProfile::new(format!("Query (id={query_id})"))),
        })
    }

    /// Replace the conjunct compiler. None disables compilation entirely.
    pub fn with_compiler(mut self, compiler: Option<Arc<dyn ConjunctCompiler>>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Compiler to use for conjuncts, if compilation is enabled and a
    /// compiler is available.
    pub fn conjunct_compiler(&self) -> Option<&dyn ConjunctCompiler> {
        if !self.config.enable_codegen {
            return None;
        }
        self.compiler.as_deref()
    }

    pub fn profile(&self) -> &Arc<RuntimeProfile> {
        &self.profile
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return a cancellation error if the query has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DbError::cancelled().with_field("query_id", self.query_id));
        }
        Ok(())
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("query_id", &self.query_id)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("compiler", &self.compiler)
            .finish_non_exhaustive()
    }
}
