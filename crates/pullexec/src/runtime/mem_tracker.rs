use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use super::profile::Counter;

/// Tracks memory held by a single operator.
///
/// The peak is written to a high-water counter in the operator's profile.
#[derive(Debug)]
pub struct MemTracker {
    current: AtomicI64,
    peak: Arc<Counter>,
}

impl MemTracker {
    pub fn new(peak: Arc<Counter>) -> Self {
        MemTracker {
            current: AtomicI64::new(0),
            peak,
        }
    }

    pub fn consume(&self, bytes: usize) {
        let bytes = bytes as i64;
        let current = self.current.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak.update_max(current);
    }

    pub fn release(&self, bytes: usize) {
        self.current.fetch_sub(bytes as i64, Ordering::Relaxed);
    }

    /// Release everything currently tracked, returning the number of bytes
    /// released.
    pub fn release_all(&self) -> i64 {
        self.current.swap(0, Ordering::Relaxed)
    }

    pub fn current(&self) -> i64 {
        self.current.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> i64 {
        self.peak.value()
    }
}
