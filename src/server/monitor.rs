//! Server connection statistics.
//!
//! Workers update lock-free atomic counters; the accept loop logs a summary
//! when it stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters, cheap to clone into each worker
#[derive(Debug, Clone, Default)]
pub struct ServerCounters {
    accepted: Arc<AtomicU64>,
    served: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    accept_errors: Arc<AtomicU64>,
}

/// Point-in-time copy of [`ServerCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub accepted: u64,
    pub served: u64,
    pub failed: u64,
    pub accept_errors: u64,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_served(&self) {
        self.served.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_accept_errors(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            served: self.served.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
        }
    }
}
