//! Per-activity serialization
//!
//! Contracts of one activity are processed strictly one at a time; different
//! activities run in parallel.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ActivityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ActivityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for an activity, created on first use
    pub fn handle(&self, activity_code: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(activity_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
