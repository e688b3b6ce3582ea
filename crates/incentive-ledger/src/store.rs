//! Fact store contract
//!
//! Storage backends for performance records. Records are keyed by
//! `(activity_code, contract_id)` and never updated; every statistic is
//! derived on read with historical records filtered out.

use incentive_common::{
    ActivityStats, HousekeeperStats, PerformanceRecord, ProjectStats, Result,
};
use std::sync::Arc;

/// Trait for performance record storage backends
pub trait FactStore: Send + Sync {
    /// Whether a contract is already recorded for the activity
    fn exists(&self, contract_id: &str, activity_code: &str) -> Result<bool>;

    /// Cumulative figures for a housekeeper, excluding historical records
    fn stats(&self, housekeeper: &str, activity_code: &str) -> Result<HousekeeperStats>;

    /// Cumulative figures for a project, excluding historical records
    fn project_stats(&self, project_id: &str, activity_code: &str) -> Result<ProjectStats>;

    /// Cumulative figures for the activity, excluding historical records
    fn activity_stats(&self, activity_code: &str) -> Result<ActivityStats>;

    /// Insert one record.
    ///
    /// The natural-key check and the insert are a single atomic step; a
    /// collision fails with `StoreError::ConcurrencyViolation`. The record
    /// is visible to the next read as soon as this returns.
    fn persist(&self, record: &PerformanceRecord) -> Result<()>;

    /// All records of an activity in insertion order
    fn records(&self, activity_code: &str) -> Result<Vec<PerformanceRecord>>;

    /// One record by natural key
    fn record(&self, contract_id: &str, activity_code: &str) -> Result<Option<PerformanceRecord>>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

impl<S: FactStore + ?Sized> FactStore for Arc<S> {
    fn exists(&self, contract_id: &str, activity_code: &str) -> Result<bool> {
        (**self).exists(contract_id, activity_code)
    }

    fn stats(&self, housekeeper: &str, activity_code: &str) -> Result<HousekeeperStats> {
        (**self).stats(housekeeper, activity_code)
    }

    fn project_stats(&self, project_id: &str, activity_code: &str) -> Result<ProjectStats> {
        (**self).project_stats(project_id, activity_code)
    }

    fn activity_stats(&self, activity_code: &str) -> Result<ActivityStats> {
        (**self).activity_stats(activity_code)
    }

    fn persist(&self, record: &PerformanceRecord) -> Result<()> {
        (**self).persist(record)
    }

    fn records(&self, activity_code: &str) -> Result<Vec<PerformanceRecord>> {
        (**self).records(activity_code)
    }

    fn record(&self, contract_id: &str, activity_code: &str) -> Result<Option<PerformanceRecord>> {
        (**self).record(contract_id, activity_code)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Natural key of a performance record
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordKey {
    pub activity_code: String,
    pub contract_id: String,
}

impl RecordKey {
    pub fn new(activity_code: impl Into<String>, contract_id: impl Into<String>) -> Self {
        Self {
            activity_code: activity_code.into(),
            contract_id: contract_id.into(),
        }
    }

    pub fn of(record: &PerformanceRecord) -> Self {
        Self::new(record.activity_code.clone(), record.contract_id())
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.activity_code, self.contract_id)
    }
}
