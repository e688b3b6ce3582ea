//! In-memory fact store
//!
//! Uses DashMap for concurrent access. Records live in one map keyed by
//! natural key; secondary indexes keep per-activity insertion order and
//! per-housekeeper / per-project membership so aggregates only touch the
//! relevant rows.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use incentive_common::{
    ActivityStats, HousekeeperStats, PerformanceRecord, ProjectStats, Result, StoreError,
};
use tracing::{debug, instrument};

use crate::store::{FactStore, RecordKey};

/// In-memory storage implementation
#[derive(Debug, Default)]
pub struct InMemoryFactStore {
    /// All records by natural key
    records: DashMap<RecordKey, PerformanceRecord>,

    /// Contract ids per activity, in insertion order
    by_activity: DashMap<String, Vec<String>>,

    /// Contract ids per (activity, housekeeper)
    by_housekeeper: DashMap<(String, String), Vec<String>>,

    /// Contract ids per (activity, project)
    by_project: DashMap<(String, String), Vec<String>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all activities
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect(&self, activity_code: &str, ids: &[String]) -> Vec<PerformanceRecord> {
        ids.iter()
            .filter_map(|id| {
                self.records
                    .get(&RecordKey::new(activity_code, id.as_str()))
                    .map(|r| r.clone())
            })
            .collect()
    }
}

impl FactStore for InMemoryFactStore {
    fn exists(&self, contract_id: &str, activity_code: &str) -> Result<bool> {
        Ok(self
            .records
            .contains_key(&RecordKey::new(activity_code, contract_id)))
    }

    fn stats(&self, housekeeper: &str, activity_code: &str) -> Result<HousekeeperStats> {
        let ids = self
            .by_housekeeper
            .get(&(activity_code.to_string(), housekeeper.to_string()))
            .map(|ids| ids.clone())
            .unwrap_or_default();
        let records = self.collect(activity_code, &ids);
        Ok(HousekeeperStats::fold(housekeeper, activity_code, &records))
    }

    fn project_stats(&self, project_id: &str, activity_code: &str) -> Result<ProjectStats> {
        let ids = self
            .by_project
            .get(&(activity_code.to_string(), project_id.to_string()))
            .map(|ids| ids.clone())
            .unwrap_or_default();
        let records = self.collect(activity_code, &ids);
        Ok(ProjectStats::fold(project_id, activity_code, &records))
    }

    fn activity_stats(&self, activity_code: &str) -> Result<ActivityStats> {
        let records = self.records(activity_code)?;
        Ok(ActivityStats::fold(activity_code, &records))
    }

    #[instrument(skip(self, record), fields(activity = %record.activity_code, contract_id = %record.contract_id()))]
    fn persist(&self, record: &PerformanceRecord) -> Result<()> {
        let key = RecordKey::of(record);

        match self.records.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::ConcurrencyViolation {
                    activity_code: key.activity_code,
                    contract_id: key.contract_id,
                }
                .into());
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        let activity = record.activity_code.clone();
        let contract_id = record.contract_id().to_string();

        self.by_activity
            .entry(activity.clone())
            .or_default()
            .push(contract_id.clone());
        self.by_housekeeper
            .entry((activity.clone(), record.housekeeper().to_string()))
            .or_default()
            .push(contract_id.clone());
        if let Some(project) = &record.contract.project_id {
            self.by_project
                .entry((activity, project.clone()))
                .or_default()
                .push(contract_id);
        }

        debug!(key = %key, "Persisted performance record");
        Ok(())
    }

    fn records(&self, activity_code: &str) -> Result<Vec<PerformanceRecord>> {
        let ids = self
            .by_activity
            .get(activity_code)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        Ok(self.collect(activity_code, &ids))
    }

    fn record(&self, contract_id: &str, activity_code: &str) -> Result<Option<PerformanceRecord>> {
        Ok(self
            .records
            .get(&RecordKey::new(activity_code, contract_id))
            .map(|r| r.clone()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use incentive_common::IncentiveError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_persist_and_exists() {
        let store = InMemoryFactStore::new();
        let r = record("bj", "c1", "H", dec!(100), false);

        assert!(!store.exists("c1", "bj").unwrap());
        store.persist(&r).unwrap();
        assert!(store.exists("c1", "bj").unwrap());
        assert!(!store.exists("c1", "sh").unwrap());
        assert_eq!(store.record("c1", "bj").unwrap(), Some(r));
    }

    #[test]
    fn test_duplicate_insert_is_concurrency_violation() {
        let store = InMemoryFactStore::new();
        let r = record("bj", "c1", "H", dec!(100), false);
        store.persist(&r).unwrap();

        let err = store.persist(&r).unwrap_err();
        assert!(matches!(
            err,
            IncentiveError::Store(StoreError::ConcurrencyViolation { .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stats_exclude_historical_in_any_order() {
        let store = InMemoryFactStore::new();
        store.persist(&record("bj", "h1", "H", dec!(9000), true)).unwrap();
        store.persist(&record("bj", "c1", "H", dec!(100), false)).unwrap();
        store.persist(&record("bj", "c2", "H", dec!(200), false)).unwrap();
        store.persist(&record("bj", "h2", "H", dec!(9000), true)).unwrap();
        store.persist(&record("bj", "c3", "H", dec!(300), false)).unwrap();

        let stats = store.stats("H", "bj").unwrap();
        assert_eq!(stats.contract_count, 3);
        assert_eq!(stats.performance_amount, dec!(600));

        let activity = store.activity_stats("bj").unwrap();
        assert_eq!(activity.contract_count, 3);
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let store = InMemoryFactStore::new();
        for id in ["c3", "c1", "c2"] {
            store.persist(&record("bj", id, "H", dec!(1), false)).unwrap();
        }
        let ids: Vec<String> = store
            .records("bj")
            .unwrap()
            .iter()
            .map(|r| r.contract_id().to_string())
            .collect();
        assert_eq!(ids, vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn test_project_stats() {
        let store = InMemoryFactStore::new();
        let mut a = record("bj", "a", "H1", dec!(30000), false);
        a.contract.project_id = Some("P".into());
        let mut b = record("bj", "b", "H2", dec!(20000), false);
        b.contract.project_id = Some("P".into());
        store.persist(&a).unwrap();
        store.persist(&b).unwrap();

        let project = store.project_stats("P", "bj").unwrap();
        assert_eq!(project.contract_count, 2);
        assert_eq!(project.performance_amount, dec!(50000));
    }
}
