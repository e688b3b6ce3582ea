//! # Incentive Ledger
//!
//! Append-only storage for performance records.
//!
//! ## Backends
//!
//! - [`InMemoryFactStore`]: DashMap-backed, for tests and single-process runs
//! - [`SqliteFactStore`]: durable table with a unique natural key and
//!   aggregate views
//!
//! Both implement [`FactStore`]. Statistics are never stored; each call
//! folds the non-historical records for the requested key.

pub mod memory;
pub mod sqlite;
pub mod store;

pub use memory::InMemoryFactStore;
pub use sqlite::SqliteFactStore;
pub use store::{FactStore, RecordKey};

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{TimeZone, Utc};
    use incentive_common::{ContractData, HousekeeperStats, PerformanceRecord};
    use rust_decimal::Decimal;

    pub fn record(
        activity: &str,
        contract_id: &str,
        housekeeper: &str,
        amount: Decimal,
        historical: bool,
    ) -> PerformanceRecord {
        let mut contract = ContractData::new(
            contract_id,
            housekeeper,
            amount,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        );
        contract.is_historical = historical;
        PerformanceRecord {
            activity_code: activity.to_string(),
            contract,
            performance_amount: if historical { Decimal::ZERO } else { amount },
            activity_sequence: 0,
            housekeeper_sequence: 0,
            rewards: Vec::new(),
            stats_before: HousekeeperStats::empty(housekeeper, activity),
            recorded_at: Utc::now(),
        }
    }
}
