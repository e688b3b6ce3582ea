//! Record builder
//!
//! Pure assembly of a `PerformanceRecord`; no I/O and no statistics logic.

use chrono::Utc;
use incentive_common::{ContractData, HousekeeperStats, PerformanceRecord, RewardInfo};
use rust_decimal::Decimal;

/// Sequence numbers assigned to one contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequences {
    /// Position among the activity's non-historical contracts
    pub activity: u64,
    /// Position among the housekeeper's non-historical contracts
    pub housekeeper: u64,
}

impl Sequences {
    /// Sequences for the next non-historical contract
    pub fn next(activity_count: u64, housekeeper_count: u64) -> Self {
        Self {
            activity: activity_count + 1,
            housekeeper: housekeeper_count + 1,
        }
    }

    /// Historical contracts take no position
    pub fn historical() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBuilder;

impl RecordBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        activity_code: &str,
        contract: &ContractData,
        stats_before: &HousekeeperStats,
        rewards: Vec<RewardInfo>,
        performance_amount: Decimal,
        sequences: Sequences,
    ) -> PerformanceRecord {
        PerformanceRecord {
            activity_code: activity_code.to_string(),
            contract: contract.clone(),
            performance_amount,
            activity_sequence: sequences.activity,
            housekeeper_sequence: sequences.housekeeper,
            rewards,
            stats_before: stats_before.clone(),
            recorded_at: Utc::now(),
        }
    }
}
