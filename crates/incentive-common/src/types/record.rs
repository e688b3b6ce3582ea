//! Persisted performance records
//!
//! A `PerformanceRecord` is written once and never mutated. It carries
//! everything a notification renderer needs: both sequence numbers, the
//! statistics as they stood before this contract, and the reward list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::contract::ContractData;
use super::reward::{RewardInfo, RewardType};
use super::stats::HousekeeperStats;

/// Append-only fact produced for each processed contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Activity the contract was processed under
    pub activity_code: String,
    /// The contract as ingested
    pub contract: ContractData,
    /// Capped contribution; zero for historical contracts
    pub performance_amount: Decimal,
    /// 1-based position among the activity's non-historical contracts (0 if historical)
    pub activity_sequence: u64,
    /// 1-based position among the housekeeper's non-historical contracts (0 if historical)
    pub housekeeper_sequence: u64,
    /// Rewards earned by this contract, in rule order
    pub rewards: Vec<RewardInfo>,
    /// Housekeeper statistics before this contract was applied
    pub stats_before: HousekeeperStats,
    /// When the record was built
    pub recorded_at: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn contract_id(&self) -> &str {
        &self.contract.contract_id
    }

    pub fn housekeeper(&self) -> &str {
        &self.contract.housekeeper
    }

    pub fn is_historical(&self) -> bool {
        self.contract.is_historical
    }

    /// Total value of all rewards on this record
    pub fn reward_total(&self) -> Decimal {
        self.rewards.iter().map(|r| r.value).sum()
    }

    pub fn has_reward(&self, reward_type: RewardType) -> bool {
        self.rewards.iter().any(|r| r.reward_type == reward_type)
    }
}
