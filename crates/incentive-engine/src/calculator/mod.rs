//! Reward calculator
//!
//! Pure function of (contract, statistics before this contract, config).
//! Each sub-rule is independently toggled by the activity configuration and
//! contributes at most one reward; the result is ordered lucky number,
//! tier, self-referral.

pub mod lucky;
pub mod self_referral;
pub mod tiered;

use incentive_common::{
    ActivityRewardConfig, ActivityStats, ContractData, HousekeeperStats, RewardInfo,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Statistics as they stood before the contract being evaluated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreContractStats {
    pub housekeeper: HousekeeperStats,
    pub activity: ActivityStats,
}

impl PreContractStats {
    pub fn new(housekeeper: HousekeeperStats, activity: ActivityStats) -> Self {
        Self {
            housekeeper,
            activity,
        }
    }
}

/// Stateless reward calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardCalculator;

impl RewardCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the rewards earned by one contract.
    ///
    /// `performance_amount` is the contract's capped contribution; tier
    /// progress includes it. Historical contracts and announcement-only
    /// activities never earn anything.
    pub fn calculate(
        &self,
        contract: &ContractData,
        performance_amount: Decimal,
        stats: &PreContractStats,
        config: &ActivityRewardConfig,
    ) -> Vec<RewardInfo> {
        if contract.is_historical || config.is_announcement_only() {
            return Vec::new();
        }

        [
            lucky::evaluate(contract, stats, config),
            tiered::evaluate(contract, performance_amount, stats, config),
            self_referral::evaluate(contract, stats, config),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
