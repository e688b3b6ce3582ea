//! Lucky-number rule
//!
//! The contract's ordinal (1-based, including this contract) is counted per
//! `LuckyNumberMode`; the reward fires when the ordinal is a multiple of the
//! configured number.

use incentive_common::{
    ActivityRewardConfig, ContractData, LuckyNumberMode, OrderType, RewardInfo, RewardType,
};
use tracing::debug;

use super::PreContractStats;

/// Ordinal of this contract under the given mode, `None` if it does not qualify
pub fn ordinal(
    mode: LuckyNumberMode,
    contract: &ContractData,
    stats: &PreContractStats,
) -> Option<u64> {
    match mode {
        LuckyNumberMode::PersonalSequence => Some(stats.housekeeper.contract_count + 1),
        LuckyNumberMode::PlatformOnly => match contract.order_type {
            OrderType::Platform => Some(stats.housekeeper.platform_count + 1),
            OrderType::SelfReferral => None,
        },
        LuckyNumberMode::Global => Some(stats.activity.contract_count + 1),
    }
}

pub fn evaluate(
    contract: &ContractData,
    stats: &PreContractStats,
    config: &ActivityRewardConfig,
) -> Option<RewardInfo> {
    let divisor = config.lucky_divisor()?;
    let rewards = config.lucky_rewards.as_ref()?;
    let position = ordinal(config.lucky_number_mode, contract, stats)?;

    if position % divisor != 0 {
        return None;
    }

    let tier = if contract.contract_amount >= rewards.high.threshold {
        &rewards.high
    } else {
        &rewards.base
    };

    debug!(
        contract_id = %contract.contract_id,
        position,
        reward = %tier.name,
        "Lucky number hit"
    );
    Some(RewardInfo::new(
        RewardType::LuckyNumber,
        tier.name.clone(),
        config.award_value(&tier.name),
    ))
}
