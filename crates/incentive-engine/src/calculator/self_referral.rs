//! Self-referral dedup rule

use incentive_common::{ActivityRewardConfig, ContractData, OrderType, RewardInfo, RewardType};

use super::PreContractStats;

pub fn evaluate(
    contract: &ContractData,
    stats: &PreContractStats,
    config: &ActivityRewardConfig,
) -> Option<RewardInfo> {
    let rule = &config.self_referral_rewards;
    if !rule.enable || contract.order_type != OrderType::SelfReferral {
        return None;
    }

    let value = contract.dedup_value(rule.dedup_field)?;
    if stats.housekeeper.has_seen(rule.dedup_field, value) {
        return None;
    }

    Some(RewardInfo::new(
        RewardType::SelfReferral,
        rule.reward_name.clone(),
        config.award_value(&rule.reward_name),
    ))
}
