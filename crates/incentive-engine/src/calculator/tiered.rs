//! Tiered cumulative rule
//!
//! A tier is a one-shot bonus. Once the housekeeper has more than
//! `min_contracts` contracts behind them, a contract earns the highest tier
//! its cumulative figure has reached, unless that tier was already awarded.
//! A threshold passed while the gate was still closed is paid out by the
//! first contract after the gate opens. Tiers jumped over on the way to a
//! higher one are never paid.

use incentive_common::{
    ActivityRewardConfig, ContractData, OrderType, RewardInfo, RewardStrategy, RewardType,
    StatsSource, Tier, TieredRewards,
};
use rust_decimal::Decimal;
use tracing::debug;

use super::PreContractStats;

/// The ladder and stats source that apply to one contract
#[derive(Debug, Clone, Copy)]
pub struct Track<'a> {
    pub source: StatsSource,
    pub ladder: &'a TieredRewards,
    /// Channel whose earlier awards count against this ladder; `None` for a shared ladder
    pub channel: Option<OrderType>,
}

/// Resolve the track for a contract, `None` when it cannot progress any ladder
pub fn track_for<'a>(
    contract: &ContractData,
    config: &'a ActivityRewardConfig,
) -> Option<Track<'a>> {
    let track = match &config.reward_calculation_strategy {
        RewardStrategy::AnnouncementOnly => return None,
        RewardStrategy::SingleTrack { stats_source } => Track {
            source: *stats_source,
            ladder: config.tiered_rewards.as_ref()?,
            channel: None,
        },
        RewardStrategy::DualTrack {
            platform,
            self_referral,
        } => {
            let (rule, channel_source) = match contract.order_type {
                OrderType::Platform => (platform, StatsSource::PlatformOnly),
                OrderType::SelfReferral => (self_referral, StatsSource::SelfReferralOnly),
            };
            Track {
                source: rule.stats_source.unwrap_or(channel_source),
                ladder: rule
                    .tiered_rewards
                    .as_ref()
                    .or(config.tiered_rewards.as_ref())?,
                channel: Some(contract.order_type),
            }
        }
    };

    // Contracts outside the source only feed aggregate counters
    if !track.source.includes(contract.order_type) {
        return None;
    }
    Some(track)
}

/// Highest tier whose threshold is at or below `amount`
pub fn highest_reached(tiers: &[Tier], amount: Decimal) -> Option<&Tier> {
    tiers
        .iter()
        .filter(|tier| tier.threshold <= amount)
        .max_by(|a, b| a.threshold.cmp(&b.threshold))
}

pub fn evaluate(
    contract: &ContractData,
    performance_amount: Decimal,
    stats: &PreContractStats,
    config: &ActivityRewardConfig,
) -> Option<RewardInfo> {
    let track = track_for(contract, config)?;

    if stats.housekeeper.contract_count < track.ladder.min_contracts {
        return None;
    }

    let before = stats.housekeeper.amount_for(track.source);
    let after = before + performance_amount;
    let tier = highest_reached(&track.ladder.tiers, after)?;
    if stats.housekeeper.tier_awarded(&tier.name, track.channel) {
        return None;
    }

    debug!(
        contract_id = %contract.contract_id,
        %before,
        %after,
        tier = %tier.name,
        "Tier reached"
    );
    Some(RewardInfo::new(
        RewardType::Tiered,
        tier.name.clone(),
        config.award_value(&tier.name),
    ))
}
