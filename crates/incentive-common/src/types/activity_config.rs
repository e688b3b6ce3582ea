//! Activity reward configuration
//!
//! One `ActivityRewardConfig` per activity (campaign). Every reward rule is
//! independently toggleable; the strategy enum decides how tier progress is
//! tracked across the platform and self-referral channels.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::contract::{is_whole_fen, OrderType};

/// How the lucky-number ordinal is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuckyNumberMode {
    /// All of the housekeeper's contracts
    PersonalSequence,
    /// Only the housekeeper's platform contracts; self-referrals never qualify
    PlatformOnly,
    /// All contracts in the activity
    Global,
}

impl Default for LuckyNumberMode {
    fn default() -> Self {
        LuckyNumberMode::PersonalSequence
    }
}

/// A named lucky reward with its amount threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyRewardTier {
    pub name: String,
    #[serde(default)]
    pub threshold: Decimal,
}

/// Base and high lucky rewards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyRewards {
    pub base: LuckyRewardTier,
    /// Chosen when `contract_amount >= high.threshold`
    pub high: LuckyRewardTier,
}

/// Caps applied to a contract's performance contribution
///
/// `enable_cap` switches the per-contract caps only. A configured project
/// limit always applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceLimits {
    #[serde(default)]
    pub enable_cap: bool,
    #[serde(default)]
    pub single_contract_cap: Option<Decimal>,
    #[serde(default)]
    pub single_project_limit: Option<Decimal>,
    /// Replaces `single_contract_cap` for self-referral contracts
    #[serde(default)]
    pub self_referral_contract_cap: Option<Decimal>,
    /// Replaces `single_project_limit` for self-referral contracts
    #[serde(default)]
    pub self_referral_project_limit: Option<Decimal>,
}

impl PerformanceLimits {
    /// Per-contract cap for a channel, if capping applies
    pub fn contract_cap_for(&self, order_type: OrderType) -> Option<Decimal> {
        if !self.enable_cap {
            return None;
        }
        match order_type {
            OrderType::SelfReferral => self.self_referral_contract_cap.or(self.single_contract_cap),
            OrderType::Platform => self.single_contract_cap,
        }
    }

    /// Per-project limit for a channel, if one is configured
    pub fn project_limit_for(&self, order_type: OrderType) -> Option<Decimal> {
        match order_type {
            OrderType::SelfReferral => self
                .self_referral_project_limit
                .or(self.single_project_limit),
            OrderType::Platform => self.single_project_limit,
        }
    }
}

/// A one-shot cumulative tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub threshold: Decimal,
}

/// Tier ladder with its contract-count gate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TieredRewards {
    #[serde(default)]
    pub min_contracts: u64,
    /// Ordered by strictly increasing threshold
    #[serde(default)]
    pub tiers: Vec<Tier>,
}

/// Field used to dedup self-referral rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupField {
    ProjectAddress,
    ProjectId,
}

impl Default for DedupField {
    fn default() -> Self {
        DedupField::ProjectAddress
    }
}

/// Self-referral reward, once per distinct dedup value per housekeeper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfReferralRewards {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub reward_name: String,
    #[serde(default)]
    pub dedup_field: DedupField,
}

/// Which cumulative figure feeds a tier ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    Total,
    PlatformOnly,
    SelfReferralOnly,
}

impl StatsSource {
    /// Whether a contract of this channel advances the figure
    pub fn includes(&self, order_type: OrderType) -> bool {
        match self {
            StatsSource::Total => true,
            StatsSource::PlatformOnly => order_type == OrderType::Platform,
            StatsSource::SelfReferralOnly => order_type == OrderType::SelfReferral,
        }
    }
}

/// One tier ladder in a dual-track activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRule {
    /// Defaults to the track's own channel
    #[serde(default)]
    pub stats_source: Option<StatsSource>,
    /// Falls back to the activity's `tiered_rewards` when absent
    #[serde(default)]
    pub tiered_rewards: Option<TieredRewards>,
}

fn platform_only() -> StatsSource {
    StatsSource::PlatformOnly
}

/// Reward calculation strategy, a closed set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardStrategy {
    /// One ladder. With the default `platform_only` source, self-referral
    /// contracts only feed aggregate counters.
    SingleTrack {
        #[serde(default = "platform_only")]
        stats_source: StatsSource,
    },
    /// Independent ladders for platform and self-referral contracts
    DualTrack {
        platform: TrackRule,
        self_referral: TrackRule,
    },
    /// Broadcast-only activity; no rewards are computed
    AnnouncementOnly,
}

impl Default for RewardStrategy {
    fn default() -> Self {
        RewardStrategy::SingleTrack {
            stats_source: platform_only(),
        }
    }
}

/// Full reward configuration for one activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRewardConfig {
    /// Digit string; empty disables the lucky-number rule
    #[serde(default)]
    pub lucky_number: String,
    #[serde(default)]
    pub lucky_number_mode: LuckyNumberMode,
    #[serde(default)]
    pub lucky_rewards: Option<LuckyRewards>,
    #[serde(default)]
    pub performance_limits: PerformanceLimits,
    #[serde(default)]
    pub tiered_rewards: Option<TieredRewards>,
    /// Reward name -> monetary value
    #[serde(default)]
    pub awards_mapping: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub self_referral_rewards: SelfReferralRewards,
    #[serde(default)]
    pub reward_calculation_strategy: RewardStrategy,
}

impl ActivityRewardConfig {
    /// Lucky-number divisor, `None` when the rule is disabled
    pub fn lucky_divisor(&self) -> Option<u64> {
        let digits = self.lucky_number.trim();
        if digits.is_empty() {
            return None;
        }
        digits.parse::<u64>().ok().filter(|n| *n > 0)
    }

    /// Value of a named award, zero when unmapped
    pub fn award_value(&self, name: &str) -> Decimal {
        self.awards_mapping.get(name).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn is_announcement_only(&self) -> bool {
        matches!(
            self.reward_calculation_strategy,
            RewardStrategy::AnnouncementOnly
        )
    }

    /// Validate structure, returning every violation found
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        // Lucky number
        let lucky = self.lucky_number.trim();
        if !lucky.is_empty() {
            if !lucky.chars().all(|c| c.is_ascii_digit()) || self.lucky_divisor().is_none() {
                violations.push(format!(
                    "lucky_number must be a positive digit string, got {:?}",
                    self.lucky_number
                ));
            }
            match &self.lucky_rewards {
                None => violations.push("lucky_rewards is required when lucky_number is set".into()),
                Some(rewards) => {
                    if rewards.high.threshold < rewards.base.threshold {
                        violations.push(format!(
                            "lucky_rewards.high.threshold {} is below base threshold {}",
                            rewards.high.threshold, rewards.base.threshold
                        ));
                    }
                    for tier in [&rewards.base, &rewards.high] {
                        self.check_award("lucky_rewards", &tier.name, &mut violations);
                    }
                }
            }
        }

        // Performance limits
        let limits = &self.performance_limits;
        if limits.enable_cap && limits.single_contract_cap.is_none() {
            violations.push("performance_limits.single_contract_cap is required when capping is enabled".into());
        }
        for (field, value) in [
            ("single_contract_cap", limits.single_contract_cap),
            ("single_project_limit", limits.single_project_limit),
            ("self_referral_contract_cap", limits.self_referral_contract_cap),
            ("self_referral_project_limit", limits.self_referral_project_limit),
        ] {
            if let Some(v) = value {
                if v <= Decimal::ZERO {
                    violations.push(format!("performance_limits.{} must be positive, got {}", field, v));
                } else if !is_whole_fen(v) {
                    violations.push(format!("performance_limits.{} is finer than one fen: {}", field, v));
                }
            }
        }

        // Tier ladders
        match &self.reward_calculation_strategy {
            RewardStrategy::SingleTrack { .. } => {
                if let Some(tiers) = &self.tiered_rewards {
                    self.check_ladder("tiered_rewards", tiers, &mut violations);
                }
            }
            RewardStrategy::DualTrack {
                platform,
                self_referral,
            } => {
                for (track, rule) in [("platform", platform), ("self_referral", self_referral)] {
                    let path = format!("reward_calculation_strategy.{}", track);
                    match rule.tiered_rewards.as_ref().or(self.tiered_rewards.as_ref()) {
                        Some(tiers) => self.check_ladder(&path, tiers, &mut violations),
                        None => violations.push(format!("{} has no tier ladder", path)),
                    }
                }
            }
            RewardStrategy::AnnouncementOnly => {}
        }

        // Self-referral reward
        let self_ref = &self.self_referral_rewards;
        if self_ref.enable {
            if self_ref.reward_name.trim().is_empty() {
                violations.push("self_referral_rewards.reward_name is required when enabled".into());
            } else {
                self.check_award("self_referral_rewards", &self_ref.reward_name, &mut violations);
            }
        }

        for (name, value) in &self.awards_mapping {
            if *value < Decimal::ZERO {
                violations.push(format!("awards_mapping[{}] is negative: {}", name, value));
            }
        }

        violations
    }

    fn check_ladder(&self, path: &str, ladder: &TieredRewards, violations: &mut Vec<String>) {
        if ladder.tiers.is_empty() {
            violations.push(format!("{}.tiers is empty", path));
        }
        let mut previous: Option<Decimal> = None;
        for tier in &ladder.tiers {
            if tier.name.trim().is_empty() {
                violations.push(format!("{}.tiers has a tier without a name", path));
            }
            if tier.threshold <= Decimal::ZERO {
                violations.push(format!(
                    "{}.tiers[{}] threshold must be positive",
                    path, tier.name
                ));
            }
            if let Some(prev) = previous {
                if tier.threshold <= prev {
                    violations.push(format!(
                        "{}.tiers thresholds must be strictly increasing: {} after {}",
                        path, tier.threshold, prev
                    ));
                }
            }
            previous = Some(tier.threshold);
            self.check_award(path, &tier.name, violations);
        }
    }

    fn check_award(&self, path: &str, name: &str, violations: &mut Vec<String>) {
        if !name.trim().is_empty() && !self.awards_mapping.contains_key(name) {
            violations.push(format!("{}: award {:?} missing from awards_mapping", path, name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_config() -> ActivityRewardConfig {
        let mut awards = BTreeMap::new();
        awards.insert("接好运".to_string(), dec!(58));
        awards.insert("接好运万元以上".to_string(), dec!(88));
        awards.insert("达标奖".to_string(), dec!(200));
        ActivityRewardConfig {
            lucky_number: "5".into(),
            lucky_rewards: Some(LuckyRewards {
                base: LuckyRewardTier {
                    name: "接好运".into(),
                    threshold: Decimal::ZERO,
                },
                high: LuckyRewardTier {
                    name: "接好运万元以上".into(),
                    threshold: dec!(10000),
                },
            }),
            tiered_rewards: Some(TieredRewards {
                min_contracts: 1,
                tiers: vec![Tier {
                    name: "达标奖".into(),
                    threshold: dec!(80000),
                }],
            }),
            awards_mapping: awards,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_has_no_violations() {
        assert!(valid_config().validate().is_empty());
    }

    #[test]
    fn test_non_monotonic_tiers_rejected() {
        let mut config = valid_config();
        config.awards_mapping.insert("精英奖".into(), dec!(500));
        config.tiered_rewards.as_mut().unwrap().tiers.push(Tier {
            name: "精英奖".into(),
            threshold: dec!(80000),
        });
        let violations = config.validate();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("strictly increasing"));
    }

    #[test]
    fn test_lucky_requires_rewards_and_digits() {
        let mut config = valid_config();
        config.lucky_number = "5a".into();
        config.lucky_rewards = None;
        assert_eq!(config.validate().len(), 2);
    }

    #[test]
    fn test_cap_enabled_requires_cap() {
        let mut config = valid_config();
        config.performance_limits.enable_cap = true;
        assert!(config.validate()[0].contains("single_contract_cap"));
    }

    #[test]
    fn test_dual_track_needs_ladders() {
        let mut config = valid_config();
        config.tiered_rewards = None;
        config.reward_calculation_strategy = RewardStrategy::DualTrack {
            platform: TrackRule::default(),
            self_referral: TrackRule::default(),
        };
        assert_eq!(config.validate().len(), 2);
    }

    #[test]
    fn test_self_referral_cap_replaces_generic() {
        let limits = PerformanceLimits {
            enable_cap: true,
            single_contract_cap: Some(dec!(50000)),
            self_referral_contract_cap: Some(dec!(30000)),
            ..Default::default()
        };
        assert_eq!(limits.contract_cap_for(OrderType::Platform), Some(dec!(50000)));
        assert_eq!(limits.contract_cap_for(OrderType::SelfReferral), Some(dec!(30000)));

        let disabled = PerformanceLimits {
            enable_cap: false,
            ..limits
        };
        assert_eq!(disabled.contract_cap_for(OrderType::Platform), None);
    }

    #[test]
    fn test_project_limit_ignores_cap_switch() {
        let limits = PerformanceLimits {
            enable_cap: false,
            single_project_limit: Some(dec!(50000)),
            self_referral_project_limit: Some(dec!(20000)),
            ..Default::default()
        };
        assert_eq!(limits.contract_cap_for(OrderType::Platform), None);
        assert_eq!(limits.project_limit_for(OrderType::Platform), Some(dec!(50000)));
        assert_eq!(limits.project_limit_for(OrderType::SelfReferral), Some(dec!(20000)));
    }

    #[test]
    fn test_limits_must_be_whole_fen() {
        let mut config = valid_config();
        config.performance_limits.single_project_limit = Some(dec!(100.005));
        let violations = config.validate();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("single_project_limit"));
    }

    #[test]
    fn test_strategy_deserializes_tagged() {
        let json = r#"{
            "type": "dual_track",
            "platform": { "stats_source": "platform_only" },
            "self_referral": { "stats_source": "self_referral_only" }
        }"#;
        let strategy: RewardStrategy = serde_json::from_str(json).unwrap();
        assert!(matches!(strategy, RewardStrategy::DualTrack { .. }));

        let strategy: RewardStrategy =
            serde_json::from_str(r#"{ "type": "announcement_only" }"#).unwrap();
        assert_eq!(strategy, RewardStrategy::AnnouncementOnly);
    }

    #[test]
    fn test_single_track_source_defaults_agree() {
        let parsed: RewardStrategy = serde_json::from_str(r#"{ "type": "single_track" }"#).unwrap();
        assert_eq!(parsed, RewardStrategy::default());
        assert_eq!(
            parsed,
            RewardStrategy::SingleTrack {
                stats_source: StatsSource::PlatformOnly
            }
        );

        let config: ActivityRewardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.reward_calculation_strategy, RewardStrategy::default());
    }
}
