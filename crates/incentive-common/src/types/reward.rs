//! Reward results

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which rule produced a reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    LuckyNumber,
    Tiered,
    SelfReferral,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::LuckyNumber => "lucky_number",
            RewardType::Tiered => "tiered",
            RewardType::SelfReferral => "self_referral",
        }
    }
}

impl std::fmt::Display for RewardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single awarded reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardInfo {
    pub reward_type: RewardType,
    pub reward_name: String,
    pub value: Decimal,
}

impl RewardInfo {
    pub fn new(reward_type: RewardType, reward_name: impl Into<String>, value: Decimal) -> Self {
        Self {
            reward_type,
            reward_name: reward_name.into(),
            value,
        }
    }
}
