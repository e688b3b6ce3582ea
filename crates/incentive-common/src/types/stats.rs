//! Derived statistics
//!
//! Never stored. Each view is folded from the non-historical performance
//! records; historical records contribute nothing to any count or sum.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::activity_config::{DedupField, StatsSource};
use super::contract::OrderType;
use super::record::PerformanceRecord;
use super::reward::RewardType;

/// Cumulative figures for one housekeeper in one activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HousekeeperStats {
    pub housekeeper: String,
    pub activity_code: String,
    pub contract_count: u64,
    /// Sum of raw contract amounts
    pub total_amount: Decimal,
    /// Sum of capped contributions
    pub performance_amount: Decimal,
    pub platform_count: u64,
    /// Capped contributions from platform contracts
    pub platform_amount: Decimal,
    pub self_referral_count: u64,
    /// Capped contributions from self-referral contracts
    pub self_referral_amount: Decimal,
    /// Project addresses already seen on self-referral contracts, trimmed
    pub self_referral_addresses: BTreeSet<String>,
    /// Project ids already seen on self-referral contracts, trimmed
    pub self_referral_projects: BTreeSet<String>,
    /// Tier rewards already earned by platform contracts
    pub platform_tiers: BTreeSet<String>,
    /// Tier rewards already earned by self-referral contracts
    pub self_referral_tiers: BTreeSet<String>,
}

impl HousekeeperStats {
    pub fn empty(housekeeper: impl Into<String>, activity_code: impl Into<String>) -> Self {
        Self {
            housekeeper: housekeeper.into(),
            activity_code: activity_code.into(),
            ..Default::default()
        }
    }

    /// Fold a stream of records for this housekeeper
    pub fn fold<'a>(
        housekeeper: &str,
        activity_code: &str,
        records: impl IntoIterator<Item = &'a PerformanceRecord>,
    ) -> Self {
        let mut stats = Self::empty(housekeeper, activity_code);
        for record in records {
            if record.activity_code == activity_code && record.housekeeper() == housekeeper {
                stats.absorb(record);
            }
        }
        stats
    }

    /// Apply one record; historical records are ignored
    pub fn absorb(&mut self, record: &PerformanceRecord) {
        if record.is_historical() {
            return;
        }
        let contract = &record.contract;
        self.contract_count += 1;
        self.total_amount += contract.contract_amount;
        self.performance_amount += record.performance_amount;
        match contract.order_type {
            OrderType::Platform => {
                self.platform_count += 1;
                self.platform_amount += record.performance_amount;
            }
            OrderType::SelfReferral => {
                self.self_referral_count += 1;
                self.self_referral_amount += record.performance_amount;
                if let Some(address) = contract.dedup_value(DedupField::ProjectAddress) {
                    self.self_referral_addresses.insert(address.to_string());
                }
                if let Some(project) = contract.dedup_value(DedupField::ProjectId) {
                    self.self_referral_projects.insert(project.to_string());
                }
            }
        }
        for reward in record.rewards.iter().filter(|r| r.reward_type == RewardType::Tiered) {
            self.record_tier(contract.order_type, &reward.reward_name);
        }
    }

    /// Note a tier earned by a contract of `channel`
    pub fn record_tier(&mut self, channel: OrderType, name: &str) {
        let tiers = match channel {
            OrderType::Platform => &mut self.platform_tiers,
            OrderType::SelfReferral => &mut self.self_referral_tiers,
        };
        tiers.insert(name.to_string());
    }

    /// Whether a tier was already earned on `channel`, or on either channel when `None`
    pub fn tier_awarded(&self, name: &str, channel: Option<OrderType>) -> bool {
        match channel {
            Some(OrderType::Platform) => self.platform_tiers.contains(name),
            Some(OrderType::SelfReferral) => self.self_referral_tiers.contains(name),
            None => self.platform_tiers.contains(name) || self.self_referral_tiers.contains(name),
        }
    }

    /// Cumulative performance amount for a stats source
    pub fn amount_for(&self, source: StatsSource) -> Decimal {
        match source {
            StatsSource::Total => self.performance_amount,
            StatsSource::PlatformOnly => self.platform_amount,
            StatsSource::SelfReferralOnly => self.self_referral_amount,
        }
    }

    /// Whether a self-referral dedup value has already been used
    pub fn has_seen(&self, field: DedupField, value: &str) -> bool {
        match field {
            DedupField::ProjectAddress => self.self_referral_addresses.contains(value),
            DedupField::ProjectId => self.self_referral_projects.contains(value),
        }
    }
}

/// Cumulative figures for one project in one activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub project_id: String,
    pub activity_code: String,
    pub contract_count: u64,
    pub total_amount: Decimal,
    pub performance_amount: Decimal,
}

impl ProjectStats {
    pub fn fold<'a>(
        project_id: &str,
        activity_code: &str,
        records: impl IntoIterator<Item = &'a PerformanceRecord>,
    ) -> Self {
        let mut stats = Self {
            project_id: project_id.to_string(),
            activity_code: activity_code.to_string(),
            ..Default::default()
        };
        for record in records {
            if record.is_historical()
                || record.activity_code != activity_code
                || record.contract.project_id.as_deref() != Some(project_id)
            {
                continue;
            }
            stats.contract_count += 1;
            stats.total_amount += record.contract.contract_amount;
            stats.performance_amount += record.performance_amount;
        }
        stats
    }
}

/// Cumulative figures for a whole activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub activity_code: String,
    pub contract_count: u64,
    pub platform_count: u64,
    pub self_referral_count: u64,
    pub total_amount: Decimal,
    pub performance_amount: Decimal,
    pub housekeeper_count: u64,
}

impl ActivityStats {
    pub fn fold<'a>(
        activity_code: &str,
        records: impl IntoIterator<Item = &'a PerformanceRecord>,
    ) -> Self {
        let mut stats = Self {
            activity_code: activity_code.to_string(),
            ..Default::default()
        };
        let mut housekeepers = HashSet::new();
        for record in records {
            if record.is_historical() || record.activity_code != activity_code {
                continue;
            }
            stats.contract_count += 1;
            match record.contract.order_type {
                OrderType::Platform => stats.platform_count += 1,
                OrderType::SelfReferral => stats.self_referral_count += 1,
            }
            stats.total_amount += record.contract.contract_amount;
            stats.performance_amount += record.performance_amount;
            housekeepers.insert(record.housekeeper());
        }
        stats.housekeeper_count = housekeepers.len() as u64;
        stats
    }
}
