//! # Incentive Common
//!
//! Shared types, errors, and activity configuration for the housekeeper
//! incentive engine.
//!
//! ## Core Types
//!
//! - [`ContractData`]: immutable contract fact, adapted from raw BI rows
//! - [`ActivityRewardConfig`]: per-activity reward rules
//! - [`HousekeeperStats`]: derived cumulative figures, never stored
//! - [`RewardInfo`]: a single earned reward
//! - [`PerformanceRecord`]: the append-only persisted fact
//!
//! ## Configuration
//!
//! - [`ConfigRegistry`]: validated lookup of activity configs by code

pub mod error;
pub mod resolver;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, IncentiveError, Result, StoreError, ValidationError};
pub use resolver::ConfigRegistry;
pub use types::{
    activity_config::{
        ActivityRewardConfig, DedupField, LuckyNumberMode, LuckyRewardTier, LuckyRewards,
        PerformanceLimits, RewardStrategy, SelfReferralRewards, StatsSource, Tier,
        TieredRewards, TrackRule,
    },
    contract::{dedup_key, is_whole_fen, ContractData, OrderType, RawContractRow},
    record::PerformanceRecord,
    reward::{RewardInfo, RewardType},
    stats::{ActivityStats, HousekeeperStats, ProjectStats},
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
