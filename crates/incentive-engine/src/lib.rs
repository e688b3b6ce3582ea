//! # Incentive Engine
//!
//! Stateless reward evaluation for housekeeper incentive activities.
//!
//! ## Rules
//!
//! - **Lucky number**: the Nth contract (per mode) earns a base or high reward
//! - **Tiered**: one-shot bonus when cumulative performance crosses a threshold
//! - **Self-referral**: once per distinct project address (or id) per housekeeper
//!
//! ## Strategies
//!
//! ```text
//! single_track      one ladder, fed by one stats source
//! dual_track        platform ladder + self-referral ladder
//! announcement_only no rewards
//! ```

pub mod builder;
pub mod calculator;

pub use builder::{RecordBuilder, Sequences};
pub use calculator::{PreContractStats, RewardCalculator};
