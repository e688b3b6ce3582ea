//! # Incentive Pipeline
//!
//! Contract reward processing for housekeeper incentive activities.
//!
//! ## Flow
//!
//! ```text
//! raw rows -> ContractData -> dedup -> stats -> cap -> rewards -> record -> store
//! ```
//!
//! Each activity is processed under its own lock in `created_at` order;
//! independent activities run concurrently via [`RewardPipeline::process_activities`].

pub mod capping;
pub mod config;
pub mod locks;
pub mod metrics;
pub mod pipeline;
pub mod summary;

pub use capping::{cap_amount, CappedAmount};
pub use config::{PipelineSettings, StoreBackend, StoreSettings};
pub use metrics::PipelineMetrics;
pub use pipeline::{ActivityBatch, BatchOutcome, RewardPipeline};
pub use summary::{ContractIssue, ContractStage, IssueKind, ProcessingSummary};
