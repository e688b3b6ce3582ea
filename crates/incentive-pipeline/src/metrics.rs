//! Prometheus metrics for the pipeline

use incentive_common::RewardType;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

use crate::summary::IssueKind;

/// Prometheus metrics for contract processing
pub struct PipelineMetrics {
    /// Contracts by outcome: persisted, duplicate, concurrency_violation, invalid, storage, internal
    pub contracts_total: IntCounterVec,
    /// Rewards by type
    pub rewards_total: IntCounterVec,
    pub batch_duration_seconds: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            contracts_total: IntCounterVec::new(
                Opts::new(
                    "incentive_contracts_total",
                    "Contracts processed, by outcome",
                ),
                &["activity", "outcome"],
            )?,
            rewards_total: IntCounterVec::new(
                Opts::new("incentive_rewards_total", "Rewards awarded, by type"),
                &["activity", "reward_type"],
            )?,
            batch_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "incentive_batch_duration_seconds",
                    "Wall time to process one activity batch",
                )
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.contracts_total.clone()))?;
        registry.register(Box::new(self.rewards_total.clone()))?;
        registry.register(Box::new(self.batch_duration_seconds.clone()))?;
        Ok(())
    }

    pub fn persisted(&self, activity: &str) {
        self.contracts_total
            .with_label_values(&[activity, "persisted"])
            .inc();
    }

    pub fn issue(&self, activity: &str, kind: IssueKind) {
        let outcome = match kind {
            IssueKind::Duplicate => "duplicate",
            IssueKind::ConcurrencyViolation => "concurrency_violation",
            IssueKind::Invalid => "invalid",
            IssueKind::Storage => "storage",
            IssueKind::Internal => "internal",
        };
        self.contracts_total
            .with_label_values(&[activity, outcome])
            .inc();
    }

    pub fn reward(&self, activity: &str, reward_type: RewardType) {
        self.rewards_total
            .with_label_values(&[activity, reward_type.as_str()])
            .inc();
    }
}
