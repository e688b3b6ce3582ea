//! Contract reward pipeline
//!
//! Drives one batch of contracts for one activity through dedup, statistics,
//! capping, reward calculation, record building and persistence. Contracts
//! are handled strictly in `created_at` order under the activity's lock, so
//! each contract sees the statistics left behind by the one before it.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use incentive_common::{
    ActivityRewardConfig, ConfigRegistry, ContractData, IncentiveError, PerformanceRecord,
    RawContractRow, Result, StoreError,
};
use incentive_engine::{PreContractStats, RecordBuilder, RewardCalculator, Sequences};
use incentive_ledger::FactStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::capping::{cap_amount, needs_project_stats};
use crate::locks::ActivityLocks;
use crate::metrics::PipelineMetrics;
use crate::summary::{ContractStage, IssueKind, ProcessingSummary};

/// Raw rows for one activity, as read from the batch input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityBatch {
    pub activity_code: String,
    #[serde(alias = "contracts")]
    pub rows: Vec<RawContractRow>,
}

/// Records persisted by one batch plus its summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub activity_code: String,
    pub records: Vec<PerformanceRecord>,
    pub summary: ProcessingSummary,
}

/// Reward processing pipeline over a fact store
pub struct RewardPipeline {
    store: Arc<dyn FactStore>,
    configs: Arc<ConfigRegistry>,
    calculator: RewardCalculator,
    builder: RecordBuilder,
    locks: ActivityLocks,
    /// Last summary per activity
    summaries: DashMap<String, ProcessingSummary>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl RewardPipeline {
    pub fn new(store: Arc<dyn FactStore>, configs: Arc<ConfigRegistry>) -> Self {
        Self {
            store,
            configs,
            calculator: RewardCalculator::new(),
            builder: RecordBuilder::new(),
            locks: ActivityLocks::new(),
            summaries: DashMap::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    /// Process a batch of validated contracts for one activity.
    ///
    /// Fails only when the activity has no usable configuration; per-contract
    /// problems are reported in the summary and never abort the batch.
    #[instrument(skip(self, contracts), fields(count = contracts.len()))]
    pub fn process(&self, activity_code: &str, contracts: Vec<ContractData>) -> Result<BatchOutcome> {
        let config = self.configs.get_config(activity_code)?;
        let mut summary = ProcessingSummary::new(Uuid::now_v7(), activity_code);
        summary.received = contracts.len() as u64;
        Ok(self.run(activity_code, &config, contracts, summary))
    }

    /// Adapt raw rows and process the valid ones.
    ///
    /// Rows that fail validation are skipped with an `invalid` issue.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub fn process_raw(&self, activity_code: &str, rows: &[RawContractRow]) -> Result<BatchOutcome> {
        let config = self.configs.get_config(activity_code)?;
        let mut summary = ProcessingSummary::new(Uuid::now_v7(), activity_code);
        summary.received = rows.len() as u64;

        let mut contracts = Vec::with_capacity(rows.len());
        for row in rows {
            match ContractData::from_raw(row) {
                Ok(contract) => contracts.push(contract),
                Err(err) => {
                    warn!(
                        activity = activity_code,
                        contract_id = row.contract_id.as_deref().unwrap_or("<none>"),
                        error = %err,
                        "Rejected raw contract row"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.issue(activity_code, IssueKind::Invalid);
                    }
                    summary.record_issue(
                        row.contract_id.clone(),
                        ContractStage::Received,
                        IssueKind::Invalid,
                        err.to_string(),
                    );
                }
            }
        }

        Ok(self.run(activity_code, &config, contracts, summary))
    }

    /// Summary of the most recent batch for an activity
    pub fn get_processing_summary(&self, activity_code: &str) -> Option<ProcessingSummary> {
        self.summaries.get(activity_code).map(|s| s.value().clone())
    }

    /// Process several activities concurrently, at most `max_concurrent` at once.
    ///
    /// Results come back in input order. Two batches for the same activity
    /// still run one after the other.
    pub async fn process_activities(
        self: Arc<Self>,
        batches: Vec<ActivityBatch>,
        max_concurrent: usize,
    ) -> Vec<(String, Result<BatchOutcome>)> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(batches.len());

        for batch in batches {
            let pipeline = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let code = batch.activity_code.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| IncentiveError::Internal(e.to_string()))?;
                tokio::task::spawn_blocking(move || {
                    pipeline.process_raw(&batch.activity_code, &batch.rows)
                })
                .await
                .map_err(|e| IncentiveError::Internal(format!("batch task failed: {}", e)))?
            });
            handles.push((code, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (code, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(IncentiveError::Internal(format!("batch task failed: {}", e))),
            };
            if let Err(err) = &result {
                error!(activity = %code, error = %err, "Activity batch failed");
            }
            results.push((code, result));
        }
        results
    }

    fn run(
        &self,
        activity_code: &str,
        config: &ActivityRewardConfig,
        mut contracts: Vec<ContractData>,
        mut summary: ProcessingSummary,
    ) -> BatchOutcome {
        let started = Instant::now();
        let lock = self.locks.handle(activity_code);
        let _guard = lock.lock();

        if contracts.windows(2).any(|w| w[0].created_at > w[1].created_at) {
            warn!(
                activity = activity_code,
                "Contracts not in created_at order; sorting before processing"
            );
        }
        contracts.sort_by_key(|c| c.created_at);

        let mut records = Vec::new();
        for contract in &contracts {
            let mut stage = ContractStage::Received;
            match self.process_contract(activity_code, config, contract, &mut stage) {
                Ok(record) => {
                    debug!(
                        contract_id = %contract.contract_id,
                        housekeeper = %contract.housekeeper,
                        performance = %record.performance_amount,
                        rewards = record.rewards.len(),
                        "Contract recorded"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.persisted(activity_code);
                        for reward in &record.rewards {
                            metrics.reward(activity_code, reward.reward_type);
                        }
                    }
                    summary.record_success(&record);
                    records.push(record);
                }
                Err(err) => {
                    // `stage` is the last stage reached, reported on the issue
                    let kind = IssueKind::from_error(&err);
                    if kind.is_skip() {
                        info!(
                            contract_id = %contract.contract_id,
                            stage = %stage,
                            outcome = %ContractStage::Skipped,
                            reason = %err,
                            "Contract skipped"
                        );
                    } else {
                        error!(
                            contract_id = %contract.contract_id,
                            stage = %stage,
                            outcome = %ContractStage::Failed,
                            error = %err,
                            "Contract failed"
                        );
                    }
                    if let Some(metrics) = &self.metrics {
                        metrics.issue(activity_code, kind);
                    }
                    summary.record_issue(
                        Some(contract.contract_id.clone()),
                        stage,
                        kind,
                        err.to_string(),
                    );
                }
            }
        }

        summary.finish();
        if let Some(metrics) = &self.metrics {
            metrics
                .batch_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }
        info!(
            activity = activity_code,
            batch_id = %summary.batch_id,
            received = summary.received,
            succeeded = summary.succeeded,
            skipped = summary.skipped(),
            failed = summary.failed,
            rewards = summary.rewards_awarded,
            "Batch processed"
        );

        self.summaries
            .insert(activity_code.to_string(), summary.clone());

        BatchOutcome {
            batch_id: summary.batch_id,
            activity_code: activity_code.to_string(),
            records,
            summary,
        }
    }

    /// One contract, start to finish. `stage` tracks how far it got.
    fn process_contract(
        &self,
        activity_code: &str,
        config: &ActivityRewardConfig,
        contract: &ContractData,
        stage: &mut ContractStage,
    ) -> Result<PerformanceRecord> {
        contract.validate()?;
        if self.store.exists(&contract.contract_id, activity_code)? {
            return Err(StoreError::Duplicate {
                activity_code: activity_code.to_string(),
                contract_id: contract.contract_id.clone(),
            }
            .into());
        }
        *stage = ContractStage::DedupChecked;

        let stats = PreContractStats::new(
            self.store.stats(&contract.housekeeper, activity_code)?,
            self.store.activity_stats(activity_code)?,
        );
        *stage = ContractStage::StatsLoaded;

        let limits = &config.performance_limits;
        let project = match (&contract.project_id, needs_project_stats(contract, limits)) {
            (Some(project_id), true) => Some(self.store.project_stats(project_id, activity_code)?),
            _ => None,
        };
        let capped = cap_amount(contract, limits, project.as_ref());
        if capped.contract_cap_applied || capped.project_limit_applied {
            debug!(
                contract_id = %contract.contract_id,
                original = %contract.contract_amount,
                capped = %capped.amount,
                project_limit = capped.project_limit_applied,
                "Performance amount capped"
            );
        }
        *stage = ContractStage::AmountCapped;

        let rewards = self
            .calculator
            .calculate(contract, capped.amount, &stats, config);
        *stage = ContractStage::RewardsComputed;

        let sequences = if contract.is_historical {
            Sequences::historical()
        } else {
            Sequences::next(stats.activity.contract_count, stats.housekeeper.contract_count)
        };
        let record = self.builder.build(
            activity_code,
            contract,
            &stats.housekeeper,
            rewards,
            capped.amount,
            sequences,
        );
        *stage = ContractStage::RecordBuilt;

        self.store.persist(&record)?;
        *stage = ContractStage::Persisted;
        Ok(record)
    }
}
