//! Batch processing summary
//!
//! Every contract that enters a batch ends in exactly one bucket, and every
//! skip or failure leaves an issue with its reason.

use chrono::{DateTime, Utc};
use incentive_common::{IncentiveError, PerformanceRecord, StoreError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-contract processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStage {
    Received,
    DedupChecked,
    StatsLoaded,
    AmountCapped,
    RewardsComputed,
    RecordBuilt,
    Persisted,
    Skipped,
    Failed,
}

impl ContractStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractStage::Persisted | ContractStage::Skipped | ContractStage::Failed
        )
    }
}

impl std::fmt::Display for ContractStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContractStage::Received => "received",
            ContractStage::DedupChecked => "dedup_checked",
            ContractStage::StatsLoaded => "stats_loaded",
            ContractStage::AmountCapped => "amount_capped",
            ContractStage::RewardsComputed => "rewards_computed",
            ContractStage::RecordBuilt => "record_built",
            ContractStage::Persisted => "persisted",
            ContractStage::Skipped => "skipped",
            ContractStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a contract did not produce a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Already recorded before this contract was reached
    Duplicate,
    /// Lost a unique-key race at insert time
    ConcurrencyViolation,
    /// Raw row rejected by the adapter
    Invalid,
    /// Store read or write failed
    Storage,
    /// Anything else
    Internal,
}

impl IssueKind {
    pub fn from_error(err: &IncentiveError) -> Self {
        match err {
            IncentiveError::Store(StoreError::Duplicate { .. }) => IssueKind::Duplicate,
            IncentiveError::Store(StoreError::ConcurrencyViolation { .. }) => {
                IssueKind::ConcurrencyViolation
            }
            IncentiveError::Store(StoreError::Backend(_)) => IssueKind::Storage,
            IncentiveError::Validation(_) => IssueKind::Invalid,
            _ => IssueKind::Internal,
        }
    }

    /// Skips are expected outcomes; everything else is a failure
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            IssueKind::Duplicate | IssueKind::ConcurrencyViolation | IssueKind::Invalid
        )
    }
}

/// One skipped or failed contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractIssue {
    /// Absent when the raw row had no usable id
    pub contract_id: Option<String>,
    /// Stage the contract had reached
    pub stage: ContractStage,
    pub kind: IssueKind,
    pub reason: String,
}

/// Counts for one processed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub batch_id: Uuid,
    pub activity_code: String,
    pub received: u64,
    pub succeeded: u64,
    pub skipped_duplicate: u64,
    pub skipped_invalid: u64,
    pub failed: u64,
    /// Persisted historical contracts (also counted in `succeeded`)
    pub historical: u64,
    pub rewards_awarded: u64,
    pub reward_value_total: Decimal,
    pub issues: Vec<ContractIssue>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingSummary {
    pub fn new(batch_id: Uuid, activity_code: impl Into<String>) -> Self {
        Self {
            batch_id,
            activity_code: activity_code.into(),
            received: 0,
            succeeded: 0,
            skipped_duplicate: 0,
            skipped_invalid: 0,
            failed: 0,
            historical: 0,
            rewards_awarded: 0,
            reward_value_total: Decimal::ZERO,
            issues: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_success(&mut self, record: &PerformanceRecord) {
        self.succeeded += 1;
        if record.is_historical() {
            self.historical += 1;
        }
        self.rewards_awarded += record.rewards.len() as u64;
        self.reward_value_total += record.reward_total();
    }

    pub fn record_issue(
        &mut self,
        contract_id: Option<String>,
        stage: ContractStage,
        kind: IssueKind,
        reason: impl Into<String>,
    ) {
        match kind {
            IssueKind::Duplicate | IssueKind::ConcurrencyViolation => self.skipped_duplicate += 1,
            IssueKind::Invalid => self.skipped_invalid += 1,
            IssueKind::Storage | IssueKind::Internal => self.failed += 1,
        }
        self.issues.push(ContractIssue {
            contract_id,
            stage,
            kind,
            reason: reason.into(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Every received contract is accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.received == self.succeeded + self.skipped_duplicate + self.skipped_invalid + self.failed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_duplicate + self.skipped_invalid
    }
}
