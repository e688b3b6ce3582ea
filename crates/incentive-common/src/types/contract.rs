//! Contract facts and the raw-row adapter
//!
//! `ContractData` is the immutable input fact. Rows from the BI query
//! client arrive loosely typed as `RawContractRow`; `ContractData::from_raw`
//! is the only way across that boundary.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::activity_config::DedupField;

/// Contract origination channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Lead supplied by the platform
    Platform,
    /// Lead brought in by the housekeeper
    SelfReferral,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Platform => "platform",
            OrderType::SelfReferral => "self_referral",
        }
    }

    /// Parse the order-type flag as the BI source emits it
    pub fn parse_flag(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "platform" | "0" | "平台" | "平台单" => Ok(OrderType::Platform),
            "self_referral" | "self-referral" | "1" | "自引" | "自引单" => {
                Ok(OrderType::SelfReferral)
            }
            other => Err(ValidationError::UnknownOrderType(other.to_string())),
        }
    }
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Platform
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed contract, immutable once ingested
///
/// `(activity_code, contract_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractData {
    /// Contract identifier, unique within an activity
    pub contract_id: String,
    /// Housekeeper (agent) credited with the contract
    pub housekeeper: String,
    /// Service provider the housekeeper works for
    pub service_provider: String,
    /// Signed contract amount
    pub contract_amount: Decimal,
    /// Amount paid so far
    pub paid_amount: Decimal,
    /// Origination channel
    pub order_type: OrderType,
    /// Project identifier, when the contract belongs to a project
    pub project_id: Option<String>,
    /// Project address, used for self-referral dedup
    pub project_address: Option<String>,
    /// Recorded for audit only; never counts toward statistics
    pub is_historical: bool,
    /// Contract creation time
    pub created_at: DateTime<Utc>,
}

impl ContractData {
    /// Create a platform contract with the required fields
    pub fn new(
        contract_id: impl Into<String>,
        housekeeper: impl Into<String>,
        contract_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            housekeeper: housekeeper.into(),
            service_provider: String::new(),
            contract_amount,
            paid_amount: Decimal::ZERO,
            order_type: OrderType::Platform,
            project_id: None,
            project_address: None,
            is_historical: false,
            created_at,
        }
    }

    /// Set service provider
    pub fn with_service_provider(mut self, provider: impl Into<String>) -> Self {
        self.service_provider = provider.into();
        self
    }

    /// Set paid amount
    pub fn with_paid_amount(mut self, paid: Decimal) -> Self {
        self.paid_amount = paid;
        self
    }

    /// Set order type
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    /// Attach to a project
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set project address
    pub fn with_project_address(mut self, address: impl Into<String>) -> Self {
        self.project_address = Some(address.into());
        self
    }

    /// Mark as historical
    pub fn historical(mut self) -> Self {
        self.is_historical = true;
        self
    }

    pub fn is_self_referral(&self) -> bool {
        self.order_type == OrderType::SelfReferral
    }

    /// The self-referral dedup value for `field`, normalized by [`dedup_key`]
    pub fn dedup_value(&self, field: DedupField) -> Option<&str> {
        let raw = match field {
            DedupField::ProjectAddress => self.project_address.as_deref(),
            DedupField::ProjectId => self.project_id.as_deref(),
        };
        raw.and_then(dedup_key)
    }

    /// Check a contract that did not come through `from_raw`.
    ///
    /// Amounts must be non-negative whole fen so every store sums them
    /// exactly.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.contract_id.trim().is_empty() {
            return Err(ValidationError::MissingField("contract_id"));
        }
        if self.housekeeper.trim().is_empty() {
            return Err(ValidationError::MissingField("housekeeper"));
        }
        check_amount(self.contract_amount, "contract_amount")?;
        check_amount(self.paid_amount, "paid_amount")?;
        Ok(())
    }

    /// Adapt a raw BI row, rejecting malformed input
    pub fn from_raw(row: &RawContractRow) -> Result<Self, ValidationError> {
        let contract_id = required_text(&row.contract_id, "contract_id")?;
        let housekeeper = required_text(&row.housekeeper, "housekeeper")?;

        let contract_amount = match &row.contract_amount {
            Some(value) => parse_amount(value, "contract_amount")?,
            None => return Err(ValidationError::MissingField("contract_amount")),
        };
        let paid_amount = match &row.paid_amount {
            Some(value) => parse_amount(value, "paid_amount")?,
            None => Decimal::ZERO,
        };

        let order_type = match &row.order_type {
            None | Some(Value::Null) => OrderType::Platform,
            Some(Value::String(s)) => OrderType::parse_flag(s)?,
            Some(Value::Number(n)) => OrderType::parse_flag(&n.to_string())?,
            Some(Value::Bool(b)) => {
                if *b {
                    OrderType::SelfReferral
                } else {
                    OrderType::Platform
                }
            }
            Some(other) => return Err(ValidationError::UnknownOrderType(other.to_string())),
        };

        let created_at = match row.created_at.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => parse_timestamp(s)?,
            _ => return Err(ValidationError::MissingField("created_at")),
        };

        Ok(Self {
            contract_id,
            housekeeper,
            service_provider: row.service_provider.clone().unwrap_or_default().trim().to_string(),
            contract_amount,
            paid_amount,
            order_type,
            project_id: optional_text(&row.project_id),
            project_address: optional_text(&row.project_address),
            is_historical: row.is_historical.unwrap_or(false),
            created_at,
        })
    }
}

/// Untrusted contract row as delivered by the BI query client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContractRow {
    pub contract_id: Option<String>,
    pub housekeeper: Option<String>,
    pub service_provider: Option<String>,
    /// Number or numeric string
    pub contract_amount: Option<Value>,
    /// Number or numeric string
    pub paid_amount: Option<Value>,
    /// Channel flag: name, Chinese label, 0/1, or bool
    pub order_type: Option<Value>,
    pub project_id: Option<String>,
    pub project_address: Option<String>,
    pub is_historical: Option<bool>,
    /// RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC)
    pub created_at: Option<String>,
}

/// Trimmed dedup value; blank values never dedup anything
pub fn dedup_key(raw: &str) -> Option<&str> {
    Some(raw.trim()).filter(|v| !v.is_empty())
}

/// Whether an amount is a whole number of fen (0.01)
pub fn is_whole_fen(amount: Decimal) -> bool {
    (amount * Decimal::ONE_HUNDRED).fract().is_zero()
}

fn check_amount(amount: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::NegativeAmount {
            field,
            value: amount.to_string(),
        });
    }
    if !is_whole_fen(amount) {
        return Err(ValidationError::SubFenAmount {
            field,
            value: amount.to_string(),
        });
    }
    Ok(())
}

fn required_text(value: &Option<String>, field: &'static str) -> Result<String, ValidationError> {
    optional_text(value).ok_or(ValidationError::MissingField(field))
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_amount(value: &Value, field: &'static str) -> Result<Decimal, ValidationError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().replace(',', ""),
        other => {
            return Err(ValidationError::InvalidAmount {
                field,
                value: other.to_string(),
            })
        }
    };

    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ValidationError::InvalidAmount {
            field,
            value: text.clone(),
        })?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::NegativeAmount { field, value: text });
    }
    if !is_whole_fen(amount) {
        return Err(ValidationError::SubFenAmount { field, value: text });
    }
    Ok(amount)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ValidationError::InvalidTimestamp(raw.to_string()))
}
