//! Common types used throughout the distribution job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use uuid::Uuid;

/// Micro-SOL per SOL (6 decimal digits)
pub const MICROS_PER_SOL: u64 = 1_000_000;

/// Lamports per micro-SOL
pub const LAMPORTS_PER_MICRO: u64 = 1_000;

/// A token holder as reported by the chain. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHolder {
    /// Wallet (token account owner) address
    pub address: Pubkey,

    /// Balance in UI token units
    pub balance: f64,
}

impl TokenHolder {
    pub fn new(address: Pubkey, balance: f64) -> Self {
        Self { address, balance }
    }
}

/// Outcome kind of a distribution run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionOutcome {
    /// Recorded for manual/external burn execution; no on-chain transfer
    Burn,
    /// SOL reward paid to a holder or priority wallet
    Holder,
}

impl fmt::Display for DistributionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Burn => write!(f, "burn"),
            Self::Holder => write!(f, "holder"),
        }
    }
}

/// Lifecycle status of a distribution record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Processing,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordStatus::Processing)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// SOL amount held as whole micro-SOL, so the 6-decimal truncation is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardAmount(u64);

impl RewardAmount {
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Truncate (floor) a SOL amount to micro-SOL precision.
    pub fn from_sol_truncated(sol: f64) -> Self {
        if !sol.is_finite() || sol <= 0.0 {
            return Self(0);
        }
        Self((sol * MICROS_PER_SOL as f64).floor() as u64)
    }

    pub fn micros(&self) -> u64 {
        self.0
    }

    pub fn lamports(&self) -> u64 {
        self.0.saturating_mul(LAMPORTS_PER_MICRO)
    }
}

impl fmt::Display for RewardAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0 / MICROS_PER_SOL,
            self.0 % MICROS_PER_SOL
        )
    }
}

/// Persisted audit row. It is also the concurrency token read by the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub id: Uuid,
    pub result: DistributionOutcome,
    pub amount: RewardAmount,
    pub recipient: Option<String>,
    pub tx_hash: Option<String>,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl DistributionRecord {
    /// New record in `processing` state
    pub fn processing(
        result: DistributionOutcome,
        amount: RewardAmount,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            result,
            amount,
            recipient: None,
            tx_hash: None,
            status: RecordStatus::Processing,
            error_message: None,
            created_at,
            finalized_at: None,
        }
    }
}

/// How a run ended from the caller's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Ran and succeeded
    Completed,
    /// Ran and failed. `record_id` is set when a record was written
    Failed,
    /// Not run (busy, cooldown, paused, misconfigured); no record created
    Skipped,
}

/// Structured result returned by the trigger entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DistributionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: RunStatus::Skipped,
            result: None,
            tx_hash: None,
            recipient_wallet: None,
            record_id: None,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn misconfigured(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            message: Some("Distribution not run: token configuration invalid".to_string()),
            ..Self::skipped("")
        }
    }

    /// The run could not reach or write its record
    pub fn failed(error: impl Into<String>, record_id: Option<Uuid>) -> Self {
        Self {
            status: RunStatus::Failed,
            record_id,
            message: None,
            error: Some(error.into()),
            ..Self::skipped("")
        }
    }

    /// Build from a finalized record
    pub fn from_record(record: &DistributionRecord) -> Self {
        let completed = record.status == RecordStatus::Completed;
        let message = match (record.result, completed) {
            (DistributionOutcome::Burn, true) => {
                Some(format!("Burn of {} SOL recorded for manual execution", record.amount))
            }
            (DistributionOutcome::Holder, true) => Some(format!(
                "Sent {} SOL to {}",
                record.amount,
                record.recipient.as_deref().unwrap_or("unknown")
            )),
            (_, false) => None,
        };

        Self {
            success: completed,
            status: if completed {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            },
            result: Some(record.result),
            tx_hash: record.tx_hash.clone(),
            recipient_wallet: record.recipient.clone(),
            record_id: Some(record.id),
            message,
            error: record.error_message.clone(),
        }
    }
}
