//! Error taxonomy for the distribution job

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use uuid::Uuid;

use crate::chain::ChainError;

/// Process configuration errors. Fatal at startup, never a per-run failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("Invalid secret {name}: {reason}")]
    InvalidSecret { name: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Token configuration errors. The run is not attempted and no record is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenConfigError {
    #[error("No active token configuration found")]
    NotFound,

    #[error("Token mint looks like a placeholder: {0}")]
    PlaceholderMint(String),

    #[error("Malformed {field} address '{value}': {reason}")]
    MalformedAddress {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid flip interval: {0}s")]
    InvalidFlipInterval(u64),

    #[error("Failed to read token configuration: {0}")]
    Store(String),
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    /// A terminal write was attempted on a record that is no longer `processing`
    #[error("Record {0} already finalized")]
    AlreadyFinalized(Uuid),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Integrity failures detected after selection. Never auto-corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyViolation {
    #[error("Selected recipient {0} is an excluded wallet")]
    ExcludedRecipient(Pubkey),

    #[error("Selected winner {0} not found in fetched holder list")]
    WinnerNotFound(Pubkey),

    #[error("Selected winner {address} holds {balance} tokens, above the eligibility cap of {cap}")]
    CapExceeded {
        address: Pubkey,
        balance: f64,
        cap: f64,
    },

    #[error("Holder outcome selected without a recipient")]
    MissingRecipient,
}

/// Reasons a run aborts after its `processing` record exists
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("No eligible holders found")]
    NoHolders,

    #[error("Insufficient funding balance: have {available} lamports, need more than {required}")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("Safety violation: {0}")]
    Safety(#[from] SafetyViolation),

    /// A hop failed. Funds stay at `funds_at`; manual recovery required.
    #[error(
        "Transfer failed at hop {failed_hop}/{total_hops} ({from} -> {to}): {reason}; \
         funds held at {funds_at}; confirmed: [{}]",
        .confirmed.join(", ")
    )]
    Transfer {
        failed_hop: usize,
        total_hops: usize,
        from: Pubkey,
        to: Pubkey,
        funds_at: Pubkey,
        confirmed: Vec<String>,
        reason: String,
    },

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DistributionError {
    /// Critical errors page operators rather than just logging
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            DistributionError::Safety(_) | DistributionError::Transfer { .. }
        )
    }
}
