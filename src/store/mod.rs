//! Persistence collaborator
//!
//! The record store is the single shared resource of the job: the guard reads
//! it for locking decisions and the audit recorder writes each record's
//! terminal state exactly once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::types::DistributionRecord;

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Token configuration row as stored. Validated by `token_config` before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfigRow {
    pub mint: String,
    pub burn_address: String,
    #[serde(default)]
    pub excluded_wallets: Vec<String>,
    pub flip_interval_seconds: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub pause_reason: Option<String>,
}

fn default_true() -> bool {
    true
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record (normally `processing`)
    async fn insert_record(&self, record: &DistributionRecord) -> Result<(), StoreError>;

    /// Replace a `processing` record with its terminal state.
    ///
    /// Fails with `AlreadyFinalized` if the stored record is no longer `processing`.
    async fn finalize_record(&self, record: &DistributionRecord) -> Result<(), StoreError>;

    async fn get_record(&self, id: Uuid) -> Result<Option<DistributionRecord>, StoreError>;

    /// Most recent record by `created_at`, any status
    async fn latest_record(&self) -> Result<Option<DistributionRecord>, StoreError>;

    /// `processing` records created at or after `cutoff`, newest first
    async fn processing_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, StoreError>;

    /// Newest first
    async fn recent_records(&self, limit: usize) -> Result<Vec<DistributionRecord>, StoreError>;

    async fn active_token_config(&self) -> Result<Option<TokenConfigRow>, StoreError>;

    /// Upsert by mint. Activating a row deactivates every other row.
    async fn put_token_config(&self, row: &TokenConfigRow) -> Result<(), StoreError>;
}
