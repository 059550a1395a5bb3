//! Embedded sled-backed record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use super::{RecordStore, TokenConfigRow};
use crate::errors::StoreError;
use crate::types::{DistributionRecord, RecordStatus};

const RECORDS_TREE: &str = "records";
const RECORD_INDEX_TREE: &str = "record_index";
const TOKEN_CONFIG_TREE: &str = "token_configs";

/// Records are keyed by `created_at` millis (big-endian) followed by the id,
/// so byte order equals recency order.
pub struct SledStore {
    db: sled::Db,
    records: sled::Tree,
    index: sled::Tree,
    token_configs: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let store = Self::from_db(db)?;
        info!(path = %path.as_ref().display(), records = store.records.len(), "Record store opened");
        Ok(store)
    }

    /// Throwaway store that lives in memory / a temp dir
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            records: db.open_tree(RECORDS_TREE)?,
            index: db.open_tree(RECORD_INDEX_TREE)?,
            token_configs: db.open_tree(TOKEN_CONFIG_TREE)?,
            db,
        })
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

fn time_prefix(at: DateTime<Utc>) -> [u8; 8] {
    (at.timestamp_millis().max(0) as u64).to_be_bytes()
}

fn record_key(record: &DistributionRecord) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&time_prefix(record.created_at));
    key.extend_from_slice(record.id.as_bytes());
    key
}

fn decode(bytes: &[u8]) -> Result<DistributionRecord, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[async_trait]
impl RecordStore for SledStore {
    async fn insert_record(&self, record: &DistributionRecord) -> Result<(), StoreError> {
        let key = record_key(record);
        let value = serde_json::to_vec(record)?;

        (&self.records, &self.index)
            .transaction(|(records, index)| {
                records.insert(key.as_slice(), value.as_slice())?;
                index.insert(&record.id.as_bytes()[..], key.as_slice())?;
                Ok::<_, ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| StoreError::Backend(format!("{:?}", e)))?;

        debug!(id = %record.id, status = %record.status, "Record inserted");
        Ok(())
    }

    async fn finalize_record(&self, record: &DistributionRecord) -> Result<(), StoreError> {
        let key = self
            .index
            .get(&record.id.as_bytes()[..])?
            .ok_or(StoreError::NotFound(record.id))?;
        let current = self
            .records
            .get(&key)?
            .ok_or(StoreError::NotFound(record.id))?;

        if decode(&current)?.status != RecordStatus::Processing {
            return Err(StoreError::AlreadyFinalized(record.id));
        }

        let new_value = serde_json::to_vec(record)?;
        self.records
            .compare_and_swap(&key, Some(current), Some(new_value))?
            .map_err(|_| StoreError::AlreadyFinalized(record.id))?;

        debug!(id = %record.id, status = %record.status, "Record finalized");
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<DistributionRecord>, StoreError> {
        let Some(key) = self.index.get(&id.as_bytes()[..])? else {
            return Ok(None);
        };
        self.records
            .get(&key)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn latest_record(&self) -> Result<Option<DistributionRecord>, StoreError> {
        self.records
            .last()?
            .map(|(_, bytes)| decode(&bytes))
            .transpose()
    }

    async fn processing_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, StoreError> {
        let mut out = Vec::new();
        for entry in self.records.range(time_prefix(cutoff)..).rev() {
            let (_, bytes) = entry?;
            let record = decode(&bytes)?;
            if record.status == RecordStatus::Processing && record.created_at >= cutoff {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn recent_records(&self, limit: usize) -> Result<Vec<DistributionRecord>, StoreError> {
        self.records
            .iter()
            .rev()
            .take(limit)
            .map(|entry| {
                let (_, bytes) = entry?;
                decode(&bytes)
            })
            .collect()
    }

    async fn active_token_config(&self) -> Result<Option<TokenConfigRow>, StoreError> {
        for entry in self.token_configs.iter() {
            let (_, bytes) = entry?;
            let row: TokenConfigRow = serde_json::from_slice(&bytes)?;
            if row.is_active {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    async fn put_token_config(&self, row: &TokenConfigRow) -> Result<(), StoreError> {
        if row.is_active {
            for entry in self.token_configs.iter() {
                let (key, bytes) = entry?;
                let mut other: TokenConfigRow = serde_json::from_slice(&bytes)?;
                if other.is_active && other.mint != row.mint {
                    other.is_active = false;
                    self.token_configs.insert(key, serde_json::to_vec(&other)?)?;
                }
            }
        }
        self.token_configs
            .insert(row.mint.as_bytes(), serde_json::to_vec(row)?)?;
        Ok(())
    }
}
