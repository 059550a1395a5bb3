//! In-process record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, TokenConfigRow};
use crate::errors::StoreError;
use crate::types::{DistributionRecord, RecordStatus};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<DistributionRecord>>>,
    token_configs: Arc<RwLock<Vec<TokenConfigRow>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_config(row: TokenConfigRow) -> Self {
        Self {
            records: Arc::default(),
            token_configs: Arc::new(RwLock::new(vec![row])),
        }
    }

    /// Number of records ever inserted
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

fn newest_first(records: &[DistributionRecord]) -> Vec<DistributionRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_record(&self, record: &DistributionRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn finalize_record(&self, record: &DistributionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(StoreError::NotFound(record.id))?;

        if slot.status != RecordStatus::Processing {
            return Err(StoreError::AlreadyFinalized(record.id));
        }
        *slot = record.clone();
        Ok(())
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<DistributionRecord>, StoreError> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn latest_record(&self) -> Result<Option<DistributionRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn processing_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(newest_first(&records)
            .into_iter()
            .filter(|r| r.status == RecordStatus::Processing && r.created_at >= cutoff)
            .collect())
    }

    async fn recent_records(&self, limit: usize) -> Result<Vec<DistributionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(newest_first(&records).into_iter().take(limit).collect())
    }

    async fn active_token_config(&self) -> Result<Option<TokenConfigRow>, StoreError> {
        Ok(self
            .token_configs
            .read()
            .await
            .iter()
            .find(|row| row.is_active)
            .cloned())
    }

    async fn put_token_config(&self, row: &TokenConfigRow) -> Result<(), StoreError> {
        let mut rows = self.token_configs.write().await;
        if row.is_active {
            for other in rows.iter_mut() {
                other.is_active = false;
            }
        }
        rows.retain(|other| other.mint != row.mint);
        rows.push(row.clone());
        Ok(())
    }
}
