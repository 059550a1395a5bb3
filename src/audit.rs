//! Audit recorder
//!
//! Writes each record's terminal state exactly once, then runs post-commit
//! hooks and publishes the record on a broadcast channel. Hooks and
//! subscribers can never change the stored status.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::metrics::metrics;
use crate::store::RecordStore;
use crate::types::{DistributionRecord, RecordStatus};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Side effect run after a record is finalized
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_finalized(&self, record: &DistributionRecord) -> anyhow::Result<()>;
}

/// Terminal state applied to a `processing` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Completed {
        recipient: Option<String>,
        tx_hash: Option<String>,
    },
    Failed {
        error: String,
    },
}

pub struct AuditRecorder {
    store: Arc<dyn RecordStore>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
    events: broadcast::Sender<DistributionRecord>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            hooks: Vec::new(),
            events,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Stream of finalized records
    pub fn subscribe(&self) -> broadcast::Receiver<DistributionRecord> {
        self.events.subscribe()
    }

    pub async fn finalize(
        &self,
        mut record: DistributionRecord,
        terminal: Terminal,
    ) -> Result<DistributionRecord, StoreError> {
        match terminal {
            Terminal::Completed { recipient, tx_hash } => {
                record.status = RecordStatus::Completed;
                record.recipient = recipient;
                record.tx_hash = tx_hash;
                record.error_message = None;
            }
            Terminal::Failed { error } => {
                record.status = RecordStatus::Failed;
                record.error_message = Some(error);
            }
        }
        record.finalized_at = Some(Utc::now());

        self.store.finalize_record(&record).await?;
        info!(
            id = %record.id,
            status = %record.status,
            result = %record.result,
            "Record finalized"
        );

        for hook in &self.hooks {
            if let Err(e) = hook.on_finalized(&record).await {
                metrics().notification_failures.inc();
                warn!(hook = hook.name(), id = %record.id, error = %e, "Post-commit hook failed");
            }
        }

        // No subscribers is fine
        let _ = self.events.send(record.clone());
        Ok(record)
    }

    /// Operator resolution of an orphaned `processing` record
    pub async fn reconcile(&self, id: Uuid, reason: &str) -> Result<DistributionRecord, StoreError> {
        let record = self
            .store
            .get_record(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(StoreError::AlreadyFinalized(id));
        }

        warn!(%id, reason, "Reconciling orphaned record");
        self.finalize(
            record,
            Terminal::Failed {
                error: format!("Reconciled by operator: {reason}"),
            },
        )
        .await
    }
}
