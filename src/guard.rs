//! Concurrency guard
//!
//! The record store doubles as the lock: a `processing` record younger than the
//! busy window means another run is in flight, and the newest record of any
//! status starts the cooldown. Nothing is released explicitly; a record reaching
//! `completed`/`failed` frees the next caller once the cooldown elapses.
//!
//! The scan is optimistic. Two triggers racing inside the same window can both
//! pass; the scheduler is expected to run one job at a time.
//!
//! A crashed run leaves its record `processing`. After the busy window that
//! record no longer blocks anyone but stays orphaned until an operator
//! reconciles it.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::store::RecordStore;
use crate::types::{DistributionOutcome, DistributionRecord, RewardAmount};

/// How long a `processing` record counts as an active run
pub const DEFAULT_BUSY_WINDOW_SECS: i64 = 60;

/// Reasons the guard refuses a run. These are expected "not now" outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardRefusal {
    #[error("Distribution {active_id} already in progress")]
    Busy { active_id: Uuid },

    #[error("Cooldown active, {} seconds remaining", .remaining.num_seconds())]
    Cooldown { remaining: Duration },
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Refused(#[from] GuardRefusal),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Flip interval {0}s is out of range")]
    IntervalOutOfRange(u64),
}

/// Permission to start one run. Consumed by `open_record`.
#[must_use = "a lease must be turned into a processing record before doing any work"]
#[derive(Debug)]
pub struct Lease {
    acquired_at: DateTime<Utc>,
}

impl Lease {
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Create the `processing` record that becomes the lock for later callers
    pub async fn open_record(
        self,
        store: &dyn RecordStore,
        result: DistributionOutcome,
        amount: RewardAmount,
    ) -> Result<DistributionRecord, StoreError> {
        let record = DistributionRecord::processing(result, amount, self.acquired_at);
        store.insert_record(&record).await?;
        debug!(id = %record.id, %result, %amount, "Processing record opened");
        Ok(record)
    }
}

pub struct ConcurrencyGuard {
    store: Arc<dyn RecordStore>,
    busy_window: Duration,
}

impl ConcurrencyGuard {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_busy_window(store, Duration::seconds(DEFAULT_BUSY_WINDOW_SECS))
    }

    pub fn with_busy_window(store: Arc<dyn RecordStore>, busy_window: Duration) -> Self {
        Self { store, busy_window }
    }

    /// Refuse when a run is in flight or the cooldown has not elapsed.
    pub async fn try_acquire(
        &self,
        now: DateTime<Utc>,
        flip_interval_seconds: u64,
    ) -> Result<Lease, GuardError> {
        let interval = i64::try_from(flip_interval_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or(GuardError::IntervalOutOfRange(flip_interval_seconds))?;

        let active = self.store.processing_since(now - self.busy_window).await?;
        if let Some(record) = active.first() {
            return Err(GuardRefusal::Busy {
                active_id: record.id,
            }
            .into());
        }

        if let Some(last) = self.store.latest_record().await? {
            let elapsed = now - last.created_at;
            if elapsed < interval {
                return Err(GuardRefusal::Cooldown {
                    remaining: interval - elapsed,
                }
                .into());
            }
        }

        Ok(Lease { acquired_at: now })
    }
}
