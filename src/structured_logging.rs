//! Structured logging for distribution runs

use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::types::{DistributionRecord, RewardAmount};

/// Per-run logger. Every event carries the same `run_id`.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_trigger(&self, mint: &Pubkey) {
        tracing::info!(
            run_id = %self.run_id,
            mint = %mint,
            "Distribution triggered"
        );
    }

    pub fn log_skipped(&self, reason: &str, detail: &str) {
        tracing::info!(
            run_id = %self.run_id,
            reason = %reason,
            detail = %detail,
            "Distribution skipped"
        );
    }

    pub fn log_draw(&self, draw: f64, band: &str, amount: RewardAmount) {
        tracing::info!(
            run_id = %self.run_id,
            draw = %draw,
            band = %band,
            amount_sol = %amount,
            "Outcome drawn"
        );
    }

    pub fn log_holders(&self, eligible: usize) {
        tracing::debug!(
            run_id = %self.run_id,
            eligible = %eligible,
            "Holders fetched"
        );
    }

    pub fn log_selection(&self, recipient: &Pubkey, path: &str) {
        tracing::info!(
            run_id = %self.run_id,
            recipient = %recipient,
            path = %path,
            "Recipient selected"
        );
    }

    pub fn log_finalized(&self, record: &DistributionRecord, latency_ms: u64) {
        tracing::info!(
            run_id = %self.run_id,
            record_id = %record.id,
            status = %record.status,
            result = %record.result,
            tx_hash = ?record.tx_hash,
            latency_ms = %latency_ms,
            "Distribution finished"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            run_id = %self.run_id,
            message = %message,
            "Warning"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            run_id = %self.run_id,
            message = %message,
            "Error"
        );
    }

    /// Integrity failures that need an operator
    pub fn critical(&self, message: &str) {
        tracing::error!(
            run_id = %self.run_id,
            critical = true,
            message = %message,
            "Critical distribution failure"
        );
    }
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new()
    }
}
