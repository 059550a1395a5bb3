//! Distribution job
//!
//! One trigger runs the pipeline in a fixed order: token config, guard, draw,
//! processing record, holders, selection, validation, payout, finalization.
//! Every outcome is returned as a `TriggerResponse` so callers can tell "not
//! run" from "ran and failed" from "ran and succeeded".

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::audit::{AuditRecorder, Terminal};
use crate::chain::ChainClient;
use crate::errors::{DistributionError, SafetyViolation};
use crate::guard::{ConcurrencyGuard, GuardError, GuardRefusal, DEFAULT_BUSY_WINDOW_SECS};
use crate::holders::{fetch_holders, EligibilityRules};
use crate::metrics::{metrics, Timer};
use crate::payout::PayoutExecutor;
use crate::selection::{select_recipient, validate_selection, Band, Outcome, RewardRange};
use crate::store::RecordStore;
use crate::structured_logging::RunLogger;
use crate::token_config::{load_token_config, TokenConfig, TokenConfigState};
use crate::types::{RecordStatus, RewardAmount, TriggerResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct DistributorSettings {
    /// Wallets eligible on the priority band regardless of balance
    pub priority_wallets: Vec<Pubkey>,
    pub reward_range: RewardRange,
    pub rules: EligibilityRules,
    pub busy_window: Duration,
}

impl Default for DistributorSettings {
    fn default() -> Self {
        Self {
            priority_wallets: Vec::new(),
            reward_range: RewardRange::default(),
            rules: EligibilityRules::default(),
            busy_window: Duration::seconds(DEFAULT_BUSY_WINDOW_SECS),
        }
    }
}

pub struct Distributor {
    store: Arc<dyn RecordStore>,
    chain: Arc<dyn ChainClient>,
    guard: ConcurrencyGuard,
    payout: PayoutExecutor,
    audit: AuditRecorder,
    settings: DistributorSettings,
    rng: Mutex<StdRng>,
}

impl Distributor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        chain: Arc<dyn ChainClient>,
        payout: PayoutExecutor,
        audit: AuditRecorder,
        settings: DistributorSettings,
    ) -> Self {
        let guard = ConcurrencyGuard::with_busy_window(store.clone(), settings.busy_window);
        Self {
            store,
            chain,
            guard,
            payout,
            audit,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic draws
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub async fn run(&self) -> TriggerResponse {
        self.run_at(Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> TriggerResponse {
        let logger = RunLogger::new();
        let timer = Timer::new();

        let mut config = match load_token_config(self.store.as_ref()).await {
            Ok(TokenConfigState::Active(config)) => config,
            Ok(TokenConfigState::Paused { reason }) => {
                metrics().record_skip("paused");
                logger.log_skipped("paused", &reason);
                return TriggerResponse::skipped(format!("Distribution paused: {reason}"));
            }
            Err(e) => {
                metrics().record_skip("misconfigured");
                logger.error(&e.to_string());
                return TriggerResponse::misconfigured(e.to_string());
            }
        };
        config.exclude_all(self.payout.wallets().controlled_addresses());
        logger.log_trigger(&config.mint);

        let lease = match self.guard.try_acquire(now, config.flip_interval_seconds).await {
            Ok(lease) => lease,
            Err(GuardError::Refused(refusal)) => {
                let reason = match refusal {
                    GuardRefusal::Busy { .. } => "busy",
                    GuardRefusal::Cooldown { .. } => "cooldown",
                };
                metrics().record_skip(reason);
                logger.log_skipped(reason, &refusal.to_string());
                return TriggerResponse::skipped(refusal.to_string());
            }
            Err(e @ GuardError::IntervalOutOfRange(_)) => {
                metrics().record_skip("misconfigured");
                logger.error(&e.to_string());
                return TriggerResponse::misconfigured(e.to_string());
            }
            Err(GuardError::Store(e)) => {
                logger.error(&e.to_string());
                return TriggerResponse::failed(e.to_string(), None);
            }
        };

        let (band, amount) = {
            let mut rng = self.rng.lock();
            let draw: f64 = rng.gen();
            let amount = self.settings.reward_range.draw(&mut *rng);
            let band = Band::from_draw(draw);
            logger.log_draw(draw, band.label(), amount);
            (band, amount)
        };

        let record = match lease
            .open_record(self.store.as_ref(), band.outcome(), amount)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                logger.error(&e.to_string());
                return TriggerResponse::failed(e.to_string(), None);
            }
        };
        let record_id = record.id;
        metrics().runs_started.inc();
        metrics().record_outcome(band.outcome().to_string().as_str());

        let terminal = match self.execute(&logger, band, amount, &config).await {
            Ok(terminal) => terminal,
            Err(e) => {
                if matches!(e, DistributionError::Safety(_)) {
                    metrics().safety_violations.inc();
                }
                if e.is_critical() {
                    logger.critical(&e.to_string());
                } else {
                    logger.error(&e.to_string());
                }
                Terminal::Failed {
                    error: e.to_string(),
                }
            }
        };

        let finalized = match self.audit.finalize(record, terminal).await {
            Ok(record) => record,
            Err(e) => {
                logger.critical(&format!("Failed to finalize record {record_id}: {e}"));
                return TriggerResponse::failed(e.to_string(), Some(record_id));
            }
        };

        match finalized.status {
            RecordStatus::Completed => metrics().runs_completed.inc(),
            _ => metrics().runs_failed.inc(),
        }
        timer.observe_duration(&metrics().run_latency);
        logger.log_finalized(&finalized, (timer.elapsed_secs() * 1000.0) as u64);

        TriggerResponse::from_record(&finalized)
    }

    async fn execute(
        &self,
        logger: &RunLogger,
        band: Band,
        amount: RewardAmount,
        config: &TokenConfig,
    ) -> Result<Terminal, DistributionError> {
        if band == Band::Burn {
            info!(%amount, burn_address = %config.burn_address, "Burn recorded for manual execution, no transfer issued");
            return Ok(Terminal::Completed {
                recipient: None,
                tx_hash: None,
            });
        }

        let holders = fetch_holders(self.chain.as_ref(), config, &self.settings.rules).await?;
        logger.log_holders(holders.len());

        let outcome = {
            let mut rng = self.rng.lock();
            select_recipient(band, &self.settings.priority_wallets, &holders, &mut *rng)?
        };
        validate_selection(&outcome, config, &holders, &self.settings.rules)?;

        let Outcome::Holder { recipient, path } = outcome else {
            return Err(SafetyViolation::MissingRecipient.into());
        };
        logger.log_selection(&recipient, path.label());

        let mode = self.payout.mode_for(amount);
        let receipt = self.payout.payout(recipient, amount, mode).await?;

        Ok(Terminal::Completed {
            recipient: Some(recipient.to_string()),
            tx_hash: receipt.final_signature().map(|s| s.to_string()),
        })
    }
}
