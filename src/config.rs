//! Configuration module for the holder lottery
//!
//! Tunables come from a TOML file layered with `LOTTERY__SECTION__KEY`
//! environment overrides. Secrets are resolved separately through a
//! `CredentialProvider` once at startup and handed to components explicitly.

use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Keypair};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::chain::RetryPolicy;
use crate::distributor::DistributorSettings;
use crate::errors::ConfigError;
use crate::holders::{EligibilityRules, MAX_ELIGIBLE_BALANCE};
use crate::payout::PayoutSettings;
use crate::selection::RewardRange;
use crate::types::RewardAmount;
use crate::wallet::{keypair_from_base58, keypair_from_file};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Upper bound for `busy_window_secs` (one day)
pub const MAX_BUSY_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub distribution: DistributionConfig,
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// processed, confirmed or finalized
    pub commitment: String,

    /// Retries for read calls. Transfers are never retried.
    pub max_read_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    pub priority_wallets: Vec<String>,
    pub reward_min_sol: f64,
    pub reward_max_sol: f64,
    pub max_eligible_balance: f64,
    pub busy_window_secs: i64,
    pub fee_buffer_sol: f64,
    pub fee_per_transfer_lamports: u64,
    /// Amounts at or above this go through the hop wallets
    pub multi_hop_threshold_sol: Option<f64>,
    pub exclude_off_curve_owners: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_secs: u64,
    /// Overall deadline for one run
    pub run_deadline_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    pub enable_metrics: bool,

    /// Metrics port
    pub metrics_port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            commitment: "confirmed".to_string(),
            max_read_retries: 3,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            priority_wallets: Vec::new(),
            reward_min_sol: 0.005,
            reward_max_sol: 0.01,
            max_eligible_balance: MAX_ELIGIBLE_BALANCE,
            busy_window_secs: 60,
            fee_buffer_sol: 0.001,
            fee_per_transfer_lamports: 5_000,
            multi_hop_threshold_sol: None,
            exclude_off_curve_owners: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/lottery.sled".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            run_deadline_secs: 120,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            metrics_port: 9090,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file (optional) with `LOTTERY__` environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("LOTTERY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("distribution.priority_wallets"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Cross-field checks. `hop_count` comes from the resolved credentials.
    pub fn validate(&self, hop_count: usize) -> Result<(), ConfigError> {
        let d = &self.distribution;
        if !(d.reward_min_sol.is_finite() && d.reward_max_sol.is_finite()) {
            return Err(ConfigError::Invalid(
                "reward bounds must be finite".to_string(),
            ));
        }
        if !(d.reward_min_sol > 0.0 && d.reward_max_sol > 0.0) {
            return Err(ConfigError::Invalid(
                "reward bounds must be positive".to_string(),
            ));
        }
        if d.reward_min_sol > d.reward_max_sol {
            return Err(ConfigError::Invalid(format!(
                "reward_min_sol {} exceeds reward_max_sol {}",
                d.reward_min_sol, d.reward_max_sol
            )));
        }
        if d.busy_window_secs <= 0 || d.busy_window_secs > MAX_BUSY_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "busy_window_secs must be in 1..={MAX_BUSY_WINDOW_SECS}"
            )));
        }
        if !(d.fee_buffer_sol.is_finite() && d.fee_buffer_sol >= 0.0) {
            return Err(ConfigError::Invalid(
                "fee_buffer_sol must be a finite, non-negative amount".to_string(),
            ));
        }

        let legs = hop_count as u64 + 1;
        let fees = legs.saturating_mul(d.fee_per_transfer_lamports);
        if self.payout_settings().fee_buffer_lamports < fees {
            return Err(ConfigError::Invalid(format!(
                "fee buffer of {} SOL does not cover {} transfer fees ({} lamports)",
                d.fee_buffer_sol, legs, fees
            )));
        }

        self.priority_wallets()?;
        self.commitment()?;
        Ok(())
    }

    pub fn priority_wallets(&self) -> Result<Vec<Pubkey>, ConfigError> {
        self.distribution
            .priority_wallets
            .iter()
            .map(|w| {
                Pubkey::from_str(w.trim()).map_err(|e| {
                    ConfigError::Invalid(format!("priority wallet '{w}': {e}"))
                })
            })
            .collect()
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        match self.rpc.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(ConfigError::Invalid(format!("unknown commitment '{other}'"))),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.rpc.max_read_retries)
    }

    pub fn payout_settings(&self) -> PayoutSettings {
        let d = &self.distribution;
        PayoutSettings {
            fee_buffer_lamports: (d.fee_buffer_sol * LAMPORTS_PER_SOL).round() as u64,
            fee_per_transfer_lamports: d.fee_per_transfer_lamports,
            multi_hop_threshold: d.multi_hop_threshold_sol.map(RewardAmount::from_sol_truncated),
        }
    }

    pub fn distributor_settings(&self) -> Result<DistributorSettings, ConfigError> {
        let d = &self.distribution;
        Ok(DistributorSettings {
            priority_wallets: self.priority_wallets()?,
            reward_range: RewardRange {
                min_sol: d.reward_min_sol,
                max_sol: d.reward_max_sol,
            },
            rules: EligibilityRules {
                max_eligible_balance: d.max_eligible_balance,
                exclude_off_curve_owners: d.exclude_off_curve_owners,
            },
            busy_window: chrono::Duration::try_seconds(d.busy_window_secs).ok_or_else(|| {
                ConfigError::Invalid(format!("busy_window_secs {} out of range", d.busy_window_secs))
            })?,
        })
    }
}

/// Source of named secrets
pub trait CredentialProvider {
    fn secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

pub const RPC_URL: &str = "LOTTERY_RPC_URL";
pub const RPC_API_KEY: &str = "LOTTERY_RPC_API_KEY";
pub const FUNDING_KEY: &str = "LOTTERY_FUNDING_KEY";
pub const FUNDING_KEYPAIR_PATH: &str = "LOTTERY_FUNDING_KEYPAIR_PATH";
pub const HOP_KEYS: &str = "LOTTERY_HOP_KEYS";
pub const WEBHOOK_URLS: &str = "LOTTERY_WEBHOOK_URLS";

/// Secrets resolved once at startup
pub struct Credentials {
    pub rpc_url: String,
    pub funding: Keypair,
    pub hops: Vec<Keypair>,
    pub webhook_urls: Vec<String>,
}

impl Credentials {
    pub fn resolve(provider: &dyn CredentialProvider) -> Result<Self, ConfigError> {
        let base_url = provider
            .secret(RPC_URL)
            .ok_or(ConfigError::MissingSecret(RPC_URL))?;
        let rpc_url = match provider.secret(RPC_API_KEY) {
            Some(key) => {
                let separator = if base_url.contains('?') { '&' } else { '?' };
                format!("{base_url}{separator}api-key={}", key.trim())
            }
            None => base_url,
        };

        let funding = match (provider.secret(FUNDING_KEY), provider.secret(FUNDING_KEYPAIR_PATH)) {
            (Some(encoded), _) => {
                keypair_from_base58(&encoded).map_err(|e| ConfigError::InvalidSecret {
                    name: FUNDING_KEY,
                    reason: e.to_string(),
                })?
            }
            (None, Some(path)) => keypair_from_file(&path).map_err(|e| ConfigError::InvalidSecret {
                name: FUNDING_KEYPAIR_PATH,
                reason: e.to_string(),
            })?,
            (None, None) => return Err(ConfigError::MissingSecret(FUNDING_KEY)),
        };

        let hops = provider
            .secret(HOP_KEYS)
            .map(|keys| {
                split_list(&keys)
                    .enumerate()
                    .map(|(i, key)| {
                        keypair_from_base58(key).map_err(|e| ConfigError::InvalidSecret {
                            name: HOP_KEYS,
                            reason: format!("hop {}: {e}", i + 1),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let webhook_urls: Vec<String> = provider
            .secret(WEBHOOK_URLS)
            .map(|urls| split_list(&urls).map(str::to_string).collect())
            .unwrap_or_default();
        if webhook_urls.is_empty() {
            return Err(ConfigError::MissingSecret(WEBHOOK_URLS));
        }

        Ok(Self {
            rpc_url,
            funding,
            hops,
            webhook_urls,
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
