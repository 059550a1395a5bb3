//! Holder Lottery - scheduled reward distribution for token holders
//!
//! Entry point for the distribution job and its operator commands.
//!
//! ## Commands
//!
//! - `run`: execute one distribution and print the structured result
//! - `serve`: tick on a fixed interval, exposing `/metrics` and `/health`
//! - `set-token`: upsert the token configuration the job reads
//! - `history`: print recent distribution records
//! - `reconcile`: mark an orphaned `processing` record failed

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use holder_lottery::audit::AuditRecorder;
use holder_lottery::chain::{ChainClient, SolanaChain};
use holder_lottery::config::{AppConfig, Credentials, EnvCredentials};
use holder_lottery::endpoints;
use holder_lottery::notify::WebhookNotifier;
use holder_lottery::payout::PayoutExecutor;
use holder_lottery::store::{RecordStore, SledStore, TokenConfigRow};
use holder_lottery::token_config::{validate_row, TokenConfigState};
use holder_lottery::wallet::WalletManager;
use holder_lottery::Distributor;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lottery.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one distribution now
    Run,

    /// Run distributions on the configured interval until ctrl-c
    Serve,

    /// Upsert the token configuration from a TOML file
    SetToken {
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the most recent distribution records
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Mark an orphaned processing record as failed
    Reconcile {
        id: Uuid,

        #[arg(long)]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;
    info!("Holder lottery v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    let store = Arc::new(
        SledStore::open(&config.store.path)
            .with_context(|| format!("Failed to open store at {}", config.store.path))?,
    );

    let outcome = match args.command {
        Command::Run => {
            let distributor = build_distributor(&config, store.clone())?;
            let response = distributor.run().await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Serve => {
            let distributor = build_distributor(&config, store.clone())?;
            if config.monitoring.enable_metrics {
                let port = config.monitoring.metrics_port;
                info!("Starting metrics server on port {}", port);
                tokio::spawn(async move {
                    if let Err(e) = endpoints::endpoint_server(port).await {
                        error!("Metrics server error: {}", e);
                    }
                });
            }
            run_event_loop(&config, distributor).await
        }
        Command::SetToken { file } => set_token(store.as_ref(), &file).await,
        Command::History { limit } => {
            let records = store.recent_records(limit).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Command::Reconcile { id, reason } => {
            let recorder = AuditRecorder::new(store.clone());
            let record = recorder
                .reconcile(id, &reason)
                .await
                .with_context(|| format!("Failed to reconcile record {}", id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    };

    store.flush().await.context("Failed to flush store")?;
    outcome
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "holder_lottery=debug,info"
    } else {
        "holder_lottery=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with environment overrides
fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        warn!(
            "Config file '{}' not found, using defaults and environment",
            path.display()
        );
    }
    AppConfig::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Resolve secrets and wire every component of the job
fn build_distributor(config: &AppConfig, store: Arc<SledStore>) -> Result<Distributor> {
    let creds = Credentials::resolve(&EnvCredentials).context("Failed to resolve credentials")?;
    config
        .validate(creds.hops.len())
        .context("Invalid configuration")?;

    let chain: Arc<dyn ChainClient> = Arc::new(SolanaChain::new(
        &creds.rpc_url,
        config.rpc_timeout(),
        config.commitment()?,
        config.retry_policy(),
    ));

    let wallets = WalletManager::new(creds.funding, creds.hops);
    info!(
        funding = %wallets.funding_pubkey(),
        hops = wallets.hop_count(),
        "Wallets loaded"
    );

    let notifier = WebhookNotifier::new(creds.webhook_urls)?;
    info!(urls = notifier.url_count(), "Webhook notifier ready");

    let store: Arc<dyn RecordStore> = store;
    let audit = AuditRecorder::new(store.clone()).with_hook(Arc::new(notifier));
    let payout = PayoutExecutor::new(chain.clone(), wallets, config.payout_settings());

    Ok(Distributor::new(
        store,
        chain,
        payout,
        audit,
        config.distributor_settings()?,
    ))
}

async fn set_token(store: &dyn RecordStore, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let row: TokenConfigRow = toml::from_str(&content).context("Failed to parse token config")?;

    match validate_row(&row).context("Token config rejected")? {
        TokenConfigState::Active(config) => info!(
            mint = %config.mint,
            excluded = config.excluded_wallets.len(),
            "Token config valid"
        ),
        TokenConfigState::Paused { reason } => warn!(%reason, "Token config stored as paused"),
    }

    store.put_token_config(&row).await?;
    info!(mint = %row.mint, active = row.is_active, "Token config saved");
    Ok(())
}

/// Main event loop
async fn run_event_loop(config: &AppConfig, distributor: Distributor) -> Result<()> {
    info!(
        tick_secs = config.scheduler.tick_secs,
        deadline_secs = config.scheduler.run_deadline_secs,
        "Event loop started"
    );

    let deadline = Duration::from_secs(config.scheduler.run_deadline_secs);
    let mut tick = tokio::time::interval(Duration::from_secs(config.scheduler.tick_secs.max(1)));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut events = distributor.audit().subscribe();

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match tokio::time::timeout(deadline, distributor.run()).await {
                    Ok(response) => info!(
                        success = response.success,
                        status = ?response.status,
                        message = ?response.message,
                        error = ?response.error,
                        "Tick finished"
                    ),
                    // The record, if any, stays processing until reconciled
                    Err(_) => error!(deadline_secs = deadline.as_secs(), "Distribution exceeded deadline, abandoned"),
                }
            }

            Ok(record) = events.recv() => {
                info!(id = %record.id, status = %record.status, "Audit event");
            }

            // Graceful shutdown signal
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("Shutting down gracefully...");
    Ok(())
}
