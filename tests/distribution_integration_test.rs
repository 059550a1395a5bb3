//! Integration test for the distribution job through the public API
//!
//! Wires a `Distributor` from its parts the way the binary does, with an
//! in-memory store and a scripted chain.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::Arc;

use holder_lottery::audit::AuditRecorder;
use holder_lottery::chain::{ChainClient, ChainError};
use holder_lottery::payout::{PayoutExecutor, PayoutSettings};
use holder_lottery::store::{MemoryStore, RecordStore, TokenConfigRow};
use holder_lottery::types::{RunStatus, TokenHolder};
use holder_lottery::wallet::WalletManager;
use holder_lottery::{DistributionOutcome, Distributor, DistributorSettings, RecordStatus};

/// Chain with a fixed holder list and a generous funding balance
struct ScriptedChain {
    holders: Vec<TokenHolder>,
    sent: Mutex<Vec<(Pubkey, Pubkey, u64)>>,
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn get_balance(&self, _address: &Pubkey) -> Result<u64, ChainError> {
        Ok(10_000_000_000)
    }

    async fn get_token_holders(&self, _mint: &Pubkey) -> Result<Vec<TokenHolder>, ChainError> {
        Ok(self.holders.clone())
    }

    async fn transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, ChainError> {
        self.sent.lock().push((from.pubkey(), *to, lamports));
        Ok(Signature::new_unique())
    }
}

fn token_row() -> TokenConfigRow {
    TokenConfigRow {
        mint: Keypair::new().pubkey().to_string(),
        burn_address: Keypair::new().pubkey().to_string(),
        excluded_wallets: Vec::new(),
        flip_interval_seconds: 3_600,
        is_active: true,
        paused: false,
        pause_reason: None,
    }
}

#[tokio::test]
async fn test_hourly_schedule_produces_one_record_per_interval() {
    let whale = Pubkey::new_unique();
    let minnow = Pubkey::new_unique();
    let chain = Arc::new(ScriptedChain {
        holders: vec![
            TokenHolder::new(whale, 80_000_000.0),
            TokenHolder::new(minnow, 1_500.0),
        ],
        sent: Mutex::new(Vec::new()),
    });

    let store = MemoryStore::with_token_config(token_row());
    let shared: Arc<dyn RecordStore> = Arc::new(store.clone());
    let payout = PayoutExecutor::new(
        chain.clone(),
        WalletManager::new(Keypair::new(), Vec::new()),
        PayoutSettings::default(),
    );
    let distributor = Distributor::new(
        shared.clone(),
        chain.clone(),
        payout,
        AuditRecorder::new(shared),
        DistributorSettings::default(),
    )
    .with_rng_seed(2024);

    let start = Utc::now();
    let mut completed = 0;
    for hour in 0..24 {
        let at = start + Duration::hours(hour);

        let response = distributor.run_at(at).await;
        assert_ne!(response.status, RunStatus::Skipped, "hour {hour}");
        if response.status == RunStatus::Completed {
            completed += 1;
        }

        // Inside the interval nothing runs
        let early = distributor.run_at(at + Duration::minutes(30)).await;
        assert_eq!(early.status, RunStatus::Skipped);
    }
    assert_eq!(completed, 24);

    let records = store.recent_records(100).await.unwrap();
    assert_eq!(records.len(), 24);
    assert!(records.iter().all(|r| r.status == RecordStatus::Completed));

    // The whale is over the cap, so every holder reward went to the minnow
    let holder_rewards = records
        .iter()
        .filter(|r| r.result == DistributionOutcome::Holder)
        .count();
    let sent = chain.sent.lock().clone();
    assert_eq!(sent.len(), holder_rewards);
    assert!(sent.iter().all(|(_, to, _)| *to == minnow));
    assert!(sent
        .iter()
        .all(|(_, _, lamports)| (5_000_000..=10_000_000).contains(lamports)));
}

#[tokio::test]
async fn test_response_json_shape() {
    let chain = Arc::new(ScriptedChain {
        holders: vec![TokenHolder::new(Pubkey::new_unique(), 10.0)],
        sent: Mutex::new(Vec::new()),
    });
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::with_token_config(token_row()));
    let payout = PayoutExecutor::new(
        chain.clone(),
        WalletManager::new(Keypair::new(), Vec::new()),
        PayoutSettings::default(),
    );
    let distributor = Distributor::new(
        store.clone(),
        chain,
        payout,
        AuditRecorder::new(store),
        DistributorSettings::default(),
    );

    let response = distributor.run().await;
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "completed");
    assert!(json["recordId"].is_string());
    assert!(json.get("error").is_none());

    let skipped = serde_json::to_value(distributor.run().await).unwrap();
    assert_eq!(skipped["success"], false);
    assert_eq!(skipped["status"], "skipped");
    assert!(skipped.get("recordId").is_none());
}
