//! End-to-end runs of the distribution job against the in-memory store and
//! the mock chain.
//!
//! The outcome band is random, so scenarios that need a specific band try
//! successive seeds until the band comes up.

use chrono::{Duration, Utc};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;

use crate::audit::AuditRecorder;
use crate::distributor::{Distributor, DistributorSettings};
use crate::payout::{PayoutExecutor, PayoutSettings};
use crate::store::{MemoryStore, RecordStore, TokenConfigRow};
use crate::test_utils::MockChain;
use crate::types::{
    DistributionOutcome, DistributionRecord, RecordStatus, RewardAmount, RunStatus, TokenHolder,
    TriggerResponse,
};
use crate::wallet::WalletManager;

const SOL: u64 = 1_000_000_000;
const MAX_SEEDS: u64 = 128;

fn token_row() -> TokenConfigRow {
    TokenConfigRow {
        mint: Keypair::new().pubkey().to_string(),
        burn_address: Keypair::new().pubkey().to_string(),
        excluded_wallets: Vec::new(),
        flip_interval_seconds: 300,
        is_active: true,
        paused: false,
        pause_reason: None,
    }
}

struct Scenario {
    row: TokenConfigRow,
    holders: Vec<TokenHolder>,
    hop_count: usize,
    funding_lamports: u64,
    priority_wallets: Vec<Pubkey>,
    /// Priority wallets that resolve to the funding wallet
    prioritise_funding: bool,
    multi_hop_threshold: Option<RewardAmount>,
    fail_transfer_at: Option<usize>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            row: token_row(),
            holders: vec![
                TokenHolder::new(Pubkey::new_unique(), 700.0),
                TokenHolder::new(Pubkey::new_unique(), 300.0),
            ],
            hop_count: 0,
            funding_lamports: SOL,
            priority_wallets: Vec::new(),
            prioritise_funding: false,
            multi_hop_threshold: None,
            fail_transfer_at: None,
        }
    }
}

struct Harness {
    store: MemoryStore,
    chain: MockChain,
    distributor: Distributor,
    funding: Pubkey,
    hops: Vec<Pubkey>,
}

impl Scenario {
    fn build(&self, seed: u64) -> Harness {
        let funding = Keypair::new();
        let hops: Vec<Keypair> = (0..self.hop_count).map(|_| Keypair::new()).collect();
        let funding_pk = funding.pubkey();
        let hop_pks: Vec<Pubkey> = hops.iter().map(|k| k.pubkey()).collect();

        let store = MemoryStore::with_token_config(self.row.clone());
        let mut chain = MockChain::new()
            .with_holders(self.holders.clone())
            .with_balance(funding_pk, self.funding_lamports);
        if let Some(index) = self.fail_transfer_at {
            chain = chain.failing_transfer_at(index);
        }

        let mut priority_wallets = self.priority_wallets.clone();
        if self.prioritise_funding {
            priority_wallets.push(funding_pk);
        }

        let shared_store: Arc<dyn RecordStore> = Arc::new(store.clone());
        let payout = PayoutExecutor::new(
            Arc::new(chain.clone()),
            WalletManager::new(funding, hops),
            PayoutSettings {
                multi_hop_threshold: self.multi_hop_threshold,
                ..PayoutSettings::default()
            },
        );
        let distributor = Distributor::new(
            shared_store.clone(),
            Arc::new(chain.clone()),
            payout,
            AuditRecorder::new(shared_store),
            DistributorSettings {
                priority_wallets,
                ..DistributorSettings::default()
            },
        )
        .with_rng_seed(seed);

        Harness {
            store,
            chain,
            distributor,
            funding: funding_pk,
            hops: hop_pks,
        }
    }

    /// Run fresh harnesses until one draws `outcome`
    async fn run_until(&self, outcome: DistributionOutcome) -> (Harness, TriggerResponse) {
        for seed in 0..MAX_SEEDS {
            let harness = self.build(seed);
            let response = harness.distributor.run().await;
            if response.result == Some(outcome) {
                return (harness, response);
            }
        }
        panic!("no {outcome} outcome in {MAX_SEEDS} seeds");
    }
}

async fn only_record(store: &MemoryStore) -> DistributionRecord {
    let records = store.recent_records(10).await.unwrap();
    assert_eq!(records.len(), 1, "expected exactly one record");
    records.into_iter().next().unwrap()
}

#[tokio::test]
async fn test_holder_payout_completes_with_weighted_winner() {
    let scenario = Scenario::default();
    let (h, response) = scenario.run_until(DistributionOutcome::Holder).await;

    assert!(response.success);
    assert_eq!(response.status, RunStatus::Completed);
    assert!(response.tx_hash.is_some());

    let recipient: Pubkey = response.recipient_wallet.as_ref().unwrap().parse().unwrap();
    assert!(scenario.holders.iter().any(|holder| holder.address == recipient));

    let record = only_record(&h.store).await;
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.tx_hash, response.tx_hash);
    assert!(record.finalized_at.is_some());
    assert!((5_000..=10_000).contains(&record.amount.micros()));

    let transfers = h.chain.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from, h.funding);
    assert_eq!(h.chain.balance_of(&recipient), record.amount.lamports());
}

#[tokio::test]
async fn test_burn_outcome_issues_no_transfer() {
    let (h, response) = Scenario::default()
        .run_until(DistributionOutcome::Burn)
        .await;

    assert!(response.success);
    assert!(response.tx_hash.is_none());
    assert!(response.recipient_wallet.is_none());
    assert!(response.message.unwrap().contains("manual execution"));

    let record = only_record(&h.store).await;
    assert_eq!(record.result, DistributionOutcome::Burn);
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(h.chain.transfer_attempts(), 0);
    assert_eq!(h.chain.balance_queries(), 0);
}

#[tokio::test]
async fn test_busy_trigger_creates_no_record() {
    let h = Scenario::default().build(1);
    let active = DistributionRecord::processing(
        DistributionOutcome::Holder,
        RewardAmount::from_micros(5_000),
        Utc::now() - Duration::seconds(10),
    );
    h.store.insert_record(&active).await.unwrap();

    let response = h.distributor.run().await;
    assert_eq!(response.status, RunStatus::Skipped);
    assert!(!response.success);
    assert!(response.message.unwrap().contains("already in progress"));
    assert_eq!(h.store.record_count().await, 1);
    assert_eq!(h.chain.transfer_attempts(), 0);
}

#[tokio::test]
async fn test_back_to_back_triggers_hit_cooldown() {
    let h = Scenario::default().build(3);

    let first = h.distributor.run().await;
    assert_ne!(first.status, RunStatus::Skipped);

    let second = h.distributor.run().await;
    assert_eq!(second.status, RunStatus::Skipped);
    assert!(second.message.unwrap().starts_with("Cooldown active"));
    assert_eq!(h.store.record_count().await, 1);

    // Allowed again once the flip interval has passed
    let later = h
        .distributor
        .run_at(Utc::now() + Duration::seconds(301))
        .await;
    assert_ne!(later.status, RunStatus::Skipped);
    assert_eq!(h.store.record_count().await, 2);
}

#[tokio::test]
async fn test_paused_config_is_not_run() {
    let mut row = token_row();
    row.paused = true;
    row.pause_reason = Some("Treasury top-up".to_string());
    let h = Scenario {
        row,
        ..Scenario::default()
    }
    .build(0);

    let response = h.distributor.run().await;
    assert_eq!(response.status, RunStatus::Skipped);
    assert_eq!(
        response.message.as_deref(),
        Some("Distribution paused: Treasury top-up")
    );
    assert_eq!(h.store.record_count().await, 0);
}

#[tokio::test]
async fn test_placeholder_mint_is_a_config_error_without_record() {
    let mut row = token_row();
    row.mint = "YOUR_TOKEN_MINT_ADDRESS".to_string();
    let h = Scenario {
        row,
        ..Scenario::default()
    }
    .build(0);

    let response = h.distributor.run().await;
    assert_eq!(response.status, RunStatus::Skipped);
    assert!(response.error.unwrap().contains("placeholder"));
    assert_eq!(h.store.record_count().await, 0);
}

#[tokio::test]
async fn test_oversized_flip_interval_is_a_config_error_without_record() {
    let mut row = token_row();
    row.flip_interval_seconds = 10_000_000_000_000_000;
    let h = Scenario {
        row,
        ..Scenario::default()
    }
    .build(0);

    let response = h.distributor.run().await;
    assert_eq!(response.status, RunStatus::Skipped);
    assert!(response.error.unwrap().contains("Invalid flip interval"));
    assert_eq!(h.store.record_count().await, 0);
}

#[tokio::test]
async fn test_no_holders_fails_record() {
    let scenario = Scenario {
        holders: Vec::new(),
        ..Scenario::default()
    };
    let (h, response) = scenario.run_until(DistributionOutcome::Holder).await;

    assert_eq!(response.status, RunStatus::Failed);
    assert_eq!(response.error.as_deref(), Some("No eligible holders found"));
    assert_eq!(only_record(&h.store).await.status, RecordStatus::Failed);
    assert_eq!(h.chain.transfer_attempts(), 0);
}

#[tokio::test]
async fn test_insufficient_balance_fails_before_transfer() {
    let scenario = Scenario {
        funding_lamports: 1_000,
        ..Scenario::default()
    };
    let (h, response) = scenario.run_until(DistributionOutcome::Holder).await;

    assert_eq!(response.status, RunStatus::Failed);
    assert!(response.error.unwrap().contains("Insufficient funding balance"));
    assert_eq!(h.chain.transfer_attempts(), 0);
    assert_eq!(only_record(&h.store).await.status, RecordStatus::Failed);
}

#[tokio::test]
async fn test_multi_hop_routes_through_hops_in_order() {
    let scenario = Scenario {
        hop_count: 2,
        multi_hop_threshold: Some(RewardAmount::from_micros(5_000)),
        ..Scenario::default()
    };
    let (h, response) = scenario.run_until(DistributionOutcome::Holder).await;
    assert!(response.success);

    let recipient: Pubkey = response.recipient_wallet.unwrap().parse().unwrap();
    let route: Vec<(Pubkey, Pubkey)> = h.chain.transfers().iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        route,
        vec![
            (h.funding, h.hops[0]),
            (h.hops[0], h.hops[1]),
            (h.hops[1], recipient),
        ]
    );
    assert_eq!(
        response.tx_hash,
        Some(h.chain.transfers()[2].signature.to_string())
    );
}

#[tokio::test]
async fn test_failed_hop_halts_chain_and_fails_record() {
    let scenario = Scenario {
        hop_count: 2,
        multi_hop_threshold: Some(RewardAmount::from_micros(5_000)),
        fail_transfer_at: Some(1),
        ..Scenario::default()
    };
    let (h, response) = scenario.run_until(DistributionOutcome::Holder).await;

    assert_eq!(response.status, RunStatus::Failed);
    let error = response.error.unwrap();
    assert!(error.contains("hop 2/3"), "{error}");
    assert!(error.contains(&format!("funds held at {}", h.hops[0])), "{error}");

    for holder in &scenario.holders {
        assert_eq!(h.chain.balance_of(&holder.address), 0);
    }
    assert_eq!(h.chain.transfer_attempts(), 2);

    let record = only_record(&h.store).await;
    assert_eq!(record.status, RecordStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some(error.as_str()));
}

#[tokio::test]
async fn test_controlled_wallet_never_receives_a_reward() {
    let scenario = Scenario {
        prioritise_funding: true,
        ..Scenario::default()
    };

    let mut safety_failures = 0;
    for seed in 0..MAX_SEEDS {
        let h = scenario.build(seed);
        let response = h.distributor.run().await;

        if let Some(recipient) = &response.recipient_wallet {
            assert_ne!(recipient, &h.funding.to_string());
        }
        if let Some(error) = &response.error {
            assert!(error.contains("excluded wallet"), "{error}");
            assert_eq!(h.chain.transfer_attempts(), 0);
            safety_failures += 1;
        }
    }
    assert!(safety_failures > 0, "priority band never drawn");
}

#[tokio::test]
async fn test_finalized_records_are_published() {
    let h = Scenario::default().build(5);
    let mut events = h.distributor.audit().subscribe();

    let response = h.distributor.run().await;
    let event = events.recv().await.unwrap();

    assert_eq!(Some(event.id), response.record_id);
    assert!(event.status.is_terminal());
}
