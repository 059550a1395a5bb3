//! Test Utilities Module
//!
//! Test doubles for the chain collaborator. Every transfer is recorded and
//! balances move between wallets, so tests can observe exactly which
//! transactions were issued and where funds ended up.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::chain::{ChainClient, ChainError};
use crate::types::TokenHolder;

/// A transfer observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    pub from: Pubkey,
    pub to: Pubkey,
    pub lamports: u64,
    pub signature: Signature,
}

/// Mock chain for deterministic testing. No network calls.
#[derive(Clone, Default)]
pub struct MockChain {
    holders: Arc<Mutex<Vec<TokenHolder>>>,
    balances: Arc<Mutex<HashMap<Pubkey, u64>>>,
    transfers: Arc<Mutex<Vec<TransferCall>>>,
    /// 0-based index of the transfer call that fails
    fail_transfer_at: Arc<Mutex<Option<usize>>>,
    fail_holder_fetch: Arc<Mutex<bool>>,
    transfer_attempts: Arc<AtomicUsize>,
    balance_queries: Arc<AtomicUsize>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holders(self, holders: Vec<TokenHolder>) -> Self {
        *self.holders.lock() = holders;
        self
    }

    pub fn with_balance(self, address: Pubkey, lamports: u64) -> Self {
        self.balances.lock().insert(address, lamports);
        self
    }

    /// Fail the n-th transfer call (0-based)
    pub fn failing_transfer_at(self, index: usize) -> Self {
        *self.fail_transfer_at.lock() = Some(index);
        self
    }

    pub fn failing_holder_fetch(self) -> Self {
        *self.fail_holder_fetch.lock() = true;
        self
    }

    pub fn transfers(&self) -> Vec<TransferCall> {
        self.transfers.lock().clone()
    }

    /// Transfers attempted, including failed ones
    pub fn transfer_attempts(&self) -> usize {
        self.transfer_attempts.load(Ordering::SeqCst)
    }

    pub fn balance_queries(&self) -> usize {
        self.balance_queries.load(Ordering::SeqCst)
    }

    pub fn balance_of(&self, address: &Pubkey) -> u64 {
        self.balances.lock().get(address).copied().unwrap_or(0)
    }
}

fn mock_signature(n: usize) -> Signature {
    let mut bytes = [0u8; 64];
    bytes[..8].copy_from_slice(&(n as u64 + 1).to_le_bytes());
    Signature::from(bytes)
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance_of(address))
    }

    async fn get_token_holders(&self, _mint: &Pubkey) -> Result<Vec<TokenHolder>, ChainError> {
        if *self.fail_holder_fetch.lock() {
            return Err(ChainError::Transport {
                endpoint: "mock".to_string(),
                message: "holder fetch failed".to_string(),
            });
        }
        Ok(self.holders.lock().clone())
    }

    async fn transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, ChainError> {
        let index = self.transfer_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_transfer_at.lock() == Some(index) {
            return Err(ChainError::TransactionExpired {
                endpoint: "mock".to_string(),
            });
        }

        let from_key = from.pubkey();
        let mut balances = self.balances.lock();
        let available = balances.get(&from_key).copied().unwrap_or(0);
        if available < lamports {
            return Err(ChainError::InsufficientFunds {
                endpoint: "mock".to_string(),
            });
        }
        balances.insert(from_key, available - lamports);
        *balances.entry(*to).or_default() += lamports;
        drop(balances);

        let signature = mock_signature(index);
        self.transfers.lock().push(TransferCall {
            from: from_key,
            to: *to,
            lamports,
            signature,
        });
        Ok(signature)
    }
}
