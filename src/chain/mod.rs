//! Chain collaborator
//!
//! The job only needs three chain operations: a SOL balance, the holder set
//! of a mint, and a confirmed SOL transfer. `ChainClient` is the seam the
//! job is written against; `SolanaChain` is the JSON-RPC implementation.

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signature::Signature};

use crate::types::TokenHolder;

pub mod chain_errors;
pub mod retry;
pub mod solana;

pub use chain_errors::ChainError;
pub use retry::RetryPolicy;
pub use solana::SolanaChain;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// SOL balance in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainError>;

    /// Every owner with a positive balance of `mint`, aggregated per owner
    async fn get_token_holders(&self, mint: &Pubkey) -> Result<Vec<TokenHolder>, ChainError>;

    /// Transfer lamports and wait for confirmation
    async fn transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, ChainError>;
}
