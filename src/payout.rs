//! Payout executor
//!
//! Moves a holder reward from the funding wallet to the recipient, either in
//! one transfer or through the configured hot wallets. Hops are strictly
//! sequential: each leg is confirmed before the next one is submitted. A failed
//! leg halts the chain and leaves the funds at the sender of that leg; nothing
//! is rolled back.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Signature, Signer},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::chain::ChainClient;
use crate::errors::DistributionError;
use crate::metrics::metrics;
use crate::types::RewardAmount;
use crate::wallet::{HotWalletChain, WalletManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutMode {
    Direct,
    MultiHop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutSettings {
    /// Headroom the funding wallet must hold above the payout amount
    pub fee_buffer_lamports: u64,

    /// Fee forwarded along the route for each remaining leg
    pub fee_per_transfer_lamports: u64,

    /// Amounts at or above this go through the hot wallets
    pub multi_hop_threshold: Option<RewardAmount>,
}

impl Default for PayoutSettings {
    fn default() -> Self {
        Self {
            fee_buffer_lamports: 1_000_000,
            fee_per_transfer_lamports: 5_000,
            multi_hop_threshold: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub mode: PayoutMode,
    /// One confirmed signature per leg, in route order
    pub signatures: Vec<Signature>,
}

impl PayoutReceipt {
    /// Signature of the leg that reached the recipient
    pub fn final_signature(&self) -> Option<&Signature> {
        self.signatures.last()
    }
}

pub struct PayoutExecutor {
    chain: Arc<dyn ChainClient>,
    wallets: WalletManager,
    settings: PayoutSettings,
}

impl PayoutExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, wallets: WalletManager, settings: PayoutSettings) -> Self {
        Self {
            chain,
            wallets,
            settings,
        }
    }

    pub fn wallets(&self) -> &WalletManager {
        &self.wallets
    }

    /// Multi-hop when the amount reaches the threshold and hop wallets exist
    pub fn mode_for(&self, amount: RewardAmount) -> PayoutMode {
        match self.settings.multi_hop_threshold {
            Some(threshold) if amount >= threshold && self.wallets.hop_count() > 0 => {
                PayoutMode::MultiHop
            }
            _ => PayoutMode::Direct,
        }
    }

    /// Fail fast, before any transfer, if the funding wallet cannot cover
    /// `amount + fee_buffer`. Returns the observed balance.
    pub async fn preflight(&self, amount: RewardAmount) -> Result<u64, DistributionError> {
        let funding = self.wallets.funding_pubkey();
        let available = self.chain.get_balance(&funding).await?;
        let required = amount
            .lamports()
            .saturating_add(self.settings.fee_buffer_lamports);

        if available <= required {
            error!(%funding, available, required, "Funding wallet balance too low");
            return Err(DistributionError::InsufficientBalance {
                available,
                required,
            });
        }
        Ok(available)
    }

    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn payout(
        &self,
        recipient: Pubkey,
        amount: RewardAmount,
        mode: PayoutMode,
    ) -> Result<PayoutReceipt, DistributionError> {
        self.preflight(amount).await?;

        let route = match mode {
            PayoutMode::Direct => self.wallets.direct_route(recipient),
            PayoutMode::MultiHop => self.wallets.multi_hop_route(recipient),
        };

        let signatures = self.execute_route(&route, amount).await?;
        info!(
            %recipient,
            ?mode,
            legs = signatures.len(),
            "Payout delivered"
        );
        Ok(PayoutReceipt { mode, signatures })
    }

    async fn execute_route(
        &self,
        route: &HotWalletChain,
        amount: RewardAmount,
    ) -> Result<Vec<Signature>, DistributionError> {
        let total = route.leg_count();
        let fee = self.settings.fee_per_transfer_lamports;
        let mut confirmed: Vec<Signature> = Vec::with_capacity(total);

        for (index, (signer, to)) in route.legs().enumerate() {
            // Forward enough for every later leg to pay its own fee
            let remaining_legs = (total - index - 1) as u64;
            let lamports = amount
                .lamports()
                .saturating_add(fee.saturating_mul(remaining_legs));
            let from = signer.pubkey();

            let start = Instant::now();
            metrics().transfers_total.inc();
            match self.chain.transfer(signer, &to, lamports).await {
                Ok(signature) => {
                    metrics()
                        .transfer_latency
                        .observe(start.elapsed().as_secs_f64());
                    info!(
                        hop = index + 1,
                        total_hops = total,
                        %from,
                        %to,
                        lamports,
                        %signature,
                        "Transfer confirmed"
                    );
                    confirmed.push(signature);
                }
                Err(e) => {
                    metrics().transfers_failed.inc();
                    error!(
                        hop = index + 1,
                        total_hops = total,
                        %from,
                        %to,
                        error = %e,
                        "Transfer failed, halting route"
                    );
                    return Err(DistributionError::Transfer {
                        failed_hop: index + 1,
                        total_hops: total,
                        from,
                        to,
                        funds_at: from,
                        confirmed: confirmed.iter().map(|s| s.to_string()).collect(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(confirmed)
    }
}
