//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;

/// Funding wallet plus the hot wallets used as intermediate hops
pub struct WalletManager {
    funding: Arc<Keypair>,
    hops: Vec<Arc<Keypair>>,
}

impl WalletManager {
    pub fn new(funding: Keypair, hops: Vec<Keypair>) -> Self {
        Self {
            funding: Arc::new(funding),
            hops: hops.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn funding_pubkey(&self) -> Pubkey {
        self.funding.pubkey()
    }

    pub fn funding(&self) -> &Keypair {
        &self.funding
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Every wallet the job controls. None of them may ever win.
    pub fn controlled_addresses(&self) -> Vec<Pubkey> {
        std::iter::once(self.funding.pubkey())
            .chain(self.hops.iter().map(|k| k.pubkey()))
            .collect()
    }

    /// `funding -> destination` with no intermediate hops
    pub fn direct_route(&self, destination: Pubkey) -> HotWalletChain {
        HotWalletChain {
            signers: vec![Arc::clone(&self.funding)],
            destination,
        }
    }

    /// `funding -> hop_1 -> ... -> hop_k -> destination`
    pub fn multi_hop_route(&self, destination: Pubkey) -> HotWalletChain {
        let signers = std::iter::once(Arc::clone(&self.funding))
            .chain(self.hops.iter().cloned())
            .collect();
        HotWalletChain {
            signers,
            destination,
        }
    }
}

impl Clone for WalletManager {
    fn clone(&self) -> Self {
        Self {
            funding: Arc::clone(&self.funding),
            hops: self.hops.clone(),
        }
    }
}

/// Ordered route `[source, hop_1, ..., hop_k, destination]`.
///
/// Every wallet but the destination signs the leg that leaves it.
pub struct HotWalletChain {
    signers: Vec<Arc<Keypair>>,
    destination: Pubkey,
}

impl HotWalletChain {
    pub fn destination(&self) -> Pubkey {
        self.destination
    }

    /// Number of transfers needed to reach the destination
    pub fn leg_count(&self) -> usize {
        self.signers.len()
    }

    pub fn intermediate_count(&self) -> usize {
        self.signers.len().saturating_sub(1)
    }

    /// Sender keypair and receiving address of each leg, in order
    pub fn legs(&self) -> impl Iterator<Item = (&Keypair, Pubkey)> + '_ {
        self.signers.iter().enumerate().map(move |(i, signer)| {
            let to = self
                .signers
                .get(i + 1)
                .map(|next| next.pubkey())
                .unwrap_or(self.destination);
            (signer.as_ref(), to)
        })
    }
}

/// Load a keypair from a Solana CLI JSON file or raw 64-byte file
pub fn keypair_from_file(path: &str) -> Result<Keypair> {
    let keypair_bytes =
        std::fs::read(path).with_context(|| format!("Failed to read keypair file: {}", path))?;

    let bytes = if keypair_bytes.len() == 64 {
        keypair_bytes
    } else {
        serde_json::from_slice::<Vec<u8>>(&keypair_bytes).context("Failed to parse keypair JSON")?
    };
    keypair_from_bytes(&bytes)
}

/// Decode a base58-encoded 64-byte secret key
pub fn keypair_from_base58(encoded: &str) -> Result<Keypair> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .context("Invalid base58 secret key")?;
    keypair_from_bytes(&bytes)
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 64 {
        anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
    }
    if bytes.iter().all(|&b| b == 0) {
        anyhow::bail!("Invalid keypair: all-zero key rejected");
    }
    Keypair::try_from(bytes).context("Invalid keypair bytes")
}
