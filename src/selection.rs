//! Selection engine
//!
//! A single uniform draw in `[0, 1)` picks the outcome band:
//!
//! | draw           | outcome | recipient                              |
//! |----------------|---------|----------------------------------------|
//! | `[0.00, 0.35)` | burn    | none                                   |
//! | `[0.35, 0.53)` | holder  | uniform pick from the priority wallets |
//! | `[0.53, 1.00)` | holder  | balance-weighted pick among holders    |
//!
//! Band boundaries belong to the upper band.

use rand::Rng;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::errors::SafetyViolation;
use crate::holders::EligibilityRules;
use crate::token_config::TokenConfig;
use crate::types::{DistributionOutcome, RewardAmount, TokenHolder};

pub const BURN_BAND_END: f64 = 0.35;
pub const PRIORITY_BAND_END: f64 = 0.53;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Burn,
    Priority,
    Weighted,
}

impl Band {
    pub fn from_draw(draw: f64) -> Self {
        if draw < BURN_BAND_END {
            Band::Burn
        } else if draw < PRIORITY_BAND_END {
            Band::Priority
        } else {
            Band::Weighted
        }
    }

    pub fn outcome(&self) -> DistributionOutcome {
        match self {
            Band::Burn => DistributionOutcome::Burn,
            Band::Priority | Band::Weighted => DistributionOutcome::Holder,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Band::Burn => "burn",
            Band::Priority => "priority",
            Band::Weighted => "weighted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPath {
    Priority,
    Weighted,
}

impl SelectionPath {
    pub fn label(&self) -> &'static str {
        match self {
            SelectionPath::Priority => "priority",
            SelectionPath::Weighted => "weighted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Burn,
    Holder {
        recipient: Pubkey,
        path: SelectionPath,
    },
}

impl Outcome {
    pub fn recipient(&self) -> Option<Pubkey> {
        match self {
            Outcome::Burn => None,
            Outcome::Holder { recipient, .. } => Some(*recipient),
        }
    }
}

/// Inclusive SOL range the reward amount is drawn from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardRange {
    pub min_sol: f64,
    pub max_sol: f64,
}

impl Default for RewardRange {
    fn default() -> Self {
        Self {
            min_sol: 0.005,
            max_sol: 0.01,
        }
    }
}

impl RewardRange {
    /// Uniform draw in `[min_sol, max_sol]`, truncated to 6 decimals
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> RewardAmount {
        let sol = rng.gen_range(self.min_sol..=self.max_sol);
        let min = RewardAmount::from_sol_truncated(self.min_sol);
        let max = RewardAmount::from_sol_truncated(self.max_sol);
        RewardAmount::from_sol_truncated(sol).clamp(min, max)
    }
}

/// Decide the full outcome for a draw.
pub fn decide<R: Rng + ?Sized>(
    draw: f64,
    priority_wallets: &[Pubkey],
    holders: &[TokenHolder],
    rng: &mut R,
) -> Result<Outcome, SafetyViolation> {
    select_recipient(Band::from_draw(draw), priority_wallets, holders, rng)
}

/// Pick the recipient for an already-drawn band
pub fn select_recipient<R: Rng + ?Sized>(
    band: Band,
    priority_wallets: &[Pubkey],
    holders: &[TokenHolder],
    rng: &mut R,
) -> Result<Outcome, SafetyViolation> {
    match band {
        Band::Burn => Ok(Outcome::Burn),
        Band::Priority if !priority_wallets.is_empty() => {
            let recipient = priority_wallets[rng.gen_range(0..priority_wallets.len())];
            debug!(%recipient, "Priority wallet selected");
            Ok(Outcome::Holder {
                recipient,
                path: SelectionPath::Priority,
            })
        }
        Band::Priority | Band::Weighted => {
            if band == Band::Priority {
                warn!("Priority band drawn with no priority wallets configured, using weighted pick");
            }
            let winner =
                weighted_pick(holders, rng.gen::<f64>()).ok_or(SafetyViolation::MissingRecipient)?;
            debug!(recipient = %winner.address, balance = winner.balance, "Weighted holder selected");
            Ok(Outcome::Holder {
                recipient: winner.address,
                path: SelectionPath::Weighted,
            })
        }
    }
}

/// Stake-weighted pick: holder `i` wins with probability `balance_i / Σ balance`.
///
/// `unit` is a uniform value in `[0, 1)`. Non-positive balances never win.
pub fn weighted_pick(holders: &[TokenHolder], unit: f64) -> Option<&TokenHolder> {
    let weight = |h: &TokenHolder| if h.balance.is_finite() && h.balance > 0.0 { h.balance } else { 0.0 };
    let total: f64 = holders.iter().map(weight).sum();
    if total <= 0.0 {
        return None;
    }

    let target = unit.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for holder in holders {
        let w = weight(holder);
        if w == 0.0 {
            continue;
        }
        cumulative += w;
        if target < cumulative {
            return Some(holder);
        }
    }

    // Float rounding at the top end
    holders.iter().rev().find(|h| weight(h) > 0.0)
}

/// Re-validate a selection before any funds move. Violations are never corrected
/// by re-selecting.
pub fn validate_selection(
    outcome: &Outcome,
    config: &TokenConfig,
    holders: &[TokenHolder],
    rules: &EligibilityRules,
) -> Result<(), SafetyViolation> {
    let Outcome::Holder { recipient, path } = outcome else {
        return Ok(());
    };

    if config.is_excluded(recipient) {
        return Err(SafetyViolation::ExcludedRecipient(*recipient));
    }

    if *path == SelectionPath::Weighted {
        let holder = holders
            .iter()
            .find(|h| h.address == *recipient)
            .ok_or(SafetyViolation::WinnerNotFound(*recipient))?;
        if !rules.is_within_cap(holder.balance) {
            return Err(SafetyViolation::CapExceeded {
                address: *recipient,
                balance: holder.balance,
                cap: rules.max_eligible_balance,
            });
        }
    }
    Ok(())
}
