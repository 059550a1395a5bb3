//! Holder fetcher

use tracing::{debug, info};

use crate::chain::ChainClient;
use crate::errors::DistributionError;
use crate::token_config::TokenConfig;
use crate::types::TokenHolder;

/// Regular-path eligibility cap, in token units
pub const MAX_ELIGIBLE_BALANCE: f64 = 50_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityRules {
    /// Holders above this balance never win on the regular path
    pub max_eligible_balance: f64,

    /// Drop owners that are PDAs (pools, vaults, program escrow)
    pub exclude_off_curve_owners: bool,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            max_eligible_balance: MAX_ELIGIBLE_BALANCE,
            exclude_off_curve_owners: false,
        }
    }
}

impl EligibilityRules {
    pub fn is_within_cap(&self, balance: f64) -> bool {
        balance <= self.max_eligible_balance
    }
}

/// Fetch the current holder set of the configured mint and keep eligible holders.
///
/// Fails with `NoHolders` when nothing survives the filters; the caller records
/// the failure and does not retry.
pub async fn fetch_holders(
    chain: &dyn ChainClient,
    config: &TokenConfig,
    rules: &EligibilityRules,
) -> Result<Vec<TokenHolder>, DistributionError> {
    let all = chain.get_token_holders(&config.mint).await?;
    let total = all.len();

    let eligible = filter_eligible(all, config, rules);
    info!(
        mint = %config.mint,
        total,
        eligible = eligible.len(),
        "Holder set filtered"
    );

    if eligible.is_empty() {
        return Err(DistributionError::NoHolders);
    }
    Ok(eligible)
}

pub fn filter_eligible(
    holders: Vec<TokenHolder>,
    config: &TokenConfig,
    rules: &EligibilityRules,
) -> Vec<TokenHolder> {
    holders
        .into_iter()
        .filter(|h| {
            if config.is_excluded(&h.address) {
                debug!(address = %h.address, "Excluded wallet filtered");
                return false;
            }
            if !(h.balance.is_finite() && h.balance > 0.0) {
                return false;
            }
            if !rules.is_within_cap(h.balance) {
                debug!(address = %h.address, balance = h.balance, "Holder above eligibility cap");
                return false;
            }
            !(rules.exclude_off_curve_owners && !h.address.is_on_curve())
        })
        .collect()
}
