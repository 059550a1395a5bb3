//! Token configuration loader
//!
//! Resolves the active token row from the store and validates it. A row that
//! is flagged paused yields `TokenConfigState::Paused` instead of an error so
//! the job can report "not run" without touching the record store.

use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::errors::TokenConfigError;
use crate::store::{RecordStore, TokenConfigRow};

/// Base58 pubkeys are 32..=44 characters long
const MIN_ADDRESS_LEN: usize = 32;
const MAX_ADDRESS_LEN: usize = 44;

/// One year. Longer intervals are treated as a misconfiguration.
pub const MAX_FLIP_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

const PLACEHOLDER_MARKERS: &[&str] = &[
    "placeholder",
    "your_",
    "your-",
    "yourmint",
    "xxxx",
    "example",
    "replace",
    "todo_",
    "<",
    ">",
];

/// Program and DEX authority accounts that hold tokens on behalf of others
static KNOWN_PROGRAM_ACCOUNTS: Lazy<Vec<Pubkey>> = Lazy::new(|| {
    [
        "11111111111111111111111111111111",              // System program
        "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",   // SPL Token
        "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",   // Token-2022
        "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",  // Associated token program
        "1nc1nerator11111111111111111111111111111111",   // Incinerator
        "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8",  // Raydium AMM v4
        "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1",  // Raydium AMM authority
        "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",   // Pump.fun
        "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA",   // Pump.fun AMM
        "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc",   // Orca Whirlpool
        "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo",   // Meteora DLMM
    ]
    .iter()
    .filter_map(|s| Pubkey::from_str(s).ok())
    .collect()
});

pub fn known_program_accounts() -> &'static [Pubkey] {
    &KNOWN_PROGRAM_ACCOUNTS
}

/// Validated token configuration. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub mint: Pubkey,
    pub burn_address: Pubkey,
    pub excluded_wallets: HashSet<Pubkey>,
    pub flip_interval_seconds: u64,
}

impl TokenConfig {
    pub fn is_excluded(&self, address: &Pubkey) -> bool {
        self.excluded_wallets.contains(address)
    }

    /// Add process-level wallets (funding, hops) to the excluded set
    pub fn exclude_all(&mut self, wallets: impl IntoIterator<Item = Pubkey>) {
        self.excluded_wallets.extend(wallets);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenConfigState {
    Active(TokenConfig),
    Paused { reason: String },
}

/// Load and validate the active token configuration
pub async fn load_token_config(
    store: &dyn RecordStore,
) -> Result<TokenConfigState, TokenConfigError> {
    let row = store
        .active_token_config()
        .await
        .map_err(|e| TokenConfigError::Store(e.to_string()))?
        .ok_or(TokenConfigError::NotFound)?;

    validate_row(&row)
}

/// Validate a stored row. Placeholder or malformed rows are rejected even when paused.
pub fn validate_row(row: &TokenConfigRow) -> Result<TokenConfigState, TokenConfigError> {
    if looks_like_placeholder(&row.mint) {
        warn!(mint = %row.mint, "Rejecting placeholder token mint");
        return Err(TokenConfigError::PlaceholderMint(row.mint.clone()));
    }

    let mint = parse_address("mint", &row.mint)?;
    let burn_address = parse_address("burn", &row.burn_address)?;

    if row.flip_interval_seconds == 0 || row.flip_interval_seconds > MAX_FLIP_INTERVAL_SECS {
        return Err(TokenConfigError::InvalidFlipInterval(row.flip_interval_seconds));
    }

    if row.paused {
        let reason = row
            .pause_reason
            .clone()
            .unwrap_or_else(|| "Distribution paused".to_string());
        debug!(%mint, %reason, "Token config paused");
        return Ok(TokenConfigState::Paused { reason });
    }

    let mut excluded_wallets: HashSet<Pubkey> = row
        .excluded_wallets
        .iter()
        .map(|w| parse_address("excluded wallet", w))
        .collect::<Result<_, _>>()?;
    excluded_wallets.insert(burn_address);
    excluded_wallets.extend(known_program_accounts().iter().copied());

    Ok(TokenConfigState::Active(TokenConfig {
        mint,
        burn_address,
        excluded_wallets,
        flip_interval_seconds: row.flip_interval_seconds,
    }))
}

fn looks_like_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    // "1111...", "AAAA..." and friends
    let mut chars = trimmed.chars();
    let first = chars.next();
    if chars.all(|c| Some(c) == first) {
        return true;
    }
    // Markers only apply to text that is not already a usable address
    if Pubkey::from_str(trimmed).is_ok() {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}

fn parse_address(field: &'static str, value: &str) -> Result<Pubkey, TokenConfigError> {
    let trimmed = value.trim();
    let malformed = |reason: String| TokenConfigError::MalformedAddress {
        field,
        value: value.to_string(),
        reason,
    };

    if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&trimmed.len()) {
        return Err(malformed(format!(
            "length {} outside {}..={}",
            trimmed.len(),
            MIN_ADDRESS_LEN,
            MAX_ADDRESS_LEN
        )));
    }
    Pubkey::from_str(trimmed).map_err(|e| malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn row(mint: &str) -> TokenConfigRow {
        TokenConfigRow {
            mint: mint.to_string(),
            burn_address: Pubkey::new_unique().to_string(),
            excluded_wallets: vec![Pubkey::new_unique().to_string()],
            flip_interval_seconds: 300,
            is_active: true,
            paused: false,
            pause_reason: None,
        }
    }

    #[test]
    fn test_valid_row_includes_burn_and_programs_in_exclusions() {
        let mint = Pubkey::new_unique();
        let r = row(&mint.to_string());
        let burn = Pubkey::from_str(&r.burn_address).unwrap();

        let TokenConfigState::Active(config) = validate_row(&r).unwrap() else {
            panic!("expected active config");
        };
        assert_eq!(config.mint, mint);
        assert!(config.is_excluded(&burn));
        assert!(config.is_excluded(&spl_token::id()));
        assert_eq!(config.excluded_wallets.len(), 2 + known_program_accounts().len());
    }

    #[test]
    fn test_placeholder_mints_rejected() {
        for mint in [
            "YOUR_TOKEN_MINT_ADDRESS_HERE_PLEASE_123",
            "PLACEHOLDER",
            "<mint>",
            "11111111111111111111111111111111",
            "",
        ] {
            assert!(
                matches!(validate_row(&row(mint)), Err(TokenConfigError::PlaceholderMint(_))),
                "{mint} should be rejected as placeholder"
            );
        }
    }

    #[test]
    fn test_real_address_with_marker_letters_accepted() {
        let mint = "8RrPJojuGTHHCvfdV7oxXxXxqcfRtAXWSSNaeQ4nEB3c";
        assert!(Pubkey::from_str(mint).is_ok());

        let TokenConfigState::Active(config) = validate_row(&row(mint)).unwrap() else {
            panic!("expected active config");
        };
        assert_eq!(config.mint.to_string(), mint);
    }

    #[test]
    fn test_malformed_mint_rejected() {
        let err = validate_row(&row("abc123")).unwrap_err();
        assert!(matches!(err, TokenConfigError::MalformedAddress { field: "mint", .. }));

        // Right length, invalid base58 ('0' is not in the alphabet)
        let err = validate_row(&row("0000000000000000000000000000000000000000000A")).unwrap_err();
        assert!(matches!(err, TokenConfigError::MalformedAddress { .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut r = row(&Pubkey::new_unique().to_string());
        r.flip_interval_seconds = 0;
        assert_eq!(
            validate_row(&r).unwrap_err(),
            TokenConfigError::InvalidFlipInterval(0)
        );
    }

    #[test]
    fn test_interval_above_one_year_rejected() {
        let mut r = row(&Pubkey::new_unique().to_string());
        r.flip_interval_seconds = MAX_FLIP_INTERVAL_SECS;
        assert!(validate_row(&r).is_ok());

        r.flip_interval_seconds = 10_000_000_000_000_000;
        assert_eq!(
            validate_row(&r).unwrap_err(),
            TokenConfigError::InvalidFlipInterval(10_000_000_000_000_000)
        );
    }

    #[test]
    fn test_paused_row_yields_paused_state() {
        let mut r = row(&Pubkey::new_unique().to_string());
        r.paused = true;
        r.pause_reason = Some("maintenance".to_string());

        assert_eq!(
            validate_row(&r).unwrap(),
            TokenConfigState::Paused {
                reason: "maintenance".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_load_without_active_row() {
        let store = MemoryStore::new();
        assert_eq!(
            load_token_config(&store).await.unwrap_err(),
            TokenConfigError::NotFound
        );
    }
}
