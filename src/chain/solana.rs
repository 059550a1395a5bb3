//! JSON-RPC implementation of the chain collaborator

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, MemcmpEncodedBytes, RpcFilterType};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::Transaction,
};
use spl_token::solana_program::program_error::ProgramError;
use spl_token_2022::extension::StateWithExtensions;
use spl_token_2022::state::{Account as TokenAccount, Mint};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::{ChainClient, ChainError, RetryPolicy};
use crate::metrics::metrics;
use crate::types::TokenHolder;

/// Byte length of a classic SPL token account
const TOKEN_ACCOUNT_LEN: u64 = 165;

/// Program that owns a mint and all of its token accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenProgram {
    Classic,
    Token2022,
}

impl TokenProgram {
    pub fn from_owner(owner: &Pubkey) -> Option<Self> {
        if *owner == spl_token::id() {
            Some(Self::Classic)
        } else if *owner == spl_token_2022::id() {
            Some(Self::Token2022)
        } else {
            None
        }
    }

    pub fn id(self) -> Pubkey {
        match self {
            Self::Classic => spl_token::id(),
            Self::Token2022 => spl_token_2022::id(),
        }
    }

    /// Token-2022 accounts carry extensions past the base layout, so only
    /// classic accounts can be filtered by size.
    fn holder_filters(self, mint: &Pubkey) -> Vec<RpcFilterType> {
        // Offset 0 is the mint address in a token account
        let by_mint = RpcFilterType::Memcmp(Memcmp::new(
            0,
            MemcmpEncodedBytes::Bytes(mint.to_bytes().to_vec()),
        ));
        match self {
            Self::Classic => vec![RpcFilterType::DataSize(TOKEN_ACCOUNT_LEN), by_mint],
            Self::Token2022 => vec![by_mint],
        }
    }
}

/// Decode a mint account of either token program
fn decode_mint(
    mint: &Pubkey,
    owner: &Pubkey,
    data: &[u8],
) -> Result<(TokenProgram, u8), ChainError> {
    let invalid = |reason: String| ChainError::InvalidAccountData {
        account: mint.to_string(),
        reason,
    };

    let program = TokenProgram::from_owner(owner)
        .ok_or_else(|| invalid(format!("owned by {owner}, not a token program")))?;
    let state = StateWithExtensions::<Mint>::unpack(data).map_err(|e| invalid(e.to_string()))?;
    Ok((program, state.base.decimals))
}

/// Owner and raw amount of a token account, extensions ignored
fn decode_holding(data: &[u8]) -> Result<(Pubkey, u64), ProgramError> {
    let state = StateWithExtensions::<TokenAccount>::unpack(data)?;
    Ok((state.base.owner, state.base.amount))
}

pub struct SolanaChain {
    client: Arc<RpcClient>,
    endpoint: String,
    retry: RetryPolicy,
}

impl SolanaChain {
    pub fn new(
        rpc_url: &str,
        timeout: Duration,
        commitment: CommitmentConfig,
        retry: RetryPolicy,
    ) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(
            rpc_url.to_string(),
            timeout,
            commitment,
        );
        Self {
            client: Arc::new(client),
            endpoint: redact_endpoint(rpc_url),
            retry,
        }
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> ChainError {
        ChainError::from_client_error(err, &self.endpoint)
    }

    async fn mint_info(&self, mint: &Pubkey) -> Result<(TokenProgram, u8), ChainError> {
        let account = self
            .retry
            .run(move || async move {
                self.client
                    .get_account(mint)
                    .await
                    .map_err(|e| self.map_err(e))
            })
            .await?;

        decode_mint(mint, &account.owner, &account.data)
    }
}

/// Strip query strings so API keys never reach logs
fn redact_endpoint(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

#[async_trait]
impl ChainClient for SolanaChain {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
        let start = Instant::now();
        let result = self
            .retry
            .run(move || async move {
                self.client
                    .get_balance(address)
                    .await
                    .map_err(|e| self.map_err(e))
            })
            .await;
        metrics().rpc_latency.observe(start.elapsed().as_secs_f64());
        result
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn get_token_holders(&self, mint: &Pubkey) -> Result<Vec<TokenHolder>, ChainError> {
        let start = Instant::now();
        let (program, decimals) = self.mint_info(mint).await?;
        let program_id = program.id();

        let config = RpcProgramAccountsConfig {
            filters: Some(program.holder_filters(mint)),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .retry
            .run(move || {
                let config = config.clone();
                async move {
                    self.client
                        .get_program_accounts_with_config(&program_id, config)
                        .await
                        .map_err(|e| self.map_err(e))
                }
            })
            .await?;

        debug!(accounts = accounts.len(), ?program, "Fetched token accounts");

        let scale = 10f64.powi(decimals as i32);
        let mut balances: HashMap<Pubkey, u64> = HashMap::new();
        for (pubkey, account) in &accounts {
            match decode_holding(&account.data) {
                Ok((owner, amount)) if amount > 0 => {
                    *balances.entry(owner).or_default() += amount;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(account = %pubkey, error = %e, "Skipping undecodable token account");
                }
            }
        }

        let holders: Vec<TokenHolder> = balances
            .into_iter()
            .map(|(owner, raw)| TokenHolder::new(owner, raw as f64 / scale))
            .collect();

        metrics().rpc_latency.observe(start.elapsed().as_secs_f64());
        info!(holders = holders.len(), decimals, "Token holders loaded");
        Ok(holders)
    }

    #[instrument(skip_all, fields(from = %from.pubkey(), to = %to, lamports = lamports))]
    async fn transfer(
        &self,
        from: &Keypair,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, ChainError> {
        // Not retried: a resend after an ambiguous failure could pay twice
        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(|e| self.map_err(e))?;

        let ix = system_instruction::transfer(&from.pubkey(), to, lamports);
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&from.pubkey()), &[from], blockhash);

        let signature = self
            .client
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(|e| self.map_err(e))?;

        debug!(%signature, "Transfer confirmed");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_endpoint_strips_api_key() {
        assert_eq!(
            redact_endpoint("https://rpc.example.com/?api-key=secret"),
            "https://rpc.example.com/"
        );
        assert_eq!(
            redact_endpoint("https://api.mainnet-beta.solana.com"),
            "https://api.mainnet-beta.solana.com"
        );
    }

    use spl_token::solana_program::program_option::COption;
    use spl_token::solana_program::program_pack::Pack;
    use spl_token_2022::extension::{AccountType, ExtensionType};
    use spl_token_2022::state::AccountState;

    fn mint_state(decimals: u8) -> Mint {
        Mint {
            mint_authority: COption::None,
            supply: 1_000_000_000,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        }
    }

    /// Base layout padded to the account length, then the account type byte
    /// and one TLV entry.
    fn with_extension(base: &[u8], account_type: AccountType, ext: ExtensionType, value: &[u8]) -> Vec<u8> {
        let mut data = base.to_vec();
        data.resize(TokenAccount::LEN, 0);
        data.push(account_type as u8);
        data.extend_from_slice(&(ext as u16).to_le_bytes());
        data.extend_from_slice(&(value.len() as u16).to_le_bytes());
        data.extend_from_slice(value);
        data
    }

    #[test]
    fn test_decode_classic_mint() {
        let mint = Pubkey::new_unique();
        let mut data = vec![0u8; Mint::LEN];
        Mint::pack(mint_state(9), &mut data).unwrap();

        let (program, decimals) = decode_mint(&mint, &spl_token::id(), &data).unwrap();
        assert_eq!(program, TokenProgram::Classic);
        assert_eq!(decimals, 9);
    }

    #[test]
    fn test_decode_token_2022_mint_with_extension() {
        let mint = Pubkey::new_unique();
        let mut base = vec![0u8; Mint::LEN];
        Mint::pack(mint_state(6), &mut base).unwrap();
        let close_authority = Pubkey::new_unique().to_bytes();
        let data = with_extension(
            &base,
            AccountType::Mint,
            ExtensionType::MintCloseAuthority,
            &close_authority,
        );
        assert!(data.len() > TokenAccount::LEN);

        let (program, decimals) = decode_mint(&mint, &spl_token_2022::id(), &data).unwrap();
        assert_eq!(program, TokenProgram::Token2022);
        assert_eq!(decimals, 6);
        assert_eq!(program.id(), spl_token_2022::id());
    }

    #[test]
    fn test_decode_token_2022_holding_with_extension() {
        let owner = Pubkey::new_unique();
        let account = TokenAccount {
            mint: Pubkey::new_unique(),
            owner,
            amount: 42_000,
            delegate: COption::None,
            state: AccountState::Initialized,
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        };
        let mut base = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(account, &mut base).unwrap();

        // Classic layout decodes as-is
        assert_eq!(decode_holding(&base).unwrap(), (owner, 42_000));

        let data = with_extension(&base, AccountType::Account, ExtensionType::ImmutableOwner, &[]);
        assert_eq!(decode_holding(&data).unwrap(), (owner, 42_000));
    }

    #[test]
    fn test_mint_owned_by_other_program_rejected() {
        let mint = Pubkey::new_unique();
        let mut data = vec![0u8; Mint::LEN];
        Mint::pack(mint_state(6), &mut data).unwrap();

        let err = decode_mint(&mint, &Pubkey::new_unique(), &data).unwrap_err();
        assert!(matches!(err, ChainError::InvalidAccountData { .. }));
    }

    #[test]
    fn test_size_filter_only_for_classic_accounts() {
        let mint = Pubkey::new_unique();
        let classic = TokenProgram::Classic.holder_filters(&mint);
        let extended = TokenProgram::Token2022.holder_filters(&mint);
        assert_eq!(classic.len(), 2);
        assert_eq!(extended.len(), 1);
        assert!(matches!(extended[0], RpcFilterType::Memcmp(_)));
    }
}
