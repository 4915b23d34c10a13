//! Solana JSON-RPC balance source

use super::{BalanceError, BalanceSource, TokenBalance, WalletBalances};
use crate::config::RpcConfig;
use crate::constants::{programs, NATIVE_DECIMALS};
use crate::utils::{from_atomic, parse_atomic};
use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub struct SolanaRpcBalanceSource {
    rpc_client: RpcClient,
    token_program: Pubkey,
}

impl SolanaRpcBalanceSource {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            rpc_client: RpcClient::new_with_timeout(
                config.url.clone(),
                Duration::from_secs(config.timeout_secs),
            ),
            // Constant is a valid pubkey
            token_program: Pubkey::from_str(programs::SPL_TOKEN).unwrap_or_default(),
        }
    }
}

fn classify(err: ClientError) -> BalanceError {
    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
            BalanceError::Transport(err.to_string())
        }
        ClientErrorKind::SerdeJson(_) => BalanceError::Parse(err.to_string()),
        _ => BalanceError::Rpc(err.to_string()),
    }
}

/// Pull mint / amount / decimals out of a jsonParsed token account
fn parse_token_account(data: &serde_json::Value) -> Result<Option<TokenBalance>, BalanceError> {
    let info = data
        .pointer("/parsed/info")
        .ok_or_else(|| BalanceError::Parse("token account is not jsonParsed".to_string()))?;

    let mint = info
        .get("mint")
        .and_then(|m| m.as_str())
        .ok_or_else(|| BalanceError::Parse("token account missing mint".to_string()))?;

    let token_amount = info
        .get("tokenAmount")
        .ok_or_else(|| BalanceError::Parse("token account missing tokenAmount".to_string()))?;

    let atoms = token_amount
        .get("amount")
        .and_then(|a| a.as_str())
        .and_then(parse_atomic)
        .ok_or_else(|| BalanceError::Parse(format!("bad amount for mint {}", mint)))?;

    let decimals = token_amount
        .get("decimals")
        .and_then(|d| d.as_u64())
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| BalanceError::Parse(format!("bad decimals for mint {}", mint)))?;

    if atoms == 0 {
        return Ok(None);
    }

    Ok(Some(TokenBalance {
        asset_id: mint.to_string(),
        amount: from_atomic(atoms, decimals),
        decimals,
    }))
}

#[async_trait]
impl BalanceSource for SolanaRpcBalanceSource {
    async fn get_balances(&self, address: &str) -> Result<WalletBalances, BalanceError> {
        let owner = Pubkey::from_str(address)
            .map_err(|_| BalanceError::InvalidAddress(address.to_string()))?;

        let (lamports, accounts) = tokio::try_join!(
            async { self.rpc_client.get_balance(&owner).await.map_err(classify) },
            async {
                self.rpc_client
                    .get_token_accounts_by_owner(
                        &owner,
                        TokenAccountsFilter::ProgramId(self.token_program),
                    )
                    .await
                    .map_err(classify)
            },
        )?;

        let mut tokens = Vec::new();
        for keyed in accounts {
            let data = serde_json::to_value(&keyed.account.data)
                .map_err(|e| BalanceError::Parse(e.to_string()))?;
            if let Some(balance) = parse_token_account(&data)? {
                tokens.push(balance);
            }
        }

        debug!(address, token_count = tokens.len(), "Fetched wallet balances");

        Ok(WalletBalances {
            address: address.to_string(),
            native_amount: from_atomic(lamports, NATIVE_DECIMALS),
            tokens,
        })
    }
}
