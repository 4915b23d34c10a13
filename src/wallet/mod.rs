//! Wallet balances: the RPC-backed source, its retry wrapper, and the
//! multi-wallet aggregator.

pub mod aggregator;
pub mod retry;
pub mod rpc;

pub use aggregator::{AggregatedHoldings, AggregationError, TokenTotal, WalletAggregator};
pub use retry::{RetryPolicy, RetryingBalanceSource};
pub use rpc::SolanaRpcBalanceSource;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One SPL token holding, in UI units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBalance {
    pub asset_id: String,
    pub amount: f64,
    pub decimals: u8,
}

/// Native + token balances of a single address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletBalances {
    pub address: String,
    /// SOL, in UI units
    pub native_amount: f64,
    /// Non-zero token accounts only
    pub tokens: Vec<TokenBalance>,
}

/// Balance lookup failures
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    /// Network, HTTP status or timeout failure
    #[error("RPC transport error: {0}")]
    Transport(String),
    /// The node answered with an error
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Failed to parse RPC response: {0}")]
    Parse(String),
}

impl BalanceError {
    /// Only transport failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, BalanceError::Transport(_))
    }
}

#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn get_balances(&self, address: &str) -> Result<WalletBalances, BalanceError>;
}
