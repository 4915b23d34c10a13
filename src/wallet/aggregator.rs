//! Merges balances across all of a user's wallets

use super::{BalanceError, BalanceSource, WalletBalances};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A single wallet's lookup failed, so the whole aggregation did
#[derive(Debug, Error)]
#[error("Failed to fetch balances for wallet {address}: {source}")]
pub struct AggregationError {
    pub address: String,
    #[source]
    pub source: BalanceError,
}

/// Summed amount of one token across wallets
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenTotal {
    pub amount: f64,
    /// Taken from the first wallet that holds the token
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedHoldings {
    pub total_native: f64,
    /// Keyed by asset id
    pub token_totals: BTreeMap<String, TokenTotal>,
    /// In the order the addresses were given
    pub per_wallet: Vec<WalletBalances>,
}

pub struct WalletAggregator {
    source: Arc<dyn BalanceSource>,
}

impl WalletAggregator {
    pub fn new(source: Arc<dyn BalanceSource>) -> Self {
        Self { source }
    }

    /// One concurrent lookup per address; any failure fails the aggregate
    pub async fn aggregate(&self, addresses: &[String]) -> Result<AggregatedHoldings, AggregationError> {
        let lookups = addresses.iter().map(|address| async move {
            self.source
                .get_balances(address)
                .await
                .map_err(|source| AggregationError {
                    address: address.clone(),
                    source,
                })
        });

        let per_wallet = try_join_all(lookups).await?;
        Ok(merge(per_wallet))
    }
}

/// Sum native and per-token amounts over wallet snapshots
pub fn merge(per_wallet: Vec<WalletBalances>) -> AggregatedHoldings {
    let mut total_native = 0.0;
    let mut token_totals: BTreeMap<String, TokenTotal> = BTreeMap::new();

    for wallet in &per_wallet {
        total_native += wallet.native_amount;
        for token in &wallet.tokens {
            token_totals
                .entry(token.asset_id.clone())
                .and_modify(|total| total.amount += token.amount)
                .or_insert(TokenTotal {
                    amount: token.amount,
                    decimals: token.decimals,
                });
        }
    }

    AggregatedHoldings {
        total_native,
        token_totals,
        per_wallet,
    }
}
