//! Portfolio valuation: aggregated balances x cached prices -> ranked holdings

use crate::constants::{self, mints};
use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::price_cache::PriceCache;
use crate::wallet::{AggregatedHoldings, WalletAggregator, WalletBalances};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One valued line of a portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub asset_id: String,
    pub symbol: String,
    pub amount: f64,
    /// USD; 0 when unknown
    pub price: f64,
    pub value: f64,
    /// Share of total value, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    /// Sorted by value descending, then asset id ascending
    pub holdings: Vec<Holding>,
    pub total_value: f64,
    /// SOL price, always looked up even when no SOL is held
    pub native_price: f64,
    pub wallet_count: usize,
    pub wallets: Vec<WalletBalances>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PortfolioView {
    /// User has no wallets linked
    Empty,
    Valued(Portfolio),
}

/// Price ids needed to value `aggregated`: every held token plus the native asset
pub fn price_ids(aggregated: &AggregatedHoldings) -> Vec<String> {
    let mut ids: Vec<String> = aggregated.token_totals.keys().cloned().collect();
    if !aggregated.token_totals.contains_key(mints::SOL) {
        ids.push(mints::SOL.to_string());
    }
    ids
}

/// Pure valuation step
pub fn build_portfolio(aggregated: &AggregatedHoldings, prices: &HashMap<String, f64>) -> Portfolio {
    let price_of = |id: &str| prices.get(id).copied().filter(|p| p.is_finite()).unwrap_or(0.0);

    let mut amounts: BTreeMap<&str, f64> = aggregated
        .token_totals
        .iter()
        .map(|(id, total)| (id.as_str(), total.amount))
        .collect();
    if aggregated.total_native > 0.0 {
        // Native SOL and wrapped SOL share a line
        *amounts.entry(mints::SOL).or_insert(0.0) += aggregated.total_native;
    }

    let mut holdings: Vec<Holding> = amounts
        .into_iter()
        .map(|(id, amount)| {
            let price = price_of(id);
            Holding {
                asset_id: id.to_string(),
                symbol: constants::symbol_for(id),
                amount,
                price,
                value: amount * price,
                percentage: 0.0,
            }
        })
        .collect();

    let total_value: f64 = holdings.iter().map(|h| h.value).sum();
    if total_value > 0.0 {
        for holding in &mut holdings {
            holding.percentage = holding.value / total_value * 100.0;
        }
    }

    holdings.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.asset_id.cmp(&b.asset_id))
    });

    Portfolio {
        holdings,
        total_value,
        native_price: price_of(mints::SOL),
        wallet_count: aggregated.per_wallet.len(),
        wallets: aggregated.per_wallet.clone(),
    }
}

/// Values a user's linked wallets
pub struct PortfolioEngine {
    pool: DbPool,
    aggregator: Arc<WalletAggregator>,
    prices: Arc<PriceCache>,
}

impl PortfolioEngine {
    pub fn new(pool: DbPool, aggregator: Arc<WalletAggregator>, prices: Arc<PriceCache>) -> Self {
        Self {
            pool,
            aggregator,
            prices,
        }
    }

    pub async fn valuate(&self, user_id: i64) -> AppResult<PortfolioView> {
        let wallets = db::get_user_wallets(&self.pool, user_id).await?;
        if wallets.is_empty() {
            return Ok(PortfolioView::Empty);
        }

        let addresses: Vec<String> = wallets.into_iter().map(|w| w.address).collect();
        let aggregated = self.aggregator.aggregate(&addresses).await?;

        let prices = self.prices.get_prices(&price_ids(&aggregated)).await;

        tracing::debug!(
            user_id,
            wallets = addresses.len(),
            assets = prices.len(),
            "Valuing portfolio"
        );

        Ok(PortfolioView::Valued(build_portfolio(&aggregated, &prices)))
    }
}
