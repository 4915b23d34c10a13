//! Market data adapters: USD prices and exchange quotes
//!
//! Both sit behind traits so the cache, scheduler and tests can swap the
//! HTTP clients for in-process fakes.

pub mod coingecko;
pub mod jupiter;

pub use coingecko::CoinGeckoClient;
pub use jupiter::JupiterClient;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Result of one price lookup, total over the requested ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceBatch {
    /// USD price per asset id; 0.0 means unknown
    pub prices: HashMap<String, f64>,
    /// False when any upstream call failed and some ids were zeroed as a result
    pub healthy: bool,
}

impl PriceBatch {
    pub fn price(&self, asset_id: &str) -> f64 {
        self.prices.get(asset_id).copied().unwrap_or(0.0)
    }
}

/// Source of current USD prices. Never fails: unpriceable ids come back as 0.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_prices(&self, asset_ids: &[String]) -> PriceBatch;
}

/// Parameters for an exact-in swap quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Input amount in the input token's atomic units
    pub amount_atoms: u64,
    pub slippage_bps: u16,
}

/// Quote returned by the exchange aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Expected output in the output token's atomic units
    pub output_amount_atoms: u64,
    pub price_impact_pct: Option<f64>,
}

/// Quote failures, propagated to the caller unretried
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Quote request failed: {0}")]
    Transport(String),
    #[error("Quote API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse quote: {0}")]
    Parse(String),
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError>;
}
