//! CoinGecko price client
//!
//! Tier 1 asks `/simple/price` by coin id for tokens in the registry. Tier 2
//! asks `/simple/token_price/solana` by mint address for everything else, and
//! for registry tokens whose tier-1 request failed.

use super::{PriceBatch, PriceFeed};
use crate::config::PricesConfig;
use crate::constants;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from a single CoinGecko request
#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Parse error: {0}")]
    Parse(String),
}

/// `{ "<key>": { "usd": 1.23 } }`
type SimplePriceResponse = HashMap<String, UsdQuote>;

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl CoinGeckoClient {
    pub fn new(config: &PricesConfig) -> Result<Self, PriceFeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PriceFeedError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.coingecko_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<SimplePriceResponse, PriceFeedError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key.expose_secret().as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| PriceFeedError::Http(format!("CoinGecko request failed: {}", e)))?;

        if response.status() == 429 {
            return Err(PriceFeedError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(PriceFeedError::Http(format!(
                "CoinGecko returned error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PriceFeedError::Parse(format!("Failed to parse CoinGecko response: {}", e)))
    }

    /// Tier 1: coin id -> USD price
    async fn fetch_by_coin_id(
        &self,
        coin_ids: &[&str],
    ) -> Result<HashMap<String, f64>, PriceFeedError> {
        let data = self
            .get_json(
                "/simple/price",
                &[
                    ("ids", coin_ids.join(",")),
                    ("vs_currencies", "usd".to_string()),
                ],
            )
            .await?;

        Ok(data
            .into_iter()
            .filter_map(|(id, quote)| quote.usd.map(|p| (id, p)))
            .collect())
    }

    /// Tier 2: mint address -> USD price
    async fn fetch_by_contract(
        &self,
        mints: &[String],
    ) -> Result<HashMap<String, f64>, PriceFeedError> {
        let data = self
            .get_json(
                "/simple/token_price/solana",
                &[
                    ("contract_addresses", mints.join(",")),
                    ("vs_currencies", "usd".to_string()),
                ],
            )
            .await?;

        // Keys may come back lowercased
        let mut prices = HashMap::new();
        for mint in mints {
            let quote = data.get(mint).or_else(|| {
                data.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(mint))
                    .map(|(_, v)| v)
            });
            if let Some(price) = quote.and_then(|q| q.usd) {
                prices.insert(mint.clone(), price);
            }
        }
        Ok(prices)
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoClient {
    async fn fetch_prices(&self, asset_ids: &[String]) -> PriceBatch {
        let unique: BTreeSet<&String> = asset_ids.iter().collect();
        let mut prices: HashMap<String, f64> =
            unique.iter().map(|id| ((*id).clone(), 0.0)).collect();
        let mut healthy = true;

        let mut by_coin: Vec<(&String, &'static str)> = Vec::new();
        let mut by_contract: Vec<String> = Vec::new();
        for id in unique.iter().copied() {
            match constants::coingecko_id(id) {
                Some(coin) => by_coin.push((id, coin)),
                None => by_contract.push(id.clone()),
            }
        }

        if !by_coin.is_empty() {
            let coin_ids: Vec<&str> = by_coin.iter().map(|(_, coin)| *coin).collect();
            match self.fetch_by_coin_id(&coin_ids).await {
                Ok(coin_prices) => {
                    for (mint, coin) in &by_coin {
                        if let Some(price) = coin_prices.get(*coin) {
                            prices.insert((*mint).clone(), *price);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, count = by_coin.len(), "Tier-1 price fetch failed, falling back to contract lookup");
                    healthy = false;
                    by_contract.extend(by_coin.iter().map(|(mint, _)| (*mint).clone()));
                }
            }
        }

        if !by_contract.is_empty() {
            match self.fetch_by_contract(&by_contract).await {
                Ok(contract_prices) => prices.extend(contract_prices),
                Err(e) => {
                    warn!(error = %e, count = by_contract.len(), "Contract price fetch failed");
                    healthy = false;
                }
            }
        }

        debug!(
            requested = prices.len(),
            priced = prices.values().filter(|p| **p > 0.0).count(),
            healthy,
            "Fetched prices from CoinGecko"
        );

        PriceBatch { prices, healthy }
    }
}
