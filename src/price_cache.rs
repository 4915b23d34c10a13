//! Price Cache for token prices
//!
//! Serves fresh prices from memory and sends every stale or missing id to
//! the feed in a single batch. A price of 0 means "unknown" and is returned
//! to the caller but never cached.

use crate::market::PriceFeed;
use crate::metrics::MetricsState;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default cache TTL in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Price entry in cache
#[derive(Debug, Clone, Copy)]
pub struct PriceEntry {
    /// Price in USD
    pub price_usd: f64,
    /// When this price was fetched
    pub fetched_at: Instant,
}

/// Price cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PriceCacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
}

/// Price cache shared by the monitor, valuation and action layer
pub struct PriceCache {
    feed: Arc<dyn PriceFeed>,
    /// Cached prices by asset id
    prices: RwLock<HashMap<String, PriceEntry>>,
    ttl: Duration,
    last_fetch_healthy: AtomicBool,
    metrics: Option<Arc<MetricsState>>,
}

impl PriceCache {
    /// Create a new price cache with default TTL
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self::with_ttl(feed, Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }

    /// Create with custom TTL
    pub fn with_ttl(feed: Arc<dyn PriceFeed>, ttl: Duration) -> Self {
        Self {
            feed,
            prices: RwLock::new(HashMap::new()),
            ttl,
            last_fetch_healthy: AtomicBool::new(true),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn is_fresh(&self, entry: &PriceEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) < self.ttl
    }

    /// Prices for every requested id (0.0 when unknown)
    pub async fn get_prices(&self, asset_ids: &[String]) -> HashMap<String, f64> {
        let unique: BTreeSet<&String> = asset_ids.iter().collect();
        let mut result = HashMap::with_capacity(unique.len());
        let mut missing = Vec::new();

        {
            let now = Instant::now();
            let prices = self.prices.read();
            for id in unique {
                match prices.get(id) {
                    Some(entry) if self.is_fresh(entry, now) => {
                        result.insert(id.clone(), entry.price_usd);
                    }
                    _ => missing.push(id.clone()),
                }
            }
        }

        if missing.is_empty() {
            return result;
        }

        tracing::debug!(
            cached = result.len(),
            missing = missing.len(),
            "Fetching uncached prices"
        );

        let batch = self.feed.fetch_prices(&missing).await;
        self.record_health(batch.healthy);

        let fetched_at = Instant::now();
        let mut prices = self.prices.write();
        for id in missing {
            let price = batch.price(&id);
            if price > 0.0 {
                prices.insert(
                    id.clone(),
                    PriceEntry {
                        price_usd: price,
                        fetched_at,
                    },
                );
            }
            result.insert(id, price);
        }

        result
    }

    /// Single-id convenience over [`get_prices`](Self::get_prices)
    pub async fn get_price(&self, asset_id: &str) -> f64 {
        let ids = [asset_id.to_string()];
        self.get_prices(&ids)
            .await
            .get(asset_id)
            .copied()
            .unwrap_or(0.0)
    }

    fn record_health(&self, healthy: bool) {
        if !healthy {
            tracing::warn!("Price feed degraded, some prices reported as 0");
        }
        self.last_fetch_healthy.store(healthy, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.price_feed_healthy.set(if healthy { 1 } else { 0 });
        }
    }

    /// Whether the most recent feed call reported itself healthy
    pub fn last_fetch_healthy(&self) -> bool {
        self.last_fetch_healthy.load(Ordering::Relaxed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> PriceCacheStats {
        let prices = self.prices.read();
        let now = Instant::now();
        let fresh = prices.values().filter(|e| self.is_fresh(e, now)).count();

        PriceCacheStats {
            total_entries: prices.len(),
            fresh_entries: fresh,
            stale_entries: prices.len() - fresh,
        }
    }

    /// Drop expired entries, returning how many were removed
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut prices = self.prices.write();
        let before = prices.len();
        prices.retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < self.ttl);
        before - prices.len()
    }

    pub fn clear(&self) {
        self.prices.write().clear();
    }
}
