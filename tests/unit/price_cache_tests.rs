//! Price cache tests
//!
//! Tests TTL freshness, batching of missing ids into one feed call,
//! and that unknown (zero) prices are never cached.

use crate::support::FakePriceFeed;
use dca_sentinel::constants::mints;
use dca_sentinel::metrics::MetricsState;
use dca_sentinel::price_cache::PriceCache;
use std::sync::Arc;
use std::time::Duration;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// FRESHNESS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fresh_prices_do_not_hit_the_feed() {
    let feed = Arc::new(FakePriceFeed::new().with_price(mints::SOL, 150.0));
    let cache = PriceCache::with_ttl(feed.clone(), Duration::from_secs(30));

    assert_eq!(cache.get_price(mints::SOL).await, 150.0);
    assert_eq!(feed.calls(), 1);

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(cache.get_price(mints::SOL).await, 150.0);
    assert_eq!(feed.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_prices_are_refetched_once() {
    let feed = Arc::new(FakePriceFeed::new().with_price(mints::SOL, 150.0));
    let cache = PriceCache::with_ttl(feed.clone(), Duration::from_secs(30));

    cache.get_price(mints::SOL).await;
    feed.set_price(mints::SOL, 160.0);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(cache.stats().stale_entries, 1);

    assert_eq!(cache.get_price(mints::SOL).await, 160.0);
    assert_eq!(feed.calls(), 2);
    assert_eq!(cache.get_price(mints::SOL).await, 160.0);
    assert_eq!(feed.calls(), 2);
}

#[tokio::test]
async fn test_zero_ttl_always_fetches() {
    let feed = Arc::new(FakePriceFeed::new().with_price(mints::SOL, 150.0));
    let cache = PriceCache::with_ttl(feed.clone(), Duration::ZERO);

    for _ in 0..3 {
        cache.get_price(mints::SOL).await;
    }
    assert_eq!(feed.calls(), 3);
}

// =============================================================================
// BATCHING
// =============================================================================

#[tokio::test]
async fn test_only_missing_ids_are_fetched_in_one_batch() {
    let feed = Arc::new(
        FakePriceFeed::new()
            .with_price(mints::SOL, 150.0)
            .with_price(mints::USDC, 1.0)
            .with_price(mints::JUP, 0.8),
    );
    let cache = PriceCache::new(feed.clone());

    cache.get_price(mints::SOL).await;

    let prices = cache
        .get_prices(&ids(&[mints::SOL, mints::USDC, mints::JUP, mints::USDC]))
        .await;

    assert_eq!(prices.len(), 3);
    assert_eq!(prices[mints::SOL], 150.0);
    assert_eq!(prices[mints::USDC], 1.0);
    assert_eq!(prices[mints::JUP], 0.8);

    assert_eq!(feed.calls(), 2);
    let mut second = feed.requested()[1].clone();
    second.sort();
    let mut expected = ids(&[mints::USDC, mints::JUP]);
    expected.sort();
    assert_eq!(second, expected);
}

#[tokio::test]
async fn test_empty_request_skips_the_feed() {
    let feed = Arc::new(FakePriceFeed::new());
    let cache = PriceCache::new(feed.clone());

    assert!(cache.get_prices(&[]).await.is_empty());
    assert_eq!(feed.calls(), 0);
}

// =============================================================================
// UNKNOWN PRICES
// =============================================================================

#[tokio::test]
async fn test_zero_price_is_returned_but_not_cached() {
    let feed = Arc::new(FakePriceFeed::new());
    let cache = PriceCache::new(feed.clone());

    assert_eq!(cache.get_price(mints::BONK).await, 0.0);
    assert_eq!(cache.stats().total_entries, 0);

    feed.set_price(mints::BONK, 0.00002);
    assert_eq!(cache.get_price(mints::BONK).await, 0.00002);
    assert_eq!(feed.calls(), 2);
    assert_eq!(cache.stats().total_entries, 1);
}

#[tokio::test]
async fn test_unhealthy_feed_is_reported() {
    let metrics = Arc::new(MetricsState::new());
    let feed = Arc::new(FakePriceFeed::new().with_price(mints::SOL, 150.0));
    let cache = PriceCache::new(feed.clone()).with_metrics(metrics.clone());

    assert!(cache.last_fetch_healthy());

    feed.set_healthy(false);
    cache.get_price(mints::SOL).await;
    assert!(!cache.last_fetch_healthy());
    assert_eq!(metrics.price_feed_healthy.get(), 0);

    feed.set_healthy(true);
    cache.get_price(mints::USDC).await;
    assert!(cache.last_fetch_healthy());
    assert_eq!(metrics.price_feed_healthy.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_prune_and_clear() {
    let feed = Arc::new(
        FakePriceFeed::new()
            .with_price(mints::SOL, 150.0)
            .with_price(mints::USDC, 1.0),
    );
    let cache = PriceCache::with_ttl(feed.clone(), Duration::from_secs(30));

    cache.get_price(mints::SOL).await;
    tokio::time::advance(Duration::from_secs(20)).await;
    cache.get_price(mints::USDC).await;
    tokio::time::advance(Duration::from_secs(15)).await;

    assert_eq!(cache.prune_expired(), 1);
    let stats = cache.stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.fresh_entries, 1);

    cache.clear();
    assert_eq!(cache.stats().total_entries, 0);
}
