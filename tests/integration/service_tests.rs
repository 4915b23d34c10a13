//! Investor Service Integration Tests
//!
//! Tests the user-facing actions over a temp database with fake market,
//! balance and notification adapters: limits, validation, ownership
//! scoping, scheduler coupling and portfolio valuation.

use crate::support::{create_test_db, new_strategy, wallet, FakeBalances, FakePriceFeed, FakeQuotes, RecordingNotifier};
use dca_sentinel::config::LimitsConfig;
use dca_sentinel::constants::mints;
use dca_sentinel::engine::DcaScheduler;
use dca_sentinel::error::AppError;
use dca_sentinel::models::{AlertCondition, NewStrategy, StrategyStatus};
use dca_sentinel::portfolio::{PortfolioEngine, PortfolioView};
use dca_sentinel::price_cache::PriceCache;
use dca_sentinel::service::InvestorService;
use dca_sentinel::wallet::WalletAggregator;
use dca_sentinel::DbPool;
use std::sync::Arc;
use tempfile::TempDir;

const WALLET_A: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
const WALLET_B: &str = "HN7cABqLq46Es1jh92dQQisAq662SmxELLLsHHe4YWrH";
const WALLET_C: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

struct Harness {
    service: InvestorService,
    scheduler: Arc<DcaScheduler>,
    feed: Arc<FakePriceFeed>,
    pool: DbPool,
    _dir: TempDir,
}

async fn harness_with(limits: LimitsConfig, balances: FakeBalances) -> Harness {
    let (pool, dir) = create_test_db().await;
    let feed = Arc::new(
        FakePriceFeed::new()
            .with_price(mints::SOL, 150.0)
            .with_price(mints::USDC, 1.0),
    );
    let prices = Arc::new(PriceCache::new(feed.clone()));
    let scheduler = Arc::new(DcaScheduler::new(
        pool.clone(),
        Arc::new(FakeQuotes::returning(1_000_000)),
        Arc::new(RecordingNotifier::new()),
    ));
    let aggregator = Arc::new(WalletAggregator::new(Arc::new(balances)));
    let portfolio = Arc::new(PortfolioEngine::new(pool.clone(), aggregator, prices.clone()));

    let service = InvestorService::new(pool.clone(), limits, prices, scheduler.clone(), portfolio);

    Harness {
        service,
        scheduler,
        feed,
        pool,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(LimitsConfig::default(), FakeBalances::default()).await
}

// =============================================================================
// USERS & WALLETS
// =============================================================================

#[tokio::test]
async fn test_register_user_rejects_blank_handle() {
    let h = harness().await;
    assert!(matches!(
        h.service.register_user("  ", None).await,
        Err(AppError::Validation(_))
    ));
    let user = h.service.register_user(" 123 ", Some("sam")).await.unwrap();
    assert_eq!(user.handle, "123");
}

#[tokio::test]
async fn test_wallet_validation_duplicates_and_cap() {
    let limits = LimitsConfig {
        max_wallets_per_user: 2,
        ..Default::default()
    };
    let h = harness_with(limits, FakeBalances::default()).await;
    let user = h.service.register_user("1", None).await.unwrap();

    assert!(matches!(
        h.service.add_wallet(&user, "not-a-wallet", None).await,
        Err(AppError::Validation(_))
    ));

    h.service.add_wallet(&user, WALLET_A, Some("main")).await.unwrap();
    assert!(matches!(
        h.service.add_wallet(&user, WALLET_A, None).await,
        Err(AppError::Duplicate(_))
    ));

    h.service.add_wallet(&user, WALLET_B, None).await.unwrap();
    let over = h.service.add_wallet(&user, WALLET_C, None).await;
    assert!(matches!(over, Err(AppError::LimitExceeded(_))));
    assert_eq!(over.unwrap_err().reason(), "limit_exceeded");

    h.service.remove_wallet(&user, WALLET_A).await.unwrap();
    assert!(matches!(
        h.service.remove_wallet(&user, WALLET_A).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(h.service.list_wallets(&user).await.unwrap().len(), 1);
}

// =============================================================================
// ALERTS
// =============================================================================

#[tokio::test]
async fn test_create_alert_validates_and_canonicalizes() {
    let h = harness().await;
    let user = h.service.register_user("1", None).await.unwrap();

    assert!(matches!(
        h.service.create_alert(&user, "DOGE", AlertCondition::Above, 1.0).await,
        Err(AppError::UnknownToken(_))
    ));
    for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            h.service.create_alert(&user, "SOL", AlertCondition::Above, bad).await,
            Err(AppError::Validation(_))
        ));
    }

    let alert = h
        .service
        .create_alert(&user, "sol", AlertCondition::Below, 120.0)
        .await
        .unwrap();
    assert_eq!(alert.asset_symbol, "SOL");
    assert_eq!(alert.asset_id, mints::SOL);

    let by_mint = h
        .service
        .create_alert(&user, mints::JUP, AlertCondition::Above, 2.0)
        .await
        .unwrap();
    assert_eq!(by_mint.asset_symbol, "JUP");

    assert_eq!(h.service.list_alerts(&user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_active_alert_cap_and_owner_scoped_delete() {
    let limits = LimitsConfig {
        max_active_alerts_per_user: 1,
        ..Default::default()
    };
    let h = harness_with(limits, FakeBalances::default()).await;
    let alice = h.service.register_user("1", None).await.unwrap();
    let bob = h.service.register_user("2", None).await.unwrap();

    let alert = h
        .service
        .create_alert(&alice, "SOL", AlertCondition::Above, 200.0)
        .await
        .unwrap();
    assert!(matches!(
        h.service.create_alert(&alice, "SOL", AlertCondition::Below, 50.0).await,
        Err(AppError::LimitExceeded(_))
    ));

    assert!(matches!(
        h.service.delete_alert(&bob, alert.id).await,
        Err(AppError::NotFound(_))
    ));
    h.service.delete_alert(&alice, alert.id).await.unwrap();

    h.service
        .create_alert(&alice, "SOL", AlertCondition::Below, 50.0)
        .await
        .unwrap();
}

// =============================================================================
// STRATEGIES
// =============================================================================

#[tokio::test]
async fn test_create_strategy_persists_and_schedules() {
    let h = harness().await;
    let user = h.service.register_user("1", None).await.unwrap();

    let strategy = h
        .service
        .create_strategy(&user, new_strategy("sol", 50.0, "0  9 * * 1"))
        .await
        .unwrap();

    assert_eq!(strategy.source_asset, "USDC");
    assert_eq!(strategy.target_asset, "SOL");
    assert_eq!(strategy.schedule, "0 9 * * 1");
    assert_eq!(strategy.slippage_bps, 50);
    assert_eq!(strategy.status, StrategyStatus::Active);
    assert!(h.scheduler.is_scheduled(strategy.id));
}

#[tokio::test]
async fn test_create_strategy_rejects_bad_input() {
    let h = harness().await;
    let user = h.service.register_user("1", None).await.unwrap();

    let cases = [
        new_strategy("USDC", 10.0, "0 9 * * 1"),
        new_strategy("SOL", 0.0, "0 9 * * 1"),
        new_strategy("SOL", -1.0, "0 9 * * 1"),
        new_strategy("SOL", 10.0, "weekly"),
        NewStrategy {
            slippage_bps: Some(10_001),
            ..new_strategy("SOL", 10.0, "0 9 * * 1")
        },
    ];
    for case in cases {
        assert!(
            matches!(h.service.create_strategy(&user, case.clone()).await, Err(AppError::Validation(_))),
            "expected validation error for {:?}",
            case
        );
    }

    assert!(matches!(
        h.service.create_strategy(&user, new_strategy("DOGE", 10.0, "0 9 * * 1")).await,
        Err(AppError::UnknownToken(_))
    ));
    assert!(h.service.list_strategies(&user).await.unwrap().is_empty());
    assert_eq!(h.scheduler.scheduled_count(), 0);
}

#[tokio::test]
async fn test_pause_and_resume_are_owner_scoped() {
    let h = harness().await;
    let alice = h.service.register_user("1", None).await.unwrap();
    let bob = h.service.register_user("2", None).await.unwrap();
    let strategy = h
        .service
        .create_strategy(&alice, new_strategy("JUP", 20.0, "0 12 * * *"))
        .await
        .unwrap();

    assert!(matches!(
        h.service.pause_strategy(&bob, strategy.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(h.scheduler.is_scheduled(strategy.id));

    let paused = h.service.pause_strategy(&alice, strategy.id).await.unwrap();
    assert_eq!(paused.status, StrategyStatus::Paused);
    assert!(!h.scheduler.is_scheduled(strategy.id));

    // Pausing twice is harmless
    h.service.pause_strategy(&alice, strategy.id).await.unwrap();

    let resumed = h.service.resume_strategy(&alice, strategy.id).await.unwrap();
    assert_eq!(resumed.status, StrategyStatus::Active);
    assert!(h.scheduler.is_scheduled(strategy.id));
}

#[tokio::test]
async fn test_terminal_strategies_cannot_resume() {
    let h = harness().await;
    let user = h.service.register_user("1", None).await.unwrap();
    let strategy = h
        .service
        .create_strategy(&user, new_strategy("SOL", 20.0, "0 12 * * *"))
        .await
        .unwrap();
    dca_sentinel::db::update_strategy_status(&h.pool, strategy.id, StrategyStatus::Completed)
        .await
        .unwrap();

    assert!(matches!(
        h.service.resume_strategy(&user, strategy.id).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        h.service.pause_strategy(&user, strategy.id).await,
        Err(AppError::Validation(_))
    ));
}

// =============================================================================
// MARKET & PORTFOLIO
// =============================================================================

#[tokio::test]
async fn test_price_lookup_and_market_overview() {
    let h = harness().await;

    assert_eq!(h.service.price_of("sol").await.unwrap(), 150.0);
    assert!(matches!(
        h.service.price_of("DOGE").await,
        Err(AppError::UnknownToken(_))
    ));

    let overview = h.service.market_overview().await;
    let sol = overview.iter().find(|q| q.symbol == "SOL").unwrap();
    let bonk = overview.iter().find(|q| q.symbol == "BONK").unwrap();
    assert_eq!(sol.price, 150.0);
    assert_eq!(bonk.price, 0.0);
    // SOL was still fresh from price_of
    assert_eq!(h.feed.calls(), 2);
}

#[tokio::test]
async fn test_portfolio_without_wallets_is_empty() {
    let h = harness().await;
    let user = h.service.register_user("1", None).await.unwrap();

    assert_eq!(h.service.portfolio(&user).await.unwrap(), PortfolioView::Empty);
}

#[tokio::test]
async fn test_portfolio_values_all_wallets() {
    let balances = FakeBalances::new(vec![
        wallet(WALLET_A, 5.0, &[]),
        wallet(WALLET_B, 0.0, &[(mints::USDC, 100.0, 6)]),
    ]);
    let h = harness_with(LimitsConfig::default(), balances).await;
    let user = h.service.register_user("1", None).await.unwrap();
    h.service.add_wallet(&user, WALLET_A, None).await.unwrap();
    h.service.add_wallet(&user, WALLET_B, None).await.unwrap();

    let PortfolioView::Valued(portfolio) = h.service.portfolio(&user).await.unwrap() else {
        panic!("expected a valued portfolio");
    };

    assert_eq!(portfolio.wallet_count, 2);
    assert!((portfolio.total_value - 850.0).abs() < 1e-9);
    assert_eq!(portfolio.holdings[0].symbol, "SOL");
    assert!((portfolio.holdings[0].percentage - 88.235).abs() < 0.01);
}

#[tokio::test]
async fn test_portfolio_fails_when_a_wallet_lookup_fails() {
    let balances = FakeBalances::new(vec![wallet(WALLET_A, 1.0, &[])]);
    let h = harness_with(LimitsConfig::default(), balances).await;
    let user = h.service.register_user("1", None).await.unwrap();
    h.service.add_wallet(&user, WALLET_A, None).await.unwrap();
    h.service.add_wallet(&user, WALLET_C, None).await.unwrap();

    let err = h.service.portfolio(&user).await.unwrap_err();
    assert!(matches!(err, AppError::Aggregation(_)));
    assert_eq!(err.reason(), "balance_unavailable");
}

#[tokio::test]
async fn test_recent_transactions_after_execution() {
    let h = harness().await;
    let user = h.service.register_user("1", None).await.unwrap();
    let strategy = h
        .service
        .create_strategy(&user, new_strategy("JUP", 20.0, "0 12 * * *"))
        .await
        .unwrap();

    h.scheduler.execute(&strategy).await;

    let recent = h.service.recent_transactions(&user, 5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].strategy_id, Some(strategy.id));
}
