//! DCA Sentinel - scheduled purchases and price alerts for Solana wallets
//!
//! Starts the DCA scheduler and alert monitor, then serves `/health` and
//! `/metrics` until SIGINT/SIGTERM.

use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use dca_sentinel::config::AppConfig;
use dca_sentinel::db;
use dca_sentinel::engine::{AlertMonitor, DcaScheduler};
use dca_sentinel::handlers::{build_router, AppState};
use dca_sentinel::market::{CoinGeckoClient, JupiterClient};
use dca_sentinel::metrics::MetricsState;
use dca_sentinel::notifications::build_notifier;
use dca_sentinel::portfolio::PortfolioEngine;
use dca_sentinel::price_cache::PriceCache;
use dca_sentinel::service::InvestorService;
use dca_sentinel::wallet::{
    RetryPolicy, RetryingBalanceSource, SolanaRpcBalanceSource, WalletAggregator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    tracing::info!("Starting DCA Sentinel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        rpc = %config.rpc.url,
        "Configuration loaded"
    );

    // Initialize database
    let db_pool = db::init_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    tracing::info!("Database initialized");

    let metrics = Arc::new(MetricsState::new());

    // Market data
    let price_feed = Arc::new(CoinGeckoClient::new(&config.prices)?);
    let price_cache = Arc::new(
        PriceCache::with_ttl(price_feed, config.prices.cache_ttl()).with_metrics(metrics.clone()),
    );
    let quotes = Arc::new(JupiterClient::new(&config.jupiter)?);
    tracing::info!(ttl_secs = config.prices.cache_ttl_secs, "Price cache initialized");

    // Balances
    let balance_source = Arc::new(RetryingBalanceSource::new(
        SolanaRpcBalanceSource::new(&config.rpc),
        RetryPolicy::from(&config.rpc.retry),
    ));
    let aggregator = Arc::new(WalletAggregator::new(balance_source));
    let portfolio = Arc::new(PortfolioEngine::new(
        db_pool.clone(),
        aggregator,
        price_cache.clone(),
    ));

    let notifier = build_notifier(&config.notifications)?;

    // DCA scheduler
    let scheduler = Arc::new(
        DcaScheduler::new(db_pool.clone(), quotes, notifier.clone()).with_metrics(metrics.clone()),
    );
    let scheduled = scheduler.init_from_store().await?;
    tracing::info!(scheduled, "DCA scheduler started");

    // Alert monitor
    let monitor = Arc::new(
        AlertMonitor::new(db_pool.clone(), price_cache.clone(), notifier)
            .with_interval(config.monitor.poll_interval())
            .with_metrics(metrics.clone()),
    );
    monitor.start();

    // Action layer for the chat front-end
    let service = Arc::new(InvestorService::new(
        db_pool.clone(),
        config.limits.clone(),
        price_cache.clone(),
        scheduler.clone(),
        portfolio,
    ));

    let app_state = Arc::new(AppState {
        db: db_pool.clone(),
        started_at: Utc::now(),
        scheduler: scheduler.clone(),
        monitor: monitor.clone(),
        price_cache,
        service,
    });
    let app = build_router(app_state, metrics);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    monitor.stop();
    tracing::info!("DCA Sentinel stopped");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dca_sentinel=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
