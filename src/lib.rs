//! DCA Sentinel Library
//!
//! Recurring DCA purchases and price alerts on Solana, backed by a
//! multi-wallet balance aggregator and a shared price cache.
//! This library exposes core modules for the binary and for testing.

pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod market;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod portfolio;
pub mod price_cache;
pub mod schedule;
pub mod service;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for tests
pub use config::AppConfig;
pub use db::DbPool;
pub use engine::{AlertMonitor, DcaScheduler, ExecutionOutcome, MonitorTickReport};
pub use error::{AppError, AppResult};
pub use market::{PriceBatch, PriceFeed, Quote, QuoteError, QuoteProvider, QuoteRequest};
pub use models::{
    AlertCondition, DcaStrategy, ExecutionKind, ExecutionRecord, ExecutionStatus, NewStrategy,
    PriceAlert, StrategyStatus, User, Wallet,
};
pub use notifications::{NotificationEvent, Notifier};
pub use portfolio::{build_portfolio, Holding, Portfolio, PortfolioEngine, PortfolioView};
pub use price_cache::PriceCache;
pub use schedule::{CronSchedule, ScheduleError};
pub use service::InvestorService;
pub use wallet::{BalanceError, BalanceSource, WalletAggregator, WalletBalances};
