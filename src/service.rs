//! User-facing actions
//!
//! `InvestorService` is what a chat front-end calls. It validates input,
//! enforces per-user limits, and keeps the scheduler in step with the store.

use crate::config::LimitsConfig;
use crate::constants::{self, TOKENS};
use crate::db::{self, DbPool};
use crate::engine::DcaScheduler;
use crate::error::{AppError, AppResult};
use crate::models::{
    AlertCondition, DcaStrategy, ExecutionRecord, NewStrategy, PriceAlert, StrategyStatus, User,
    Wallet,
};
use crate::portfolio::{PortfolioEngine, PortfolioView};
use crate::price_cache::PriceCache;
use crate::schedule::CronSchedule;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Highest slippage a strategy may carry (100%)
const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// One row of the market overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub asset_id: String,
    /// USD; 0 when unknown
    pub price: f64,
}

pub struct InvestorService {
    pool: DbPool,
    limits: LimitsConfig,
    prices: Arc<PriceCache>,
    scheduler: Arc<DcaScheduler>,
    portfolio: Arc<PortfolioEngine>,
}

/// Registry spelling for known symbols, trimmed input otherwise
fn canonical_symbol(input: &str) -> String {
    let trimmed = input.trim();
    TOKENS
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(trimmed))
        .map(|t| t.symbol.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn resolve_or_unknown(symbol: &str) -> AppResult<String> {
    constants::resolve(symbol).ok_or_else(|| AppError::UnknownToken(symbol.to_string()))
}

impl InvestorService {
    pub fn new(
        pool: DbPool,
        limits: LimitsConfig,
        prices: Arc<PriceCache>,
        scheduler: Arc<DcaScheduler>,
        portfolio: Arc<PortfolioEngine>,
    ) -> Self {
        Self {
            pool,
            limits,
            prices,
            scheduler,
            portfolio,
        }
    }

    pub async fn register_user(&self, handle: &str, username: Option<&str>) -> AppResult<User> {
        if handle.trim().is_empty() {
            return Err(AppError::Validation("handle must not be empty".to_string()));
        }
        db::find_or_create_user(&self.pool, handle.trim(), username).await
    }

    // -------------------------------------------------------------------------
    // Wallets
    // -------------------------------------------------------------------------

    pub async fn add_wallet(&self, user: &User, address: &str, label: Option<&str>) -> AppResult<Wallet> {
        let address = address.trim();
        Pubkey::from_str(address)
            .map_err(|_| AppError::Validation(format!("'{}' is not a valid Solana address", address)))?;

        let count = db::count_user_wallets(&self.pool, user.id).await?;
        if count >= i64::from(self.limits.max_wallets_per_user) {
            return Err(AppError::LimitExceeded(format!(
                "at most {} wallets per user",
                self.limits.max_wallets_per_user
            )));
        }

        let wallet = db::add_wallet(&self.pool, user.id, address, label).await?;
        info!(user_id = user.id, address, "Wallet added");
        Ok(wallet)
    }

    pub async fn remove_wallet(&self, user: &User, address: &str) -> AppResult<()> {
        if !db::remove_wallet(&self.pool, user.id, address.trim()).await? {
            return Err(AppError::NotFound(format!("wallet {}", address)));
        }
        Ok(())
    }

    pub async fn list_wallets(&self, user: &User) -> AppResult<Vec<Wallet>> {
        db::get_user_wallets(&self.pool, user.id).await
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    pub async fn create_alert(
        &self,
        user: &User,
        symbol: &str,
        condition: AlertCondition,
        target_price: f64,
    ) -> AppResult<PriceAlert> {
        let asset_id = resolve_or_unknown(symbol)?;

        if !target_price.is_finite() || target_price <= 0.0 {
            return Err(AppError::Validation(format!(
                "target price must be a positive number, got {}",
                target_price
            )));
        }

        let active = db::count_user_active_alerts(&self.pool, user.id).await?;
        if active >= i64::from(self.limits.max_active_alerts_per_user) {
            return Err(AppError::LimitExceeded(format!(
                "at most {} active alerts per user",
                self.limits.max_active_alerts_per_user
            )));
        }

        let asset_symbol = constants::token_by_mint(&asset_id)
            .map(|t| t.symbol.to_string())
            .unwrap_or_else(|| canonical_symbol(symbol));

        let alert = db::create_alert(&self.pool, user.id, &asset_symbol, &asset_id, condition, target_price).await?;
        info!(user_id = user.id, alert_id = alert.id, asset = %asset_symbol, %condition, target_price, "Alert created");
        Ok(alert)
    }

    pub async fn delete_alert(&self, user: &User, alert_id: i64) -> AppResult<()> {
        if !db::delete_alert(&self.pool, user.id, alert_id).await? {
            return Err(AppError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    pub async fn list_alerts(&self, user: &User) -> AppResult<Vec<PriceAlert>> {
        db::get_user_active_alerts(&self.pool, user.id).await
    }

    // -------------------------------------------------------------------------
    // Strategies
    // -------------------------------------------------------------------------

    /// Validate, persist as active, then schedule
    pub async fn create_strategy(&self, user: &User, new: NewStrategy) -> AppResult<DcaStrategy> {
        let source = canonical_symbol(new.source_asset.as_deref().unwrap_or("USDC"));
        let target = canonical_symbol(&new.target_asset);

        let source_mint = resolve_or_unknown(&source)?;
        let target_mint = resolve_or_unknown(&target)?;
        if source_mint == target_mint {
            return Err(AppError::Validation(
                "source and target assets must differ".to_string(),
            ));
        }

        if !new.amount_per_execution.is_finite() || new.amount_per_execution <= 0.0 {
            return Err(AppError::Validation(format!(
                "amount must be a positive number, got {}",
                new.amount_per_execution
            )));
        }

        CronSchedule::parse(&new.schedule)
            .map_err(|e| AppError::Validation(format!("invalid schedule: {}", e)))?;

        let slippage_bps = new.slippage_bps.unwrap_or(self.limits.default_slippage_bps);
        if slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(AppError::Validation(format!(
                "slippage must be at most {} bps",
                MAX_SLIPPAGE_BPS
            )));
        }

        let normalized = NewStrategy {
            name: new.name.filter(|n| !n.trim().is_empty()),
            source_asset: Some(source),
            target_asset: target,
            amount_per_execution: new.amount_per_execution,
            schedule: new.schedule.split_whitespace().collect::<Vec<_>>().join(" "),
            slippage_bps: Some(slippage_bps),
        };

        let strategy = db::create_strategy(&self.pool, user.id, &normalized).await?;
        if !self.scheduler.schedule(&strategy) {
            warn!(strategy_id = strategy.id, "Strategy persisted but not scheduled");
        }
        Ok(strategy)
    }

    /// Load a strategy, treating another user's strategy as missing
    async fn owned_strategy(&self, user: &User, strategy_id: i64) -> AppResult<DcaStrategy> {
        db::get_strategy(&self.pool, strategy_id)
            .await?
            .filter(|s| s.user_id == user.id)
            .ok_or_else(|| AppError::NotFound(format!("strategy {}", strategy_id)))
    }

    async fn reload(&self, strategy_id: i64) -> AppResult<DcaStrategy> {
        db::get_strategy(&self.pool, strategy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("strategy {}", strategy_id)))
    }

    pub async fn pause_strategy(&self, user: &User, strategy_id: i64) -> AppResult<DcaStrategy> {
        let strategy = self.owned_strategy(user, strategy_id).await?;
        if !strategy.status.can_transition_to(StrategyStatus::Paused) {
            return Err(AppError::Validation(format!(
                "cannot pause a {} strategy",
                strategy.status
            )));
        }

        self.scheduler.pause(strategy_id).await?;
        self.reload(strategy_id).await
    }

    pub async fn resume_strategy(&self, user: &User, strategy_id: i64) -> AppResult<DcaStrategy> {
        let strategy = self.owned_strategy(user, strategy_id).await?;
        if !strategy.status.can_transition_to(StrategyStatus::Active) {
            return Err(AppError::Validation(format!(
                "cannot resume a {} strategy",
                strategy.status
            )));
        }

        self.scheduler.resume(&strategy).await?;
        self.reload(strategy_id).await
    }

    pub async fn list_strategies(&self, user: &User) -> AppResult<Vec<DcaStrategy>> {
        db::get_user_strategies(&self.pool, user.id).await
    }

    pub async fn recent_transactions(&self, user: &User, limit: u32) -> AppResult<Vec<ExecutionRecord>> {
        db::get_user_transactions(&self.pool, user.id, limit).await
    }

    // -------------------------------------------------------------------------
    // Market & portfolio
    // -------------------------------------------------------------------------

    pub async fn price_of(&self, symbol: &str) -> AppResult<f64> {
        let asset_id = resolve_or_unknown(symbol)?;
        Ok(self.prices.get_price(&asset_id).await)
    }

    /// Every registry token, priced in one batch
    pub async fn market_overview(&self) -> Vec<MarketQuote> {
        let ids: Vec<String> = TOKENS.iter().map(|t| t.mint.to_string()).collect();
        let prices = self.prices.get_prices(&ids).await;

        TOKENS
            .iter()
            .map(|t| MarketQuote {
                symbol: t.symbol.to_string(),
                asset_id: t.mint.to_string(),
                price: prices.get(t.mint).copied().unwrap_or(0.0),
            })
            .collect()
    }

    pub async fn portfolio(&self, user: &User) -> AppResult<PortfolioView> {
        self.portfolio.valuate(user.id).await
    }
}
