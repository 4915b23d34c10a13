//! Database module for DCA Sentinel
//!
//! Manages SQLite connection pool with WAL mode and provides
//! store operations for users, wallets, alerts, strategies and the ledger.

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    AlertCondition, DcaStrategy, ExecutionRecord, NewExecution, NewStrategy, PriceAlert,
    StrategyStatus, User, Wallet,
};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<Sqlite>;

const SCHEMA: &str = include_str!("../database/schema.sql");

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    // Ensure data directory exists
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Internal(format!("Failed to create database directory: {}", e))
            })?;
            info!("Created database directory: {:?}", parent);
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.path.display());

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        // Enable WAL mode for concurrent reads
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    info!(
        "Database pool initialized: {:?} (max {} connections)",
        config.path, config.max_connections
    );

    Ok(pool)
}

/// Apply the embedded schema. Every statement is `IF NOT EXISTS`, so this is idempotent.
pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    let without_comments: String = SCHEMA
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    // SQLite doesn't support multiple statements in one query
    for statement in without_comments.split(';') {
        let stmt = statement.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt).execute(pool).await?;
    }

    info!("Database schema applied successfully");
    Ok(())
}

/// Cheap connectivity check for the health endpoint
pub async fn ping(pool: &DbPool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Bad timestamp '{}': {}", raw, e)))
}

fn parse_optional_timestamp(raw: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// =============================================================================
// USERS & WALLETS
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    handle: String,
    username: Option<String>,
    language: String,
    created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(User {
            id: row.id,
            handle: row.handle,
            username: row.username,
            language: row.language,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Idempotent on `handle`; refreshes the username when one is supplied
pub async fn find_or_create_user(
    pool: &DbPool,
    handle: &str,
    username: Option<&str>,
) -> AppResult<User> {
    sqlx::query(
        r#"
        INSERT INTO users (handle, username) VALUES (?, ?)
        ON CONFLICT(handle) DO UPDATE SET username = COALESCE(excluded.username, users.username)
        "#,
    )
    .bind(handle)
    .bind(username)
    .execute(pool)
    .await?;

    get_user_by_handle(pool, handle)
        .await?
        .ok_or_else(|| AppError::Internal(format!("User {} vanished after upsert", handle)))
}

pub async fn get_user_by_handle(pool: &DbPool, handle: &str) -> AppResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, handle, username, language, created_at FROM users WHERE handle = ?",
    )
    .bind(handle)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    id: i64,
    user_id: i64,
    address: String,
    label: Option<String>,
    created_at: String,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = AppError;

    fn try_from(row: WalletRow) -> AppResult<Self> {
        Ok(Wallet {
            id: row.id,
            user_id: row.user_id,
            address: row.address,
            label: row.label,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Link a wallet to a user. A second insert of the same address is `Duplicate`.
pub async fn add_wallet(
    pool: &DbPool,
    user_id: i64,
    address: &str,
    label: Option<&str>,
) -> AppResult<Wallet> {
    let result = sqlx::query("INSERT INTO wallets (user_id, address, label) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(address)
        .bind(label)
        .execute(pool)
        .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Duplicate(format!("Wallet {} already added", address)))
        }
        Err(e) => return Err(e.into()),
    };

    let row: WalletRow = sqlx::query_as(
        "SELECT id, user_id, address, label, created_at FROM wallets WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get_user_wallets(pool: &DbPool, user_id: i64) -> AppResult<Vec<Wallet>> {
    let rows: Vec<WalletRow> = sqlx::query_as(
        "SELECT id, user_id, address, label, created_at FROM wallets WHERE user_id = ? ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Wallet::try_from).collect()
}

/// Returns whether a wallet was removed
pub async fn remove_wallet(pool: &DbPool, user_id: i64, address: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM wallets WHERE user_id = ? AND address = ?")
        .bind(user_id)
        .bind(address)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_user_wallets(pool: &DbPool, user_id: i64) -> AppResult<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallets WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count.0)
}

// =============================================================================
// PRICE ALERTS
// =============================================================================

const ALERT_COLUMNS: &str = "a.id, a.user_id, u.handle AS owner_handle, a.asset_symbol, \
     a.asset_id, a.condition, a.target_price, a.is_active, a.triggered_at, a.created_at";

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    user_id: i64,
    owner_handle: String,
    asset_symbol: String,
    asset_id: String,
    condition: String,
    target_price: f64,
    is_active: bool,
    triggered_at: Option<String>,
    created_at: String,
}

impl TryFrom<AlertRow> for PriceAlert {
    type Error = AppError;

    fn try_from(row: AlertRow) -> AppResult<Self> {
        Ok(PriceAlert {
            id: row.id,
            user_id: row.user_id,
            owner_handle: row.owner_handle,
            asset_symbol: row.asset_symbol,
            asset_id: row.asset_id,
            condition: AlertCondition::from_str(&row.condition).map_err(AppError::Internal)?,
            target_price: row.target_price,
            is_active: row.is_active,
            triggered_at: parse_optional_timestamp(row.triggered_at)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

pub async fn create_alert(
    pool: &DbPool,
    user_id: i64,
    asset_symbol: &str,
    asset_id: &str,
    condition: AlertCondition,
    target_price: f64,
) -> AppResult<PriceAlert> {
    let id = sqlx::query(
        r#"
        INSERT INTO price_alerts (user_id, asset_symbol, asset_id, condition, target_price)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(asset_symbol)
    .bind(asset_id)
    .bind(condition.as_str())
    .bind(target_price)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_alert(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Alert {} vanished after insert", id)))
}

pub async fn get_alert(pool: &DbPool, id: i64) -> AppResult<Option<PriceAlert>> {
    let sql = format!(
        "SELECT {} FROM price_alerts a JOIN users u ON u.id = a.user_id WHERE a.id = ?",
        ALERT_COLUMNS
    );
    let row: Option<AlertRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;

    row.map(PriceAlert::try_from).transpose()
}

/// Every active alert across all users, in one query
pub async fn get_active_alerts(pool: &DbPool) -> AppResult<Vec<PriceAlert>> {
    let sql = format!(
        "SELECT {} FROM price_alerts a JOIN users u ON u.id = a.user_id \
         WHERE a.is_active = 1 ORDER BY a.id",
        ALERT_COLUMNS
    );
    let rows: Vec<AlertRow> = sqlx::query_as(&sql).fetch_all(pool).await?;

    rows.into_iter().map(PriceAlert::try_from).collect()
}

pub async fn get_user_active_alerts(pool: &DbPool, user_id: i64) -> AppResult<Vec<PriceAlert>> {
    let sql = format!(
        "SELECT {} FROM price_alerts a JOIN users u ON u.id = a.user_id \
         WHERE a.user_id = ? AND a.is_active = 1 ORDER BY a.id",
        ALERT_COLUMNS
    );
    let rows: Vec<AlertRow> = sqlx::query_as(&sql).bind(user_id).fetch_all(pool).await?;

    rows.into_iter().map(PriceAlert::try_from).collect()
}

pub async fn count_user_active_alerts(pool: &DbPool, user_id: i64) -> AppResult<i64> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM price_alerts WHERE user_id = ? AND is_active = 1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count.0)
}

/// Deactivate an alert. Returns false if it was already inactive, so a
/// concurrent trigger can never fire the same alert twice.
pub async fn trigger_alert(pool: &DbPool, id: i64) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE price_alerts SET is_active = 0, triggered_at = ? WHERE id = ? AND is_active = 1",
    )
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Owner-scoped delete; returns whether a row was removed
pub async fn delete_alert(pool: &DbPool, user_id: i64, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM price_alerts WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// DCA STRATEGIES
// =============================================================================

const STRATEGY_COLUMNS: &str = "s.id, s.user_id, u.handle AS owner_handle, s.name, \
     s.source_asset, s.target_asset, s.amount_per_execution, s.schedule, s.slippage_bps, \
     s.status, s.last_executed_at, s.total_executed, s.total_spent, s.total_received, \
     s.created_at";

#[derive(sqlx::FromRow)]
struct StrategyRow {
    id: i64,
    user_id: i64,
    owner_handle: String,
    name: Option<String>,
    source_asset: String,
    target_asset: String,
    amount_per_execution: f64,
    schedule: String,
    slippage_bps: i64,
    status: String,
    last_executed_at: Option<String>,
    total_executed: i64,
    total_spent: f64,
    total_received: f64,
    created_at: String,
}

impl TryFrom<StrategyRow> for DcaStrategy {
    type Error = AppError;

    fn try_from(row: StrategyRow) -> AppResult<Self> {
        Ok(DcaStrategy {
            id: row.id,
            user_id: row.user_id,
            owner_handle: row.owner_handle,
            name: row.name,
            source_asset: row.source_asset,
            target_asset: row.target_asset,
            amount_per_execution: row.amount_per_execution,
            schedule: row.schedule,
            slippage_bps: u16::try_from(row.slippage_bps).map_err(|_| {
                AppError::Internal(format!("Bad slippage_bps {} on strategy {}", row.slippage_bps, row.id))
            })?,
            status: StrategyStatus::from_str(&row.status).map_err(AppError::Internal)?,
            last_executed_at: parse_optional_timestamp(row.last_executed_at)?,
            total_executed: row.total_executed,
            total_spent: row.total_spent,
            total_received: row.total_received,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Persist a strategy as `active`. Absent source/slippage fall back to USDC / 50 bps.
pub async fn create_strategy(
    pool: &DbPool,
    user_id: i64,
    new: &NewStrategy,
) -> AppResult<DcaStrategy> {
    let id = sqlx::query(
        r#"
        INSERT INTO dca_strategies
            (user_id, name, source_asset, target_asset, amount_per_execution, schedule, slippage_bps, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'active')
        "#,
    )
    .bind(user_id)
    .bind(new.name.as_deref())
    .bind(new.source_asset.as_deref().unwrap_or("USDC"))
    .bind(&new.target_asset)
    .bind(new.amount_per_execution)
    .bind(&new.schedule)
    .bind(new.slippage_bps.unwrap_or(50) as i64)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_strategy(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Strategy {} vanished after insert", id)))
}

pub async fn get_strategy(pool: &DbPool, id: i64) -> AppResult<Option<DcaStrategy>> {
    let sql = format!(
        "SELECT {} FROM dca_strategies s JOIN users u ON u.id = s.user_id WHERE s.id = ?",
        STRATEGY_COLUMNS
    );
    let row: Option<StrategyRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;

    row.map(DcaStrategy::try_from).transpose()
}

pub async fn get_user_strategies(pool: &DbPool, user_id: i64) -> AppResult<Vec<DcaStrategy>> {
    let sql = format!(
        "SELECT {} FROM dca_strategies s JOIN users u ON u.id = s.user_id \
         WHERE s.user_id = ? ORDER BY s.id",
        STRATEGY_COLUMNS
    );
    let rows: Vec<StrategyRow> = sqlx::query_as(&sql).bind(user_id).fetch_all(pool).await?;

    rows.into_iter().map(DcaStrategy::try_from).collect()
}

pub async fn get_active_strategies(pool: &DbPool) -> AppResult<Vec<DcaStrategy>> {
    let sql = format!(
        "SELECT {} FROM dca_strategies s JOIN users u ON u.id = s.user_id \
         WHERE s.status = 'active' ORDER BY s.id",
        STRATEGY_COLUMNS
    );
    let rows: Vec<StrategyRow> = sqlx::query_as(&sql).fetch_all(pool).await?;

    rows.into_iter().map(DcaStrategy::try_from).collect()
}

/// Returns whether the strategy exists
pub async fn update_strategy_status(
    pool: &DbPool,
    id: i64,
    status: StrategyStatus,
) -> AppResult<bool> {
    let result = sqlx::query("UPDATE dca_strategies SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    debug!(strategy_id = id, status = %status, "Strategy status updated");
    Ok(result.rows_affected() > 0)
}

/// Bump strategy counters and append the success ledger row atomically.
/// Returns the ledger row id.
pub async fn record_dca_success(
    pool: &DbPool,
    strategy_id: i64,
    spent: f64,
    received: f64,
    ledger: &NewExecution,
) -> AppResult<i64> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE dca_strategies
        SET total_executed = total_executed + 1,
            total_spent = total_spent + ?,
            total_received = total_received + ?,
            last_executed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(spent)
    .bind(received)
    .bind(now_rfc3339())
    .bind(strategy_id)
    .execute(&mut *tx)
    .await?;

    let id = insert_transaction(&mut tx, ledger).await?;

    tx.commit().await?;
    Ok(id)
}

// =============================================================================
// EXECUTION LEDGER
// =============================================================================

async fn insert_transaction(
    conn: &mut sqlx::SqliteConnection,
    entry: &NewExecution,
) -> AppResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, strategy_id, kind, from_asset, to_asset, from_amount, to_amount,
             price_at_execution, external_ref, status, error_message)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.strategy_id)
    .bind(entry.kind.as_str())
    .bind(&entry.from_asset)
    .bind(&entry.to_asset)
    .bind(entry.from_amount)
    .bind(entry.to_amount)
    .bind(entry.price_at_execution)
    .bind(entry.external_ref.as_deref())
    .bind(entry.status.as_str())
    .bind(entry.error_message.as_deref())
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Append a ledger row
pub async fn record_transaction(pool: &DbPool, entry: &NewExecution) -> AppResult<i64> {
    let mut conn = pool.acquire().await?;
    insert_transaction(&mut conn, entry).await
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: i64,
    user_id: i64,
    strategy_id: Option<i64>,
    kind: String,
    from_asset: String,
    to_asset: String,
    from_amount: f64,
    to_amount: Option<f64>,
    price_at_execution: Option<f64>,
    external_ref: Option<String>,
    status: String,
    error_message: Option<String>,
    created_at: String,
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = AppError;

    fn try_from(row: ExecutionRow) -> AppResult<Self> {
        Ok(ExecutionRecord {
            id: row.id,
            user_id: row.user_id,
            strategy_id: row.strategy_id,
            kind: row.kind.parse().map_err(AppError::Internal)?,
            from_asset: row.from_asset,
            to_asset: row.to_asset,
            from_amount: row.from_amount,
            to_amount: row.to_amount,
            price_at_execution: row.price_at_execution,
            external_ref: row.external_ref,
            status: row.status.parse().map_err(AppError::Internal)?,
            error_message: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

const EXECUTION_COLUMNS: &str = "id, user_id, strategy_id, kind, from_asset, to_asset, \
     from_amount, to_amount, price_at_execution, external_ref, status, error_message, created_at";

/// Most recent ledger rows for a user, newest first
pub async fn get_user_transactions(
    pool: &DbPool,
    user_id: i64,
    limit: u32,
) -> AppResult<Vec<ExecutionRecord>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        EXECUTION_COLUMNS
    );
    let rows: Vec<ExecutionRow> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(ExecutionRecord::try_from).collect()
}

/// Ledger rows produced by one strategy, oldest first
pub async fn get_strategy_transactions(
    pool: &DbPool,
    strategy_id: i64,
) -> AppResult<Vec<ExecutionRecord>> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE strategy_id = ? ORDER BY id",
        EXECUTION_COLUMNS
    );
    let rows: Vec<ExecutionRow> = sqlx::query_as(&sql).bind(strategy_id).fetch_all(pool).await?;

    rows.into_iter().map(ExecutionRecord::try_from).collect()
}
