//! Configuration management for DCA Sentinel
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Health/metrics server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Solana RPC configuration
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Price feed and cache configuration
    #[serde(default)]
    pub prices: PricesConfig,
    /// Jupiter quote API configuration
    #[serde(default)]
    pub jupiter: JupiterConfig,
    /// Alert monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Per-user limits and defaults
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Notification configuration
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/sentinel.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Solana RPC configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
    /// Retry policy for balance lookups
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_rpc_timeout() -> u64 {
    15
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff for transient RPC failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled each time
    #[serde(default = "default_retry_base_delay")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay
    #[serde(default = "default_retry_max_delay")]
    pub max_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay(),
            max_delay_ms: default_retry_max_delay(),
        }
    }
}

/// Price feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    /// CoinGecko API base URL
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
    /// Optional CoinGecko demo/pro API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// How long a fetched price stays fresh
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_price_timeout")]
    pub timeout_secs: u64,
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_cache_ttl() -> u64 {
    30
}

fn default_price_timeout() -> u64 {
    10
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            coingecko_url: default_coingecko_url(),
            api_key: None,
            cache_ttl_secs: default_cache_ttl(),
            timeout_secs: default_price_timeout(),
        }
    }
}

/// Jupiter API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JupiterConfig {
    /// Jupiter swap API base URL
    #[serde(default = "default_jupiter_api_url")]
    pub api_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_quote_timeout")]
    pub timeout_secs: u64,
}

fn default_jupiter_api_url() -> String {
    "https://api.jup.ag/swap/v1".to_string()
}

fn default_quote_timeout() -> u64 {
    15
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            api_url: default_jupiter_api_url(),
            timeout_secs: default_quote_timeout(),
        }
    }
}

/// Alert monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between alert checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Per-user limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_wallets")]
    pub max_wallets_per_user: u32,
    #[serde(default = "default_max_alerts")]
    pub max_active_alerts_per_user: u32,
    /// Slippage applied to strategies created without one
    #[serde(default = "default_slippage_bps")]
    pub default_slippage_bps: u16,
}

fn default_max_wallets() -> u32 {
    5
}

fn default_max_alerts() -> u32 {
    20
}

fn default_slippage_bps() -> u16 {
    50
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_wallets_per_user: default_max_wallets(),
            max_active_alerts_per_user: default_max_alerts(),
            default_slippage_bps: default_slippage_bps(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationsConfig {
    /// Telegram notification settings
    #[serde(default)]
    pub telegram: TelegramNotificationConfig,
}

/// Telegram-specific notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramNotificationConfig {
    /// Whether Telegram notifications are enabled
    #[serde(default)]
    pub enabled: bool,
    /// Bot token (from environment: SENTINEL_NOTIFICATIONS__TELEGRAM__BOT_TOKEN)
    #[serde(default)]
    pub bot_token: Option<SecretString>,
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramNotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            api_url: default_telegram_api_url(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SENTINEL_*)
    /// 2. config/config.yaml
    /// 3. config.yaml
    /// 4. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/sentinel.db")?
            .set_default("database.max_connections", 5)?
            .set_default("rpc.url", "https://api.mainnet-beta.solana.com")?
            .set_default("monitor.poll_interval_secs", 60)?
            .set_default("prices.cache_ttl_secs", 30)?
            // Load from config files (lower priority)
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // SENTINEL_MONITOR__POLL_INTERVAL_SECS=30 -> monitor.poll_interval_secs = 30
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.is_empty() {
            return Err(ConfigError::Message("RPC URL must be set".to_string()));
        }

        if self.prices.cache_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "prices.cache_ttl_secs must be greater than 0".to_string(),
            ));
        }

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "monitor.poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.rpc.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "rpc.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.rpc.retry.base_delay_ms > self.rpc.retry.max_delay_ms {
            return Err(ConfigError::Message(
                "rpc.retry.base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }

        if self.limits.default_slippage_bps > 10_000 {
            return Err(ConfigError::Message(
                "limits.default_slippage_bps must be at most 10000".to_string(),
            ));
        }

        let telegram = &self.notifications.telegram;
        let has_token = telegram
            .bot_token
            .as_ref()
            .map(|t| !t.expose_secret().is_empty())
            .unwrap_or(false);
        if telegram.enabled && !has_token {
            return Err(ConfigError::Message(
                "Telegram is enabled but SENTINEL_NOTIFICATIONS__TELEGRAM__BOT_TOKEN is not set"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

impl PricesConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl JupiterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
