//! Notification delivery for DCA Sentinel
//!
//! Scheduler and monitor hand a [`NotificationEvent`] and the recipient's
//! messaging handle to a [`Notifier`]. Delivery is best effort: callers log
//! failures and carry on.

pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::config::NotificationsConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alert level for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Something the user should look at (failed purchase, price alert)
    Important,
    /// Routine confirmation
    Info,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Important => write!(f, "IMPORTANT"),
            AlertLevel::Info => write!(f, "INFO"),
        }
    }
}

/// Notification event types
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// A scheduled purchase was quoted and recorded
    DcaExecuted {
        strategy_name: String,
        amount: f64,
        source_symbol: String,
        received: f64,
        target_symbol: String,
        price: f64,
    },
    /// A scheduled purchase could not be quoted
    DcaFailed {
        strategy_name: String,
        error: String,
    },
    /// A price alert crossed its threshold
    AlertTriggered {
        symbol: String,
        condition: String,
        target_price: f64,
        current_price: f64,
    },
}

impl NotificationEvent {
    /// Get the alert level for this event
    pub fn level(&self) -> AlertLevel {
        match self {
            NotificationEvent::DcaExecuted { .. } => AlertLevel::Info,
            NotificationEvent::DcaFailed { .. } => AlertLevel::Important,
            NotificationEvent::AlertTriggered { .. } => AlertLevel::Important,
        }
    }

    /// Short machine name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::DcaExecuted { .. } => "dca_executed",
            NotificationEvent::DcaFailed { .. } => "dca_failed",
            NotificationEvent::AlertTriggered { .. } => "alert_triggered",
        }
    }

    /// Format the event as a notification message
    pub fn format_message(&self) -> String {
        match self {
            NotificationEvent::DcaExecuted {
                strategy_name,
                amount,
                source_symbol,
                received,
                target_symbol,
                price,
            } => format!(
                "✅ DCA {}: bought {:.6} {} for {:.2} {} (price {:.6})",
                strategy_name, received, target_symbol, amount, source_symbol, price
            ),
            NotificationEvent::DcaFailed {
                strategy_name,
                error,
            } => format!("❌ DCA {} failed: {}", strategy_name, error),
            NotificationEvent::AlertTriggered {
                symbol,
                condition,
                target_price,
                current_price,
            } => format!(
                "🔔 {} is now ${:.6} ({} ${:.6})",
                symbol, current_price, condition, target_price
            ),
        }
    }
}

/// Delivers events to a single recipient
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send `event` to the user identified by `recipient` (messaging handle)
    async fn notify(&self, recipient: &str, event: &NotificationEvent) -> anyhow::Result<()>;

    /// Check if the service is enabled
    fn is_enabled(&self) -> bool;
}

/// Writes notifications to the log. Used when no transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, event: &NotificationEvent) -> anyhow::Result<()> {
        tracing::info!(
            recipient,
            level = %event.level(),
            message = %event.format_message(),
            "Notification"
        );
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Telegram when enabled, log output otherwise
pub fn build_notifier(config: &NotificationsConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    if config.telegram.enabled {
        Ok(Arc::new(TelegramNotifier::new(&config.telegram)?))
    } else {
        tracing::info!("Telegram disabled, notifications go to the log");
        Ok(Arc::new(LogNotifier))
    }
}
