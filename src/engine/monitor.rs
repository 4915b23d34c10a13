//! Price alert monitor
//!
//! A single polling loop checks every active alert against one price
//! snapshot per tick. Alerts are single-shot: each is deactivated in the
//! store before its notification is sent.

use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::metrics::MetricsState;
use crate::models::{ExecutionKind, ExecutionStatus, NewExecution, PriceAlert};
use crate::notifications::{NotificationEvent, Notifier};
use crate::price_cache::PriceCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default seconds between checks
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Summary of one monitor tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorTickReport {
    /// Active alerts loaded
    pub checked: usize,
    /// Alerts that fired and were deactivated
    pub triggered: usize,
    /// Alerts whose price was unknown
    pub skipped: usize,
    pub notify_failures: usize,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct AlertMonitor {
    pool: DbPool,
    prices: Arc<PriceCache>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    metrics: Option<Arc<MetricsState>>,
    running: Mutex<Option<RunningLoop>>,
}

impl AlertMonitor {
    pub fn new(pool: DbPool, prices: Arc<PriceCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            prices,
            notifier,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            metrics: None,
            running: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Evaluate all active alerts once. Expired cache entries are dropped first.
    pub async fn check_alerts(&self) -> AppResult<MonitorTickReport> {
        let started = Instant::now();
        let pruned = self.prices.prune_expired();
        if pruned > 0 {
            debug!(pruned, "Pruned expired prices");
        }

        let alerts = db::get_active_alerts(&self.pool).await?;
        let mut report = MonitorTickReport {
            checked: alerts.len(),
            ..Default::default()
        };

        if alerts.is_empty() {
            return Ok(report);
        }

        let ids: Vec<String> = alerts
            .iter()
            .map(|a| a.asset_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let prices = self.prices.get_prices(&ids).await;

        for alert in &alerts {
            let price = prices.get(&alert.asset_id).copied().unwrap_or(0.0);
            if price <= 0.0 {
                debug!(alert_id = alert.id, asset = %alert.asset_symbol, "No price, skipping alert");
                report.skipped += 1;
                continue;
            }

            if !alert.should_trigger(price) {
                continue;
            }

            match self.fire(alert, price).await {
                Ok(Some(delivered)) => {
                    report.triggered += 1;
                    if !delivered {
                        report.notify_failures += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(alert_id = alert.id, error = %e, "Failed to trigger alert");
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics
                .monitor_tick_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        if report.triggered > 0 {
            info!(
                checked = report.checked,
                triggered = report.triggered,
                skipped = report.skipped,
                "Alert check complete"
            );
        }

        Ok(report)
    }

    /// Deactivate, ledger, then notify. `Ok(None)` when another tick got there first;
    /// otherwise whether the notification was delivered.
    async fn fire(&self, alert: &PriceAlert, price: f64) -> AppResult<Option<bool>> {
        if !db::trigger_alert(&self.pool, alert.id).await? {
            return Ok(None);
        }

        if let Some(metrics) = &self.metrics {
            metrics.alert_triggers.inc();
        }

        let ledger = NewExecution {
            user_id: alert.user_id,
            strategy_id: None,
            kind: ExecutionKind::AlertTrigger,
            from_asset: alert.asset_symbol.clone(),
            to_asset: alert.asset_symbol.clone(),
            from_amount: 0.0,
            to_amount: None,
            price_at_execution: Some(price),
            external_ref: None,
            status: ExecutionStatus::Success,
            error_message: None,
        };
        if let Err(e) = db::record_transaction(&self.pool, &ledger).await {
            error!(alert_id = alert.id, error = %e, "Failed to record alert trigger");
        }

        let event = NotificationEvent::AlertTriggered {
            symbol: alert.asset_symbol.clone(),
            condition: alert.condition.to_string(),
            target_price: alert.target_price,
            current_price: price,
        };

        info!(
            alert_id = alert.id,
            asset = %alert.asset_symbol,
            price,
            target = alert.target_price,
            "Price alert triggered"
        );

        match self.notifier.notify(&alert.owner_handle, &event).await {
            Ok(()) => Ok(Some(true)),
            Err(e) => {
                warn!(alert_id = alert.id, error = %e, "Failed to deliver alert notification");
                if let Some(metrics) = &self.metrics {
                    metrics
                        .notification_failures
                        .with_label_values(&[event.kind()])
                        .inc();
                }
                Ok(Some(false))
            }
        }
    }

    /// Start the polling loop. The first check runs immediately.
    /// Returns false if already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let monitor = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { monitor.run(token).await });

        *running = Some(RunningLoop { cancel, handle });
        true
    }

    async fn run(&self, cancel_token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Alert monitor started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Alert monitor shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.check_alerts().await {
                        error!(error = %e, "Alert check failed");
                    }
                }
            }
        }
    }

    /// Stop the loop; an in-flight check finishes first
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished() && !r.cancel.is_cancelled())
    }
}
