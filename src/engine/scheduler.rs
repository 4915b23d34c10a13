//! DCA strategy scheduler
//!
//! One spawned task per active strategy. Each task sleeps until the next cron
//! match, reloads its strategy, executes it, and only then computes the next
//! fire time, so fires of one strategy never overlap.
//!
//! State transitions:
//! ```text
//! active --pause--> paused --resume--> active
//! ```
//! `pause` cancels the task before persisting; `resume` persists before
//! scheduling.

use crate::constants::{self, purchase_decimals};
use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::market::{QuoteProvider, QuoteRequest};
use crate::metrics::MetricsState;
use crate::models::{DcaStrategy, ExecutionKind, ExecutionStatus, NewExecution, StrategyStatus};
use crate::notifications::{NotificationEvent, Notifier};
use crate::schedule::CronSchedule;
use crate::utils::{from_atomic, to_atomic};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What a single fire did
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Quote obtained, counters and ledger updated
    Executed { received: f64, ledger_id: i64 },
    /// Quote (or bookkeeping) failed; a failed ledger row was written when possible
    Failed { error: String },
    /// Nothing was recorded
    Skipped { reason: String },
}

/// Performs one purchase. Cloned into every strategy task.
#[derive(Clone)]
struct DcaExecutor {
    pool: DbPool,
    quotes: Arc<dyn QuoteProvider>,
    notifier: Arc<dyn Notifier>,
    metrics: Option<Arc<MetricsState>>,
}

impl DcaExecutor {
    fn count(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.dca_executions.with_label_values(&[outcome]).inc();
        }
    }

    async fn notify(&self, strategy: &DcaStrategy, event: NotificationEvent) {
        if let Err(e) = self.notifier.notify(&strategy.owner_handle, &event).await {
            error!(strategy_id = strategy.id, error = %e, "Failed to send DCA notification");
            if let Some(metrics) = &self.metrics {
                metrics
                    .notification_failures
                    .with_label_values(&[event.kind()])
                    .inc();
            }
        }
    }

    async fn execute(&self, strategy: &DcaStrategy) -> ExecutionOutcome {
        let (input_mint, output_mint) = match (
            constants::resolve(&strategy.source_asset),
            constants::resolve(&strategy.target_asset),
        ) {
            (Some(input), Some(output)) => (input, output),
            _ => {
                let reason = format!(
                    "cannot resolve {} -> {}",
                    strategy.source_asset, strategy.target_asset
                );
                error!(strategy_id = strategy.id, %reason, "Skipping DCA execution");
                self.count("skipped");
                return ExecutionOutcome::Skipped { reason };
            }
        };

        let amount = strategy.amount_per_execution;
        let request = QuoteRequest {
            input_mint,
            output_mint,
            amount_atoms: to_atomic(amount, purchase_decimals(&strategy.source_asset)),
            slippage_bps: strategy.slippage_bps,
        };

        debug!(
            strategy_id = strategy.id,
            amount_atoms = request.amount_atoms,
            "Executing DCA purchase"
        );

        let quote = match self.quotes.fetch_quote(&request).await {
            Ok(quote) => quote,
            Err(e) => return self.record_failure(strategy, e.to_string()).await,
        };

        let received = from_atomic(
            quote.output_amount_atoms,
            purchase_decimals(&strategy.target_asset),
        );
        let price = (received > 0.0).then(|| amount / received);

        let ledger = NewExecution {
            user_id: strategy.user_id,
            strategy_id: Some(strategy.id),
            kind: ExecutionKind::Dca,
            from_asset: strategy.source_asset.clone(),
            to_asset: strategy.target_asset.clone(),
            from_amount: amount,
            to_amount: Some(received),
            price_at_execution: price,
            external_ref: Some(format!("sim_{}", Uuid::new_v4())),
            status: ExecutionStatus::Success,
            error_message: None,
        };

        let ledger_id = match db::record_dca_success(&self.pool, strategy.id, amount, received, &ledger).await {
            Ok(id) => id,
            Err(e) => {
                error!(strategy_id = strategy.id, error = %e, "Failed to record DCA execution");
                self.count("failed");
                return ExecutionOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        info!(
            strategy_id = strategy.id,
            amount,
            received,
            price_impact_pct = ?quote.price_impact_pct,
            "DCA executed"
        );
        self.count("success");

        self.notify(
            strategy,
            NotificationEvent::DcaExecuted {
                strategy_name: strategy.display_name(),
                amount,
                source_symbol: strategy.source_asset.clone(),
                received,
                target_symbol: strategy.target_asset.clone(),
                price: price.unwrap_or(0.0),
            },
        )
        .await;

        ExecutionOutcome::Executed {
            received,
            ledger_id,
        }
    }

    async fn record_failure(&self, strategy: &DcaStrategy, message: String) -> ExecutionOutcome {
        warn!(strategy_id = strategy.id, error = %message, "DCA quote failed");
        self.count("failed");

        let ledger = NewExecution {
            user_id: strategy.user_id,
            strategy_id: Some(strategy.id),
            kind: ExecutionKind::Dca,
            from_asset: strategy.source_asset.clone(),
            to_asset: strategy.target_asset.clone(),
            from_amount: strategy.amount_per_execution,
            to_amount: None,
            price_at_execution: None,
            external_ref: None,
            status: ExecutionStatus::Failed,
            error_message: Some(message.clone()),
        };
        if let Err(e) = db::record_transaction(&self.pool, &ledger).await {
            error!(strategy_id = strategy.id, error = %e, "Failed to record failed DCA execution");
        }

        self.notify(
            strategy,
            NotificationEvent::DcaFailed {
                strategy_name: strategy.display_name(),
                error: message.clone(),
            },
        )
        .await;

        ExecutionOutcome::Failed { error: message }
    }
}

/// Source of the current UTC time for fire-time calculations
pub type WallClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

struct ScheduledJob {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Recurring-task registry for DCA strategies
pub struct DcaScheduler {
    executor: DcaExecutor,
    jobs: Mutex<HashMap<i64, ScheduledJob>>,
    clock: WallClock,
}

impl DcaScheduler {
    pub fn new(pool: DbPool, quotes: Arc<dyn QuoteProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            executor: DcaExecutor {
                pool,
                quotes,
                notifier,
                metrics: None,
            },
            jobs: Mutex::new(HashMap::new()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used to compute fire times
    pub fn with_clock(mut self, clock: WallClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsState>) -> Self {
        self.executor.metrics = Some(metrics);
        self
    }

    fn update_gauge(&self, count: usize) {
        if let Some(metrics) = &self.executor.metrics {
            metrics.scheduled_strategies.set(count as i64);
        }
    }

    /// Install (or reinstall) the recurring task for an active strategy.
    /// Returns false when the cron expression is invalid or the strategy is not active.
    pub fn schedule(&self, strategy: &DcaStrategy) -> bool {
        if strategy.status != StrategyStatus::Active {
            warn!(strategy_id = strategy.id, status = %strategy.status, "Not scheduling inactive strategy");
            return false;
        }

        let cron = match CronSchedule::parse(&strategy.schedule) {
            Ok(cron) => cron,
            Err(e) => {
                error!(
                    strategy_id = strategy.id,
                    schedule = %strategy.schedule,
                    error = %e,
                    "Invalid schedule, strategy left unscheduled"
                );
                return false;
            }
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_strategy(
            self.executor.clone(),
            strategy.id,
            cron,
            self.clock.clone(),
            cancel.clone(),
        ));

        let count = {
            let mut jobs = self.jobs.lock();
            if let Some(previous) = jobs.insert(strategy.id, ScheduledJob { cancel, handle }) {
                previous.cancel.cancel();
            }
            jobs.len()
        };
        self.update_gauge(count);

        info!(strategy_id = strategy.id, schedule = %strategy.schedule, "Strategy scheduled");
        true
    }

    /// Cancel the task for `strategy_id`. Returns whether one existed.
    pub fn unschedule(&self, strategy_id: i64) -> bool {
        let (removed, count) = {
            let mut jobs = self.jobs.lock();
            let removed = jobs.remove(&strategy_id);
            (removed, jobs.len())
        };
        self.update_gauge(count);

        match removed {
            Some(job) => {
                job.cancel.cancel();
                debug!(strategy_id, "Strategy task cancelled");
                true
            }
            None => false,
        }
    }

    /// Stop the task, then persist `paused`. Returns whether the strategy exists.
    pub async fn pause(&self, strategy_id: i64) -> AppResult<bool> {
        self.unschedule(strategy_id);
        let found = db::update_strategy_status(&self.executor.pool, strategy_id, StrategyStatus::Paused).await?;
        if found {
            info!(strategy_id, "Strategy paused");
        }
        Ok(found)
    }

    /// Persist `active`, then schedule. Returns whether a task was installed.
    pub async fn resume(&self, strategy: &DcaStrategy) -> AppResult<bool> {
        let found = db::update_strategy_status(&self.executor.pool, strategy.id, StrategyStatus::Active).await?;
        if !found {
            return Ok(false);
        }

        let mut active = strategy.clone();
        active.status = StrategyStatus::Active;
        let scheduled = self.schedule(&active);
        info!(strategy_id = strategy.id, scheduled, "Strategy resumed");
        Ok(scheduled)
    }

    /// Run one purchase now
    pub async fn execute(&self, strategy: &DcaStrategy) -> ExecutionOutcome {
        self.executor.execute(strategy).await
    }

    /// Schedule every active strategy in the store. Returns how many were installed.
    pub async fn init_from_store(&self) -> AppResult<usize> {
        let strategies = db::get_active_strategies(&self.executor.pool).await?;
        let total = strategies.len();
        let scheduled = strategies.iter().filter(|s| self.schedule(s)).count();

        info!(scheduled, total, "DCA scheduler initialized");
        Ok(scheduled)
    }

    pub fn scheduled_count(&self) -> usize {
        self.jobs.lock().values().filter(|j| !j.handle.is_finished()).count()
    }

    pub fn is_scheduled(&self, strategy_id: i64) -> bool {
        self.jobs
            .lock()
            .get(&strategy_id)
            .map(|j| !j.handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel every task. Persisted status is left untouched.
    pub fn shutdown(&self) {
        let jobs: Vec<(i64, ScheduledJob)> = self.jobs.lock().drain().collect();
        for (_, job) in &jobs {
            job.cancel.cancel();
        }
        self.update_gauge(0);
        info!(stopped = jobs.len(), "DCA scheduler stopped");
    }
}

impl Drop for DcaScheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.cancel.cancel();
        }
    }
}

/// Fire loop for one strategy
async fn run_strategy(
    executor: DcaExecutor,
    strategy_id: i64,
    cron: CronSchedule,
    clock: WallClock,
    cancel: CancellationToken,
) {
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = clock();
        // Never fire the same minute twice if the wall clock lags the timer
        let reference = last_fire.map_or(now, |fired| fired.max(now));
        let Some(next) = cron.next_after(reference) else {
            warn!(strategy_id, schedule = %cron, "Schedule has no upcoming fire time");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        last_fire = Some(next);

        if cancel.is_cancelled() {
            break;
        }

        match db::get_strategy(&executor.pool, strategy_id).await {
            Ok(Some(strategy)) if strategy.status == StrategyStatus::Active => {
                executor.execute(&strategy).await;
            }
            Ok(Some(strategy)) => {
                debug!(strategy_id, status = %strategy.status, "Strategy not active, skipping fire");
            }
            Ok(None) => {
                info!(strategy_id, "Strategy deleted, stopping task");
                break;
            }
            Err(e) => {
                error!(strategy_id, error = %e, "Failed to reload strategy, skipping fire");
            }
        }
    }

    debug!(strategy_id, "Strategy task exited");
}
