//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::db::{self, DbPool};
use crate::engine::{AlertMonitor, DcaScheduler};
use crate::price_cache::{PriceCache, PriceCacheStats};
use crate::service::InvestorService;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall system status
    pub status: HealthStatus,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Database status
    pub database: ComponentHealth,
    /// Strategies with a live recurring task
    pub scheduled_strategies: usize,
    /// Whether the alert monitor loop is running
    pub monitor_running: bool,
    /// Price cache status
    pub price_cache: PriceCacheHealth,
}

/// Health status enum
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some systems degraded but operational
    Degraded,
    /// Critical systems failing
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Price cache health info
#[derive(Debug, Serialize)]
pub struct PriceCacheHealth {
    #[serde(flatten)]
    pub stats: PriceCacheStats,
    pub feed_healthy: bool,
}

/// Shared application state for health checks
pub struct AppState {
    /// Database connection pool
    pub db: DbPool,
    /// Application start time
    pub started_at: chrono::DateTime<Utc>,
    pub scheduler: Arc<DcaScheduler>,
    pub monitor: Arc<AlertMonitor>,
    /// Price cache
    pub price_cache: Arc<PriceCache>,
    /// Action layer for the chat front-end; shares the scheduler and cache above
    pub service: Arc<InvestorService>,
}

/// Health check handler
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();

    let database = match db::ping(&state.db).await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
            }
        }
    };

    let monitor_running = state.monitor.is_running();
    let feed_healthy = state.price_cache.last_fetch_healthy();

    let overall_status = if database.status == HealthStatus::Unhealthy {
        HealthStatus::Unhealthy
    } else if !monitor_running || !feed_healthy {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let status_code = match overall_status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        // Still return 200 for degraded
        _ => StatusCode::OK,
    };

    let response = HealthResponse {
        status: overall_status,
        uptime_seconds: uptime,
        database,
        scheduled_strategies: state.scheduler.scheduled_count(),
        monitor_running,
        price_cache: PriceCacheHealth {
            stats: state.price_cache.stats(),
            feed_healthy,
        },
    };

    (status_code, Json(response))
}
