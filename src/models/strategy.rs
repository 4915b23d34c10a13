//! DCA strategy models - a recurring purchase plan and its lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strategy status
///
/// State transitions:
/// ```text
/// ACTIVE <-> PAUSED
///   |
///   v
/// COMPLETED | FAILED
/// ```
///
/// Nothing in the engine moves a strategy to a terminal state today; the
/// variants exist so stored rows always round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    /// Scheduled and firing
    Active,
    /// Stopped by the user, may be resumed
    Paused,
    /// Finished its plan
    Completed,
    /// Permanently disabled
    Failed,
}

impl StrategyStatus {
    /// Check if transition to new status is valid
    pub fn can_transition_to(&self, new_status: StrategyStatus) -> bool {
        use StrategyStatus::*;

        matches!(
            (self, new_status),
            (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Active, Failed)
                // Idempotent pause/resume
                | (Active, Active)
                | (Paused, Paused)
        )
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StrategyStatus::Completed | StrategyStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Active => "active",
            StrategyStatus::Paused => "paused",
            StrategyStatus::Completed => "completed",
            StrategyStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(StrategyStatus::Active),
            "paused" => Ok(StrategyStatus::Paused),
            "completed" => Ok(StrategyStatus::Completed),
            "failed" => Ok(StrategyStatus::Failed),
            _ => Err(format!("Unknown strategy status: {}", s)),
        }
    }
}

/// Persisted DCA strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcaStrategy {
    /// Database ID
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Owner's messaging handle (joined from users)
    pub owner_handle: String,
    /// Display name
    pub name: Option<String>,
    /// Symbol spent on each execution
    pub source_asset: String,
    /// Symbol bought on each execution
    pub target_asset: String,
    /// Amount of source asset per execution (UI units)
    pub amount_per_execution: f64,
    /// 5-field cron expression
    pub schedule: String,
    /// Slippage budget in basis points
    pub slippage_bps: u16,
    pub status: StrategyStatus,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub total_executed: i64,
    pub total_spent: f64,
    pub total_received: f64,
    pub created_at: DateTime<Utc>,
}

impl DcaStrategy {
    /// Name for messages, falling back to the id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    /// Average price paid per unit of target asset so far
    pub fn average_price(&self) -> Option<f64> {
        if self.total_received > 0.0 {
            Some(self.total_spent / self.total_received)
        } else {
            None
        }
    }
}

/// Input for creating a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStrategy {
    pub name: Option<String>,
    /// Defaults to USDC when absent
    pub source_asset: Option<String>,
    pub target_asset: String,
    pub amount_per_execution: f64,
    pub schedule: String,
    /// Defaults to the configured slippage budget when absent
    pub slippage_bps: Option<u16>,
}
