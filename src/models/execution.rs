//! Execution ledger - append-only audit rows for scheduler fires and alert triggers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What produced a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Dca,
    Rebalance,
    Swap,
    AlertTrigger,
}

impl ExecutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionKind::Dca => "dca",
            ExecutionKind::Rebalance => "rebalance",
            ExecutionKind::Swap => "swap",
            ExecutionKind::AlertTrigger => "alert_trigger",
        }
    }
}

impl std::fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dca" => Ok(ExecutionKind::Dca),
            "rebalance" => Ok(ExecutionKind::Rebalance),
            "swap" => Ok(ExecutionKind::Swap),
            "alert_trigger" => Ok(ExecutionKind::AlertTrigger),
            _ => Err(format!("Unknown execution kind: {}", s)),
        }
    }
}

/// Outcome recorded on a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            _ => Err(format!("Unknown execution status: {}", s)),
        }
    }
}

/// Ledger row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub user_id: i64,
    pub strategy_id: Option<i64>,
    pub kind: ExecutionKind,
    pub from_asset: String,
    pub to_asset: String,
    pub from_amount: f64,
    pub to_amount: Option<f64>,
    pub price_at_execution: Option<f64>,
    /// Simulated settlement reference (`sim_<uuid>`)
    pub external_ref: Option<String>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row to append
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub user_id: i64,
    pub strategy_id: Option<i64>,
    pub kind: ExecutionKind,
    pub from_asset: String,
    pub to_asset: String,
    pub from_amount: f64,
    pub to_amount: Option<f64>,
    pub price_at_execution: Option<f64>,
    pub external_ref: Option<String>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
}
