//! Price alert models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a price threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    /// Fires when price >= target
    Above,
    /// Fires when price <= target
    Below,
}

impl AlertCondition {
    /// Evaluate the condition against an observed price
    pub fn is_met(&self, price: f64, target: f64) -> bool {
        match self {
            AlertCondition::Above => price >= target,
            AlertCondition::Below => price <= target,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "above" | ">" | ">=" => Ok(AlertCondition::Above),
            "below" | "<" | "<=" => Ok(AlertCondition::Below),
            _ => Err(format!("Unknown alert condition: {}", s)),
        }
    }
}

/// Single-shot price alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: i64,
    pub user_id: i64,
    /// Owner's messaging handle (joined from users)
    pub owner_handle: String,
    pub asset_symbol: String,
    pub asset_id: String,
    pub condition: AlertCondition,
    pub target_price: f64,
    /// Once false, never true again
    pub is_active: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PriceAlert {
    /// Whether this alert should fire at `price`. Zero means "price unknown".
    pub fn should_trigger(&self, price: f64) -> bool {
        self.is_active && price > 0.0 && self.condition.is_met(price, self.target_price)
    }
}
