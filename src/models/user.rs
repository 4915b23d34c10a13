//! Users and their registered wallets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the engine, addressed by their messaging handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Chat id used as the notification recipient
    pub handle: String,
    pub username: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// A wallet address registered by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub address: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}
