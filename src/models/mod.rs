//! Domain models for users, wallets, strategies, alerts and the execution ledger

pub mod alert;
pub mod execution;
pub mod strategy;
pub mod user;

pub use alert::{AlertCondition, PriceAlert};
pub use execution::{ExecutionKind, ExecutionRecord, ExecutionStatus, NewExecution};
pub use strategy::{DcaStrategy, NewStrategy, StrategyStatus};
pub use user::{User, Wallet};
