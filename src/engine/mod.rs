//! Background engines: the DCA scheduler and the price alert monitor

pub mod monitor;
pub mod scheduler;

pub use monitor::{AlertMonitor, MonitorTickReport};
pub use scheduler::{DcaScheduler, ExecutionOutcome, WallClock};
