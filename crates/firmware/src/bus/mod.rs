//! Bus ownership, recovery procedures and health accounting.

pub mod handle;
pub mod health;

pub use handle::{BusHandle, BusPort, BusStatus, RecoveryReport};
pub use health::{BusCondition, HealthMonitor, HealthStats};
