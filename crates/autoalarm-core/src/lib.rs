//! AutoAlarm Core Library
//!
//! Configuration, error types and the data model shared by the alarm
//! dispatcher and its collaborators.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::AutoAlarmConfig;
pub use error::{Error, Result};

/// AutoAlarm version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Separator joining the parts of an alarm key
pub const ALARM_SEPARATOR: &str = "-";

/// Owner marker appended to every alarm key created by this tool
pub const OWNER_MARKER: &str = "Created_by_CloudWatchAutoAlarms";

/// Default alarm period
pub const DEFAULT_PERIOD: &str = "5m";

/// Default number of evaluation periods
pub const DEFAULT_EVALUATION_PERIODS: &str = "1";

/// Default alarm statistic
pub const DEFAULT_STATISTIC: &str = "Average";

/// Tag key overriding the notification topic of a resource
pub const NOTIFY_TAG: &str = "notify";
