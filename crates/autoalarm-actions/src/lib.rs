//! Alarm actions for AutoAlarm
//!
//! Defines the interface the dispatcher uses to read resource tags,
//! reconcile alarms and enumerate organization accounts. The dry-run
//! implementation records what would be done instead of calling
//! CloudWatch.

pub mod dry_run;
pub mod traits;

pub use dry_run::{DryRunActions, DryRunFixtures, PlannedAction};
pub use traits::*;
