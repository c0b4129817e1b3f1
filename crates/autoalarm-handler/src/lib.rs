//! AutoAlarm Handler
//!
//! Receives EC2, RDS and Lambda lifecycle events (or a scan request),
//! classifies them and asks the alarm actions to create, reconcile or
//! delete the matching CloudWatch alarms.
//!
//! ```text
//!  event ──▶ InboundEvent::decode ──▶ EventDispatcher::dispatch ──▶ AlarmActions
//!                                          │
//!                     AutoAlarmConfig ─────┤ DefaultAlarmTable
//!                                          └ MetricDimensionsMap
//! ```

pub mod dispatcher;
pub mod local;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
