//! Core types for AutoAlarm

mod alarm;
mod event;
mod resource;

pub use alarm::*;
pub use event::*;
pub use resource::*;
