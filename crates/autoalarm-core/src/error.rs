//! Error types for AutoAlarm

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration Errors
    #[error("Environment variable {0} is not set")]
    MissingConfig(&'static str),

    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidConfig {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to load config: {0}")]
    ConfigFile(String),

    #[error("Duplicate alarm key in {group}: {key}")]
    DuplicateAlarmKey { group: String, key: String },

    // Event Errors
    #[error("Malformed {origin} event: {reason}")]
    MalformedEvent { origin: String, reason: String },

    // Collaborator Errors
    #[error(transparent)]
    Action(#[from] anyhow::Error),
}

impl Error {
    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedEvent {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingConfig(_)
            | Error::InvalidConfig { .. }
            | Error::ConfigFile(_)
            | Error::DuplicateAlarmKey { .. } => "ConfigurationError",
            Error::MalformedEvent { .. } => "MalformedEvent",
            Error::Action(_) => "ActionFailed",
        }
    }

    /// Whether the error was raised before any event was dispatched
    pub fn is_configuration(&self) -> bool {
        self.code() == "ConfigurationError"
    }
}
