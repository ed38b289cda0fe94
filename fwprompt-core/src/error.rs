//! Error types for prompt sessions

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PromptError>;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to load config from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// `submit` was called on a session that is not presenting.
    #[error("Session is not presenting (state: {state})")]
    NotPresenting { state: &'static str },

    /// The session was already resolved by a submit or by expiry.
    #[error("Session already resolved")]
    AlreadyResolved,

    #[error("Invalid {what} selection {index} (have {len} entries)")]
    InvalidSelection {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Session ended without a resolution")]
    SessionAborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid default timeout: {value} (must be >= 0 seconds)")]
    NegativeTimeout { value: i64 },

    #[error("Unknown default action: {value}")]
    UnknownAction { value: String },
}

/// Reasons a decision cannot be turned into a rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRule {
    #[error("Criterion {operand:?} has no data")]
    EmptyData { operand: String },

    #[error("Cannot encode list criteria: {0}")]
    ListEncoding(String),
}
