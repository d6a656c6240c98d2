//! Error types for tg-roster.

use std::time::Duration;

/// Top-level error type for the tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration-related errors. All of these abort the run before any
/// identity is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("File named by {key} does not exist: {path}")]
    MissingFile { key: String, path: String },

    #[error("Invite message file error: {0}")]
    Messages(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input roster errors.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Roster file not found: {0}")]
    NotFound(String),

    #[error("Roster has no phone column (matched case-insensitively)")]
    MissingPhoneColumn,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Remote directory errors.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The platform asked us to pause before repeating the same call.
    #[error("Flood wait: retry after {retry_after:?}")]
    FloodWait { retry_after: Duration },

    /// The platform kept flood-limiting one call past the retry budget.
    #[error("Flood wait retries exhausted after {attempts} waits")]
    FloodExhausted { attempts: u32 },

    /// The target account does not accept group adds from strangers.
    #[error("Account privacy settings forbid this operation")]
    PrivacyRestricted,

    #[error("Authorization failed: {reason}")]
    AuthFailed { reason: String },

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Report serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the tool.
pub type Result<T> = std::result::Result<T, Error>;
