//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout radctl.
//! All errors are structured and map to specific process exit codes.
//!
//! # Error Categories
//! - `InvalidIdentifier`: Configured table names that are not safe SQL identifiers
//! - `InvalidDuration`: Malformed block durations ("2h", "15m", ...)
//! - `InvalidIntent`: Missing or contradictory intent parameters
//! - `ConfigNotFound` / `ConfigUnreadable`: Configuration file errors
//! - `ExecutionError`: Database connection or statement failures
//! - `Interrupted`: Interactive prompt cancelled

use thiserror::Error;

/// Main error type for radctl operations
#[derive(Error, Debug)]
pub enum RadctlError {
    /// Configured table name is not a safe SQL identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Malformed relative duration
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Intent parameters missing or contradictory
    #[error("Invalid request: {0}")]
    InvalidIntent(String),

    /// Explicitly requested configuration file does not exist
    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    /// Configuration file unreadable or not valid JSON
    #[error("Config file unreadable: {0}")]
    ConfigUnreadable(String),

    /// Database connection or statement failure
    #[error("Execution failed: {0}")]
    ExecutionError(String),

    /// Interactive prompt cancelled
    #[error("Interrupted")]
    Interrupted,
}

impl RadctlError {
    /// Convert error to the process exit code reported by the CLI
    ///
    /// Exit codes are stable: 2 for user/configuration errors, 1 for
    /// execution and internal errors, 130 when interrupted.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidIdentifier(_)
            | Self::InvalidDuration(_)
            | Self::InvalidIntent(_)
            | Self::ConfigNotFound(_)
            | Self::ConfigUnreadable(_) => 2,
            Self::ExecutionError(_) => 1,
            Self::Interrupted => 130,
        }
    }

    /// Get human-readable error message
    ///
    /// This message is safe to print: it never contains credentials.
    #[must_use]
    pub fn message(&self) -> String {
        // Use Display implementation from thiserror
        self.to_string()
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier(message.into())
    }

    /// Create an invalid duration error
    pub fn invalid_duration(message: impl Into<String>) -> Self {
        Self::InvalidDuration(message.into())
    }

    /// Create an invalid intent error
    pub fn invalid_intent(message: impl Into<String>) -> Self {
        Self::InvalidIntent(message.into())
    }

    /// Create a config-not-found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound(path.into())
    }

    /// Create a config-unreadable error
    pub fn config_unreadable(message: impl Into<String>) -> Self {
        Self::ConfigUnreadable(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError(message.into())
    }
}

/// Result type alias for radctl operations
pub type Result<T> = std::result::Result<T, RadctlError>;
