//! Error types for preflight.
//!
//! This module defines all error types used throughout the preflight crate.
//! Pure computation modules (schedule resolution, weather analysis, risk
//! scoring) never produce these errors; they return sentinel or partial
//! results instead. Errors here come from I/O boundaries: local storage,
//! configuration, the weather provider, and the backend.

use std::path::PathBuf;
use thiserror::Error;

use crate::tracking::FlightStatus;

/// The main error type for preflight operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the queue database.
    #[error("failed to open queue database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Weather Provider Errors ===
    /// The weather provider request failed.
    ///
    /// Surfaced to the caller as a visible, retryable condition. Previously
    /// fetched data stays valid; this error never replaces it.
    #[error("weather fetch failed: {message}")]
    WeatherFetch {
        /// Description of the failure.
        message: String,
    },

    // === Backend Errors ===
    /// A backend write or read failed.
    ///
    /// Safety-critical writes that hit this error are converted into queued
    /// operations, never dropped.
    #[error("backend call failed: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    // === Tracking Errors ===
    /// A flight status transition violated the state machine.
    #[error("invalid flight status transition: {from} -> {to}")]
    InvalidTransition {
        /// The current status.
        from: FlightStatus,
        /// The rejected target status.
        to: FlightStatus,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for preflight operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a new weather fetch error.
    #[must_use]
    pub fn weather_fetch(message: impl Into<String>) -> Self {
        Self::WeatherFetch {
            message: message.into(),
        }
    }

    /// Check if this error came from the backend boundary.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Check if this error is a rejected status transition.
    #[must_use]
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::backend("connection refused");
        assert_eq!(err.to_string(), "backend call failed: connection refused");

        let err = Error::weather_fetch("HTTP 503");
        assert_eq!(err.to_string(), "weather fetch failed: HTTP 503");
    }

    #[test]
    fn test_error_is_backend() {
        assert!(Error::backend("x").is_backend());
        assert!(!Error::weather_fetch("x").is_backend());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::InvalidTransition {
            from: FlightStatus::Arrived,
            to: FlightStatus::Active,
        };
        assert!(err.is_invalid_transition());
        let msg = err.to_string();
        assert!(msg.contains("ARRIVED"));
        assert!(msg.contains("ACTIVE"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "flush_interval_secs must be greater than 0".to_string(),
        };
        assert!(err.to_string().contains("flush_interval_secs"));
    }
}
