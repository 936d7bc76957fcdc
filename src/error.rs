// src/error.rs

//! Unified error handling for the sync engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A single fetch attempt failed; retried up to the attempt budget
    #[error("transient fetch error for {url}: {message}")]
    TransientFetch { url: String, message: String },

    /// Fetch attempt budget exhausted; recorded per item, the run continues
    #[error("fetch failed for {url} after {attempts} attempts: {last_error}")]
    PermanentFetch {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// Content whose id or body cannot be parsed; the item is skipped
    #[error("malformed content at {key}: {message}")]
    MalformedContent { key: String, message: String },

    /// Whole-run failure (e.g. the catalogue listing itself failed)
    #[error("orchestration failure: {0}")]
    Orchestration(String),

    /// Snapshot upload or control-plane call failed; prior snapshot keeps serving
    #[error("publish failure: {0}")]
    Publish(String),

    /// A reconciliation is already holding the "latest" lock
    #[error("reconciliation already in progress: {0}")]
    ReconcileBusy(String),

    /// Object storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Control-plane protocol error
    #[error("control plane error: {0}")]
    ControlPlane(String),

    /// Credential acquisition error
    #[error("identity error: {0}")]
    Identity(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a transient fetch error.
    pub fn transient(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::TransientFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed-content error.
    pub fn malformed(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedContent {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create an orchestration error.
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration(message.into())
    }

    /// Create a publish error.
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a control-plane error.
    pub fn control_plane(message: impl Into<String>) -> Self {
        Self::ControlPlane(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is a per-item failure that must not abort sibling work.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            Self::TransientFetch { .. }
                | Self::PermanentFetch { .. }
                | Self::MalformedContent { .. }
        )
    }
}
