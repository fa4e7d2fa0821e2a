//! Shared Error Types
//!
//! This module defines the error taxonomy used by every auth adapter.
//! Errors are split by how the caller is expected to react to them.
//!
//! # Error Categories
//!
//! - `Configuration` - required backend identifiers missing or malformed (fatal at construction)
//! - `Unauthorized` - the current session is invalid or expired (recoverable, triggers cooldown)
//! - `Network` - the request failed or timed out (recoverable, triggers backoff)
//! - `Subscription` - the realtime channel could not be opened (recoverable, falls back to polling)
//! - `Backend` - the backend rejected the request (e.g. wrong password)
//! - `Serialization` - a response body could not be decoded
//! - `Disabled` - auth is running in degraded mode because configuration failed
//!
//! # Usage
//!
//! ```rust
//! use bamboo_journal::shared::error::AuthError;
//!
//! let error = AuthError::unauthorized("session expired");
//! assert!(error.is_unauthorized());
//! ```
use crate::shared::config::ConfigError;
use thiserror::Error;

/// Result alias used throughout the auth layer
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

/// Errors produced by the auth adapters
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// Required configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The backend reported the current credentials as invalid (HTTP 401)
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// Transport failure or timeout
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// Realtime channel failed to open or dropped
    #[error("Subscription error: {message}")]
    Subscription {
        /// Human-readable error message
        message: String,
    },

    /// Non-401 rejection returned by the backend
    #[error("Backend error ({status}): {message}")]
    Backend {
        /// HTTP status code returned by the backend
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// Response body could not be decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// Auth is disabled because the adapter could not be constructed
    #[error("Authentication is disabled: backend is not configured")]
    Disabled,
}

impl AuthError {
    /// Create a new unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new subscription error
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }

    /// Create a new backend error
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Map an HTTP error status and body message to the matching variant
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 401 {
            Self::unauthorized(message)
        } else {
            Self::backend(status, message)
        }
    }

    /// Whether the backend rejected the current session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether retrying later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Subscription { .. } => true,
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::serialization(format!("Invalid response body: {}", err));
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_timeout() {
            return Self::network(format!("Request timed out: {}", err));
        }
        Self::network(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
