//! Shared Module
//!
//! Types shared by every auth adapter: configuration, errors, the session
//! model, and session-change events. Nothing in here talks to a backend.

/// Shared error types
pub mod error;

/// Auth layer configuration
pub mod config;

/// User and session records
pub mod session;

/// Session-change events
pub mod event;

/// Re-export commonly used types for convenience
pub use config::{AppwriteConfig, AuthConfig, AuthConfigBuilder, BackendKind, ConfigError, PollSettings, SupabaseConfig};
pub use error::{AuthError, Result};
pub use event::{AuthEvent, AuthEventKind};
pub use session::{Credentials, Session, SignUpOptions, User, UserUpdate};
