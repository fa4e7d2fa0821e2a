//! Bamboo Journal - Auth Layer
//!
//! Session management for the Bamboo Journal (竹节记) life-logging app. One
//! adapter interface sits in front of two identity backends:
//!
//! - **Supabase** (primary) - GoTrue REST with native session events
//! - **Appwrite** (secondary) - Account API; session events are emulated from
//!   the `account` realtime channel, or by polling when realtime is unavailable
//!
//! # Module Structure
//!
//! - **`shared`** - configuration, errors, the session model and events
//! - **`auth`** - the adapters, the registry that selects one, the session
//!   watcher, and a UI-facing session context
//!
//! # Polling
//!
//! The Appwrite watcher polls every 3 s while the surface is visible, doubles
//! its delay on failure up to 60 s, and after a 401 waits the full 60 s unless
//! the surface becomes visible again. Hosts report visibility through
//! [`auth::Visibility`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use bamboo_journal::auth::{AuthRegistry, Visibility};
//! use bamboo_journal::shared::{AuthConfig, Credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let visibility = Visibility::always_visible();
//! let registry = AuthRegistry::new(AuthConfig::from_env()?).with_visibility(visibility.clone());
//! let auth = registry.adapter()?;
//!
//! let _subscription = auth.on_auth_state_change(|kind, session| {
//!     tracing::info!("{:?} {:?}", kind, session.map(|s| s.user.id));
//! });
//! auth.sign_in_with_password(&Credentials::new("ink@example.com", "secret")).await?;
//!
//! // The window was minimised
//! visibility.set_visible(false);
//! # Ok(())
//! # }
//! ```

/// Shared types and configuration
pub mod shared;

/// Auth adapters and session handling
pub mod auth;
