/**
 * Auth Event System
 *
 * This module defines the session-change events delivered to subscribers of
 * `on_auth_state_change`. The kinds mirror the events a Supabase client emits;
 * the Appwrite adapter, which detects changes itself, reports `UserChanged`.
 */
use crate::shared::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of session change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    /// Delivered once to each new subscriber with the current session
    InitialSession,
    SignedIn,
    SignedOut,
    UserUpdated,
    TokenRefreshed,
    /// A password recovery email was requested
    PasswordRecovery,
    /// The identity observed by a watcher changed
    UserChanged,
}

/// Session change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
    pub timestamp: DateTime<Utc>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self {
            kind,
            session,
            timestamp: Utc::now(),
        }
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(AuthEventKind::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }

    /// Identifier of the user the event refers to, if any
    pub fn identity(&self) -> Option<&str> {
        self.session.as_ref().map(Session::identity)
    }
}
