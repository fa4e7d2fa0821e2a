/**
 * Session Types
 *
 * Backend-neutral user and session records. Each adapter maps its own wire
 * format onto these types; the raw backend record is kept in `metadata` so
 * callers that need provider-specific fields can still reach them.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque, stable identifier assigned by the backend
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Raw backend record
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Identifier used for change detection
    pub fn identity(&self) -> &str {
        &self.id
    }
}

/// Current session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Session {
    /// Session for backends that only expose the current user (cookie sessions)
    pub fn from_user(user: User) -> Self {
        Self {
            user,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn identity(&self) -> &str {
        self.user.identity()
    }

    /// Whether the access token has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Email + password credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Options accepted by sign-up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpOptions {
    /// Where the confirmation email should send the user back to
    pub email_redirect_to: Option<String>,
}

/// Partial user update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub password: Option<String>,
    /// Current password; required by backends that verify it before changing
    pub old_password: Option<String>,
    pub email: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl UserUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.email.is_none() && self.data.is_none()
    }
}
