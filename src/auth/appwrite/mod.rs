//! # Appwrite Adapter
//!
//! Appwrite has no session event stream, so `on_auth_state_change` is driven
//! by a [`poller::Watcher`] per subscription: the `account` realtime channel
//! when it can be opened, otherwise visibility-aware polling with backoff.
//!
//! State-changing calls (sign in, sign out, ...) do not emit events directly.
//! Subscribers observe their effect on the next realtime event or poll tick,
//! as `USER_CHANGED`.

pub mod account;
pub mod poller;
pub mod realtime;

pub use account::{AccountApi, HttpAccount};
pub use poller::{PollSnapshot, PollState};
pub use realtime::{RealtimeConnector, RealtimeFeed, RealtimeMessage, WebSocketRealtime};

use crate::auth::visibility::Visibility;
use crate::auth::{AuthCallback, Subscription};
use crate::shared::config::{AuthConfig, ConfigError, PollSettings, ENV_SITE_URL};
use crate::shared::error::Result;
use crate::shared::session::{Credentials, Session, SignUpOptions, User, UserUpdate};
use poller::Watcher;
use reqwest::cookie::Jar;
use std::fmt;
use std::sync::Arc;

/// Path of the password reset page on the site
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Appwrite-backed adapter
pub struct AppwriteAuth {
    account: Arc<dyn AccountApi>,
    realtime: Option<Arc<dyn RealtimeConnector>>,
    visibility: Visibility,
    settings: PollSettings,
    recovery_url: Option<String>,
}

impl AppwriteAuth {
    /// Build the adapter from configuration; fails if endpoint or project id is missing
    pub fn new(config: &AuthConfig, visibility: Visibility) -> Result<Self> {
        let (endpoint, project_id) = config.appwrite.require()?;
        let jar = Arc::new(Jar::default());

        let account = HttpAccount::new(
            endpoint.clone(),
            project_id.clone(),
            Arc::clone(&jar),
            config.polling.fetch_timeout,
        )?;
        let realtime = WebSocketRealtime::new(endpoint.clone(), project_id, jar);

        tracing::info!("[Auth] Appwrite adapter ready for {}", endpoint);

        let auth = Self::with_parts(
            Arc::new(account),
            Some(Arc::new(realtime)),
            visibility,
            config.polling,
        );
        Ok(match config.site_link(RESET_PASSWORD_PATH) {
            Some(url) => auth.with_recovery_url(url),
            None => auth,
        })
    }

    /// Assemble the adapter from explicit parts
    pub fn with_parts(
        account: Arc<dyn AccountApi>,
        realtime: Option<Arc<dyn RealtimeConnector>>,
        visibility: Visibility,
        settings: PollSettings,
    ) -> Self {
        Self {
            account,
            realtime,
            visibility,
            settings,
            recovery_url: None,
        }
    }

    /// Default target of password recovery emails
    pub fn with_recovery_url(mut self, url: impl Into<String>) -> Self {
        self.recovery_url = Some(url.into());
        self
    }

    /// Replace the realtime connector; `None` forces polling
    pub fn set_realtime(&mut self, realtime: Option<Arc<dyn RealtimeConnector>>) {
        self.realtime = realtime;
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Session for the current account, `None` when the backend rejects it
    pub async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.get_user().await?.map(Session::from_user))
    }

    pub async fn get_user(&self) -> Result<Option<User>> {
        match self.account.get().await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_unauthorized() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Start a watcher for this subscription
    pub fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription {
        Watcher::spawn(
            Arc::clone(&self.account),
            self.realtime.clone(),
            self.visibility.clone(),
            self.settings,
            callback,
        )
    }

    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        let created = self
            .account
            .create_email_password_session(&credentials.email, &credentials.password)
            .await?;
        let user = self.account.get().await?;

        tracing::info!("[Auth] Signed in as {}", user.identity());
        let mut session = Session::from_user(user);
        session.metadata = created;
        Ok(session)
    }

    pub async fn sign_up(&self, credentials: &Credentials, _options: &SignUpOptions) -> Result<User> {
        let user_id = uuid::Uuid::new_v4().simple().to_string();
        let user = self
            .account
            .create(&user_id, &credentials.email, &credentials.password)
            .await?;
        tracing::info!("[Auth] Created account {}", user.identity());
        Ok(user)
    }

    /// Delete all sessions; failures are logged and ignored
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(e) = self.account.delete_sessions().await {
            tracing::warn!("[Auth] Appwrite sign out failed: {}", e);
        }
        Ok(())
    }

    /// Only password changes are supported
    pub async fn update_user(&self, update: &UserUpdate) -> Result<Option<User>> {
        if update.email.is_some() || update.data.is_some() {
            tracing::debug!("[Auth] Appwrite adapter ignores email and data updates");
        }
        let Some(password) = update.password.as_deref() else {
            return Ok(None);
        };
        let user = self
            .account
            .update_password(password, update.old_password.as_deref())
            .await?;
        Ok(Some(user))
    }

    pub async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let url = redirect_to
            .or(self.recovery_url.as_deref())
            .ok_or(ConfigError::MissingValue(ENV_SITE_URL))?;
        self.account.create_recovery(email, url).await
    }
}

impl fmt::Debug for AppwriteAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppwriteAuth")
            .field("realtime", &self.realtime.is_some())
            .field("visibility", &self.visibility.is_visible())
            .field("settings", &self.settings)
            .field("recovery_url", &self.recovery_url)
            .finish()
    }
}
