//! # Session Context
//!
//! Consumer-side glue between an adapter and a UI: holds the current user and
//! session, a loading flag, and the route the UI should navigate to. Both are
//! published on `watch` channels so any front end can follow along.
//!
//! When no adapter could be built the context runs disabled: state stays
//! signed out and every operation fails with [`AuthError::Disabled`].

use crate::auth::registry::AuthRegistry;
use crate::auth::{AuthAdapter, Subscription};
use crate::shared::error::{AuthError, Result};
use crate::shared::session::{Credentials, Session, SignUpOptions, User};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

const CALLBACK_PATH: &str = "/auth/callback";
const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Navigation target requested by the session context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Login,
    VerifyEmail,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/auth/login",
            Self::VerifyEmail => "/auth/verify-email",
        }
    }
}

/// Snapshot of what the UI needs to render
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub is_loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            is_loading: true,
        }
    }
}

impl SessionState {
    fn settled(session: Option<Session>) -> Self {
        Self {
            user: session.as_ref().map(|s| s.user.clone()),
            session,
            is_loading: false,
        }
    }
}

pub struct SessionContext {
    adapter: Option<Arc<AuthAdapter>>,
    site_url: Option<String>,
    state: Arc<watch::Sender<SessionState>>,
    route: Arc<watch::Sender<Option<Route>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionContext {
    pub fn new(adapter: Arc<AuthAdapter>, site_url: Option<String>) -> Self {
        Self::with_adapter(Some(adapter), site_url)
    }

    /// Context without a backend
    pub fn disabled() -> Self {
        Self::with_adapter(None, None)
    }

    /// Context for the registry's configured backend, disabled if it cannot be built
    pub fn from_registry(registry: &AuthRegistry) -> Self {
        let site_url = registry.config().site_url.clone();
        match registry.adapter() {
            Ok(adapter) => Self::new(adapter, site_url),
            Err(e) => {
                tracing::error!("[Auth] Auth disabled: {}", e);
                Self::disabled()
            }
        }
    }

    fn with_adapter(adapter: Option<Arc<AuthAdapter>>, site_url: Option<String>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (route, _) = watch::channel(None);
        Self {
            adapter,
            site_url,
            state: Arc::new(state),
            route: Arc::new(route),
            subscription: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.adapter.is_some()
    }

    fn adapter(&self) -> Result<&AuthAdapter> {
        self.adapter.as_deref().ok_or(AuthError::Disabled)
    }

    /// Load the current session, then follow session changes.
    ///
    /// Calling `start` again reloads the session but keeps the existing subscription.
    pub async fn start(&self) -> Result<()> {
        let Ok(adapter) = self.adapter() else {
            self.state.send_modify(|state| state.is_loading = false);
            return Err(AuthError::Disabled);
        };

        self.state.send_modify(|state| state.is_loading = true);
        match adapter.get_session().await {
            Ok(session) => {
                self.state.send_replace(SessionState::settled(session));
            }
            Err(e) => {
                tracing::error!("[Auth] Error getting session: {}", e);
                self.state.send_modify(|state| state.is_loading = false);
            }
        }

        let mut slot = self.subscription.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            let state = Arc::clone(&self.state);
            let route = Arc::clone(&self.route);
            *slot = Some(adapter.on_auth_state_change(move |kind, session| {
                tracing::debug!("[Auth] Session event {:?}", kind);
                let target = if session.is_some() { Route::Home } else { Route::Login };
                state.send_replace(SessionState::settled(session));
                route.send_replace(Some(target));
            }));
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Most recent navigation request, if any
    pub fn route(&self) -> Option<Route> {
        *self.route.borrow()
    }

    pub fn watch_route(&self) -> watch::Receiver<Option<Route>> {
        self.route.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .adapter()?
            .sign_in_with_password(&Credentials::new(email, password))
            .await?;
        self.state.send_replace(SessionState::settled(Some(session.clone())));
        self.route.send_replace(Some(Route::Home));
        Ok(session)
    }

    /// Register; the confirmation email links back to `{site_url}/auth/callback`
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        let options = SignUpOptions {
            email_redirect_to: self.site_link(CALLBACK_PATH),
        };
        let user = self
            .adapter()?
            .sign_up(&Credentials::new(email, password), &options)
            .await?;
        self.route.send_replace(Some(Route::VerifyEmail));
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.adapter()?.sign_out().await?;
        self.state.send_replace(SessionState::settled(None));
        self.route.send_replace(Some(Route::Login));
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let redirect = self.site_link(RESET_PASSWORD_PATH);
        self.adapter()?
            .reset_password_for_email(email, redirect.as_deref())
            .await
    }

    /// Stop following session changes
    pub fn stop(&self) {
        let subscription = self.subscription.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn site_link(&self, path: &str) -> Option<String> {
        let base = self.site_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(format!("{}{}", base.trim_end_matches('/'), path))
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.stop();
    }
}
