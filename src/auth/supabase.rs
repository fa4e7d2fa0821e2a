/**
 * Supabase Adapter
 *
 * Thin client for the Supabase GoTrue REST API. The adapter keeps the current
 * session in memory and publishes session changes on a broadcast channel, the
 * same way supabase-js drives `onAuthStateChange`: every state-changing call
 * emits its event and each new subscriber first receives `INITIAL_SESSION`.
 *
 * # Endpoints
 *
 * - `POST /auth/v1/token?grant_type=password` - sign in
 * - `POST /auth/v1/token?grant_type=refresh_token` - refresh
 * - `POST /auth/v1/signup` - sign up
 * - `POST /auth/v1/logout` - sign out
 * - `GET  /auth/v1/user` - current user
 * - `PUT  /auth/v1/user` - update user
 * - `POST /auth/v1/recover` - password recovery email
 */
use crate::auth::http::{build_client, check_status, endpoint};
use crate::auth::{AuthCallback, Subscription, SubscriptionControl, SubscriptionPhase};
use crate::shared::config::AuthConfig;
use crate::shared::error::{AuthError, Result};
use crate::shared::event::{AuthEvent, AuthEventKind};
use crate::shared::session::{Credentials, Session, SignUpOptions, User, UserUpdate};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the event fan-out channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Supabase-backed adapter
#[derive(Debug)]
pub struct SupabaseAuth {
    client: Client,
    base_url: Url,
    anon_key: String,
    session: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
}

/// Token grant response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Value,
}

impl SupabaseAuth {
    /// Build the adapter; fails if the project URL or anon key is missing
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let (base_url, anon_key) = config.supabase.require()?;
        let client = build_client(config.polling.fetch_timeout, None)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!("[Auth] Supabase adapter ready for {}", base_url);

        Ok(Self {
            client,
            base_url,
            anon_key,
            session: Arc::new(RwLock::new(None)),
            events,
        })
    }

    /// Current session, refreshed first if its access token has expired
    pub async fn get_session(&self) -> Result<Option<Session>> {
        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.is_expired(Utc::now()) => {
                tracing::debug!("[Auth] Access token for {} expired, refreshing", session.identity());
                self.refresh_session().await
            }
            other => Ok(other),
        }
    }

    /// Forward session events to `callback` until the subscription is dropped
    pub fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription {
        let control = SubscriptionControl::new();
        control.set_phase(SubscriptionPhase::Subscribing);

        let mut rx = self.events.subscribe();
        let session = Arc::clone(&self.session);
        let task_control = Arc::clone(&control);

        let task = tokio::spawn(async move {
            let initial = session.read().await.clone();
            task_control.set_phase(SubscriptionPhase::RealtimeActive);
            task_control.emit(&callback, AuthEventKind::InitialSession, initial);

            loop {
                tokio::select! {
                    _ = task_control.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => task_control.emit(&callback, event.kind, event.session),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("[Auth] Subscriber lagged, skipped {} events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription::new(control, task, None)
    }

    /// Sign in with email and password
    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        let url = format!("{}?grant_type=password", self.url("/auth/v1/token"));
        let response = self
            .send(self.client.post(&url).json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            })))
            .await?;
        let session = parse_token_response(response.json().await?)?;

        tracing::info!("[Auth] Signed in as {}", session.identity());
        self.store(AuthEvent::signed_in(session.clone())).await;
        Ok(session)
    }

    /// Register a new account.
    ///
    /// When the project auto-confirms accounts the response carries a session,
    /// which is stored and announced as `SIGNED_IN`.
    pub async fn sign_up(&self, credentials: &Credentials, options: &SignUpOptions) -> Result<User> {
        let mut request = self.client.post(self.url("/auth/v1/signup")).json(&json!({
            "email": credentials.email,
            "password": credentials.password,
        }));
        if let Some(redirect) = &options.email_redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        let body: Value = self.send(request).await?.json().await?;

        if body.get("access_token").is_some() {
            let session = parse_token_response(serde_json::from_value(body)?)?;
            let user = session.user.clone();
            self.store(AuthEvent::signed_in(session)).await;
            return Ok(user);
        }

        let user = user_from_value(body)?;
        tracing::info!("[Auth] Signed up {} (confirmation pending)", user.id);
        Ok(user)
    }

    /// Sign out. The local session is always cleared, even if the remote call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let token = self.access_token().await;
        let result = match token {
            Some(token) => self
                .send(self.client.post(self.url("/auth/v1/logout")).bearer_auth(token))
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = &result {
            tracing::warn!("[Auth] Remote sign-out failed: {}", e);
        }

        self.store(AuthEvent::signed_out()).await;
        result
    }

    /// Update the signed-in user
    pub async fn update_user(&self, update: &UserUpdate) -> Result<Option<User>> {
        let token = self
            .access_token()
            .await
            .ok_or_else(|| AuthError::unauthorized("No active session"))?;

        if update.is_empty() {
            let current = self.session.read().await.as_ref().map(|s| s.user.clone());
            return Ok(current);
        }

        let mut body = serde_json::Map::new();
        if let Some(password) = &update.password {
            body.insert("password".to_string(), json!(password));
        }
        if let Some(email) = &update.email {
            body.insert("email".to_string(), json!(email));
        }
        if let Some(data) = &update.data {
            body.insert("data".to_string(), data.clone());
        }

        let response = self
            .send(self.client.put(self.url("/auth/v1/user")).bearer_auth(token).json(&body))
            .await?;
        let user = user_from_value(response.json().await?)?;

        let updated = {
            let mut guard = self.session.write().await;
            guard.as_mut().map(|session| {
                session.user = user.clone();
                session.clone()
            })
        };
        self.publish(AuthEvent::new(AuthEventKind::UserUpdated, updated));
        Ok(Some(user))
    }

    /// Fetch the user for the current session; `None` when signed out or the token is rejected
    pub async fn get_user(&self) -> Result<Option<User>> {
        let Some(token) = self.access_token().await else {
            return Ok(None);
        };
        match self
            .send(self.client.get(self.url("/auth/v1/user")).bearer_auth(token))
            .await
        {
            Ok(response) => Ok(Some(user_from_value(response.json().await?)?)),
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("[Auth] Access token rejected: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Option<Session>> {
        let refresh_token = {
            let guard = self.session.read().await;
            guard.as_ref().and_then(|s| s.refresh_token.clone())
        };
        let Some(refresh_token) = refresh_token else {
            if self.session.read().await.is_some() {
                tracing::info!("[Auth] Session has no refresh token, signing out locally");
                self.store(AuthEvent::signed_out()).await;
            }
            return Ok(None);
        };

        let url = format!("{}?grant_type=refresh_token", self.url("/auth/v1/token"));
        let response = self
            .send(self.client.post(&url).json(&json!({ "refresh_token": refresh_token })))
            .await;
        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_unauthorized() || matches!(e, AuthError::Backend { status: 400, .. }) => {
                tracing::info!("[Auth] Refresh token rejected, signing out locally");
                self.store(AuthEvent::signed_out()).await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let session = parse_token_response(response.json().await?)?;
        self.store(AuthEvent::new(AuthEventKind::TokenRefreshed, Some(session.clone())))
            .await;
        Ok(Some(session))
    }

    /// Send a password recovery email
    pub async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let mut request = self
            .client
            .post(self.url("/auth/v1/recover"))
            .json(&json!({ "email": email }));
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        self.send(request).await?;
        self.publish(AuthEvent::new(AuthEventKind::PasswordRecovery, None));
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.header("apikey", &self.anon_key).send().await?;
        check_status(response).await
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.access_token.clone())
    }

    async fn store(&self, event: AuthEvent) {
        *self.session.write().await = event.session.clone();
        self.publish(event);
    }

    fn publish(&self, event: AuthEvent) {
        tracing::debug!("[Auth] {:?} for {}", event.kind, event.identity().unwrap_or("<none>"));
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.events.send(event);
    }
}

fn parse_token_response(token: TokenResponse) -> Result<Session> {
    let expires_at = match (token.expires_at, token.expires_in) {
        (Some(at), _) => DateTime::<Utc>::from_timestamp(at, 0),
        (None, Some(secs)) => Some(Utc::now() + ChronoDuration::seconds(secs)),
        (None, None) => None,
    };
    Ok(Session {
        user: user_from_value(token.user)?,
        access_token: Some(token.access_token),
        refresh_token: token.refresh_token,
        expires_at,
        metadata: Value::Null,
    })
}

/// Map a GoTrue user object onto `User`
fn user_from_value(value: Value) -> Result<User> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::serialization("GoTrue user is missing 'id'"))?
        .to_string();
    let email = value
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map(str::to_string);
    let name = value
        .pointer("/user_metadata/name")
        .or_else(|| value.pointer("/user_metadata/full_name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(User {
        id,
        email,
        name,
        metadata: value,
    })
}
