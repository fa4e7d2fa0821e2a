//! Auth Adapter Module
//!
//! One session API over two identity backends.
//!
//! # Architecture
//!
//! - **`registry`** - selects and caches the adapter for the configured backend
//! - **`supabase`** - Supabase GoTrue adapter (native session events)
//! - **`appwrite`** - Appwrite Account adapter (session events via realtime or polling)
//! - **`visibility`** - visible/hidden signal that throttles polling
//! - **`context`** - session consumer holding the current user and navigation target
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - AuthAdapter + Subscription handle
//! ├── registry.rs     - Adapter selection and caching
//! ├── supabase.rs     - GoTrue REST client
//! ├── http.rs         - Shared HTTP helpers
//! ├── visibility.rs   - Visibility signal
//! ├── context.rs      - Session consumer
//! └── appwrite/
//!     ├── mod.rs      - Appwrite adapter
//!     ├── account.rs  - Account API client
//!     ├── realtime.rs - Realtime channel client
//!     └── poller.rs   - Session watcher state machine
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bamboo_journal::auth::AuthRegistry;
//! use bamboo_journal::shared::AuthConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = AuthRegistry::new(AuthConfig::from_env()?);
//! let auth = registry.adapter()?;
//!
//! let subscription = auth.on_auth_state_change(|kind, session| {
//!     println!("{:?}: {:?}", kind, session.map(|s| s.user.id));
//! });
//! // ...
//! subscription.unsubscribe();
//! # Ok(())
//! # }
//! ```

pub mod appwrite;
pub mod context;
mod http;
pub mod registry;
pub mod supabase;
pub mod visibility;

pub use appwrite::AppwriteAuth;
pub use context::{Route, SessionContext, SessionState};
pub use registry::AuthRegistry;
pub use supabase::SupabaseAuth;
pub use visibility::Visibility;

use crate::auth::appwrite::poller::PollSnapshot;
use crate::shared::config::BackendKind;
use crate::shared::error::Result;
use crate::shared::event::AuthEventKind;
use crate::shared::session::{Credentials, Session, SignUpOptions, User, UserUpdate};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Session-change callback
pub type AuthCallback = Arc<dyn Fn(AuthEventKind, Option<Session>) + Send + Sync>;

/// Backend-specific adapter selected once at startup
#[derive(Debug)]
pub enum AuthAdapter {
    Supabase(SupabaseAuth),
    Appwrite(AppwriteAuth),
}

impl AuthAdapter {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Supabase(_) => BackendKind::Supabase,
            Self::Appwrite(_) => BackendKind::Appwrite,
        }
    }

    /// Current session, or `None` when signed out
    pub async fn get_session(&self) -> Result<Option<Session>> {
        match self {
            Self::Supabase(auth) => auth.get_session().await,
            Self::Appwrite(auth) => auth.get_session().await,
        }
    }

    /// Register a session-change callback.
    ///
    /// The callback is invoked from a background task. It is never invoked
    /// after [`Subscription::unsubscribe`] has returned.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(AuthEventKind, Option<Session>) + Send + Sync + 'static,
    {
        let callback: AuthCallback = Arc::new(callback);
        match self {
            Self::Supabase(auth) => auth.on_auth_state_change(callback),
            Self::Appwrite(auth) => auth.on_auth_state_change(callback),
        }
    }

    pub async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        match self {
            Self::Supabase(auth) => auth.sign_in_with_password(credentials).await,
            Self::Appwrite(auth) => auth.sign_in_with_password(credentials).await,
        }
    }

    pub async fn sign_up(&self, credentials: &Credentials, options: &SignUpOptions) -> Result<User> {
        match self {
            Self::Supabase(auth) => auth.sign_up(credentials, options).await,
            Self::Appwrite(auth) => auth.sign_up(credentials, options).await,
        }
    }

    pub async fn sign_out(&self) -> Result<()> {
        match self {
            Self::Supabase(auth) => auth.sign_out().await,
            Self::Appwrite(auth) => auth.sign_out().await,
        }
    }

    /// Apply a partial update; `Ok(None)` when there was nothing to change
    pub async fn update_user(&self, update: &UserUpdate) -> Result<Option<User>> {
        match self {
            Self::Supabase(auth) => auth.update_user(update).await,
            Self::Appwrite(auth) => auth.update_user(update).await,
        }
    }

    /// Current user; `Ok(None)` when signed out or the session was rejected
    pub async fn get_user(&self) -> Result<Option<User>> {
        match self {
            Self::Supabase(auth) => auth.get_user().await,
            Self::Appwrite(auth) => auth.get_user().await,
        }
    }

    pub async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        match self {
            Self::Supabase(auth) => auth.reset_password_for_email(email, redirect_to).await,
            Self::Appwrite(auth) => auth.reset_password_for_email(email, redirect_to).await,
        }
    }

    pub async fn refresh_session(&self) -> Result<Option<Session>> {
        match self {
            Self::Supabase(auth) => auth.refresh_session().await,
            Self::Appwrite(auth) => auth.get_session().await,
        }
    }
}

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPhase {
    Idle,
    Subscribing,
    /// Events are pushed by the backend
    RealtimeActive,
    /// Events are detected by polling
    PollingActive,
    /// Terminal
    Unsubscribed,
}

/// Cancellation and phase state shared between a handle and its task
#[derive(Debug)]
pub(crate) struct SubscriptionControl {
    active: AtomicBool,
    cancel: Notify,
    phase: watch::Sender<SubscriptionPhase>,
    /// Held for the whole check-then-invoke of `emit`
    delivery: Mutex<()>,
    /// Thread currently running the callback
    emitter: Mutex<Option<ThreadId>>,
}

impl SubscriptionControl {
    pub(crate) fn new() -> Arc<Self> {
        let (phase, _) = watch::channel(SubscriptionPhase::Idle);
        Arc::new(Self {
            active: AtomicBool::new(true),
            cancel: Notify::new(),
            phase,
            delivery: Mutex::new(()),
            emitter: Mutex::new(None),
        })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Move to `phase` unless the subscription already ended
    pub(crate) fn set_phase(&self, phase: SubscriptionPhase) {
        self.phase.send_if_modified(|current| {
            if *current == SubscriptionPhase::Unsubscribed || *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }

    /// Resolves once the subscription is cancelled
    pub(crate) async fn cancelled(&self) {
        if !self.is_active() {
            return;
        }
        self.cancel.notified().await;
    }

    /// Invoke the callback only while the subscription is live.
    ///
    /// The liveness check and the call happen under `delivery`, which
    /// `cancel` also takes, so no callback starts after `cancel` returns.
    pub(crate) fn emit(&self, callback: &AuthCallback, kind: AuthEventKind, session: Option<Session>) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_active() {
            return;
        }
        let _emitter = EmitterGuard::enter(&self.emitter);
        callback(kind, session);
    }

    fn cancel(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        if was_active {
            self.cancel.notify_one();
            self.phase.send_replace(SubscriptionPhase::Unsubscribed);
        }

        // Unsubscribing from inside the callback must not wait on itself
        let emitter = *self.emitter.lock().unwrap_or_else(PoisonError::into_inner);
        if emitter != Some(thread::current().id()) {
            drop(self.delivery.lock().unwrap_or_else(PoisonError::into_inner));
        }
        was_active
    }
}

/// Records the emitting thread for the duration of a callback
struct EmitterGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> EmitterGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self { slot }
    }
}

impl Drop for EmitterGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Disposable handle returned by `on_auth_state_change`.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    control: Arc<SubscriptionControl>,
    task: JoinHandle<()>,
    snapshot: Option<watch::Receiver<PollSnapshot>>,
}

impl Subscription {
    pub(crate) fn new(
        control: Arc<SubscriptionControl>,
        task: JoinHandle<()>,
        snapshot: Option<watch::Receiver<PollSnapshot>>,
    ) -> Self {
        Self { control, task, snapshot }
    }

    /// Stop delivering events. Safe to call repeatedly and while a fetch is in flight.
    pub fn unsubscribe(&self) {
        if self.control.cancel() {
            tracing::debug!("[Auth] Subscription cancelled");
        }
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        self.control.is_active()
    }

    pub fn phase(&self) -> SubscriptionPhase {
        *self.control.phase.borrow()
    }

    /// Receiver for phase transitions
    pub fn phases(&self) -> watch::Receiver<SubscriptionPhase> {
        self.control.phase.subscribe()
    }

    /// Latest poll state, for subscriptions driven by the Appwrite watcher
    pub fn poll_snapshot(&self) -> Option<PollSnapshot> {
        self.snapshot.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Receiver for poll state updates
    pub fn poll_updates(&self) -> Option<watch::Receiver<PollSnapshot>> {
        self.snapshot.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
