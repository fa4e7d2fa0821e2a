//! # Session Watcher
//!
//! Emulates a push-based `onAuthStateChange` for backends that only expose
//! "get the current account".
//!
//! ## States
//!
//! ```text
//! IDLE -> SUBSCRIBING -> REALTIME_ACTIVE -> POLLING_ACTIVE -> UNSUBSCRIBED
//!                    \_________________________/^
//! ```
//!
//! - **Realtime**: every account event triggers a fresh identity fetch.
//!   A channel that fails to open, closes, reports an error, or stays silent
//!   longer than `realtime_liveness` hands over to polling.
//! - **Polling**: one timer per subscription. Hidden surfaces skip the fetch
//!   but keep the timer chain alive. Success resets the delay to `base_delay`,
//!   failure doubles it up to `max_delay`, and a 401 enters a cooldown at
//!   `max_delay` that ends early when the surface becomes visible again.
//!
//! Ticks never overlap: the next wait starts only after the previous fetch
//! settled. The callback fires only when the observed identifier changes.

use crate::auth::appwrite::account::AccountApi;
use crate::auth::appwrite::realtime::{RealtimeConnector, RealtimeFeed, RealtimeMessage, ACCOUNT_CHANNEL};
use crate::auth::visibility::{became_visible, Visibility};
use crate::auth::{AuthCallback, Subscription, SubscriptionControl, SubscriptionPhase};
use crate::shared::config::PollSettings;
use crate::shared::error::{AuthError, Result};
use crate::shared::event::AuthEventKind;
use crate::shared::session::{Session, User};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Mutable per-subscription poll state
#[derive(Debug, Clone)]
pub struct PollState {
    base_delay: Duration,
    max_delay: Duration,
    last_known_identity: Option<String>,
    current_delay: Duration,
    unauthorized_cooldown: bool,
    consecutive_failures: u32,
    ticks: u64,
    fetches: u64,
}

/// Read-only view of a [`PollState`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSnapshot {
    pub last_known_identity: Option<String>,
    pub current_delay: Duration,
    pub unauthorized_cooldown: bool,
    pub consecutive_failures: u32,
    /// Timer expirations, including ones skipped while hidden
    pub ticks: u64,
    /// Identity fetches issued
    pub fetches: u64,
}

impl PollState {
    pub fn new(settings: &PollSettings) -> Self {
        let settings = PollSettings::new(settings.base_delay, settings.max_delay);
        Self {
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            last_known_identity: None,
            current_delay: settings.base_delay,
            unauthorized_cooldown: false,
            consecutive_failures: 0,
            ticks: 0,
            fetches: 0,
        }
    }

    /// Record the identity seen by a fetch. Returns `true` if it differs from the last one.
    pub fn observe(&mut self, identity: Option<&str>) -> bool {
        if self.last_known_identity.as_deref() == identity {
            return false;
        }
        self.last_known_identity = identity.map(str::to_string);
        true
    }

    pub fn record_success(&mut self) {
        self.current_delay = self.base_delay;
        self.unauthorized_cooldown = false;
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.current_delay = self
            .current_delay
            .checked_mul(2)
            .map_or(self.max_delay, |d| d.min(self.max_delay));
    }

    /// Credentials were rejected: wait the full interval before asking again
    pub fn enter_cooldown(&mut self) {
        self.unauthorized_cooldown = true;
        self.current_delay = self.max_delay;
    }

    pub fn leave_cooldown(&mut self) {
        self.unauthorized_cooldown = false;
        self.current_delay = self.base_delay;
    }

    pub fn delay(&self) -> Duration {
        self.current_delay
    }

    pub fn in_cooldown(&self) -> bool {
        self.unauthorized_cooldown
    }

    pub fn last_known_identity(&self) -> Option<&str> {
        self.last_known_identity.as_deref()
    }

    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            last_known_identity: self.last_known_identity.clone(),
            current_delay: self.current_delay,
            unauthorized_cooldown: self.unauthorized_cooldown,
            consecutive_failures: self.consecutive_failures,
            ticks: self.ticks,
            fetches: self.fetches,
        }
    }
}

/// Why the realtime loop stopped
enum RealtimeExit {
    Cancelled,
    Lost(String),
}

/// Background task behind one Appwrite subscription
pub(crate) struct Watcher {
    account: Arc<dyn AccountApi>,
    realtime: Option<Arc<dyn RealtimeConnector>>,
    visibility: Visibility,
    settings: PollSettings,
    callback: AuthCallback,
    control: Arc<SubscriptionControl>,
    state: PollState,
    snapshot: watch::Sender<PollSnapshot>,
}

impl Watcher {
    /// Start a watcher task and return its handle
    pub(crate) fn spawn(
        account: Arc<dyn AccountApi>,
        realtime: Option<Arc<dyn RealtimeConnector>>,
        visibility: Visibility,
        settings: PollSettings,
        callback: AuthCallback,
    ) -> Subscription {
        let control = SubscriptionControl::new();
        let state = PollState::new(&settings);
        let (snapshot, snapshot_rx) = watch::channel(state.snapshot());

        let watcher = Self {
            account,
            realtime,
            visibility,
            settings,
            callback,
            control: Arc::clone(&control),
            state,
            snapshot,
        };
        let task = tokio::spawn(watcher.run());

        Subscription::new(control, task, Some(snapshot_rx))
    }

    async fn run(mut self) {
        self.control.set_phase(SubscriptionPhase::Subscribing);

        if let Some(feed) = self.open_realtime().await {
            self.control.set_phase(SubscriptionPhase::RealtimeActive);
            tracing::info!("[Poller] Watching account via realtime channel");
            match self.run_realtime(feed).await {
                RealtimeExit::Cancelled => return,
                RealtimeExit::Lost(reason) => {
                    tracing::warn!("[Poller] Realtime channel lost ({}), falling back to polling", reason);
                }
            }
        }

        if !self.control.is_active() {
            return;
        }
        self.control.set_phase(SubscriptionPhase::PollingActive);
        tracing::info!(
            "[Poller] Polling account every {:?} (max {:?})",
            self.state.base_delay,
            self.state.max_delay
        );
        self.run_polling().await;
    }

    async fn open_realtime(&self) -> Option<RealtimeFeed> {
        let connector = self.realtime.as_ref()?;
        let timeout = self.settings.fetch_timeout;
        let opened = tokio::select! {
            _ = self.control.cancelled() => return None,
            opened = tokio::time::timeout(timeout, connector.open(ACCOUNT_CHANNEL)) => opened.unwrap_or_else(|_| {
                Err(AuthError::subscription(format!("Realtime handshake timed out after {:?}", timeout)))
            }),
        };
        match opened {
            Ok(feed) => Some(feed),
            Err(e) => {
                tracing::info!("[Poller] Realtime unavailable: {}", e);
                None
            }
        }
    }

    async fn run_realtime(&mut self, mut feed: RealtimeFeed) -> RealtimeExit {
        loop {
            let message = tokio::select! {
                _ = self.control.cancelled() => return RealtimeExit::Cancelled,
                message = next_message(&mut feed, self.settings.realtime_liveness) => message,
            };

            match message {
                Ok(Some(RealtimeMessage::Event { events, .. })) => {
                    tracing::debug!("[Poller] Account event: {:?}", events);
                    let Some(result) = self.fetch().await else {
                        return RealtimeExit::Cancelled;
                    };
                    match result {
                        Ok(user) => self.notify_if_changed(Some(user)),
                        Err(e) if e.is_unauthorized() => self.notify_if_changed(None),
                        Err(e) => tracing::warn!("[Poller] Account fetch after event failed: {}", e),
                    }
                    self.publish();
                }
                Ok(Some(RealtimeMessage::Error { code, message })) => {
                    return RealtimeExit::Lost(format!("error {}: {}", code, message));
                }
                Ok(Some(_)) => {}
                Ok(None) => return RealtimeExit::Lost("channel closed".to_string()),
                Err(silence) => {
                    return RealtimeExit::Lost(format!("no message for {:?}", silence));
                }
            }
        }
    }

    async fn run_polling(&mut self) {
        let mut visible_rx = self.visibility.watch();

        loop {
            let delay = self.state.delay();
            let resumed = if self.state.in_cooldown() {
                tokio::select! {
                    _ = self.control.cancelled() => return,
                    _ = tokio::time::sleep(delay) => false,
                    true = became_visible(&mut visible_rx) => true,
                }
            } else {
                tokio::select! {
                    _ = self.control.cancelled() => return,
                    _ = tokio::time::sleep(delay) => false,
                }
            };

            if resumed {
                tracing::info!("[Poller] Surface visible again, leaving cooldown");
                self.state.leave_cooldown();
            }
            self.state.ticks += 1;

            if !self.visibility.is_visible() {
                tracing::trace!("[Poller] Surface hidden, skipping fetch");
                self.publish();
                continue;
            }

            let Some(result) = self.fetch().await else {
                return;
            };
            if !self.control.is_active() {
                return;
            }
            self.apply(result);
            self.publish();
        }
    }

    /// Fetch the current account; `None` if the subscription was cancelled meanwhile
    async fn fetch(&mut self) -> Option<Result<User>> {
        self.state.fetches += 1;
        let timeout = self.settings.fetch_timeout;
        tokio::select! {
            _ = self.control.cancelled() => None,
            result = tokio::time::timeout(timeout, self.account.get()) => Some(
                result.unwrap_or_else(|_| Err(AuthError::network(format!("Account fetch timed out after {:?}", timeout))))
            ),
        }
    }

    fn apply(&mut self, result: Result<User>) {
        match result {
            Ok(user) => {
                self.state.record_success();
                self.notify_if_changed(Some(user));
            }
            Err(e) if e.is_unauthorized() => {
                self.notify_if_changed(None);
                if !self.state.in_cooldown() {
                    tracing::info!("[Poller] Session rejected, cooling down for {:?}", self.state.max_delay);
                }
                self.state.enter_cooldown();
            }
            Err(e) => {
                self.state.record_failure();
                if e.is_transient() {
                    tracing::debug!(
                        "[Poller] Account fetch failed ({} in a row), next attempt in {:?}: {}",
                        self.state.consecutive_failures,
                        self.state.delay(),
                        e
                    );
                } else {
                    tracing::warn!(
                        "[Poller] Account fetch rejected ({} in a row), next attempt in {:?}: {}",
                        self.state.consecutive_failures,
                        self.state.delay(),
                        e
                    );
                }
            }
        }
    }

    fn notify_if_changed(&mut self, user: Option<User>) {
        if self.state.observe(user.as_ref().map(User::identity)) {
            tracing::info!(
                "[Poller] Identity changed to {}",
                self.state.last_known_identity().unwrap_or("<none>")
            );
            self.control
                .emit(&self.callback, AuthEventKind::UserChanged, user.map(Session::from_user));
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.state.snapshot());
    }
}

/// Next realtime message, or `Err(window)` if nothing arrived within the liveness window
async fn next_message(
    feed: &mut RealtimeFeed,
    liveness: Option<Duration>,
) -> std::result::Result<Option<RealtimeMessage>, Duration> {
    match liveness {
        Some(window) => tokio::time::timeout(window, feed.recv())
            .await
            .map_err(|_| window),
        None => Ok(feed.recv().await),
    }
}
