//! In-process fakes for the Appwrite seams
//!
//! `ScriptedAccount` answers `get` from a queue of scripted results and then a
//! steady result, and can hold a fetch open until released. `FakeRealtime`
//! hands out channel-backed feeds the test can push frames into.

use async_trait::async_trait;
use bamboo_journal::auth::appwrite::{AccountApi, RealtimeConnector, RealtimeFeed, RealtimeMessage};
use bamboo_journal::shared::{AuthError, Result, User};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Account whose `get` follows a script
pub struct ScriptedAccount {
    script: Mutex<VecDeque<Result<User>>>,
    steady: Mutex<Result<User>>,
    gated: AtomicBool,
    hang: AtomicBool,
    gate: Notify,
    gets: AtomicUsize,
    sessions_deleted: AtomicUsize,
}

impl ScriptedAccount {
    pub fn new(steady: Result<User>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            steady: Mutex::new(steady),
            gated: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            gate: Notify::new(),
            gets: AtomicUsize::new(0),
            sessions_deleted: AtomicUsize::new(0),
        })
    }

    pub fn signed_in(id: &str) -> Arc<Self> {
        Self::new(Ok(user(id)))
    }

    pub fn signed_out() -> Arc<Self> {
        Self::new(Err(unauthorized()))
    }

    /// Queue results returned before the steady one
    pub fn then(&self, result: Result<User>) -> &Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn set_steady(&self, result: Result<User>) {
        *self.steady.lock().unwrap() = result;
    }

    /// Hold every `get` until [`release`](Self::release) is called
    pub fn gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    /// Make every `get` pend forever
    pub fn hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sessions_deleted(&self) -> usize {
        self.sessions_deleted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountApi for ScriptedAccount {
    async fn get(&self) -> Result<User> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.steady.lock().unwrap().clone())
    }

    async fn create_email_password_session(&self, _email: &str, _password: &str) -> Result<Value> {
        Ok(json!({ "$id": "session-1", "provider": "email" }))
    }

    async fn create(&self, user_id: &str, email: &str, _password: &str) -> Result<User> {
        Ok(User::new(user_id).with_email(email))
    }

    async fn delete_sessions(&self) -> Result<()> {
        self.sessions_deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_password(&self, _password: &str, _old_password: Option<&str>) -> Result<User> {
        self.steady.lock().unwrap().clone()
    }

    async fn create_recovery(&self, _email: &str, _url: &str) -> Result<()> {
        Ok(())
    }
}

/// Realtime connector backed by in-process channels
pub struct FakeRealtime {
    fail: bool,
    stall: bool,
    opens: AtomicUsize,
    senders: Mutex<Vec<mpsc::Sender<RealtimeMessage>>>,
}

impl FakeRealtime {
    pub fn connected() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            stall: false,
            opens: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            stall: false,
            opens: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
        })
    }

    /// Connector whose handshake never completes
    pub fn stalled() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            stall: true,
            opens: AtomicUsize::new(0),
            senders: Mutex::new(Vec::new()),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Deliver a frame to every open feed
    pub async fn push(&self, message: RealtimeMessage) {
        let senders: Vec<_> = self.senders.lock().unwrap().clone();
        for sender in senders {
            let _ = sender.send(message.clone()).await;
        }
    }

    pub async fn account_event(&self) {
        self.push(RealtimeMessage::Event {
            events: vec!["users.*.sessions.*.create".to_string()],
            channels: vec!["account".to_string()],
        })
        .await;
    }

    /// Close every open feed
    pub fn close(&self) {
        self.senders.lock().unwrap().clear();
    }
}

#[async_trait]
impl RealtimeConnector for FakeRealtime {
    async fn open(&self, _channel: &str) -> Result<RealtimeFeed> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(AuthError::subscription("realtime not supported"));
        }
        let (tx, feed) = RealtimeFeed::channel(16);
        self.senders.lock().unwrap().push(tx);
        Ok(feed)
    }
}

pub fn user(id: &str) -> User {
    User::new(id).with_email(format!("{}@bamboo.example", id))
}

pub fn unauthorized() -> AuthError {
    AuthError::unauthorized("User (role: guests) missing scope (account)")
}

pub fn network() -> AuthError {
    AuthError::network("connection reset")
}
