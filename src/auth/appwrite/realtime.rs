//! # Appwrite Realtime Channel
//!
//! Minimal client for the Appwrite realtime websocket. The session watcher
//! only needs to know *that* something happened on the `account` channel, so
//! frames are reduced to [`RealtimeMessage`] and the payloads are dropped.
//!
//! ## Wire Format
//!
//! ```text
//! {"type":"connected","data":{"channels":["account"],"user":{...}}}
//! {"type":"event","data":{"events":["users.*.sessions.*.create"],"channels":["account"],"payload":{...}}}
//! {"type":"error","data":{"code":1008,"message":"..."}}
//! {"type":"pong"}
//! ```

use crate::shared::error::{AuthError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Channel carrying changes to the signed-in account
pub const ACCOUNT_CHANNEL: &str = "account";

const PING_INTERVAL: Duration = Duration::from_secs(20);
const FEED_CAPACITY: usize = 32;

/// A decoded realtime frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeMessage {
    Connected { channels: Vec<String> },
    Event { events: Vec<String>, channels: Vec<String> },
    Pong,
    Error { code: i64, message: String },
}

impl RealtimeMessage {
    /// Decode a text frame. Unknown frame types yield `Ok(None)`.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let data = value.get("data");
        let strings = |key: &str| -> Vec<String> {
            data.and_then(|d| d.get(key))
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        let message = match value.get("type").and_then(|t| t.as_str()) {
            Some("connected") => Self::Connected {
                channels: strings("channels"),
            },
            Some("event") => Self::Event {
                events: strings("events"),
                channels: strings("channels"),
            },
            Some("pong") => Self::Pong,
            Some("error") => Self::Error {
                code: data.and_then(|d| d.get("code")).and_then(|c| c.as_i64()).unwrap_or_default(),
                message: data
                    .and_then(|d| d.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown realtime error")
                    .to_string(),
            },
            Some(other) => {
                tracing::trace!("[Realtime] Ignoring frame type {}", other);
                return Ok(None);
            }
            None => return Err(AuthError::serialization("Realtime frame without a type")),
        };
        Ok(Some(message))
    }
}

/// Stream of decoded messages from an open channel.
///
/// Dropping the feed closes the underlying connection.
#[derive(Debug)]
pub struct RealtimeFeed {
    rx: mpsc::Receiver<RealtimeMessage>,
    pump: Option<JoinHandle<()>>,
}

impl RealtimeFeed {
    pub fn new(rx: mpsc::Receiver<RealtimeMessage>, pump: Option<JoinHandle<()>>) -> Self {
        Self { rx, pump }
    }

    /// Feed backed by a plain channel, for in-process sources
    pub fn channel(capacity: usize) -> (mpsc::Sender<RealtimeMessage>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, None))
    }

    /// Next message, or `None` once the channel closed
    pub async fn recv(&mut self) -> Option<RealtimeMessage> {
        self.rx.recv().await
    }
}

impl Drop for RealtimeFeed {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Opens realtime channels
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn open(&self, channel: &str) -> Result<RealtimeFeed>;
}

/// Websocket connector sharing the account client's cookies
pub struct WebSocketRealtime {
    endpoint: Url,
    project_id: String,
    jar: Arc<Jar>,
}

impl WebSocketRealtime {
    pub fn new(endpoint: Url, project_id: impl Into<String>, jar: Arc<Jar>) -> Self {
        Self {
            endpoint,
            project_id: project_id.into(),
            jar,
        }
    }

    /// `ws(s)://<endpoint>/realtime?project=..&channels[]=..`
    fn socket_url(&self, channel: &str) -> Result<Url> {
        let mut url = Url::parse(&crate::auth::http::endpoint(&self.endpoint, "realtime"))
            .map_err(|e| AuthError::subscription(format!("Invalid realtime URL: {}", e)))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| AuthError::subscription("Realtime endpoint must be http(s)"))?;
        url.query_pairs_mut()
            .append_pair("project", &self.project_id)
            .append_pair("channels[]", channel);
        Ok(url)
    }
}

#[async_trait]
impl RealtimeConnector for WebSocketRealtime {
    async fn open(&self, channel: &str) -> Result<RealtimeFeed> {
        let url = self.socket_url(channel)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| AuthError::subscription(format!("Invalid realtime request: {}", e)))?;

        // Cookies are scoped to the HTTP origin, not the ws:// one
        let cookies = self
            .jar
            .cookies(&self.endpoint)
            .and_then(|value| value.to_str().ok().map(str::to_string))
            .and_then(|value| HeaderValue::from_str(&value).ok());
        if let Some(cookies) = cookies {
            request.headers_mut().insert("Cookie", cookies);
        }

        tracing::debug!("[Realtime] Connecting to {}", url);
        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| AuthError::subscription(format!("Realtime connect failed: {}", e)))?;

        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let pump = tokio::spawn(async move {
            let (mut sink, mut stream) = socket.split();
            let mut ping = tokio::time::interval(PING_INTERVAL);
            ping.tick().await;

            loop {
                tokio::select! {
                    _ = ping.tick() => {
                        let frame = serde_json::json!({ "type": "ping" }).to_string();
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            tracing::debug!("[Realtime] Ping failed: {}", e);
                            break;
                        }
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => match RealtimeMessage::parse(text.as_str()) {
                            Ok(Some(message)) => {
                                if tx.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => tracing::warn!("[Realtime] Undecodable frame: {}", e),
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!("[Realtime] Closed by server: {:?}", frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!("[Realtime] Socket error: {}", e);
                            break;
                        }
                        None => break,
                    },
                }
            }
            let _ = sink.close().await;
        });

        Ok(RealtimeFeed::new(rx, Some(pump)))
    }
}
