//! Appwrite Account API
//!
//! The subset of `/v1/account` the adapter needs. Sessions are cookie based:
//! the client shares a [`Jar`] with the realtime connector so both speak as
//! the same account.

use crate::auth::http::{build_client, check_status, endpoint};
use crate::shared::error::Result;
use crate::shared::session::User;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const PROJECT_HEADER: &str = "X-Appwrite-Project";

/// Account operations used by the Appwrite adapter
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Account behind the current session; `Unauthorized` when there is none
    async fn get(&self) -> Result<User>;

    async fn create_email_password_session(&self, email: &str, password: &str) -> Result<Value>;

    async fn create(&self, user_id: &str, email: &str, password: &str) -> Result<User>;

    /// Delete every session of the current account
    async fn delete_sessions(&self) -> Result<()>;

    async fn update_password(&self, password: &str, old_password: Option<&str>) -> Result<User>;

    async fn create_recovery(&self, email: &str, url: &str) -> Result<()>;
}

/// REST implementation of [`AccountApi`]
#[derive(Debug, Clone)]
pub struct HttpAccount {
    client: Client,
    endpoint: Url,
    project_id: String,
}

impl HttpAccount {
    pub fn new(endpoint: Url, project_id: impl Into<String>, jar: Arc<Jar>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout, Some(jar))?,
            endpoint,
            project_id: project_id.into(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, endpoint(&self.endpoint, path))
            .header(PROJECT_HEADER, &self.project_id)
    }

    async fn send_json(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = check_status(builder.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl AccountApi for HttpAccount {
    async fn get(&self) -> Result<User> {
        let value = self.send_json(self.request(reqwest::Method::GET, "account")).await?;
        user_from_appwrite(&value)
    }

    async fn create_email_password_session(&self, email: &str, password: &str) -> Result<Value> {
        let body = json!({ "email": email, "password": password });
        self.send_json(self.request(reqwest::Method::POST, "account/sessions/email").json(&body))
            .await
    }

    async fn create(&self, user_id: &str, email: &str, password: &str) -> Result<User> {
        let body = json!({ "userId": user_id, "email": email, "password": password });
        let value = self
            .send_json(self.request(reqwest::Method::POST, "account").json(&body))
            .await?;
        user_from_appwrite(&value)
    }

    async fn delete_sessions(&self) -> Result<()> {
        self.send_json(self.request(reqwest::Method::DELETE, "account/sessions"))
            .await
            .map(|_| ())
    }

    async fn update_password(&self, password: &str, old_password: Option<&str>) -> Result<User> {
        let mut body = json!({ "password": password });
        if let Some(old) = old_password {
            body["oldPassword"] = json!(old);
        }
        let value = self
            .send_json(self.request(reqwest::Method::PATCH, "account/password").json(&body))
            .await?;
        user_from_appwrite(&value)
    }

    async fn create_recovery(&self, email: &str, url: &str) -> Result<()> {
        let body = json!({ "email": email, "url": url });
        self.send_json(self.request(reqwest::Method::POST, "account/recovery").json(&body))
            .await
            .map(|_| ())
    }
}

/// Map an Appwrite account document onto [`User`]
pub(crate) fn user_from_appwrite(value: &Value) -> Result<User> {
    let id = value
        .get("$id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| crate::shared::error::AuthError::serialization("Account document without $id"))?;

    let mut user = User::new(id);
    user.email = value
        .get("email")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    user.name = value
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    user.metadata = value.get("prefs").cloned().unwrap_or(Value::Null);
    Ok(user)
}
