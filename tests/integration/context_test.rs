//! Session context driving state and navigation

use crate::common::*;
use bamboo_journal::auth::appwrite::AccountApi;
use bamboo_journal::auth::{AppwriteAuth, AuthAdapter, AuthRegistry, Route, SessionContext, Visibility};
use bamboo_journal::shared::{AuthConfig, AuthError, PollSettings};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context(account: &Arc<ScriptedAccount>) -> SessionContext {
    let api: Arc<dyn AccountApi> = account.clone();
    let auth = AppwriteAuth::with_parts(api, None, Visibility::default(), PollSettings::default());
    SessionContext::new(
        Arc::new(AuthAdapter::Appwrite(auth)),
        Some("https://journal.example.com".to_string()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_start_loads_session_then_follows_changes() {
    let account = ScriptedAccount::signed_in("u1");
    let context = context(&account);
    assert!(context.state().is_loading);

    context.start().await.unwrap();
    let state = context.state();
    assert!(!state.is_loading);
    assert_eq!(state.user.map(|u| u.id).as_deref(), Some("u1"));
    assert_eq!(context.route(), None);

    advance(Duration::from_millis(3_100)).await;
    assert_eq!(context.route(), Some(Route::Home));

    account.set_steady(Err(unauthorized()));
    advance(Duration::from_secs(3)).await;
    assert_eq!(context.route(), Some(Route::Login));
    assert!(context.state().session.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_keeps_one_subscription() {
    let account = ScriptedAccount::signed_in("u1");
    let context = context(&account);

    context.start().await.unwrap();
    context.start().await.unwrap();
    assert_eq!(account.gets(), 2);

    advance(Duration::from_millis(3_100)).await;
    assert_eq!(account.gets(), 3, "one poller, one fetch per tick");
}

#[tokio::test(start_paused = true)]
async fn test_start_survives_backend_error() {
    let account = ScriptedAccount::new(Err(network()));
    let context = context(&account);

    context.start().await.unwrap();
    let state = context.state();
    assert!(!state.is_loading);
    assert!(state.user.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_and_out_navigate() {
    let account = ScriptedAccount::signed_in("u1");
    let context = context(&account);
    let mut routes = context.watch_route();

    let session = context.sign_in("u1@bamboo.example", "bamboo-secret").await.unwrap();
    assert_eq!(session.identity(), "u1");
    assert_eq!(*routes.borrow_and_update(), Some(Route::Home));
    assert_eq!(context.state().user.map(|u| u.id).as_deref(), Some("u1"));

    context.sign_out().await.unwrap();
    assert_eq!(*routes.borrow_and_update(), Some(Route::Login));
    assert!(context.state().user.is_none());
    assert_eq!(account.sessions_deleted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_updates() {
    let account = ScriptedAccount::signed_in("u1");
    let context = context(&account);
    context.start().await.unwrap();

    context.stop();
    advance(Duration::from_secs(10)).await;
    assert_eq!(account.gets(), 1);
    assert_eq!(context.route(), None);
}

#[tokio::test]
async fn test_sign_up_redirects_to_callback_and_verification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(query_param("redirect_to", "https://journal.example.com/auth/callback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gotrue_user("u9", "new@bamboo.example")))
        .expect(1)
        .mount(&server)
        .await;

    let registry = AuthRegistry::new(supabase_config(&server));
    let context = SessionContext::from_registry(&registry);
    assert!(context.is_enabled());

    let user = context.sign_up("new@bamboo.example", "bamboo-secret").await.unwrap();
    assert_eq!(user.id, "u9");
    assert_eq!(context.route(), Some(Route::VerifyEmail));
}

#[tokio::test]
async fn test_reset_password_uses_site_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/recover"))
        .and(query_param("redirect_to", "https://journal.example.com/auth/reset-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = AuthRegistry::new(supabase_config(&server));
    let context = SessionContext::from_registry(&registry);
    crate::assert_ok!(context.reset_password("ink@bamboo.example").await);
}

#[tokio::test]
async fn test_unconfigured_backend_disables_context() {
    let registry = AuthRegistry::new(AuthConfig::default());
    let context = SessionContext::from_registry(&registry);

    assert!(!context.is_enabled());
    crate::assert_err!(context.start().await, AuthError::Disabled);
    crate::assert_err!(context.sign_in("a@b.c", "pw").await, AuthError::Disabled);
    assert!(!context.state().is_loading);
}
