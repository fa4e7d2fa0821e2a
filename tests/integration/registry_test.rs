//! Adapter selection from configuration

use crate::common::*;
use bamboo_journal::auth::appwrite::RealtimeConnector;
use bamboo_journal::auth::{AuthRegistry, SubscriptionPhase};
use bamboo_journal::shared::config::{
    ENV_APPWRITE_ENDPOINT, ENV_APPWRITE_PROJECT_ID, ENV_BACKEND, ENV_SITE_URL, ENV_SUPABASE_ANON_KEY,
    ENV_SUPABASE_URL,
};
use bamboo_journal::shared::{AuthConfig, AuthError, BackendKind, ConfigError};
use serial_test::serial;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALL_VARS: [&str; 6] = [
    ENV_BACKEND,
    ENV_SUPABASE_URL,
    ENV_SUPABASE_ANON_KEY,
    ENV_APPWRITE_ENDPOINT,
    ENV_APPWRITE_PROJECT_ID,
    ENV_SITE_URL,
];

fn clear_env() {
    for var in ALL_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_environment_selects_appwrite() {
    clear_env();
    std::env::set_var(ENV_BACKEND, "appwrite");
    std::env::set_var(ENV_APPWRITE_ENDPOINT, "https://cloud.appwrite.io/v1");
    std::env::set_var(ENV_APPWRITE_PROJECT_ID, "bamboo");

    let config = AuthConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.backend, BackendKind::Appwrite);
    let registry = AuthRegistry::new(config).without_realtime();
    let auth = registry.adapter().unwrap();
    assert_eq!(auth.kind(), BackendKind::Appwrite);
    assert!(Arc::ptr_eq(&auth, &registry.adapter().unwrap()));
}

#[test]
#[serial]
fn test_environment_defaults_to_supabase() {
    clear_env();
    std::env::set_var(ENV_SUPABASE_URL, "https://abc.supabase.co");
    std::env::set_var(ENV_SUPABASE_ANON_KEY, "anon");

    let config = AuthConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.backend, BackendKind::Supabase);
    assert_eq!(AuthRegistry::new(config).adapter().unwrap().kind(), BackendKind::Supabase);
}

#[test]
#[serial]
fn test_unknown_backend_is_rejected() {
    clear_env();
    std::env::set_var(ENV_BACKEND, "firebase");
    let result = AuthConfig::from_env();
    clear_env();

    assert_eq!(result, Err(ConfigError::UnknownBackend("firebase".to_string())));
}

#[test]
#[serial]
fn test_missing_identifiers_fail_at_construction() {
    clear_env();
    std::env::set_var(ENV_SUPABASE_URL, "https://abc.supabase.co");
    let config = AuthConfig::from_env().unwrap();
    clear_env();

    let registry = AuthRegistry::new(config);
    crate::assert_err!(
        registry.adapter(),
        AuthError::Configuration(ConfigError::MissingValue(ENV_SUPABASE_ANON_KEY))
    );
}

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
backend = "appwrite"
site_url = "https://journal.example.com"

[appwrite]
endpoint = "https://cloud.appwrite.io/v1"
project_id = "bamboo"

[polling]
base_delay_ms = 1000
max_delay_ms = 30000
"#
    )
    .unwrap();

    let config = AuthConfig::from_file(file.path()).unwrap();
    assert_eq!(config.backend, BackendKind::Appwrite);
    assert_eq!(config.polling.base_delay, Duration::from_secs(1));
    assert_eq!(config.polling.max_delay, Duration::from_secs(30));
    assert_eq!(
        config.site_link("/auth/callback").as_deref(),
        Some("https://journal.example.com/auth/callback")
    );
}

#[tokio::test]
async fn test_custom_realtime_connector_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appwrite_account("64f1", "ink@bamboo.example")))
        .mount(&server)
        .await;

    let realtime = FakeRealtime::connected();
    let connector: Arc<dyn RealtimeConnector> = realtime.clone();
    let registry = AuthRegistry::new(appwrite_config(&server)).with_realtime(connector);
    let auth = registry.adapter().unwrap();

    let recorder = EventRecorder::new();
    let subscription = auth.on_auth_state_change(recorder.callback());
    let mut phases = subscription.phases();
    tokio::time::timeout(
        Duration::from_secs(5),
        phases.wait_for(|p| *p == SubscriptionPhase::RealtimeActive),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(realtime.opens(), 1);

    realtime.account_event().await;
    assert_eq!(recorder.wait_for(1).await[0].1.as_deref(), Some("64f1"));
}
