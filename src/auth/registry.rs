//! # Adapter Registry
//!
//! Selects the adapter for the configured backend and hands out one shared
//! instance per backend kind for the lifetime of the registry. Callers keep a
//! registry (usually one per process) instead of relying on a global.
//!
//! Construction errors are returned to the caller and not cached, so a later
//! call with a fixed environment can still succeed.

use crate::auth::appwrite::{AppwriteAuth, RealtimeConnector};
use crate::auth::supabase::SupabaseAuth;
use crate::auth::visibility::Visibility;
use crate::auth::AuthAdapter;
use crate::shared::config::{AuthConfig, BackendKind};
use crate::shared::error::Result;
use std::sync::{Arc, Mutex, OnceLock};

/// How Appwrite subscriptions obtain their realtime channel
#[derive(Clone, Default)]
enum RealtimeMode {
    /// Websocket connector built from configuration
    #[default]
    Default,
    /// Polling only
    Disabled,
    Custom(Arc<dyn RealtimeConnector>),
}

/// Per-process adapter container
pub struct AuthRegistry {
    config: AuthConfig,
    visibility: Visibility,
    realtime: RealtimeMode,
    supabase: OnceLock<Arc<AuthAdapter>>,
    appwrite: OnceLock<Arc<AuthAdapter>>,
    /// Serialises construction so concurrent first calls build one adapter
    init: Mutex<()>,
}

impl AuthRegistry {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            visibility: Visibility::default(),
            realtime: RealtimeMode::Default,
            supabase: OnceLock::new(),
            appwrite: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Visibility signal shared by every Appwrite subscription
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_realtime(mut self, connector: Arc<dyn RealtimeConnector>) -> Self {
        self.realtime = RealtimeMode::Custom(connector);
        self
    }

    /// Appwrite subscriptions go straight to polling
    pub fn without_realtime(mut self) -> Self {
        self.realtime = RealtimeMode::Disabled;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Adapter for the configured backend
    pub fn adapter(&self) -> Result<Arc<AuthAdapter>> {
        self.adapter_for(self.config.backend)
    }

    /// Adapter for an explicit backend, built on first use
    pub fn adapter_for(&self, kind: BackendKind) -> Result<Arc<AuthAdapter>> {
        let slot = match kind {
            BackendKind::Supabase => &self.supabase,
            BackendKind::Appwrite => &self.appwrite,
        };
        if let Some(adapter) = slot.get() {
            return Ok(Arc::clone(adapter));
        }

        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(adapter) = slot.get() {
            return Ok(Arc::clone(adapter));
        }

        let adapter = Arc::new(self.build(kind).map_err(|e| {
            tracing::error!("[Registry] Failed to build {} adapter: {}", kind, e);
            e
        })?);
        tracing::info!("[Registry] Using {} auth backend", kind);
        Ok(Arc::clone(slot.get_or_init(|| adapter)))
    }

    fn build(&self, kind: BackendKind) -> Result<AuthAdapter> {
        match kind {
            BackendKind::Supabase => Ok(AuthAdapter::Supabase(SupabaseAuth::new(&self.config)?)),
            BackendKind::Appwrite => {
                let mut auth = AppwriteAuth::new(&self.config, self.visibility.clone())?;
                match &self.realtime {
                    RealtimeMode::Default => {}
                    RealtimeMode::Disabled => auth.set_realtime(None),
                    RealtimeMode::Custom(connector) => auth.set_realtime(Some(Arc::clone(connector))),
                }
                Ok(AuthAdapter::Appwrite(auth))
            }
        }
    }
}

impl std::fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRegistry")
            .field("backend", &self.config.backend)
            .field("supabase_ready", &self.supabase.get().is_some())
            .field("appwrite_ready", &self.appwrite.get().is_some())
            .finish()
    }
}
