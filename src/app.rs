//! Wiring: one credential holder, one navigator, one pipeline, all stores.

use std::sync::Arc;

use tracing::debug;

use crate::client::ApiClient;
use crate::config::{ApiConfig, Config};
use crate::error::Error;
use crate::router::Navigator;
use crate::session::{CredentialHolder, FileStorage};
use crate::stores::{AnalyticsStore, ApiKeysStore, AuthStore, InspectorStore, TunnelsStore};

/// Everything a dashboard front end talks to.
///
/// All stores share the same [`ApiClient`], so a 401 seen by any of them
/// clears the one credential and moves the one navigator to login.
pub struct Dashboard {
    pub credentials: Arc<CredentialHolder>,
    pub navigator: Arc<Navigator>,
    pub client: ApiClient,
    pub auth: AuthStore,
    pub tunnels: TunnelsStore,
    pub inspector: InspectorStore,
    pub analytics: AnalyticsStore,
    pub api_keys: ApiKeysStore,
}

impl Dashboard {
    /// Build from config, restoring any credential persisted under
    /// `session.data_dir`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let storage = FileStorage::new(config.data_dir());
        debug!(path = %storage.path().display(), "credential storage");
        let credentials = Arc::new(CredentialHolder::open(storage)?);
        Self::with_credentials(&config.api, credentials)
    }

    /// Build around an existing holder. An unusable `api.base_url` is a
    /// [`ConfigError`](crate::error::ConfigError).
    pub fn with_credentials(
        api: &ApiConfig,
        credentials: Arc<CredentialHolder>,
    ) -> Result<Self, Error> {
        let navigator = Arc::new(Navigator::new(Arc::clone(&credentials)));
        let client = ApiClient::new(api, Arc::clone(&credentials), Arc::clone(&navigator))?;
        Ok(Self {
            auth: AuthStore::new(client.clone(), Arc::clone(&credentials)),
            tunnels: TunnelsStore::new(client.clone()),
            inspector: InspectorStore::new(client.clone()),
            analytics: AnalyticsStore::new(client.clone()),
            api_keys: ApiKeysStore::new(client.clone()),
            credentials,
            navigator,
            client,
        })
    }
}
