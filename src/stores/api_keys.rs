//! API keys store.
//!
//! Same ordering rules as tunnels: delete drops the key locally only after
//! the server confirmed, create re-lists. The plaintext key from a create is
//! returned to the caller once and never cached.

use tokio::sync::watch;
use tracing::info;

use super::{Store, StoreState};
use crate::client::ApiClient;
use crate::types::{ApiKeyInfo, CreatedApiKey};

const FETCH_FAILED: &str = "failed to load api keys";
const CREATE_FAILED: &str = "failed to create api key";
const DELETE_FAILED: &str = "failed to delete api key";

pub struct ApiKeysStore {
    client: ApiClient,
    store: Store<Vec<ApiKeyInfo>>,
}

impl ApiKeysStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            store: Store::new(Vec::new()),
        }
    }

    /// Cached API keys. Never contains a plaintext secret.
    pub fn keys(&self) -> Vec<ApiKeyInfo> {
        self.store.data()
    }

    /// An operation is in flight.
    pub fn loading(&self) -> bool {
        self.store.loading()
    }

    /// Message from the last failed operation, cleared by the next one.
    pub fn error(&self) -> Option<String> {
        self.store.error()
    }

    /// Data and flags read together.
    pub fn snapshot(&self) -> StoreState<Vec<ApiKeyInfo>> {
        self.store.snapshot()
    }

    /// Receiver woken on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<Vec<ApiKeyInfo>>> {
        self.store.subscribe()
    }

    pub async fn fetch_keys(&self) {
        self.store.begin();
        match self.client.list_api_keys().await {
            Ok(keys) => self.store.succeed(|cache| *cache = keys),
            Err(e) => {
                self.store.fail("fetch_keys", &e, FETCH_FAILED);
            }
        }
    }

    pub async fn create_key(&self, name: &str) -> Option<CreatedApiKey> {
        self.store.begin();
        match self.client.create_api_key(name).await {
            Ok(created) => {
                info!(name = %created.name, prefix = %created.prefix, "api key created");
                self.fetch_keys().await;
                Some(created)
            }
            Err(e) => {
                self.store.fail("create_key", &e, CREATE_FAILED);
                None
            }
        }
    }

    pub async fn delete_key(&self, key_id: &str) -> bool {
        self.store.begin();
        match self.client.delete_api_key(key_id).await {
            Ok(()) => {
                info!(%key_id, "api key deleted");
                self.store.succeed(|cache| cache.retain(|k| k.id != key_id));
                true
            }
            Err(e) => {
                self.store.fail("delete_key", &e, DELETE_FAILED);
                false
            }
        }
    }
}
