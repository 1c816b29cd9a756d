//! Inspector store: recent requests through one tunnel.
//!
//! The cache is replaced wholesale on every fetch and only ever holds the
//! tunnel that was fetched last.

use tokio::sync::watch;

use super::{Store, StoreState};
use crate::client::ApiClient;
use crate::types::TunnelRequest;

/// Page size used when the caller has no preference.
pub const DEFAULT_LIMIT: u32 = 50;

const FETCH_FAILED: &str = "failed to load requests";

pub struct InspectorStore {
    client: ApiClient,
    store: Store<Vec<TunnelRequest>>,
}

impl InspectorStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            store: Store::new(Vec::new()),
        }
    }

    /// Cached requests for the last fetched tunnel, newest first as served.
    pub fn requests(&self) -> Vec<TunnelRequest> {
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
    pub fn snapshot(&self) -> StoreState<Vec<TunnelRequest>> {
        self.store.snapshot()
    }

    /// Receiver woken on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<Vec<TunnelRequest>>> {
        self.store.subscribe()
    }

    pub async fn fetch_requests(&self, tunnel_id: &str, limit: u32) {
        self.store.begin();
        match self.client.list_requests(tunnel_id, limit).await {
            Ok(requests) => self.store.succeed(|cache| *cache = requests),
            Err(e) => {
                self.store.fail("fetch_requests", &e, FETCH_FAILED);
            }
        }
    }

    /// Empty the cache. `loading` and `error` are left alone.
    pub fn clear(&self) {
        self.store.update(Vec::clear);
    }
}
