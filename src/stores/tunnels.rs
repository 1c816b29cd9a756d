//! Tunnels store.
//!
//! Caches the user's tunnels. `active_tunnels` and `active_count` are views
//! computed from the cache on every read, never stored.
//!
//! Mutations only touch the cache after the server has confirmed them:
//! deletion filters the tunnel out once the DELETE succeeds, and creation
//! re-lists the collection so the cache carries server-assigned fields.

use tokio::sync::watch;
use tracing::info;

use super::{Store, StoreState};
use crate::client::ApiClient;
use crate::types::{CreateTunnelRequest, CreatedTunnel, Tunnel};

const FETCH_FAILED: &str = "failed to load tunnels";
const CREATE_FAILED: &str = "failed to create tunnel";
const DELETE_FAILED: &str = "failed to delete tunnel";

pub struct TunnelsStore {
    client: ApiClient,
    store: Store<Vec<Tunnel>>,
}

impl TunnelsStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            store: Store::new(Vec::new()),
        }
    }

    /// Cached tunnels in server order.
    pub fn tunnels(&self) -> Vec<Tunnel> {
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
    pub fn snapshot(&self) -> StoreState<Vec<Tunnel>> {
        self.store.snapshot()
    }

    /// Receiver woken on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<Vec<Tunnel>>> {
        self.store.subscribe()
    }

    /// Tunnels currently marked active.
    pub fn active_tunnels(&self) -> Vec<Tunnel> {
        self.store
            .read(|s| s.data.iter().filter(|t| t.is_active).cloned().collect())
    }

    /// Number of entries in [`active_tunnels`](Self::active_tunnels).
    pub fn active_count(&self) -> usize {
        self.store
            .read(|s| s.data.iter().filter(|t| t.is_active).count())
    }

    pub fn find_by_subdomain(&self, subdomain: &str) -> Option<Tunnel> {
        self.store
            .read(|s| s.data.iter().find(|t| t.subdomain == subdomain).cloned())
    }

    pub fn find_by_id(&self, id: &str) -> Option<Tunnel> {
        self.store
            .read(|s| s.data.iter().find(|t| t.id == id).cloned())
    }

    /// Replace the cache with the server's list.
    pub async fn fetch_tunnels(&self) {
        self.store.begin();
        match self.client.list_tunnels().await {
            Ok(tunnels) => self.store.succeed(|cache| *cache = tunnels),
            Err(e) => {
                self.store.fail("fetch_tunnels", &e, FETCH_FAILED);
            }
        }
    }

    /// Create a tunnel, then re-list.
    ///
    /// Returns the server's creation response, or `None` if the server
    /// refused. Any 2xx counts as confirmation, even one without a usable
    /// body (see [`error`](Self::error)). A failed re-list after a
    /// successful create still returns `Some`; the store's `error` then
    /// reflects the re-list.
    pub async fn create_tunnel(&self, request: &CreateTunnelRequest) -> Option<CreatedTunnel> {
        self.store.begin();
        match self.client.create_tunnel(request).await {
            Ok(created) => {
                info!(subdomain = %created.subdomain, "tunnel created");
                self.fetch_tunnels().await;
                Some(created)
            }
            Err(e) => {
                self.store.fail("create_tunnel", &e, CREATE_FAILED);
                None
            }
        }
    }

    /// Delete by subdomain. Returns `true` once the server confirmed and the
    /// tunnel was dropped from the cache.
    pub async fn delete_tunnel(&self, subdomain: &str) -> bool {
        self.store.begin();
        match self.client.delete_tunnel(subdomain).await {
            Ok(()) => {
                info!(%subdomain, "tunnel deleted");
                self.store
                    .succeed(|cache| cache.retain(|t| t.subdomain != subdomain));
                true
            }
            Err(e) => {
                self.store.fail("delete_tunnel", &e, DELETE_FAILED);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::harness;
    use crate::stores::fixtures;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    async fn seeded(
        tunnels: serde_json::Value,
    ) -> (crate::client::tests::Harness, TunnelsStore) {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tunnels": tunnels })))
            .up_to_n_times(1)
            .mount(&h.server)
            .await;
        let store = TunnelsStore::new(h.client.clone());
        store.fetch_tunnels().await;
        h.server.reset().await;
        (h, store)
    }

    #[tokio::test]
    async fn active_views_follow_cache() {
        let (_h, store) = seeded(json!([
            fixtures::tunnel("a", true),
            fixtures::tunnel("b", false),
            fixtures::tunnel("c", true),
        ]))
        .await;

        assert_eq!(store.tunnels().len(), 3);
        let active: Vec<String> = store
            .active_tunnels()
            .into_iter()
            .map(|t| t.subdomain)
            .collect();
        assert_eq!(active, vec!["a", "c"]);
        assert_eq!(store.active_count(), store.active_tunnels().len());
        assert_eq!(
            store.active_count(),
            store.tunnels().iter().filter(|t| t.is_active).count()
        );
    }

    #[tokio::test]
    async fn empty_cache_has_no_active_tunnels() {
        let h = harness(Some("t1")).await;
        let store = TunnelsStore::new(h.client.clone());
        assert_eq!(store.active_count(), 0);
        assert!(store.active_tunnels().is_empty());
    }

    #[tokio::test]
    async fn missing_tunnels_field_is_empty_list() {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&h.server)
            .await;
        let store = TunnelsStore::new(h.client.clone());
        store.fetch_tunnels().await;

        assert!(store.tunnels().is_empty());
        assert!(store.error().is_none());
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_stale_cache() {
        let (h, store) = seeded(json!([fixtures::tunnel("a", true)])).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
            .mount(&h.server)
            .await;

        store.fetch_tunnels().await;
        assert_eq!(store.tunnels().len(), 1);
        assert_eq!(store.error().as_deref(), Some("db down"));
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn fetch_failure_without_message_uses_fallback() {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&h.server)
            .await;
        let store = TunnelsStore::new(h.client.clone());
        store.fetch_tunnels().await;
        assert_eq!(store.error().as_deref(), Some("failed to load tunnels"));
    }

    #[tokio::test]
    async fn delete_removes_only_after_confirmation() {
        let (h, store) = seeded(json!([
            fixtures::tunnel("abc", true),
            fixtures::tunnel("xyz", true),
        ]))
        .await;
        Mock::given(method("DELETE"))
            .and(path("/api/tunnels/abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&h.server)
            .await;

        assert!(store.delete_tunnel("abc").await);
        assert!(store.find_by_subdomain("abc").is_none());
        assert!(store.find_by_subdomain("xyz").is_some());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn failed_delete_keeps_tunnel() {
        let (h, store) = seeded(json!([fixtures::tunnel("abc", true)])).await;
        Mock::given(method("DELETE"))
            .and(path("/api/tunnels/abc"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;

        assert!(!store.delete_tunnel("abc").await);
        assert!(store.find_by_subdomain("abc").is_some());
        assert_eq!(store.error().as_deref(), Some("failed to delete tunnel"));
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn create_refetches_instead_of_appending() {
        let h = harness(Some("t1")).await;
        Mock::given(method("POST"))
            .and(path("/api/tunnels"))
            .and(body_json(json!({ "target_port": 8080, "protocol": "http" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "subdomain": "brave-otter",
                "url": "https://brave-otter.needle.dev",
                "bind_addr": "127.0.0.1:40001"
            })))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tunnels": [fixtures::tunnel("brave-otter", true)]
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let store = TunnelsStore::new(h.client.clone());
        let created = store
            .create_tunnel(&CreateTunnelRequest {
                target_port: 8080,
                protocol: Some("http".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.subdomain, "brave-otter");
        let cached = store.tunnels();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "id-brave-otter");
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn bodiless_create_still_refetches() {
        let h = harness(Some("t1")).await;
        Mock::given(method("POST"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tunnels": [fixtures::tunnel("quiet-heron", true)]
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let store = TunnelsStore::new(h.client.clone());
        let created = store
            .create_tunnel(&CreateTunnelRequest {
                target_port: 3000,
                ..Default::default()
            })
            .await;

        assert_eq!(created, Some(CreatedTunnel::default()));
        let cached = store.tunnels();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].subdomain, "quiet-heron");
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn rejected_create_does_not_refetch() {
        let h = harness(Some("t1")).await;
        Mock::given(method("POST"))
            .and(path("/api/tunnels"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "tunnel limit reached" })),
            )
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tunnels": [] })))
            .expect(0)
            .mount(&h.server)
            .await;

        let store = TunnelsStore::new(h.client.clone());
        let created = store
            .create_tunnel(&CreateTunnelRequest {
                target_port: 8080,
                ..Default::default()
            })
            .await;
        assert!(created.is_none());
        assert_eq!(store.error().as_deref(), Some("tunnel limit reached"));
    }
}
