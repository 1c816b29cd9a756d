//! Resource stores.
//!
//! Each store owns one cache plus a `loading` flag and an `error` message,
//! held together in a [`StoreState`]. Every operation follows the same cycle:
//!
//! ```text
//! idle ──begin()──▶ loading ──succeed()──▶ idle, cache replaced, error cleared
//!                           └─fail()─────▶ idle, cache untouched, error set
//! ```
//!
//! State lives in a `tokio::sync::watch` channel. Updates are synchronous
//! (`send_modify`) and never straddle an `.await`, so each continuation
//! applies its result in one step. Overlapping calls are not coordinated:
//! whichever finishes last decides the visible state.
//!
//! Consumers either read snapshots or [`subscribe`](TunnelsStore::subscribe)
//! to be woken on every change.

pub mod analytics;
pub mod api_keys;
pub mod auth;
pub mod inspector;
pub mod tunnels;

pub use analytics::{AnalyticsData, AnalyticsStore};
pub use api_keys::ApiKeysStore;
pub use auth::AuthStore;
pub use inspector::InspectorStore;
pub use tunnels::TunnelsStore;

use tokio::sync::watch;
use tracing::warn;

use crate::error::ApiError;

/// Snapshot of one store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

/// Shared cell behind every store.
pub(crate) struct Store<T> {
    state: watch::Sender<StoreState<T>>,
}

impl<T> Store<T> {
    pub(crate) fn new(data: T) -> Self {
        let (state, _) = watch::channel(StoreState {
            data,
            loading: false,
            error: None,
        });
        Self { state }
    }

    /// Operation started.
    pub(crate) fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// Operation succeeded; `apply` updates the cache.
    pub(crate) fn succeed(&self, apply: impl FnOnce(&mut T)) {
        self.state.send_modify(|s| {
            apply(&mut s.data);
            s.error = None;
            s.loading = false;
        });
    }

    /// Operation failed. The cache is left as it was.
    pub(crate) fn fail(&self, operation: &'static str, err: &ApiError, fallback: &str) -> String {
        let message = err.user_message(fallback);
        warn!(operation, error = %err, "store operation failed");
        self.state.send_modify(|s| {
            s.error = Some(message.clone());
            s.loading = false;
        });
        message
    }

    /// Change the cache without touching `loading`/`error`.
    pub(crate) fn update(&self, apply: impl FnOnce(&mut T)) {
        self.state.send_modify(|s| apply(&mut s.data));
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState<T>) -> R) -> R {
        f(&self.state.borrow())
    }

    pub(crate) fn loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    pub(crate) fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StoreState<T>> {
        self.state.subscribe()
    }
}

impl<T: Clone> Store<T> {
    pub(crate) fn data(&self) -> T {
        self.read(|s| s.data.clone())
    }

    pub(crate) fn snapshot(&self) -> StoreState<T> {
        self.state.borrow().clone()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub(crate) fn tunnel(subdomain: &str, active: bool) -> Value {
        json!({
            "id": format!("id-{subdomain}"),
            "user_id": "u1",
            "subdomain": subdomain,
            "custom_domain": null,
            "target_port": 8080,
            "protocol": "http",
            "is_active": active,
            "is_persistent": false,
            "created_at": "2024-05-01T12:00:00Z",
            "last_active": "2024-05-01T12:30:00Z"
        })
    }

    pub(crate) fn request(id: &str, tunnel_id: &str) -> Value {
        json!({
            "id": id,
            "tunnel_id": tunnel_id,
            "method": "GET",
            "path": "/index.html",
            "status_code": 200,
            "latency_ms": 12,
            "request_headers": { "host": "brave-otter.needle.dev" },
            "response_headers": null,
            "timestamp": "2024-05-01T12:00:00Z"
        })
    }

    pub(crate) fn day(date: &str, total_requests: u64) -> Value {
        json!({
            "date": date,
            "total_requests": total_requests,
            "total_bytes_in": 1024,
            "total_bytes_out": 2048,
            "avg_latency_ms": 20,
            "error_count": 1,
            "unique_ips": 3
        })
    }

    pub(crate) fn user() -> Value {
        json!({
            "id": "u1",
            "email": "dev@needle.dev",
            "username": "dev",
            "tier": "free"
        })
    }
}
