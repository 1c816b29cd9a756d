//! Analytics store.
//!
//! Holds two independent slices: the per-day series for one tunnel (kept in
//! the server's order) and the account-wide seven-day summary. Each fetch
//! only touches its own slice; `loading` and `error` are shared.

use tokio::sync::watch;

use super::{Store, StoreState};
use crate::client::ApiClient;
use crate::types::{AnalyticsSummary, DailyStats};

/// Window used when the caller has no preference.
pub const DEFAULT_DAYS: u32 = 30;

const STATS_FAILED: &str = "failed to load analytics";
const SUMMARY_FAILED: &str = "failed to load summary";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsData {
    pub daily_stats: Vec<DailyStats>,
    pub summary: Option<AnalyticsSummary>,
}

pub struct AnalyticsStore {
    client: ApiClient,
    store: Store<AnalyticsData>,
}

impl AnalyticsStore {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            store: Store::new(AnalyticsData::default()),
        }
    }

    /// Per-day series for the last fetched tunnel.
    pub fn daily_stats(&self) -> Vec<DailyStats> {
        self.store.read(|s| s.data.daily_stats.clone())
    }

    pub fn summary(&self) -> Option<AnalyticsSummary> {
        self.store.read(|s| s.data.summary)
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
    pub fn snapshot(&self) -> StoreState<AnalyticsData> {
        self.store.snapshot()
    }

    /// Receiver woken on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<AnalyticsData>> {
        self.store.subscribe()
    }

    pub async fn fetch_tunnel_stats(&self, tunnel_id: &str, days: u32) {
        self.store.begin();
        match self.client.tunnel_analytics(tunnel_id, days).await {
            Ok(stats) => self.store.succeed(|data| data.daily_stats = stats),
            Err(e) => {
                self.store.fail("fetch_tunnel_stats", &e, STATS_FAILED);
            }
        }
    }

    /// A response without a `summary` field leaves the summary absent.
    pub async fn fetch_summary(&self) {
        self.store.begin();
        match self.client.analytics_summary().await {
            Ok(summary) => self.store.succeed(|data| data.summary = summary),
            Err(e) => {
                self.store.fail("fetch_summary", &e, SUMMARY_FAILED);
            }
        }
    }
}
