//! Wire types for the needle API.
//!
//! Entities mirror what the server returns. The `*List` envelopes keep their
//! collection field optional so that a body missing the field (or carrying
//! `null`) decodes as an empty collection instead of an error.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub tier: String,
    /// Absent in login/register responses.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A tunnel owned by the current user. `subdomain` is its external key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub id: String,
    pub user_id: String,
    pub subdomain: String,
    #[serde(default)]
    pub custom_domain: Option<String>,
    pub target_port: u16,
    pub protocol: String,
    pub is_active: bool,
    pub is_persistent: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One proxied HTTP exchange, as recorded by the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRequest {
    pub id: String,
    pub tunnel_id: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub latency_ms: u32,
    /// Stored as arbitrary JSON; usually an object of header name to string.
    #[serde(default)]
    pub request_headers: Option<Value>,
    #[serde(default)]
    pub response_headers: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl TunnelRequest {
    /// A request header as a string, if present in that form.
    pub fn request_header(&self, name: &str) -> Option<&str> {
        header_str(self.request_headers.as_ref(), name)
    }

    /// A response header as a string, if present in that form.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        header_str(self.response_headers.as_ref(), name)
    }
}

fn header_str<'a>(headers: Option<&'a Value>, name: &str) -> Option<&'a str> {
    headers?
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))?
        .1
        .as_str()
}

/// Per-day traffic rollup for a tunnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_requests: u64,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub avg_latency_ms: u32,
    pub error_count: u64,
    pub unique_ips: u64,
}

/// Seven-day totals across all of the user's tunnels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_tunnels: u64,
    pub requests_7d: u64,
    pub bytes_7d: u64,
}

/// An API key as listed by the server. The secret itself is never listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

/// Result of creating an API key. `key` is shown exactly once.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedApiKey {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub key: String,
}

impl fmt::Debug for CreatedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedApiKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /api/tunnels`. Unset fields are left to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateTunnelRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    pub target_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_persistent: Option<bool>,
}

/// What the server hands back for a freshly created tunnel. The full record
/// is obtained by re-listing. Empty when the server confirmed without a body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreatedTunnel {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bind_addr: Option<String>,
}

/// Body of `POST /api/auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/register`.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login/register response.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateApiKeyRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TunnelList {
    #[serde(default)]
    pub tunnels: Option<Vec<Tunnel>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RequestList {
    #[serde(default)]
    pub requests: Option<Vec<TunnelRequest>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatsList {
    #[serde(default)]
    pub stats: Option<Vec<DailyStats>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SummaryEnvelope {
    #[serde(default)]
    pub summary: Option<AnalyticsSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct KeyList {
    #[serde(default)]
    pub keys: Option<Vec<ApiKeyInfo>>,
}
