//! HTTP client for the needle API: the shared request pipeline.
//!
//! [`ApiClient`] wraps one `reqwest::Client` built against a base endpoint
//! that is fixed at construction. Every store goes through it. Each call runs
//! the same two hooks:
//!
//! - **Outgoing**: if the [`CredentialHolder`] has a token, attach
//!   `Authorization: Bearer <token>`. No token is not an error; the request
//!   goes out unauthenticated and the server decides.
//! - **Incoming**: 2xx passes through. A 401 clears the credential and forces
//!   the [`Navigator`] to the login route, whichever store made the call, and
//!   is then returned like any other failure so the caller's own handling
//!   still runs. Other statuses are returned untouched.
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for an `error` field in the JSON body. If
//! there is none, [`ApiError::Status`] carries `message: None` and the caller
//! picks its own fallback text.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{normalize_base_url, ApiConfig};
use crate::error::{ApiError, ConfigError, Error};
use crate::router::Navigator;
use crate::session::CredentialHolder;
use crate::types::{
    AnalyticsSummary, ApiKeyInfo, AuthResponse, CreateApiKeyRequest, CreateTunnelRequest,
    CreatedApiKey, CreatedTunnel, DailyStats, Health, KeyList, LoginRequest, RegisterRequest,
    RequestList, StatsList, SummaryEnvelope, Tunnel, TunnelList, TunnelRequest,
};

/// The request pipeline. Cheap to clone; clones share the connection pool,
/// the credential holder and the navigator.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialHolder>,
    navigator: Arc<Navigator>,
}

impl ApiClient {
    /// Build the pipeline for `config.base_url`.
    pub fn new(
        config: &ApiConfig,
        credentials: Arc<CredentialHolder>,
        navigator: Arc<Navigator>,
    ) -> Result<Self, Error> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("needle-client/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ApiError::from)?;
        Ok(Self {
            http,
            base_url,
            credentials,
            navigator,
        })
    }

    /// The base endpoint (without trailing slash).
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// `GET /health` liveness probe.
    pub async fn health(&self) -> Result<Health, ApiError> {
        let resp = self.send(Method::GET, &["health"], |r| r).await?;
        decode(resp).await
    }

    /// `POST /api/auth/login`
    pub async fn login(&self, body: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let resp = self
            .send(Method::POST, &["api", "auth", "login"], |r| r.json(body))
            .await?;
        decode(resp).await
    }

    /// `POST /api/auth/register`
    pub async fn register(&self, body: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let resp = self
            .send(Method::POST, &["api", "auth", "register"], |r| r.json(body))
            .await?;
        decode(resp).await
    }

    /// `GET /api/tunnels`
    pub async fn list_tunnels(&self) -> Result<Vec<Tunnel>, ApiError> {
        let resp = self.send(Method::GET, &["api", "tunnels"], |r| r).await?;
        let list: TunnelList = decode_lenient(resp).await?;
        Ok(list.tunnels.unwrap_or_default())
    }

    /// `POST /api/tunnels`
    ///
    /// Any 2xx confirms the creation. A body that does not carry the created
    /// tunnel yields [`CreatedTunnel::default`].
    pub async fn create_tunnel(
        &self,
        body: &CreateTunnelRequest,
    ) -> Result<CreatedTunnel, ApiError> {
        let resp = self
            .send(Method::POST, &["api", "tunnels"], |r| r.json(body))
            .await?;
        decode_lenient(resp).await
    }

    /// `DELETE /api/tunnels/:subdomain`
    pub async fn delete_tunnel(&self, subdomain: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &["api", "tunnels", subdomain], |r| r)
            .await?;
        Ok(())
    }

    /// `GET /api/tunnels/:id/requests?limit=N`
    pub async fn list_requests(
        &self,
        tunnel_id: &str,
        limit: u32,
    ) -> Result<Vec<TunnelRequest>, ApiError> {
        let resp = self
            .send(Method::GET, &["api", "tunnels", tunnel_id, "requests"], |r| {
                r.query(&[("limit", limit)])
            })
            .await?;
        let list: RequestList = decode_lenient(resp).await?;
        Ok(list.requests.unwrap_or_default())
    }

    /// `GET /api/tunnels/:id/analytics?days=N`
    pub async fn tunnel_analytics(
        &self,
        tunnel_id: &str,
        days: u32,
    ) -> Result<Vec<DailyStats>, ApiError> {
        let resp = self
            .send(Method::GET, &["api", "tunnels", tunnel_id, "analytics"], |r| {
                r.query(&[("days", days)])
            })
            .await?;
        let list: StatsList = decode_lenient(resp).await?;
        Ok(list.stats.unwrap_or_default())
    }

    /// `GET /api/analytics/summary`
    pub async fn analytics_summary(&self) -> Result<Option<AnalyticsSummary>, ApiError> {
        let resp = self
            .send(Method::GET, &["api", "analytics", "summary"], |r| r)
            .await?;
        let envelope: SummaryEnvelope = decode_lenient(resp).await?;
        Ok(envelope.summary)
    }

    /// `GET /api/keys`
    pub async fn list_api_keys(&self) -> Result<Vec<ApiKeyInfo>, ApiError> {
        let resp = self.send(Method::GET, &["api", "keys"], |r| r).await?;
        let list: KeyList = decode_lenient(resp).await?;
        Ok(list.keys.unwrap_or_default())
    }

    /// `POST /api/keys`
    pub async fn create_api_key(&self, name: &str) -> Result<CreatedApiKey, ApiError> {
        let body = CreateApiKeyRequest { name };
        let resp = self
            .send(Method::POST, &["api", "keys"], |r| r.json(&body))
            .await?;
        decode(resp).await
    }

    /// `DELETE /api/keys/:id`
    pub async fn delete_api_key(&self, key_id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &["api", "keys", key_id], |r| r)
            .await?;
        Ok(())
    }

    /// Run one request through both hooks.
    ///
    /// `segments` are percent-encoded individually, so identifiers taken from
    /// user input cannot change the path structure.
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint(segments)?;
        let request = build(self.http.request(method.clone(), url.clone()));
        let (request, authenticated) = self.authorize(request);
        debug!(%method, path = url.path(), authenticated, "api request");
        let resp = request.send().await?;
        self.inspect(resp).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Protocol(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Outgoing hook. Also reports whether a credential was attached.
    fn authorize(&self, request: RequestBuilder) -> (RequestBuilder, bool) {
        match self.credentials.get() {
            Some(token) => (request.bearer_auth(token), true),
            None => (request, false),
        }
    }

    /// Incoming hook.
    async fn inspect(&self, resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let path = resp.url().path().to_string();

        // An unreadable error body is treated as an empty one.
        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body);

        if status == StatusCode::UNAUTHORIZED {
            warn!(%path, "session rejected by server, signing out");
            self.credentials.clear_logged();
            self.navigator.force_login();
        }

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Extract the `error` string from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.as_str().map(String::from))
}

/// Strict decode: the body must be the expected JSON document.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let body = resp.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ApiError::Protocol(format!("Invalid JSON from server: {e}")))
}

/// Envelope decode: a body that is empty, `null` or not the expected JSON
/// yields the empty envelope.
async fn decode_lenient<T: DeserializeOwned + Default>(resp: Response) -> Result<T, ApiError> {
    let path = resp.url().path().to_string();
    let body = resp.text().await?;
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    match serde_json::from_str::<Option<T>>(&body) {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(e) => {
            warn!(%path, error = %e, "unexpected success body, treating as empty");
            Ok(T::default())
        }
    }
}

/// Validate the base endpoint. It must be an absolute http(s) URL that can
/// carry path segments.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = normalize_base_url(raw)?;
    let url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "cannot carry a path".into(),
        });
    }
    Ok(url)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::router::Route;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) struct Harness {
        pub server: MockServer,
        pub credentials: Arc<CredentialHolder>,
        pub navigator: Arc<Navigator>,
        pub client: ApiClient,
    }

    pub(crate) async fn harness(token: Option<&str>) -> Harness {
        let server = MockServer::start().await;
        let credentials = Arc::new(CredentialHolder::ephemeral());
        if let Some(t) = token {
            credentials.set(t).unwrap();
        }
        let navigator = Arc::new(Navigator::new(Arc::clone(&credentials)));
        if token.is_some() {
            navigator.navigate(Route::Tunnels);
        }
        let config = ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&config, Arc::clone(&credentials), Arc::clone(&navigator))
            .unwrap();
        Harness {
            server,
            credentials,
            navigator,
            client,
        }
    }

    #[tokio::test]
    async fn attaches_bearer_when_credential_present() {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .and(header("authorization", "Bearer t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tunnels": [] })))
            .expect(1)
            .mount(&h.server)
            .await;

        assert!(h.client.list_tunnels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sends_unauthenticated_without_credential() {
        let h = harness(None).await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "healthy", "service": "needle" })),
            )
            .mount(&h.server)
            .await;

        let health = h.client.health().await.unwrap();
        assert_eq!(health.status, "healthy");

        let received = h.server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn unauthorized_clears_credential_and_forces_login() {
        let h = harness(Some("expired")).await;
        Mock::given(method("GET"))
            .and(path("/api/analytics/summary"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "token expired" })),
            )
            .mount(&h.server)
            .await;
        assert_eq!(h.navigator.current(), Route::Tunnels);

        let err = h.client.analytics_summary().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.server_message(), Some("token expired"));
        assert!(h.credentials.get().is_none());
        assert_eq!(h.navigator.current(), Route::Login);
    }

    #[tokio::test]
    async fn other_failures_leave_session_alone() {
        let h = harness(Some("t1")).await;
        Mock::given(method("DELETE"))
            .and(path("/api/tunnels/abc"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;

        let err = h.client.delete_tunnel("abc").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.server_message().is_none());
        assert_eq!(h.credentials.get().as_deref(), Some("t1"));
        assert_eq!(h.navigator.current(), Route::Tunnels);
    }

    #[tokio::test]
    async fn query_parameters_are_sent() {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels/x/requests"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "requests": [] })))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels/x/analytics"))
            .and(query_param("days", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "stats": [] })))
            .expect(1)
            .mount(&h.server)
            .await;

        assert!(h.client.list_requests("x", 50).await.unwrap().is_empty());
        assert!(h.client.tunnel_analytics("x", 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_segments_are_encoded() {
        let h = harness(Some("t1")).await;
        Mock::given(method("DELETE"))
            .and(path("/api/tunnels/a%2Fb"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&h.server)
            .await;

        h.client.delete_tunnel("a/b").await.unwrap();
    }

    #[tokio::test]
    async fn empty_success_body_is_empty_collection() {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/keys"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&h.server)
            .await;

        assert!(h.client.list_api_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_json_success_is_empty_collection() {
        let h = harness(Some("t1")).await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&h.server)
            .await;

        assert!(h.client.list_tunnels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_decode_still_rejects_garbage() {
        let h = harness(None).await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&h.server)
            .await;

        assert!(matches!(
            h.client.health().await,
            Err(ApiError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn empty_create_body_is_default() {
        let h = harness(Some("t1")).await;
        Mock::given(method("POST"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&h.server)
            .await;

        let created = h
            .client
            .create_tunnel(&CreateTunnelRequest {
                target_port: 3000,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created, CreatedTunnel::default());
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let credentials = Arc::new(CredentialHolder::ephemeral());
        let navigator = Arc::new(Navigator::new(Arc::clone(&credentials)));
        for base_url in ["not a url", "ftp://example.com", "mailto:dev@needle.dev"] {
            let config = ApiConfig {
                base_url: base_url.into(),
                ..ApiConfig::default()
            };
            let result = ApiClient::new(&config, Arc::clone(&credentials), Arc::clone(&navigator));
            assert!(
                matches!(result, Err(Error::Config(ConfigError::InvalidBaseUrl { .. }))),
                "{base_url}"
            );
        }
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":"invalid credentials"}"#).as_deref(),
            Some("invalid credentials")
        );
        assert_eq!(error_message(r#"{"error":42}"#), None);
        assert_eq!(error_message("Bad Gateway"), None);
        assert_eq!(error_message(""), None);
    }
}
