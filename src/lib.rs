#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

//! needle client library: session and data layer for the needle tunnel
//! dashboard.
//!
//! - `session` — the bearer credential and where it is persisted
//! - `client` — request pipeline (bearer attach, global 401 teardown)
//! - `router` — route table, guard and navigator
//! - `stores` — auth, tunnels, inspector, analytics and API key caches
//! - `config` — TOML + env-var configuration
//! - `app` — wires the above into a [`Dashboard`]
//!
//! ## Architecture
//!
//! ```text
//! CredentialHolder ◀──── AuthStore (login/register/logout)
//!      │    ▲
//!      │    └──── ApiClient (clears on 401) ───▶ Navigator::force_login
//!      ▼
//! RouteGuard ◀── Navigator
//!
//! TunnelsStore, InspectorStore, AnalyticsStore, ApiKeysStore ──▶ ApiClient
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod router;
pub mod session;
pub mod stores;
pub mod types;

pub use app::Dashboard;
pub use client::ApiClient;
pub use config::Config;
pub use error::{ApiError, ConfigError, Error, SessionError};
pub use router::{Navigation, Navigator, Route, RouteGuard};
pub use session::{CredentialHolder, CredentialStorage, FileStorage, MemoryStorage};
