//! Error types.
//!
//! [`ApiError`] is what every request-pipeline call returns. Stores never let
//! it escape (except login/register); they fold it into their `error` string
//! with [`ApiError::user_message`].
//!
//! ## Error kinds
//!
//! | Variant               | Meaning                                          |
//! |-----------------------|--------------------------------------------------|
//! | `Request`             | Transport failure, no HTTP response received     |
//! | `Status { 401, .. }`  | Session rejected; already torn down globally     |
//! | `Status { .. }`       | Any other non-2xx, with the server's `error`     |
//! | `Protocol`            | 2xx body that is not the expected JSON shape     |

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`ApiClient`](crate::client::ApiClient) methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("server returned HTTP {status}{}", describe(.message))]
    Status {
        status: u16,
        /// The `error` field of the JSON body, when there was one.
        message: Option<String>,
    },
    /// The response body could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

fn describe(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl ApiError {
    /// HTTP status code, if the server responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Protocol(_) => None,
        }
    }

    /// Returns `true` for HTTP 401 responses.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. })
    }

    /// Returns `true` for HTTP 404 responses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }

    /// The server-supplied `{ "error": ... }` message, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Message shown to the user: the server's own text, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

/// Failures of the durable credential storage.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read credential {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write credential {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to remove credential {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Top-level error for building a [`Dashboard`](crate::app::Dashboard).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
