//! Dashboard routes, the route guard, and the navigator.
//!
//! | Name            | Path                           | Public |
//! |-----------------|--------------------------------|--------|
//! | `login`         | `/login`                       | yes    |
//! | `register`      | `/register`                    | yes    |
//! | `dashboard`     | `/`                            | no     |
//! | `tunnels`       | `/tunnels`                     | no     |
//! | `tunnel-detail` | `/tunnels/:subdomain`          | no     |
//! | `settings`      | `/settings`                    | no     |
//! | `inspector`     | `/tunnels/:tunnelId/inspector` | no     |
//! | `analytics`     | `/tunnels/:tunnelId/analytics` | no     |
//!
//! The guard only checks that a credential is *present*. Whether it is still
//! valid is the server's call, surfaced through the pipeline's 401 handling,
//! which lands here via [`Navigator::force_login`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::session::CredentialHolder;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Tunnels,
    TunnelDetail { subdomain: String },
    Settings,
    Inspector { tunnel_id: String },
    Analytics { tunnel_id: String },
}

impl Route {
    /// Stable route name.
    pub fn name(&self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Register => "register",
            Route::Dashboard => "dashboard",
            Route::Tunnels => "tunnels",
            Route::TunnelDetail { .. } => "tunnel-detail",
            Route::Settings => "settings",
            Route::Inspector { .. } => "inspector",
            Route::Analytics { .. } => "analytics",
        }
    }

    /// Routes reachable without a credential.
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".into(),
            Route::Register => "/register".into(),
            Route::Dashboard => "/".into(),
            Route::Tunnels => "/tunnels".into(),
            Route::TunnelDetail { subdomain } => format!("/tunnels/{subdomain}"),
            Route::Settings => "/settings".into(),
            Route::Inspector { tunnel_id } => format!("/tunnels/{tunnel_id}/inspector"),
            Route::Analytics { tunnel_id } => format!("/tunnels/{tunnel_id}/analytics"),
        }
    }

    /// Match a path (query string and trailing slash ignored).
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => Route::Dashboard,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["settings"] => Route::Settings,
            ["tunnels"] => Route::Tunnels,
            ["tunnels", subdomain] => Route::TunnelDetail {
                subdomain: (*subdomain).to_string(),
            },
            ["tunnels", id, "inspector"] => Route::Inspector {
                tunnel_id: (*id).to_string(),
            },
            ["tunnels", id, "analytics"] => Route::Analytics {
                tunnel_id: (*id).to_string(),
            },
            _ => return None,
        };
        Some(route)
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(Route),
}

/// Pre-navigation check: public routes always pass, everything else needs a
/// credential.
#[derive(Clone)]
pub struct RouteGuard {
    credentials: Arc<CredentialHolder>,
}

impl RouteGuard {
    /// Guard backed by `credentials`.
    pub fn new(credentials: Arc<CredentialHolder>) -> Self {
        Self { credentials }
    }

    /// Decide whether `target` may be entered right now.
    pub fn check(&self, target: &Route) -> Navigation {
        if target.is_public() || self.credentials.is_present() {
            Navigation::Proceed
        } else {
            Navigation::Redirect(Route::Login)
        }
    }
}

/// Holds the current route and publishes changes to subscribers.
pub struct Navigator {
    guard: RouteGuard,
    current: watch::Sender<Route>,
}

impl Navigator {
    /// Starts on the dashboard when a credential is held, on login otherwise.
    pub fn new(credentials: Arc<CredentialHolder>) -> Self {
        let initial = if credentials.is_present() {
            Route::Dashboard
        } else {
            Route::Login
        };
        let (current, _) = watch::channel(initial);
        Self {
            guard: RouteGuard::new(credentials),
            current,
        }
    }

    /// The guard every navigation runs through.
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    /// Navigate to `target` through the guard. Returns where we ended up.
    pub fn navigate(&self, target: Route) -> Route {
        let resolved = match self.guard.check(&target) {
            Navigation::Proceed => target,
            Navigation::Redirect(to) => {
                debug!(from = target.name(), to = to.name(), "navigation redirected");
                to
            }
        };
        self.current.send_replace(resolved.clone());
        resolved
    }

    /// Unconditional jump to the login route, bypassing the guard.
    pub fn force_login(&self) {
        self.current.send_replace(Route::Login);
    }

    /// The route currently shown.
    pub fn current(&self) -> Route {
        self.current.borrow().clone()
    }

    /// Receiver woken on every route change, forced ones included.
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }
}
