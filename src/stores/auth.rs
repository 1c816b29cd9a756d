//! Auth store: the signed-in user and the session credential.
//!
//! Unlike the other stores, `login` and `register` hand the error back to
//! the caller after recording it, so a UI flow can stop before navigating
//! somewhere that assumes a session. On success the credential and the user
//! are written in one synchronous step before returning.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::{Store, StoreState};
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::session::CredentialHolder;
use crate::types::{AuthResponse, LoginRequest, RegisterRequest, User};

const LOGIN_FAILED: &str = "login failed";
const REGISTER_FAILED: &str = "registration failed";

pub struct AuthStore {
    client: ApiClient,
    credentials: Arc<CredentialHolder>,
    store: Store<Option<User>>,
}

impl AuthStore {
    pub fn new(client: ApiClient, credentials: Arc<CredentialHolder>) -> Self {
        Self {
            client,
            credentials,
            store: Store::new(None),
        }
    }

    /// The signed-in user, if login or register succeeded in this process.
    pub fn user(&self) -> Option<User> {
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
    pub fn snapshot(&self) -> StoreState<Option<User>> {
        self.store.snapshot()
    }

    /// Receiver woken on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState<Option<User>>> {
        self.store.subscribe()
    }

    /// The current credential.
    pub fn token(&self) -> Option<String> {
        self.credentials.get()
    }

    /// A credential is held. It may still be rejected by the server.
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_present()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        self.store.begin();
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.client.login(&body).await {
            Ok(resp) => {
                let user = self.establish(resp);
                info!(email = %user.email, "logged in");
                Ok(user)
            }
            Err(e) => {
                self.store.fail("login", &e, LOGIN_FAILED);
                Err(e)
            }
        }
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        self.store.begin();
        let body = RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.client.register(&body).await {
            Ok(resp) => {
                let user = self.establish(resp);
                info!(email = %user.email, "registered");
                Ok(user)
            }
            Err(e) => {
                self.store.fail("register", &e, REGISTER_FAILED);
                Err(e)
            }
        }
    }

    /// Drop the credential and the user. No network call; idempotent.
    pub fn logout(&self) {
        self.credentials.clear_logged();
        self.store.update(|user| *user = None);
        info!("logged out");
    }

    fn establish(&self, resp: AuthResponse) -> User {
        // A storage failure only costs persistence across restarts.
        if let Err(e) = self.credentials.set(resp.token) {
            warn!(error = %e, "credential not persisted");
        }
        let user = resp.user;
        self.store.succeed(|cached| *cached = Some(user.clone()));
        user
    }
}
