use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use shared::{
    domain::{Identity, Role},
    protocol::{LoginRequest, TokenClaims},
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    auth::AuthGateway,
    error::ClientResult,
    routing::Route,
    storage::{KeyValueStore, TOKEN_KEY, USER_KEY},
};

/// Supplies the bearer token attached to outgoing requests, if any.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
struct SignedIn {
    token: String,
    identity: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub redirect: Route,
}

/// The authenticated identity for this process. Created empty, restored by
/// [`Session::init`], filled by [`Session::login`] and torn down by
/// [`Session::logout`].
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    auth: Arc<dyn AuthGateway>,
    state: RwLock<Option<SignedIn>>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>, auth: Arc<dyn AuthGateway>) -> Self {
        Self {
            store,
            auth,
            state: RwLock::new(None),
        }
    }

    /// Restores a persisted session. An unreadable, undecodable or expired
    /// token clears local storage without reporting an error. There is no
    /// refresh; the check runs once per process.
    pub async fn init(&self) -> bool {
        self.init_at(Utc::now()).await
    }

    pub async fn init_at(&self, now: DateTime<Utc>) -> bool {
        let token = self.read_persisted(TOKEN_KEY).await;
        let user = self.read_persisted(USER_KEY).await;

        let restored = match (token, user) {
            (Some(token), Some(user)) => {
                let identity = serde_json::from_str::<Identity>(&user).ok();
                match (identity, token_expired(&token, now)) {
                    (Some(identity), false) => Some(SignedIn { token, identity }),
                    _ => None,
                }
            }
            _ => None,
        };

        match restored {
            Some(signed_in) => {
                info!(user_id = %signed_in.identity.id, role = %signed_in.identity.role, "session restored");
                *self.state.write().await = Some(signed_in);
                true
            }
            None => {
                self.clear_persisted().await;
                *self.state.write().await = None;
                false
            }
        }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> ClientResult<LoginOutcome> {
        let response = self.auth.login(credentials).await.map_err(|err| {
            warn!(email = %credentials.email, error = %err, "login failed");
            err
        })?;

        if let Err(error) = self.persist(&response.token, &response.user).await {
            warn!(%error, "session could not be persisted; continuing in memory");
        }
        let identity = response.user;
        *self.state.write().await = Some(SignedIn {
            token: response.token,
            identity: identity.clone(),
        });
        info!(user_id = %identity.id, role = %identity.role, "signed in");

        Ok(LoginOutcome {
            redirect: Route::for_role(identity.role),
            identity,
        })
    }

    /// Clears the persisted identity and returns the route to show next.
    pub async fn logout(&self) -> Route {
        *self.state.write().await = None;
        self.clear_persisted().await;
        info!("signed out");
        Route::Login
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_some()
    }

    pub async fn role(&self) -> Option<Role> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|signed_in| signed_in.identity.role)
    }

    pub async fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role()
            .await
            .is_some_and(|role| roles.contains(&role))
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|signed_in| signed_in.identity.clone())
    }

    async fn persist(&self, token: &str, identity: &Identity) -> anyhow::Result<()> {
        self.store.set(TOKEN_KEY, token).await?;
        self.store
            .set(USER_KEY, &serde_json::to_string(identity)?)
            .await
    }

    async fn read_persisted(&self, key: &'static str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(error) => {
                warn!(key, %error, "persisted session unreadable");
                None
            }
        }
    }

    async fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(error) = self.store.remove(key).await {
                warn!(key, %error, "failed to clear session key");
            }
        }
    }
}

#[async_trait]
impl TokenProvider for Session {
    async fn bearer_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|signed_in| signed_in.token.clone())
    }
}

/// Reads `exp` from the payload without checking the signature. Anything
/// that does not decode counts as expired.
pub fn token_expired(token: &str, now: DateTime<Utc>) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    match decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.is_expired_at(now),
        Err(_) => true,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
