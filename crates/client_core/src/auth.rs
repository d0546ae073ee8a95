use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use shared::{
    domain::{Identity, Role, UserId},
    error::ApiError,
    protocol::{LoginRequest, LoginResponse, TokenClaims, LOGIN_PATH},
};
use tracing::{info, warn};

use crate::{
    error::{ClientError, ClientResult},
    http::endpoint,
};

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, credentials: &LoginRequest) -> ClientResult<LoginResponse>;
}

/// Offline stand-in for the auth service. The role is picked from keywords
/// in the email address and the token is a real HS256 JWT signed with a
/// local secret.
pub struct MockAuthGateway {
    latency: Duration,
    secret: String,
    ttl: chrono::Duration,
}

impl MockAuthGateway {
    pub const MOCK_SECRET: &'static str = "bidconnect-mock-secret";

    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            secret: Self::MOCK_SECRET.to_string(),
            ttl: chrono::Duration::hours(8),
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn mint(&self, identity: &Identity) -> ClientResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ClientError::ServerError(format!("token mint failed: {e}")))
    }
}

pub fn role_for_email(email: &str) -> Role {
    let email = email.to_ascii_lowercase();
    if email.contains("admin") {
        Role::Admin
    } else if email.contains("owner") {
        Role::Owner
    } else {
        Role::Supplier
    }
}

#[async_trait]
impl AuthGateway for MockAuthGateway {
    async fn login(&self, credentials: &LoginRequest) -> ClientResult<LoginResponse> {
        tokio::time::sleep(self.latency).await;
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(ClientError::InvalidCredentials);
        }

        let user = Identity {
            id: UserId(1),
            email: credentials.email.trim().to_string(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            role: role_for_email(&credentials.email),
        };
        let token = self.mint(&user)?;
        info!(email = %user.email, role = %user.role, "mock login");
        Ok(LoginResponse { token, user })
    }
}

pub struct HttpAuthGateway {
    http: Client,
    base_url: String,
}

impl HttpAuthGateway {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self, credentials: &LoginRequest) -> ClientResult<LoginResponse> {
        let response = self
            .http
            .post(endpoint(&self.base_url, LOGIN_PATH))
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<LoginResponse>().await?);
        }

        let message = response
            .json::<ApiError>()
            .await
            .map(|err| err.message)
            .unwrap_or_else(|_| status.to_string());
        warn!(status = status.as_u16(), %message, "login rejected");
        Err(match status.as_u16() {
            401 => ClientError::InvalidCredentials,
            403 => ClientError::Forbidden(message),
            // a missing login route means the auth service is not deployed
            404 => ClientError::ServiceUnavailable("authentication service unreachable".into()),
            code => ClientError::from_status(code, message),
        })
    }
}
