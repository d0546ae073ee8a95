use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use shared::domain::{Identity, OrganizationId, Role};
use tracing::info;

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod forms;
pub mod http;
pub mod memory;
pub mod registry;
pub mod routing;
pub mod session;
pub mod settings;
pub mod storage;

use auth::{AuthGateway, HttpAuthGateway, MockAuthGateway};
use dashboard::{AdminDashboard, OwnerDashboard, SupplierDashboard};
use error::{ClientError, ClientResult};
use http::HttpBackend;
use memory::InMemoryBackend;
use registry::{SubmissionRegistry, TenderRegistry};
use session::{Session, TokenProvider};
use settings::{BackendKind, ClientSettings};
use storage::{FileStore, KeyValueStore};

/// Organization new tenders are filed under. Identities carry no
/// organization yet.
pub const DEFAULT_ORGANIZATION: OrganizationId = OrganizationId(1);

/// The composed client: one session and one pair of registries, chosen from
/// the settings when the process starts.
pub struct App {
    pub settings: ClientSettings,
    pub session: Arc<Session>,
    pub tenders: Arc<dyn TenderRegistry>,
    pub submissions: Arc<dyn SubmissionRegistry>,
}

impl App {
    /// Builds the client with a file-backed session store.
    pub fn compose(settings: ClientSettings) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings.storage_path()?));
        Self::with_store(settings, store)
    }

    pub fn with_store(settings: ClientSettings, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let app = match settings.backend {
            BackendKind::Mock => {
                let latency = settings.mock_latency();
                let auth: Arc<dyn AuthGateway> = Arc::new(MockAuthGateway::new(latency));
                let backend = Arc::new(InMemoryBackend::seeded(latency));
                Self {
                    session: Arc::new(Session::new(store, auth)),
                    tenders: backend.clone(),
                    submissions: backend,
                    settings,
                }
            }
            BackendKind::Http => {
                let base_url = settings.base_url()?.to_string();
                let http = Client::builder()
                    .timeout(settings.request_timeout())
                    .build()
                    .context("failed to build http client")?;
                let auth: Arc<dyn AuthGateway> =
                    Arc::new(HttpAuthGateway::new(http.clone(), base_url.clone()));
                let session = Arc::new(Session::new(store, auth));
                let tokens: Arc<dyn TokenProvider> = session.clone();
                let backend = Arc::new(HttpBackend::new(http, base_url, tokens));
                Self {
                    session,
                    tenders: backend.clone(),
                    submissions: backend,
                    settings,
                }
            }
        };
        info!(backend = ?app.settings.backend, "client composed");
        Ok(app)
    }

    async fn identity_with(&self, role: Role) -> ClientResult<Identity> {
        let identity = self
            .session
            .identity()
            .await
            .ok_or(ClientError::Unauthorized)?;
        if identity.role != role {
            return Err(ClientError::Forbidden(format!(
                "{} dashboard requires role {role}",
                role.as_str().to_ascii_lowercase()
            )));
        }
        Ok(identity)
    }

    pub async fn owner_dashboard(&self) -> ClientResult<OwnerDashboard> {
        let identity = self.identity_with(Role::Owner).await?;
        Ok(OwnerDashboard::new(
            self.tenders.clone(),
            self.submissions.clone(),
            identity.id,
            DEFAULT_ORGANIZATION,
        ))
    }

    pub async fn supplier_dashboard(&self) -> ClientResult<SupplierDashboard> {
        let identity = self.identity_with(Role::Supplier).await?;
        Ok(SupplierDashboard::new(
            self.tenders.clone(),
            self.submissions.clone(),
            identity.id,
        ))
    }

    pub async fn admin_dashboard(&self) -> ClientResult<AdminDashboard> {
        self.identity_with(Role::Admin).await?;
        Ok(AdminDashboard::new(
            self.tenders.clone(),
            self.submissions.clone(),
        ))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
