use std::sync::Arc;

use db::DBService;
use services::services::{
    config::{ConfigError, SyncConfig},
    events::TaskEventPublisher,
    github::{client::GITHUB_API_BASE, inbound::WebhookSyncService, outbound::IssueSyncService},
    token_vault::TokenVault,
};
use thiserror::Error;

pub mod error;
pub mod routes;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct Deployment {
    db: DBService,
    config: Arc<SyncConfig>,
    vault: TokenVault,
    events: TaskEventPublisher,
    github_api_base: String,
}

impl Deployment {
    /// Build the full deployment: configuration is read first so a
    /// missing encryption key or webhook secret fails startup before the
    /// database is touched.
    pub async fn new() -> Result<Self, DeploymentError> {
        let config = SyncConfig::from_env()?;
        let db = DBService::new().await?;
        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: DBService, config: SyncConfig) -> Self {
        let vault = TokenVault::new(config.token_key);
        Self {
            db,
            config: Arc::new(config),
            vault,
            events: TaskEventPublisher::new(),
            github_api_base: GITHUB_API_BASE.to_string(),
        }
    }

    /// Point GitHub traffic at a different origin (tests).
    pub fn with_github_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.github_api_base = api_base.into();
        self
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }

    pub fn events(&self) -> &TaskEventPublisher {
        &self.events
    }

    pub fn github_api_base(&self) -> &str {
        &self.github_api_base
    }

    pub fn issue_sync(&self) -> IssueSyncService {
        IssueSyncService::with_api_base(
            self.db.clone(),
            self.vault.clone(),
            self.github_api_base.clone(),
        )
    }

    pub fn webhook_sync(&self) -> WebhookSyncService {
        WebhookSyncService::with_api_base(
            self.db.clone(),
            self.vault.clone(),
            self.events.clone(),
            self.github_api_base.clone(),
        )
    }
}
