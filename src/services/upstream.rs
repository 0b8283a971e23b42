use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::drive::{DriveClient, DriveConnector};
use crate::error::{AppError, Result};
use crate::models::credential::IdentityFields;
use crate::services::credentials::CredentialManager;

/// Turns stored credentials into working, login-checked remote clients.
pub struct UpstreamClientFactory {
    connector: Arc<dyn DriveConnector>,
    credentials: Arc<CredentialManager>,
    login_timeout: Duration,
}

impl UpstreamClientFactory {
    pub fn new(
        connector: Arc<dyn DriveConnector>,
        credentials: Arc<CredentialManager>,
        login_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            credentials,
            login_timeout,
        }
    }

    /// Builds a client for `identity` and checks the login eagerly.
    ///
    /// Every failure, the deadline included, is reported as
    /// `UpstreamAuthFailed`. Nothing is retried.
    pub async fn client_for(&self, identity: &IdentityFields) -> Result<Box<dyn DriveClient>> {
        match tokio::time::timeout(self.login_timeout, self.connector.connect(identity)).await {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(AppError::UpstreamAuthFailed(msg))) => Err(AppError::UpstreamAuthFailed(msg)),
            Ok(Err(e)) => Err(AppError::UpstreamAuthFailed(e.to_string())),
            Err(_) => Err(AppError::UpstreamAuthFailed(format!(
                "login check timed out after {}s",
                self.login_timeout.as_secs()
            ))),
        }
    }

    /// The single entry point for proxied calls: the user's active credential,
    /// connected.
    pub async fn resolve_active_client(&self, user_id: Uuid) -> Result<Box<dyn DriveClient>> {
        let credential = self
            .credentials
            .list_active(user_id)
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NoActiveCredential)?;

        let client = self.client_for(&credential.identity).await;
        match &client {
            Ok(_) => tracing::debug!("🔗 Upstream client ready for user {} (credential {})", user_id, credential.id),
            Err(_) => tracing::warn!("❌ Upstream login failed for user {} (credential {})", user_id, credential.id),
        }
        client
    }
}
