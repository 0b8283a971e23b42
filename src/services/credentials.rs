use std::sync::Arc;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::aes::{self, SecureKey};
use crate::error::{AppError, Result};
use crate::models::credential::{Credential, CredentialSummary, IdentityFields, StoredCredential};
use crate::repositories::{CredentialRepository, NewCredential};

/// Ownership-checked CRUD over a user's upstream credentials.
///
/// Identity fields are sealed with the master key before they reach the store
/// and opened only on the way back to their owner.
pub struct CredentialManager {
    repo: Arc<dyn CredentialRepository>,
    key: SecureKey,
}

impl CredentialManager {
    pub fn new(repo: Arc<dyn CredentialRepository>, key: SecureKey) -> Self {
        Self { repo, key }
    }

    fn seal(&self, identity: &IdentityFields) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(sonic_rs::to_vec(identity)?);
        aes::seal(&self.key, &plaintext)
    }

    fn open(&self, stored: StoredCredential) -> Result<Credential> {
        let plaintext = Zeroizing::new(aes::open(&self.key, &stored.sealed_identity)?);
        let identity: IdentityFields = sonic_rs::from_slice(&plaintext)?;

        Ok(Credential {
            id: stored.id,
            user_id: stored.user_id,
            name: stored.name,
            identity,
            is_active: stored.is_active,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Fetches a row and checks that `user_id` owns it.
    async fn owned(&self, user_id: Uuid, id: Uuid) -> Result<StoredCredential> {
        let stored = self.repo.find_by_id(id).await?.ok_or(AppError::NotFound)?;

        if stored.user_id != user_id {
            tracing::warn!("❌ User {} tried to access credential {}", user_id, id);
            return Err(AppError::Forbidden);
        }

        Ok(stored)
    }

    /// Stores a new credential.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The owner.
    /// * `name` - Display name.
    /// * `identity` - The four identity fields.
    /// * `activate` - Whether to make it the active credential, atomically clearing the others.
    pub async fn add(
        &self,
        user_id: Uuid,
        name: &str,
        identity: &IdentityFields,
        activate: bool,
    ) -> Result<Credential> {
        let stored = self
            .repo
            .insert(NewCredential {
                user_id,
                name: name.to_string(),
                sealed_identity: self.seal(identity)?,
                activate,
            })
            .await?;

        tracing::info!(
            "✅ Credential {} added for user {} (active: {})",
            stored.id,
            user_id,
            stored.is_active
        );
        self.open(stored)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<CredentialSummary>> {
        let stored = self.repo.list_by_user(user_id).await?;
        Ok(stored.iter().map(CredentialSummary::from).collect())
    }

    /// The user's active credential, opened; zero or one element.
    pub async fn list_active(&self, user_id: Uuid) -> Result<Vec<Credential>> {
        let stored = self.repo.list_active(user_id).await?;
        if stored.len() > 1 {
            tracing::error!("❌ User {} has {} active credentials", user_id, stored.len());
            return Err(AppError::Internal(
                "more than one active credential".to_string(),
            ));
        }
        stored.into_iter().map(|s| self.open(s)).collect()
    }

    /// # Returns
    ///
    /// The opened credential, `NotFound` when it does not exist, or `Forbidden`
    /// when it belongs to someone else.
    pub async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Credential> {
        let stored = self.owned(user_id, id).await?;
        self.open(stored)
    }

    /// Replaces name and identity fields. `is_active` is preserved.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
        identity: &IdentityFields,
    ) -> Result<Credential> {
        self.owned(user_id, id).await?;

        let sealed = self.seal(identity)?;
        let stored = self
            .repo
            .update(user_id, id, name, &sealed)
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::info!("✅ Credential {} updated for user {}", id, user_id);
        self.open(stored)
    }

    pub async fn set_active(&self, user_id: Uuid, id: Uuid, active: bool) -> Result<()> {
        self.owned(user_id, id).await?;

        if !self.repo.set_active(user_id, id, active).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!(
            "✅ Credential {} of user {} is now {}",
            id,
            user_id,
            if active { "active" } else { "inactive" }
        );
        Ok(())
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.owned(user_id, id).await?;

        if !self.repo.delete(user_id, id).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!("🗑️ Credential {} deleted for user {}", id, user_id);
        Ok(())
    }
}
