pub mod credential;
pub mod memory;
pub mod session;
pub mod user;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{credential::StoredCredential, session::Session, user::User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user. Fails with `Conflict` when the username or email is taken.
    async fn insert(&self, username: &str, email: &str, password_hash: &str) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>>;

    /// Returns `false` when no session had that digest.
    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool>;

    /// Deletes every session that expired before `now` and returns how many went.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// The insert payload for a credential.
pub struct NewCredential {
    pub user_id: Uuid,
    pub name: String,
    pub sealed_identity: Vec<u8>,
    /// Activate on insert, clearing the owner's other active credential in the same unit.
    pub activate: bool,
}

/// Credential storage.
///
/// Every mutation filters on both `id` and `user_id`; `None` or `false` means
/// no row owned by that user matched.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn insert(&self, new: NewCredential) -> Result<StoredCredential>;

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<StoredCredential>>;

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<StoredCredential>>;

    /// Looks a credential up without an owner filter so callers can tell
    /// "missing" from "someone else's".
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredCredential>>;

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
        sealed_identity: &[u8],
    ) -> Result<Option<StoredCredential>>;

    /// With `active = true`, deactivates the owner's other credentials and
    /// activates this one under a per-user lock.
    async fn set_active(&self, user_id: Uuid, id: Uuid, active: bool) -> Result<bool>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
}

/// The three stores the services run against.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
}

impl Repositories {
    pub fn postgres(pool: Pool) -> Self {
        Self {
            users: Arc::new(user::PgUserRepository::new(pool.clone())),
            sessions: Arc::new(session::PgSessionRepository::new(pool.clone())),
            credentials: Arc::new(credential::PgCredentialRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::new();
        Self {
            users: Arc::new(store.clone()),
            sessions: Arc::new(store.clone()),
            credentials: Arc::new(store),
        }
    }
}

/// Maps a unique-constraint violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_unique_violation(err: tokio_postgres::Error, what: &str) -> crate::error::AppError {
    if err.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
        crate::error::AppError::Conflict(format!("{} already exists", what))
    } else {
        crate::error::AppError::Database(err)
    }
}
