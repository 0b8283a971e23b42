use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialRepository, NewCredential, SessionRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::models::{credential::StoredCredential, session::Session, user::User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    credentials: HashMap<Uuid, StoredCredential>,
}

/// An in-process store behind one lock.
///
/// Holding the lock for a whole operation gives the same per-user
/// serialization the Postgres store gets from its row lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let mut tables = self.tables.lock().await;

        if tables
            .users
            .values()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(AppError::Conflict(
                "username or email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound);
        }
        if tables.sessions.contains_key(token_hash) {
            return Err(AppError::Conflict("session token collision".to_string()));
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.get(token_hash).cloned())
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.sessions.remove(token_hash).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| session.expires_at >= now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

fn deactivate_all(tables: &mut Tables, user_id: Uuid, now: DateTime<Utc>) {
    for credential in tables
        .credentials
        .values_mut()
        .filter(|c| c.user_id == user_id && c.is_active)
    {
        credential.is_active = false;
        credential.updated_at = now;
    }
}

#[async_trait]
impl CredentialRepository for MemoryStore {
    async fn insert(&self, new: NewCredential) -> Result<StoredCredential> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&new.user_id) {
            return Err(AppError::NotFound);
        }

        let now = Utc::now();
        if new.activate {
            deactivate_all(&mut tables, new.user_id, now);
        }

        let credential = StoredCredential {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            name: new.name,
            sealed_identity: new.sealed_identity,
            is_active: new.activate,
            created_at: now,
            updated_at: now,
        };
        tables.credentials.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<StoredCredential>> {
        let tables = self.tables.lock().await;
        let mut credentials: Vec<StoredCredential> = tables
            .credentials
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        credentials.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(credentials)
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<StoredCredential>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .credentials
            .values()
            .filter(|c| c.user_id == user_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredCredential>> {
        let tables = self.tables.lock().await;
        Ok(tables.credentials.get(&id).cloned())
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
        sealed_identity: &[u8],
    ) -> Result<Option<StoredCredential>> {
        let mut tables = self.tables.lock().await;
        let Some(credential) = tables
            .credentials
            .get_mut(&id)
            .filter(|c| c.user_id == user_id)
        else {
            return Ok(None);
        };

        credential.name = name.to_string();
        credential.sealed_identity = sealed_identity.to_vec();
        credential.updated_at = Utc::now();
        Ok(Some(credential.clone()))
    }

    async fn set_active(&self, user_id: Uuid, id: Uuid, active: bool) -> Result<bool> {
        let mut tables = self.tables.lock().await;

        let owned = tables
            .credentials
            .get(&id)
            .is_some_and(|c| c.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        let now = Utc::now();
        if active {
            deactivate_all(&mut tables, user_id, now);
        }

        if let Some(credential) = tables.credentials.get_mut(&id) {
            credential.is_active = active;
            credential.updated_at = now;
        }
        Ok(true)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;

        let owned = tables
            .credentials
            .get(&id)
            .is_some_and(|c| c.user_id == user_id);
        if owned {
            tables.credentials.remove(&id);
        }
        Ok(owned)
    }
}
