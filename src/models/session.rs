use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::user::User;

/// Represents a user session row.
///
/// ⚠️ `token_hash` is the BLAKE3 digest of the bearer token. The token itself
/// is never stored.
#[derive(Debug, Clone)]
pub struct Session {
    /// The unique identifier for the session.
    pub id: Uuid,
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// BLAKE3 digest of the bearer token (hex).
    pub token_hash: String,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The result of a successful login.
#[derive(Serialize)]
pub struct IssuedSession {
    pub user: User,
    /// The raw bearer token; returned exactly once.
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}
