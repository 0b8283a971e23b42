use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a user in the system.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's username.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's Argon2id password hash (PHC string).
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A user that the auth middleware resolved from a bearer token.
///
/// Handlers receive it as a typed extension and pass `id` explicitly into the
/// services.
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}
