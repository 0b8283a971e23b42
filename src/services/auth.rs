use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::config::PasswordHashing;
use crate::crypto::token::{generate_session_token, hash_session_token};
use crate::error::{AppError, Result};
use crate::models::session::IssuedSession;
use crate::models::user::User;
use crate::repositories::{SessionRepository, UserRepository};

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const INVALID_SESSION: &str = "Invalid or expired session";

/// Builds the Argon2id hasher for the configured cost.
fn build_argon2(cost: &PasswordHashing) -> Result<Argon2<'static>> {
    let params: Params = ParamsBuilder::new()
        .m_cost(cost.memory_kib)
        .t_cost(cost.iterations)
        .p_cost(cost.parallelism)
        .build()
        .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `argon2` - The configured hasher.
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the PHC-encoded hash.
fn hash_password(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
///
/// # Arguments
///
/// * `argon2` - The configured hasher.
/// * `password` - The password to verify.
/// * `hash` - The PHC hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password matches.
fn verify_password(argon2: &Argon2<'_>, password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Encryption(format!("Hash parse error: {}", e)))?;
    let result = argon2
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    Ok(result)
}

/// Runs CPU-bound hashing on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Registration, login and bearer-session lifecycle.
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    argon2: Argon2<'static>,
    /// Verified against when the username is unknown, so both paths cost one hash.
    dummy_hash: String,
    session_ttl: chrono::Duration,
}

impl SessionManager {
    /// Creates a new `SessionManager`.
    ///
    /// # Arguments
    ///
    /// * `users` - User storage.
    /// * `sessions` - Session storage.
    /// * `cost` - Argon2id cost parameters.
    /// * `session_ttl` - Fixed session lifetime.
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        cost: &PasswordHashing,
        session_ttl: chrono::Duration,
    ) -> Result<Self> {
        let argon2 = build_argon2(cost)?;
        let dummy_hash = hash_password(&argon2, &generate_session_token())?;

        Ok(Self {
            users,
            sessions,
            argon2,
            dummy_hash,
            session_ttl,
        })
    }

    /// Creates a new user.
    ///
    /// # Arguments
    ///
    /// * `username` - The user's username.
    /// * `email` - The user's email address.
    /// * `password` - The plaintext password; zeroized before returning.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `User`, or `Conflict` on a duplicate.
    pub async fn register(&self, username: &str, email: &str, password: String) -> Result<User> {
        tracing::debug!("🔐 Registering user: {}", username);
        let argon2 = self.argon2.clone();
        let password = Zeroizing::new(password);
        let hashed = run_blocking(move || hash_password(&argon2, &password)).await?;

        let user = self.users.insert(username, email, &hashed).await?;
        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }

    /// Authenticates a user and issues a new session.
    ///
    /// # Arguments
    ///
    /// * `username` - The user's username.
    /// * `password` - The plaintext password; zeroized before returning.
    ///
    /// # Returns
    ///
    /// The user, the raw session token and its expiry. Existing sessions stay valid.
    pub async fn login(&self, username: &str, password: String) -> Result<IssuedSession> {
        let user = self.users.find_by_username(username).await?;

        let hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.clone(),
        };
        let argon2 = self.argon2.clone();
        let password = Zeroizing::new(password);
        let verified = run_blocking(move || verify_password(&argon2, &password, &hash)).await?;

        let user = match (user, verified) {
            (Some(user), true) => user,
            _ => {
                tracing::warn!("❌ Failed login attempt");
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
        };

        let token = generate_session_token();
        let expires_at = Utc::now() + self.session_ttl;
        let session = self
            .sessions
            .insert(user.id, &hash_session_token(&token), expires_at)
            .await?;

        tracing::info!("✅ User logged in: {} (session {})", user.id, session.id);

        Ok(IssuedSession {
            user,
            session_token: token,
            expires_at: session.expires_at,
        })
    }

    /// Resolves a bearer token to its user.
    ///
    /// Fails when the token was never issued, was revoked, or is past `expires_at`.
    pub async fn validate_session(&self, token: &str) -> Result<User> {
        let session = self
            .sessions
            .find_by_token_hash(&hash_session_token(token))
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_SESSION.to_string()))?;

        if session.is_expired_at(Utc::now()) {
            tracing::debug!("Session {} expired", session.id);
            return Err(AppError::Authentication(INVALID_SESSION.to_string()));
        }

        self.users
            .find_by_id(session.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication(INVALID_SESSION.to_string()))
    }

    pub async fn profile(&self, user_id: uuid::Uuid) -> Result<User> {
        self.users.find_by_id(user_id).await?.ok_or(AppError::NotFound)
    }

    /// Deletes the session behind `token`; `NotFound` when there is none.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if self
            .sessions
            .delete_by_token_hash(&hash_session_token(token))
            .await?
        {
            tracing::info!("👋 Session revoked");
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// Deletes every expired session.
    ///
    /// # Returns
    ///
    /// The number of sessions removed.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let removed = self.sessions.delete_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!("🧹 Removed {} expired sessions", removed);
        }
        Ok(removed)
    }
}
