use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use super::{map_unique_violation, UserRepository};
use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        username: row.try_get("username").map_err(|_| AppError::MissingData("username".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        password_hash: row.try_get("password_hash").map_err(|_| AppError::MissingData("password_hash".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|_| AppError::MissingData("updated_at".to_string()))?,
    })
}

pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    /// Creates a new user in the database.
    async fn insert(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, username, email, password_hash)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, email, password_hash, created_at, updated_at
                "#,
                &[&id, &username, &email, &password_hash],
            )
            .await
            .map_err(|e| map_unique_violation(e, "username or email"))?;
        row_to_user(&row)
    }

    /// Finds a user by their username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, username, email, password_hash, created_at, updated_at
                FROM users
                WHERE username = $1
                "#,
                &[&username],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    /// Finds a user by their ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, username, email, password_hash, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
                &[&id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }
}
