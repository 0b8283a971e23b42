use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use super::SessionRepository;
use crate::{
    error::{AppError, Result},
    models::session::Session,
};

fn row_to_session(row: &Row) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        user_id: row.try_get("user_id").map_err(|_| AppError::MissingData("user_id".to_string()))?,
        token_hash: row.try_get("token_hash").map_err(|_| AppError::MissingData("token_hash".to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|_| AppError::MissingData("expires_at".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

pub struct PgSessionRepository {
    pool: Pool,
}

impl PgSessionRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let row = client
            .query_one(
                r#"
                INSERT INTO sessions (id, user_id, token_hash, expires_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, token_hash, expires_at, created_at
                "#,
                &[&id, &user_id, &token_hash, &expires_at],
            )
            .await?;
        row_to_session(&row)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, token_hash, expires_at, created_at
                FROM sessions
                WHERE token_hash = $1
                "#,
                &[&token_hash],
            )
            .await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM sessions WHERE token_hash = $1", &[&token_hash])
            .await?;
        Ok(deleted > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM sessions WHERE expires_at < $1", &[&now])
            .await?;
        Ok(deleted)
    }
}
