use async_trait::async_trait;
use deadpool_postgres::{Pool, Transaction};
use tokio_postgres::Row;
use uuid::Uuid;

use super::{CredentialRepository, NewCredential};
use crate::{
    error::{AppError, Result},
    models::credential::StoredCredential,
};

const CREDENTIAL_COLUMNS: &str =
    "id, user_id, name, sealed_identity, is_active, created_at, updated_at";

fn row_to_credential(row: &Row) -> Result<StoredCredential> {
    Ok(StoredCredential {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        user_id: row.try_get("user_id").map_err(|_| AppError::MissingData("user_id".to_string()))?,
        name: row.try_get("name").map_err(|_| AppError::MissingData("name".to_string()))?,
        sealed_identity: row.try_get("sealed_identity").map_err(|_| AppError::MissingData("sealed_identity".to_string()))?,
        is_active: row.try_get("is_active").map_err(|_| AppError::MissingData("is_active".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|_| AppError::MissingData("updated_at".to_string()))?,
    })
}

/// Takes the per-user lock that serializes activation changes.
///
/// Returns `false` when the user row does not exist.
async fn lock_owner(client: &Transaction<'_>, user_id: &Uuid) -> Result<bool> {
    let row = client
        .query_opt("SELECT id FROM users WHERE id = $1 FOR UPDATE", &[user_id])
        .await?;
    Ok(row.is_some())
}

async fn deactivate_all(client: &Transaction<'_>, user_id: &Uuid) -> Result<u64> {
    let updated = client
        .execute(
            r#"
            UPDATE credentials
            SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_active
            "#,
            &[user_id],
        )
        .await?;
    Ok(updated)
}

pub struct PgCredentialRepository {
    pool: Pool,
}

impl PgCredentialRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn insert(&self, new: NewCredential) -> Result<StoredCredential> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        if new.activate {
            if !lock_owner(&tx, &new.user_id).await? {
                return Err(AppError::NotFound);
            }
            deactivate_all(&tx, &new.user_id).await?;
        }

        let id = Uuid::new_v4();
        let row = tx
            .query_one(
                format!(
                    r#"
                    INSERT INTO credentials (id, user_id, name, sealed_identity, is_active)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {}
                    "#,
                    CREDENTIAL_COLUMNS
                )
                .as_str(),
                &[&id, &new.user_id, &new.name, &new.sealed_identity, &new.activate],
            )
            .await?;
        let credential = row_to_credential(&row)?;

        tx.commit().await?;
        Ok(credential)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<StoredCredential>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                format!(
                    "SELECT {} FROM credentials WHERE user_id = $1 ORDER BY created_at, id",
                    CREDENTIAL_COLUMNS
                )
                .as_str(),
                &[&user_id],
            )
            .await?;
        rows.iter().map(row_to_credential).collect()
    }

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<StoredCredential>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                format!(
                    "SELECT {} FROM credentials WHERE user_id = $1 AND is_active",
                    CREDENTIAL_COLUMNS
                )
                .as_str(),
                &[&user_id],
            )
            .await?;
        rows.iter().map(row_to_credential).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredCredential>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                format!("SELECT {} FROM credentials WHERE id = $1", CREDENTIAL_COLUMNS).as_str(),
                &[&id],
            )
            .await?;
        row.map(|r| row_to_credential(&r)).transpose()
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        name: &str,
        sealed_identity: &[u8],
    ) -> Result<Option<StoredCredential>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                format!(
                    r#"
                    UPDATE credentials
                    SET name = $3, sealed_identity = $4, updated_at = NOW()
                    WHERE id = $1 AND user_id = $2
                    RETURNING {}
                    "#,
                    CREDENTIAL_COLUMNS
                )
                .as_str(),
                &[&id, &user_id, &name, &sealed_identity],
            )
            .await?;
        row.map(|r| row_to_credential(&r)).transpose()
    }

    async fn set_active(&self, user_id: Uuid, id: Uuid, active: bool) -> Result<bool> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        if !lock_owner(&tx, &user_id).await? {
            return Ok(false);
        }

        if active {
            let owned = tx
                .query_opt(
                    "SELECT id FROM credentials WHERE id = $1 AND user_id = $2",
                    &[&id, &user_id],
                )
                .await?;
            if owned.is_none() {
                return Ok(false);
            }
            deactivate_all(&tx, &user_id).await?;
        }

        let updated = tx
            .execute(
                r#"
                UPDATE credentials
                SET is_active = $3, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                "#,
                &[&id, &user_id, &active],
            )
            .await?;

        tx.commit().await?;
        Ok(updated > 0)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                "DELETE FROM credentials WHERE id = $1 AND user_id = $2",
                &[&id, &user_id],
            )
            .await?;
        Ok(deleted > 0)
    }
}
