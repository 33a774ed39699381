use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::Role;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, StoredToken, TokenRepository};

use super::SqliteRepository;

fn map_row(row: &SqliteRow) -> Result<StoredToken, StorageError> {
    let role: String = row
        .try_get("role")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    let token: String = row
        .try_get("token")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    let stored_at: DateTime<Utc> = row
        .try_get("stored_at")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    let role: Role = role
        .parse()
        .map_err(|err: lesson_core::model::RoleParseError| {
            StorageError::Serialization(err.to_string())
        })?;
    Ok(StoredToken {
        role,
        token,
        stored_at,
    })
}

#[async_trait]
impl TokenRepository for SqliteRepository {
    async fn load_tokens(&self) -> Result<Vec<StoredToken>, StorageError> {
        let rows = sqlx::query("SELECT role, token, stored_at FROM role_tokens ORDER BY role")
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        rows.iter().map(map_row).collect()
    }

    async fn get_token(&self, role: Role) -> Result<StoredToken, StorageError> {
        let row = sqlx::query("SELECT role, token, stored_at FROM role_tokens WHERE role = ?1")
            .bind(role.segment())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        let Some(row) = row else {
            return Err(StorageError::NotFound);
        };
        map_row(&row)
    }

    async fn save_token(&self, token: &StoredToken) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO role_tokens (role, token, stored_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(role) DO UPDATE SET
                token = excluded.token,
                stored_at = excluded.stored_at
            ",
        )
        .bind(token.role.segment())
        .bind(&token.token)
        .bind(token.stored_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn clear_token(&self, role: Role) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM role_tokens WHERE role = ?1")
            .bind(role.segment())
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
