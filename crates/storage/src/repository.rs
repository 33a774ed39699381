use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::Role;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A bearer token persisted for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub role: Role,
    pub token: String,
    pub stored_at: DateTime<Utc>,
}

impl StoredToken {
    #[must_use]
    pub fn new(role: Role, token: impl Into<String>, stored_at: DateTime<Utc>) -> Self {
        Self {
            role,
            token: token.into(),
            stored_at,
        }
    }
}

/// Repository contract for per-role session tokens.
///
/// Each role owns at most one token; saving replaces it, clearing one role never
/// touches another.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Load every stored token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load_tokens(&self) -> Result<Vec<StoredToken>, StorageError>;

    /// Fetch the token for one role.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the role has no token.
    async fn get_token(&self, role: Role) -> Result<StoredToken, StorageError>;

    /// Persist or replace the token for `token.role`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be stored.
    async fn save_token(&self, token: &StoredToken) -> Result<(), StorageError>;

    /// Remove the token for `role`. Removing a missing token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    async fn clear_token(&self, role: Role) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and offline use.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tokens: Arc<Mutex<HashMap<Role, StoredToken>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for InMemoryRepository {
    async fn load_tokens(&self) -> Result<Vec<StoredToken>, StorageError> {
        let guard = self
            .tokens
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut tokens: Vec<StoredToken> = guard.values().cloned().collect();
        tokens.sort_by_key(|t| t.role);
        Ok(tokens)
    }

    async fn get_token(&self, role: Role) -> Result<StoredToken, StorageError> {
        let guard = self
            .tokens
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&role).cloned().ok_or(StorageError::NotFound)
    }

    async fn save_token(&self, token: &StoredToken) -> Result<(), StorageError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(token.role, token.clone());
        Ok(())
    }

    async fn clear_token(&self, role: Role) -> Result<(), StorageError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&role);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub tokens: Arc<dyn TokenRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            tokens: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::time::fixed_now;

    #[tokio::test]
    async fn tokens_are_independent_per_role() {
        let repo = InMemoryRepository::new();
        repo.save_token(&StoredToken::new(Role::Admin, "admin-t", fixed_now()))
            .await
            .unwrap();
        repo.save_token(&StoredToken::new(Role::User, "user-t", fixed_now()))
            .await
            .unwrap();

        repo.clear_token(Role::User).await.unwrap();

        assert!(matches!(
            repo.get_token(Role::User).await,
            Err(StorageError::NotFound)
        ));
        assert_eq!(repo.get_token(Role::Admin).await.unwrap().token, "admin-t");
    }

    #[tokio::test]
    async fn save_replaces_existing_token() {
        let repo = InMemoryRepository::new();
        repo.save_token(&StoredToken::new(Role::Teacher, "old", fixed_now()))
            .await
            .unwrap();
        repo.save_token(&StoredToken::new(Role::Teacher, "new", fixed_now()))
            .await
            .unwrap();

        let tokens = repo.load_tokens().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "new");
    }

    #[tokio::test]
    async fn clearing_missing_token_is_ok() {
        let repo = InMemoryRepository::new();
        repo.clear_token(Role::Admin).await.unwrap();
    }
}
