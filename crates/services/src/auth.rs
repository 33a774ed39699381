//! Token provider, route guard, and auth-failure handling.
//!
//! Tokens are read from storage once, when `SessionTokens` loads, and served from memory
//! afterwards. Every consumer names the role it acts for explicitly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use lesson_core::Clock;
use lesson_core::model::{Role, UserProfile};
use storage::repository::{StorageError, StoredToken, TokenRepository};

use crate::api::{Credentials, LessonApi};
use crate::error::{ApiError, AuthError, FieldErrors};

/// Per-role bearer tokens, cached in memory and written through to storage.
pub struct SessionTokens {
    cache: RwLock<HashMap<Role, String>>,
    repo: Arc<dyn TokenRepository>,
    clock: Clock,
}

impl SessionTokens {
    /// Load every stored token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the repository cannot be read.
    pub async fn load(repo: Arc<dyn TokenRepository>, clock: Clock) -> Result<Self, StorageError> {
        let cache = repo
            .load_tokens()
            .await?
            .into_iter()
            .map(|stored| (stored.role, stored.token))
            .collect();
        Ok(Self {
            cache: RwLock::new(cache),
            repo,
            clock,
        })
    }

    #[must_use]
    pub fn token(&self, role: Role) -> Option<String> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&role).cloned())
    }

    #[must_use]
    pub fn has_token(&self, role: Role) -> bool {
        self.cache
            .read()
            .is_ok_and(|cache| cache.contains_key(&role))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be persisted.
    pub async fn store(&self, role: Role, token: impl Into<String>) -> Result<(), StorageError> {
        let stored = StoredToken::new(role, token, self.clock.now());
        self.repo.save_token(&stored).await?;
        let mut cache = self
            .cache
            .write()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        cache.insert(role, stored.token);
        Ok(())
    }

    /// Drops the token of `role` only.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the repository cannot be written.
    pub async fn clear(&self, role: Role) -> Result<(), StorageError> {
        {
            let mut cache = self
                .cache
                .write()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            cache.remove(&role);
        }
        self.repo.clear_token(role).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    RedirectToLogin { path: String },
}

/// Gate for role-scoped routes: no token for the role means go to that role's login.
#[derive(Clone)]
pub struct RouteGuard {
    tokens: Arc<SessionTokens>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(tokens: Arc<SessionTokens>) -> Self {
        Self { tokens }
    }

    #[must_use]
    pub fn check(&self, role: Role) -> GuardOutcome {
        if self.tokens.has_token(role) {
            GuardOutcome::Allow
        } else {
            GuardOutcome::RedirectToLogin {
                path: role.login_path(),
            }
        }
    }
}

/// What the caller should do after a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction {
    /// Session gone: the role's token has been cleared.
    RedirectToLogin { role: Role, path: String },
    /// Authorization failure: show the message and go somewhere safe.
    RedirectHome { message: String, path: String },
    /// Show these messages next to their fields.
    ShowFieldErrors(FieldErrors),
    /// Transient failure; the same action may be retried.
    ShowRetryable(String),
    ShowMessage(String),
}

pub struct AuthService {
    tokens: Arc<SessionTokens>,
}

impl AuthService {
    #[must_use]
    pub fn new(tokens: Arc<SessionTokens>) -> Self {
        Self { tokens }
    }

    #[must_use]
    pub fn tokens(&self) -> Arc<SessionTokens> {
        Arc::clone(&self.tokens)
    }

    /// Log in under `api.role()` and remember the token.
    ///
    /// A rejected login leaves every stored token untouched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` for rejected credentials or transport failures, and
    /// `AuthError::Storage` if the token cannot be saved.
    pub async fn login(
        &self,
        api: &dyn LessonApi,
        credentials: &Credentials,
    ) -> Result<UserProfile, AuthError> {
        let role = api.role();
        let grant = api.login(credentials).await?;
        self.tokens.store(role, grant.token).await?;
        info!(%role, user_id = %grant.user.id, "signed in");
        Ok(grant.user)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the token cannot be removed.
    pub async fn logout(&self, role: Role) -> Result<(), StorageError> {
        self.tokens.clear(role).await?;
        info!(%role, "signed out");
        Ok(())
    }

    /// Decide how to react to `err`, raised while acting as `role`.
    ///
    /// An expired session clears that role's token before redirecting; other
    /// roles' tokens are kept.
    pub async fn resolve_failure(&self, role: Role, err: &ApiError) -> FailureAction {
        match err {
            ApiError::Unauthorized { role: failed } | ApiError::MissingToken { role: failed } => {
                if let Err(clear_err) = self.tokens.clear(*failed).await {
                    warn!(role = %failed, error = %clear_err, "failed to clear expired token");
                }
                FailureAction::RedirectToLogin {
                    role: *failed,
                    path: failed.login_path(),
                }
            }
            ApiError::LoginRejected { message } => FailureAction::ShowMessage(message.clone()),
            ApiError::Forbidden { message } => FailureAction::RedirectHome {
                message: message.clone(),
                path: role.home_path(),
            },
            ApiError::Validation(fields) => FailureAction::ShowFieldErrors(fields.clone()),
            err if err.is_retryable() => FailureAction::ShowRetryable(format!(
                "Could not reach the server. Please try again. ({err})"
            )),
            other => FailureAction::ShowMessage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    async fn tokens_with(roles: &[(Role, &str)]) -> (Arc<SessionTokens>, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        for (role, token) in roles {
            repo.save_token(&StoredToken::new(*role, *token, fixed_clock().now()))
                .await
                .unwrap();
        }
        let tokens = SessionTokens::load(Arc::new(repo.clone()), fixed_clock())
            .await
            .unwrap();
        (Arc::new(tokens), repo)
    }

    #[tokio::test]
    async fn guard_redirects_to_role_login_without_token() {
        let (tokens, _) = tokens_with(&[(Role::Admin, "a")]).await;
        let guard = RouteGuard::new(tokens);
        assert_eq!(guard.check(Role::Admin), GuardOutcome::Allow);
        assert_eq!(
            guard.check(Role::Teacher),
            GuardOutcome::RedirectToLogin {
                path: "/teacher/login".into()
            }
        );
    }

    #[tokio::test]
    async fn expired_session_clears_only_that_role() {
        let (tokens, repo) = tokens_with(&[(Role::Admin, "a"), (Role::User, "u")]).await;
        let auth = AuthService::new(Arc::clone(&tokens));

        let action = auth
            .resolve_failure(Role::User, &ApiError::Unauthorized { role: Role::User })
            .await;

        assert_eq!(
            action,
            FailureAction::RedirectToLogin {
                role: Role::User,
                path: "/user/login".into()
            }
        );
        assert!(!tokens.has_token(Role::User));
        assert_eq!(tokens.token(Role::Admin).as_deref(), Some("a"));
        assert!(repo.get_token(Role::User).await.is_err());
    }

    #[tokio::test]
    async fn rejected_login_keeps_tokens() {
        let (tokens, _) = tokens_with(&[(Role::User, "u")]).await;
        let auth = AuthService::new(Arc::clone(&tokens));

        let action = auth
            .resolve_failure(
                Role::User,
                &ApiError::LoginRejected {
                    message: "Bad credentials".into(),
                },
            )
            .await;

        assert_eq!(action, FailureAction::ShowMessage("Bad credentials".into()));
        assert!(tokens.has_token(Role::User));
    }

    #[tokio::test]
    async fn forbidden_redirects_to_role_home() {
        let (tokens, _) = tokens_with(&[(Role::Teacher, "t")]).await;
        let auth = AuthService::new(tokens);
        let action = auth
            .resolve_failure(
                Role::Teacher,
                &ApiError::Forbidden {
                    message: "not your topic".into(),
                },
            )
            .await;
        assert_eq!(
            action,
            FailureAction::RedirectHome {
                message: "not your topic".into(),
                path: "/teacher/dashboard".into()
            }
        );
    }

    #[tokio::test]
    async fn server_failure_is_retryable_message() {
        let (tokens, _) = tokens_with(&[]).await;
        let auth = AuthService::new(tokens);
        let action = auth
            .resolve_failure(
                Role::User,
                &ApiError::Server {
                    status: 500,
                    message: "boom".into(),
                },
            )
            .await;
        assert!(matches!(action, FailureAction::ShowRetryable(_)));
    }
}
