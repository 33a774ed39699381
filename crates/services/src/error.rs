//! Shared error types for the services crate.

use std::collections::BTreeMap;

use thiserror::Error;

use lesson_core::model::{AnswerError, PageError, Role};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::player::AttemptState;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Errors emitted by `LessonApi` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("no {role} session; sign in first")]
    MissingToken { role: Role },
    #[error("login failed: {message}")]
    LoginRejected { message: String },
    #[error("{role} session expired")]
    Unauthorized { role: Role },
    #[error("access denied: {message}")]
    Forbidden { message: String },
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),
    #[error("request rejected: {message}")]
    Rejected { message: String },
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Transient failures worth offering a retry for.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors emitted by `LessonPlayer`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("lesson is not loaded yet")]
    NotLoaded,
    #[error("lesson already loaded")]
    AlreadyLoaded,
    #[error("lesson has no questions")]
    NoQuestions,
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("attempt already submitted")]
    AlreadySubmitted,
    #[error("time is up; answers can no longer change")]
    TimeUp,
    #[error("operation not allowed while {0:?}")]
    InvalidState(AttemptState),
    #[error("'{0}' is not an item of this matching question")]
    UnknownMatchItem(String),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Errors emitted by `LessonAttempt`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt was closed")]
    Closed,
    #[error("attempt state is unavailable")]
    StateUnavailable,
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `AuthService` and `SessionTokens`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("lesson {0} is not part of this topic")]
    LessonNotInTopic(lesson_core::model::LessonId),
    #[error("lesson is locked: {}", .0.message())]
    Locked(lesson_core::AccessDecision),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
