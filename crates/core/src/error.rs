use thiserror::Error;

use crate::model::{AnswerError, LevelParseError, PageError, RoleParseError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Level(#[from] LevelParseError),
    #[error(transparent)]
    Role(#[from] RoleParseError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}
