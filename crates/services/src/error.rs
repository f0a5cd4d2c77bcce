//! Shared error types for the services crate.

use thiserror::Error;

use course_core::grading::GradingError;
use course_core::model::LessonId;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `RelationStore`.
///
/// Duplicate links never show up here: the store resolves them to the
/// existing link.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelationError {
    #[error("invalid relation request: {0}")]
    Validation(String),
    #[error("link endpoint not found")]
    NotFound,
    #[error(transparent)]
    Upstream(StorageError),
}

impl From<StorageError> for RelationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Upstream(other),
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Upstream(StorageError),
}

impl From<StorageError> for ProgressError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound("record"),
            other => Self::Upstream(other),
        }
    }
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("lesson {0} has no quiz questions")]
    NoQuestions(LessonId),
    #[error(transparent)]
    Grading(GradingError),
    #[error(transparent)]
    Upstream(StorageError),
}

impl From<StorageError> for QuizServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound("record"),
            other => Self::Upstream(other),
        }
    }
}

/// Why a single backfill item was not migrated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackfillError {
    #[error("could not read legacy references: {0}")]
    LegacyRead(StorageError),
    #[error(transparent)]
    Link(#[from] RelationError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

/// Errors emitted while loading the demo catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error(transparent)]
    Domain(#[from] course_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
