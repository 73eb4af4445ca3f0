//! Shared error types for the services crate.

use thiserror::Error;

use elearn_core::grading::GradingError;
use elearn_core::model::{LessonId, TopicId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Why a gated operation is refused for a user.
///
/// Carried inside `Locked(..)` variants so callers can tell the learner
/// exactly which prerequisite is missing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LockReason {
    #[error("user is not enrolled in the subject")]
    NotEnrolled,
    #[error("lesson {0} must be completed first")]
    PreviousLessonIncomplete(LessonId),
    #[error("topic {0} must be completed first")]
    PreviousTopicIncomplete(TopicId),
    #[error("the quiz for topic {0} has not been passed")]
    TopicQuizNotPassed(TopicId),
    #[error("not all lessons in topic {0} are completed")]
    TopicLessonsIncomplete(TopicId),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("not found")]
    NotFound,
    #[error("locked: {0}")]
    Locked(LockReason),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("not found")]
    NotFound,
    #[error("locked: {0}")]
    Locked(LockReason),
    #[error("invalid submission: {0}")]
    Validation(#[from] GradingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
