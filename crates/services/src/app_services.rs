use std::sync::Arc;

use elearn_core::grading::GradingConfig;
use storage::repository::{InMemoryRepository, Storage};

use crate::Clock;
use crate::cascade::CompletionCascade;
use crate::error::AppServicesError;
use crate::gate::PrerequisiteGate;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;

/// Wires repositories into the gate, cascade, and user-facing services.
#[derive(Clone)]
pub struct AppServices {
    gate: PrerequisiteGate,
    progress: Arc<ProgressService>,
    quizzes: Arc<QuizService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if the pool cannot be opened or
    /// migrations fail.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        grading: GradingConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, grading))
    }

    /// Build services over an in-memory repository (tests, prototyping).
    #[must_use]
    pub fn new_in_memory(repo: InMemoryRepository, clock: Clock, grading: GradingConfig) -> Self {
        Self::from_storage(&Storage::from_in_memory(repo), clock, grading)
    }

    /// Assemble services over an already-built storage aggregate.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, grading: GradingConfig) -> Self {
        let gate = PrerequisiteGate::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.attempts),
        );
        let cascade = CompletionCascade::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.attempts),
        );
        let progress = Arc::new(ProgressService::new(
            clock,
            gate.clone(),
            cascade.clone(),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
        ));
        let quizzes = Arc::new(QuizService::new(
            clock,
            gate.clone(),
            cascade,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.attempts),
            grading,
        ));
        Self {
            gate,
            progress,
            quizzes,
        }
    }

    #[must_use]
    pub fn gate(&self) -> &PrerequisiteGate {
        &self.gate
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }
}
