use std::collections::HashMap;
use std::sync::Arc;

use elearn_core::model::{LessonId, LessonProgress, SubjectId, UserId, Visibility};
use elearn_core::time::Clock;
use storage::repository::{CatalogRepository, ProgressRepository, StorageError};

use crate::cascade::CompletionCascade;
use crate::error::ProgressError;
use crate::gate::{GateDecision, PrerequisiteGate};
use crate::view::LessonProgressItem;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Lesson completion and progress reads for one user at a time.
pub struct ProgressService {
    clock: Clock,
    gate: PrerequisiteGate,
    cascade: CompletionCascade,
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        gate: PrerequisiteGate,
        cascade: CompletionCascade,
        catalog: Arc<dyn CatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            gate,
            cascade,
            catalog,
            progress,
        }
    }

    /// Mark a lesson completed for the user and roll completion upward.
    ///
    /// Idempotent: completing an already-completed lesson keeps the original
    /// completion time and still re-runs the cascade.
    ///
    /// # Errors
    ///
    /// - `ProgressError::NotFound` if the lesson is not visible.
    /// - `ProgressError::Locked(reason)` if a prerequisite is unmet.
    /// - `ProgressError::Storage` on repository failure.
    pub async fn mark_lesson_completed(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<(), ProgressError> {
        let lesson = self
            .catalog
            .get_lesson(lesson_id, Visibility::Active)
            .await?
            .ok_or(ProgressError::NotFound)?;

        match self.gate.can_complete_lesson(user_id, &lesson).await {
            Ok(GateDecision::Allowed) => {}
            Ok(GateDecision::Locked(reason)) => {
                tracing::info!(user_id = %user_id, lesson_id = %lesson_id, %reason, "lesson locked");
                return Err(ProgressError::Locked(reason));
            }
            Err(StorageError::NotFound) => return Err(ProgressError::NotFound),
            Err(err) => return Err(err.into()),
        }

        let now = self.clock.now();
        self.progress
            .upsert_lesson_progress(user_id, lesson_id, now)
            .await?;
        self.cascade
            .on_lesson_completed(user_id, lesson.topic_id, now)
            .await?;
        tracing::info!(user_id = %user_id, lesson_id = %lesson_id, "lesson completed");
        Ok(())
    }

    /// Every visible lesson of a subject merged with the user's completion
    /// state, in topic then lesson `order_index` order.
    ///
    /// # Errors
    ///
    /// - `ProgressError::NotFound` if the subject is not visible.
    /// - `ProgressError::Storage` on repository failure.
    pub async fn user_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Vec<LessonProgressItem>, ProgressError> {
        self.catalog
            .get_subject(subject_id, Visibility::Active)
            .await?
            .ok_or(ProgressError::NotFound)?;

        let topics = self
            .catalog
            .topics_in_subject(subject_id, Visibility::Active)
            .await?;

        let mut lessons = Vec::new();
        for topic in &topics {
            lessons.extend(
                self.catalog
                    .lessons_in_topic(topic.id, Visibility::Active)
                    .await?,
            );
        }

        let ids: Vec<LessonId> = lessons.iter().map(|l| l.id).collect();
        let records: HashMap<LessonId, LessonProgress> = self
            .progress
            .lesson_progress_for(user_id, &ids)
            .await?
            .into_iter()
            .map(|r| (r.lesson_id, r))
            .collect();

        Ok(lessons
            .iter()
            .map(|lesson| LessonProgressItem::merge(lesson, records.get(&lesson.id)))
            .collect())
    }

    /// The user's most recently completed lesson.
    ///
    /// Resolves the lesson title with `IncludeDeleted` so history survives
    /// a later soft-delete of the lesson.
    ///
    /// # Errors
    ///
    /// - `ProgressError::NotFound` if the user has completed nothing yet.
    /// - `ProgressError::Storage` on repository failure.
    pub async fn last_visited_lesson(
        &self,
        user_id: UserId,
    ) -> Result<LessonProgressItem, ProgressError> {
        let record = self
            .progress
            .last_visited_lesson(user_id)
            .await?
            .ok_or(ProgressError::NotFound)?;
        let lesson = self
            .catalog
            .get_lesson(record.lesson_id, Visibility::IncludeDeleted)
            .await?
            .ok_or(ProgressError::NotFound)?;
        Ok(LessonProgressItem::merge(&lesson, Some(&record)))
    }
}
