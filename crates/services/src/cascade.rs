use std::sync::Arc;

use chrono::{DateTime, Utc};

use elearn_core::model::{TopicId, UserId, Visibility};
use storage::repository::{
    AttemptRepository, CatalogRepository, ProgressRepository, StorageError,
};

//
// ─── CASCADE ───────────────────────────────────────────────────────────────────
//

/// Rolls completion upward through the hierarchy.
///
/// Recomputes topic and subject completion from the current completed-sets
/// rather than incrementing counters, so re-running after a duplicate event
/// or a crash converges on the same state.
#[derive(Clone)]
pub struct CompletionCascade {
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl CompletionCascade {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            catalog,
            progress,
            attempts,
        }
    }

    /// Re-evaluate a topic after one of its lessons was completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any read or upsert fails.
    pub async fn on_lesson_completed(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.recompute_topic(user_id, topic_id, when).await
    }

    /// Re-evaluate a topic after a passing quiz attempt.
    ///
    /// The quiz can be the last missing piece of a topic whose lessons are
    /// already done, so quiz passes trigger the same recomputation as
    /// lesson completions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any read or upsert fails.
    pub async fn on_quiz_passed(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.recompute_topic(user_id, topic_id, when).await
    }

    async fn recompute_topic(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let Some(topic) = self.catalog.get_topic(topic_id, Visibility::Active).await? else {
            // Topic removed between the triggering event and the cascade.
            return Ok(());
        };

        if !self.topic_is_complete(user_id, &topic).await? {
            return Ok(());
        }

        self.progress
            .upsert_topic_progress(user_id, topic.id, when)
            .await?;
        tracing::debug!(user_id = %user_id, topic_id = %topic.id, "topic completed");

        self.recompute_subject(user_id, topic, when).await
    }

    async fn recompute_subject(
        &self,
        user_id: UserId,
        topic: elearn_core::model::TopicRef,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let topics = self
            .catalog
            .topics_in_subject(topic.subject_id, Visibility::Active)
            .await?;
        if topics.is_empty() {
            return Ok(());
        }

        let completed = self
            .progress
            .completed_topic_ids(user_id, topic.subject_id)
            .await?;
        // The topic just upserted is in `completed` already; this is a pure
        // read-back, not an in-memory union.
        if topics.iter().all(|t| completed.contains(&t.id)) {
            self.progress
                .upsert_subject_progress(user_id, topic.subject_id, when)
                .await?;
            tracing::debug!(user_id = %user_id, subject_id = %topic.subject_id, "subject completed");
        }
        Ok(())
    }

    /// All lessons completed and, where the topic has a quiz, the latest
    /// attempt passed. A topic with no lessons never counts as complete.
    async fn topic_is_complete(
        &self,
        user_id: UserId,
        topic: &elearn_core::model::TopicRef,
    ) -> Result<bool, StorageError> {
        let lessons = self
            .catalog
            .lessons_in_topic(topic.id, Visibility::Active)
            .await?;
        if lessons.is_empty() {
            return Ok(false);
        }
        let completed = self.progress.completed_lesson_ids(user_id, topic.id).await?;
        if !lessons.iter().all(|l| completed.contains(&l.id)) {
            return Ok(false);
        }

        if topic.has_quiz {
            let Some(quiz) = self
                .catalog
                .quiz_for_topic(topic.id, Visibility::Active)
                .await?
            else {
                return Ok(true);
            };
            let latest = self.attempts.latest_attempt(user_id, quiz.id()).await?;
            return Ok(latest.is_some_and(|a| a.is_passed));
        }
        Ok(true)
    }
}
