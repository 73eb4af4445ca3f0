use std::sync::Arc;

use elearn_core::model::{LessonRef, TopicRef, UserId, Visibility};
use storage::repository::{
    AttemptRepository, CatalogRepository, EnrollmentRepository, ProgressRepository, StorageError,
};

use crate::error::LockReason;

//
// ─── DECISION ──────────────────────────────────────────────────────────────────
//

/// Outcome of a prerequisite check.
///
/// `Locked` is an ordinary answer, not an error; storage failures are the
/// only `Err` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Locked(LockReason),
}

impl GateDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }

    /// The lock reason, if the decision is `Locked`.
    #[must_use]
    pub fn lock_reason(&self) -> Option<LockReason> {
        match self {
            GateDecision::Allowed => None,
            GateDecision::Locked(reason) => Some(*reason),
        }
    }
}

//
// ─── GATE ──────────────────────────────────────────────────────────────────────
//

/// Enforces sequential unlocking over the content hierarchy.
///
/// Content is consumed in `order_index` order: a lesson unlocks once every
/// earlier lesson in its topic is completed and every earlier topic in the
/// subject is fully advanced (lessons done, quiz passed where one exists).
/// A topic's quiz unlocks once all of the topic's lessons are completed.
#[derive(Clone)]
pub struct PrerequisiteGate {
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl PrerequisiteGate {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            catalog,
            progress,
            enrollments,
            attempts,
        }
    }

    /// May the user mark this lesson completed?
    ///
    /// Checks enrollment, every earlier topic in the subject, then every
    /// earlier lesson in the lesson's own topic. The first unmet
    /// prerequisite wins.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson's topic is not
    /// visible, or other `StorageError`s on query failure.
    pub async fn can_complete_lesson(
        &self,
        user_id: UserId,
        lesson: &LessonRef,
    ) -> Result<GateDecision, StorageError> {
        let topic = self
            .catalog
            .get_topic(lesson.topic_id, Visibility::Active)
            .await?
            .ok_or(StorageError::NotFound)?;

        if !self.enrollments.is_enrolled(user_id, topic.subject_id).await? {
            return Ok(GateDecision::Locked(LockReason::NotEnrolled));
        }

        if let Some(reason) = self.first_blocking_earlier_topic(user_id, &topic).await? {
            return Ok(GateDecision::Locked(reason));
        }

        let lessons = self
            .catalog
            .lessons_in_topic(topic.id, Visibility::Active)
            .await?;
        let completed = self.progress.completed_lesson_ids(user_id, topic.id).await?;
        for earlier in lessons.iter().take_while(|l| l.id != lesson.id) {
            if !completed.contains(&earlier.id) {
                return Ok(GateDecision::Locked(LockReason::PreviousLessonIncomplete(
                    earlier.id,
                )));
            }
        }

        Ok(GateDecision::Allowed)
    }

    /// May the user take (or submit) this topic's quiz?
    ///
    /// Requires enrollment and every lesson of the topic completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any query fails.
    pub async fn can_access_quiz(
        &self,
        user_id: UserId,
        topic: &TopicRef,
    ) -> Result<GateDecision, StorageError> {
        if !self.enrollments.is_enrolled(user_id, topic.subject_id).await? {
            return Ok(GateDecision::Locked(LockReason::NotEnrolled));
        }
        match self.topic_lessons_done(user_id, topic).await? {
            true => Ok(GateDecision::Allowed),
            false => Ok(GateDecision::Locked(LockReason::TopicLessonsIncomplete(
                topic.id,
            ))),
        }
    }

    /// Has the user fully advanced through this topic?
    ///
    /// True when every lesson is completed and, where the topic has a quiz,
    /// the latest attempt passed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any query fails.
    pub async fn can_advance_to_next_topic(
        &self,
        user_id: UserId,
        topic: &TopicRef,
    ) -> Result<GateDecision, StorageError> {
        if !self.topic_lessons_done(user_id, topic).await? {
            return Ok(GateDecision::Locked(LockReason::TopicLessonsIncomplete(
                topic.id,
            )));
        }
        if topic.has_quiz && !self.quiz_passed(user_id, topic).await? {
            return Ok(GateDecision::Locked(LockReason::TopicQuizNotPassed(
                topic.id,
            )));
        }
        Ok(GateDecision::Allowed)
    }

    /// The first earlier topic (by `order_index`) the user has not fully
    /// advanced through, translated to a lock reason on the current check.
    async fn first_blocking_earlier_topic(
        &self,
        user_id: UserId,
        topic: &TopicRef,
    ) -> Result<Option<LockReason>, StorageError> {
        let topics = self
            .catalog
            .topics_in_subject(topic.subject_id, Visibility::Active)
            .await?;
        for earlier in topics.iter().take_while(|t| t.id != topic.id) {
            match self.can_advance_to_next_topic(user_id, earlier).await? {
                GateDecision::Allowed => {}
                GateDecision::Locked(LockReason::TopicQuizNotPassed(id)) => {
                    return Ok(Some(LockReason::TopicQuizNotPassed(id)));
                }
                GateDecision::Locked(_) => {
                    return Ok(Some(LockReason::PreviousTopicIncomplete(earlier.id)));
                }
            }
        }
        Ok(None)
    }

    async fn topic_lessons_done(
        &self,
        user_id: UserId,
        topic: &TopicRef,
    ) -> Result<bool, StorageError> {
        let lessons = self
            .catalog
            .lessons_in_topic(topic.id, Visibility::Active)
            .await?;
        if lessons.is_empty() {
            return Ok(false);
        }
        let completed = self.progress.completed_lesson_ids(user_id, topic.id).await?;
        Ok(lessons.iter().all(|l| completed.contains(&l.id)))
    }

    async fn quiz_passed(&self, user_id: UserId, topic: &TopicRef) -> Result<bool, StorageError> {
        let Some(quiz) = self
            .catalog
            .quiz_for_topic(topic.id, Visibility::Active)
            .await?
        else {
            return Ok(true);
        };
        let latest = self.attempts.latest_attempt(user_id, quiz.id()).await?;
        Ok(latest.is_some_and(|a| a.is_passed))
    }
}
