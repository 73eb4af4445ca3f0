use std::sync::Arc;

use elearn_core::grading::{Answer, GradingConfig, grade_quiz};
use elearn_core::model::{QuizId, TopicId, UserId, Visibility};
use elearn_core::time::Clock;
use storage::repository::{
    AttemptRecord, AttemptRepository, CatalogRepository, StorageError, SubmissionRecord,
};

use crate::cascade::CompletionCascade;
use crate::error::QuizServiceError;
use crate::gate::{GateDecision, PrerequisiteGate};
use crate::view::{QuizView, SubmitQuizOutcome};

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Quiz access control, grading orchestration, and attempt persistence.
pub struct QuizService {
    clock: Clock,
    gate: PrerequisiteGate,
    cascade: CompletionCascade,
    catalog: Arc<dyn CatalogRepository>,
    attempts: Arc<dyn AttemptRepository>,
    grading: GradingConfig,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        gate: PrerequisiteGate,
        cascade: CompletionCascade,
        catalog: Arc<dyn CatalogRepository>,
        attempts: Arc<dyn AttemptRepository>,
        grading: GradingConfig,
    ) -> Self {
        Self {
            clock,
            gate,
            cascade,
            catalog,
            attempts,
            grading,
        }
    }

    /// The grading configuration in effect.
    #[must_use]
    pub fn grading(&self) -> GradingConfig {
        self.grading
    }

    /// Hand the topic's quiz to a learner, with the answer key stripped.
    ///
    /// # Errors
    ///
    /// - `QuizServiceError::NotFound` if the topic is not visible or has no
    ///   quiz.
    /// - `QuizServiceError::Locked(reason)` if the topic's lessons are not
    ///   all completed or the user is not enrolled.
    /// - `QuizServiceError::Storage` on repository failure.
    pub async fn take_quiz(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<QuizView, QuizServiceError> {
        let topic = self
            .catalog
            .get_topic(topic_id, Visibility::Active)
            .await?
            .ok_or(QuizServiceError::NotFound)?;

        match self.gate.can_access_quiz(user_id, &topic).await? {
            GateDecision::Allowed => {}
            GateDecision::Locked(reason) => return Err(QuizServiceError::Locked(reason)),
        }

        let quiz = self
            .catalog
            .quiz_for_topic(topic_id, Visibility::Active)
            .await?
            .ok_or(QuizServiceError::NotFound)?;
        Ok(QuizView::from_quiz(&quiz))
    }

    /// Grade a submission, persist the attempt with its submissions as one
    /// unit, and cascade topic completion when the attempt passes.
    ///
    /// Submitting is gated exactly like taking: the quiz's topic must be
    /// fully unlocked for the user. Invalid submissions persist nothing.
    ///
    /// # Errors
    ///
    /// - `QuizServiceError::NotFound` if the quiz or its topic is not
    ///   visible.
    /// - `QuizServiceError::Locked(reason)` if the gate refuses.
    /// - `QuizServiceError::Validation` if the submission references
    ///   questions or options outside the quiz, answers a question twice,
    ///   or is empty.
    /// - `QuizServiceError::Storage` on repository failure.
    pub async fn submit_quiz(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        answers: &[Answer],
    ) -> Result<SubmitQuizOutcome, QuizServiceError> {
        let quiz = self
            .catalog
            .get_quiz(quiz_id, Visibility::Active)
            .await?
            .ok_or(QuizServiceError::NotFound)?;
        let topic = self
            .catalog
            .get_topic(quiz.topic_id(), Visibility::Active)
            .await?
            .ok_or(QuizServiceError::NotFound)?;

        match self.gate.can_access_quiz(user_id, &topic).await? {
            GateDecision::Allowed => {}
            GateDecision::Locked(reason) => {
                tracing::info!(user_id = %user_id, quiz_id = %quiz_id, %reason, "quiz locked");
                return Err(QuizServiceError::Locked(reason));
            }
        }

        let graded = grade_quiz(&quiz, answers, &self.grading)?;

        let now = self.clock.now();
        let attempt = AttemptRecord {
            id: None,
            user_id,
            quiz_id,
            total_questions: graded.total_questions,
            correct_answers: graded.correct_answers,
            incorrect_answers: graded.incorrect_answers,
            total_score: graded.total_score,
            is_passed: graded.is_passed,
            submitted_at: now,
        };
        let submissions: Vec<SubmissionRecord> = graded
            .per_question
            .iter()
            .map(|r| SubmissionRecord {
                quiz_id,
                question_id: r.question_id,
                selected_option_id: r.selected_option_id,
                score: r.score,
            })
            .collect();

        let attempt_id = self.attempts.record_attempt(&attempt, &submissions).await?;

        if graded.is_passed {
            self.cascade
                .on_quiz_passed(user_id, quiz.topic_id(), now)
                .await?;
        }

        tracing::info!(
            user_id = %user_id,
            quiz_id = %quiz_id,
            attempt_id = %attempt_id,
            total_score = graded.total_score,
            is_passed = graded.is_passed,
            "quiz submitted"
        );
        Ok(SubmitQuizOutcome::from_graded(attempt_id, &graded))
    }

    /// The user's latest attempt on a quiz, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    pub async fn latest_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        self.attempts.latest_attempt(user_id, quiz_id).await
    }
}
