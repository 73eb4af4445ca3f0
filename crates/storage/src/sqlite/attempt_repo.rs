use elearn_core::model::{AttemptId, QuizId, UserId};

use super::SqliteRepository;
use super::mapping::{attempt_id_from_i64, id_to_i64, map_attempt_row, map_submission_row};
use crate::repository::{AttemptRepository, AttemptRecord, StorageError, SubmissionRecord};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn record_attempt(
        &self,
        attempt: &AttemptRecord,
        submissions: &[SubmissionRecord],
    ) -> Result<AttemptId, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        // Header first to obtain the attempt id, aggregates zeroed.
        let result = sqlx::query(
            r"
            INSERT INTO quiz_attempts (
                user_id, quiz_id, total_questions, correct_answers,
                incorrect_answers, total_score, is_passed, submitted_at
            )
            VALUES (?1, ?2, ?3, 0, 0, 0, 0, ?4)
            ",
        )
        .bind(id_to_i64("user_id", attempt.user_id.value())?)
        .bind(id_to_i64("quiz_id", attempt.quiz_id.value())?)
        .bind(i64::from(attempt.total_questions))
        .bind(attempt.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let attempt_id = attempt_id_from_i64(result.last_insert_rowid())?;

        for submission in submissions {
            sqlx::query(
                r"
                INSERT INTO quiz_submissions (
                    attempt_id, quiz_id, question_id, selected_option_id, score
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(id_to_i64("attempt_id", attempt_id.value())?)
            .bind(id_to_i64("quiz_id", submission.quiz_id.value())?)
            .bind(id_to_i64("question_id", submission.question_id.value())?)
            .bind(
                submission
                    .selected_option_id
                    .map(|o| id_to_i64("option_id", o.value()))
                    .transpose()?,
            )
            .bind(i64::from(submission.score))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        // Final aggregates land in the same transaction, so an attempt row
        // is never visible without them.
        sqlx::query(
            r"
            UPDATE quiz_attempts SET
                correct_answers = ?2,
                incorrect_answers = ?3,
                total_score = ?4,
                is_passed = ?5
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("attempt_id", attempt_id.value())?)
        .bind(i64::from(attempt.correct_answers))
        .bind(i64::from(attempt.incorrect_answers))
        .bind(attempt.total_score)
        .bind(attempt.is_passed)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(attempt_id)
    }

    async fn latest_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, quiz_id, total_questions, correct_answers,
                   incorrect_answers, total_score, is_passed, submitted_at
            FROM quiz_attempts
            WHERE user_id = ?1 AND quiz_id = ?2
            ORDER BY submitted_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("quiz_id", quiz_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn submissions_for(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Vec<SubmissionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT quiz_id, question_id, selected_option_id, score
            FROM quiz_submissions
            WHERE attempt_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("attempt_id", attempt_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_submission_row).collect()
    }
}
