use std::collections::HashSet;

use chrono::{DateTime, Utc};
use elearn_core::model::{
    LessonId, LessonProgress, SubjectId, SubjectProgress, TopicId, TopicProgress, UserId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    id_to_i64, lesson_id_from_i64, map_lesson_progress_row, map_subject_progress_row,
    map_topic_progress_row, ser, topic_id_from_i64,
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_progress (user_id, lesson_id, is_completed, completed_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                is_completed = 1,
                -- first completion wins; duplicate submissions are a no-op
                completed_at = COALESCE(lesson_progress.completed_at, excluded.completed_at)
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .bind(when)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn upsert_topic_progress(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topic_progress (user_id, topic_id, is_completed, completed_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                is_completed = 1,
                completed_at = COALESCE(topic_progress.completed_at, excluded.completed_at)
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("topic_id", topic_id.value())?)
        .bind(when)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn upsert_subject_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subject_progress (user_id, subject_id, is_completed, completed_at)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(user_id, subject_id) DO UPDATE SET
                is_completed = 1,
                completed_at = COALESCE(subject_progress.completed_at, excluded.completed_at)
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("subject_id", subject_id.value())?)
        .bind(when)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn completed_lesson_ids(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<HashSet<LessonId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT lp.lesson_id
            FROM lesson_progress lp
            JOIN lessons l ON l.id = lp.lesson_id
            WHERE lp.user_id = ?1 AND lp.is_completed = 1 AND l.topic_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("topic_id", topic_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?))
            .collect()
    }

    async fn completed_topic_ids(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<HashSet<TopicId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT tp.topic_id
            FROM topic_progress tp
            JOIN topics t ON t.id = tp.topic_id
            WHERE tp.user_id = ?1 AND tp.is_completed = 1 AND t.subject_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("subject_id", subject_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?))
            .collect()
    }

    async fn lesson_progress_for(
        &self,
        user_id: UserId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT user_id, lesson_id, is_completed, completed_at
            FROM lesson_progress
            WHERE user_id = ?1 AND lesson_id IN (
            ",
        );
        for i in 0..lesson_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push_str(")\n");

        let mut q = sqlx::query(&sql).bind(id_to_i64("user_id", user_id.value())?);
        for id in lesson_ids {
            q = q.bind(id_to_i64("lesson_id", id.value())?);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_lesson_progress_row).collect()
    }

    async fn last_visited_lesson(
        &self,
        user_id: UserId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, lesson_id, is_completed, completed_at
            FROM lesson_progress
            WHERE user_id = ?1 AND completed_at IS NOT NULL
            ORDER BY completed_at DESC, lesson_id DESC
            LIMIT 1
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_lesson_progress_row).transpose()
    }

    async fn get_topic_progress(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, topic_id, is_completed, completed_at
            FROM topic_progress
            WHERE user_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("topic_id", topic_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_topic_progress_row).transpose()
    }

    async fn get_subject_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Option<SubjectProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, subject_id, is_completed, completed_at
            FROM subject_progress
            WHERE user_id = ?1 AND subject_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("subject_id", subject_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_subject_progress_row).transpose()
    }
}
