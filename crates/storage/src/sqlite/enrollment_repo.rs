use chrono::{DateTime, Utc};
use elearn_core::model::{SubjectId, UserId};

use super::SqliteRepository;
use super::mapping::id_to_i64;
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn is_enrolled(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 FROM enrollments WHERE user_id = ?1 AND subject_id = ?2",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("subject_id", subject_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn enroll(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (user_id, subject_id, enrolled_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, subject_id) DO NOTHING
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
}
