use elearn_core::model::{
    LessonId, LessonRef, Question, Quiz, QuizId, QuizOption, SubjectId, SubjectRef, TopicId,
    TopicRef, Visibility,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    id_to_i64, map_lesson_row, option_id_from_i64, question_id_from_i64, quiz_id_from_i64, ser,
    topic_id_from_i64,
};
use crate::repository::{CatalogRepository, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

//
// ─── SEED INPUT ────────────────────────────────────────────────────────────────
//

/// Insert-only shapes used by the seed binary and tests. Catalog authoring
/// proper is outside the engine.
#[derive(Debug, Clone)]
pub struct SubjectSeed {
    pub id: SubjectId,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct TopicSeed {
    pub id: TopicId,
    pub subject_id: SubjectId,
    pub title: String,
    pub order_index: u32,
}

#[derive(Debug, Clone)]
pub struct LessonSeed {
    pub id: LessonId,
    pub topic_id: TopicId,
    pub title: String,
    pub order_index: u32,
}

impl SqliteRepository {
    /// Insert a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or `Connection`
    /// on other failures.
    pub async fn insert_subject(&self, seed: &SubjectSeed) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO subjects (id, title) VALUES (?1, ?2)")
            .bind(id_to_i64("subject_id", seed.id.value())?)
            .bind(&seed.title)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    /// Insert a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or `Connection`
    /// on other failures.
    pub async fn insert_topic(&self, seed: &TopicSeed) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO topics (id, subject_id, title, order_index) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id_to_i64("topic_id", seed.id.value())?)
        .bind(id_to_i64("subject_id", seed.subject_id.value())?)
        .bind(&seed.title)
        .bind(i64::from(seed.order_index))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    /// Insert a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or `Connection`
    /// on other failures.
    pub async fn insert_lesson(&self, seed: &LessonSeed) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO lessons (id, topic_id, title, order_index) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id_to_i64("lesson_id", seed.id.value())?)
        .bind(id_to_i64("topic_id", seed.topic_id.value())?)
        .bind(&seed.title)
        .bind(i64::from(seed.order_index))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    /// Insert a quiz with its questions and options as one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the topic already has a quiz
    /// (one quiz per topic), or `Connection` on other failures.
    pub async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("INSERT INTO quizzes (id, topic_id, title) VALUES (?1, ?2, ?3)")
            .bind(id_to_i64("quiz_id", quiz.id().value())?)
            .bind(id_to_i64("topic_id", quiz.topic_id().value())?)
            .bind(quiz.title())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for question in quiz.questions() {
            sqlx::query(
                r"
                INSERT INTO questions (id, quiz_id, text, correct_option_id, point_value)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(id_to_i64("question_id", question.id().value())?)
            .bind(id_to_i64("quiz_id", quiz.id().value())?)
            .bind(question.text())
            .bind(id_to_i64("option_id", question.correct_option_id().value())?)
            .bind(i64::from(question.point_value()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for option in question.options() {
                sqlx::query("INSERT INTO options (id, question_id, text) VALUES (?1, ?2, ?3)")
                    .bind(id_to_i64("option_id", option.id.value())?)
                    .bind(id_to_i64("question_id", question.id().value())?)
                    .bind(&option.text)
                    .execute(&mut *tx)
                    .await
                    .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    /// Soft-delete or restore a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    pub async fn set_lesson_deleted(
        &self,
        id: LessonId,
        deleted: bool,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE lessons SET is_deleted = ?2 WHERE id = ?1")
            .bind(id_to_i64("lesson_id", id.value())?)
            .bind(deleted)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn load_quiz(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Quiz, StorageError> {
        let quiz_id = quiz_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
        let topic_id = topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?;
        let title: String = row.try_get("title").map_err(ser)?;

        let question_rows = sqlx::query(
            r"
            SELECT id, text, correct_option_id, point_value
            FROM questions
            WHERE quiz_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for q_row in question_rows {
            let question_id = question_id_from_i64(q_row.try_get::<i64, _>("id").map_err(ser)?)?;
            let option_rows = sqlx::query(
                "SELECT id, text FROM options WHERE question_id = ?1 ORDER BY id ASC",
            )
            .bind(id_to_i64("question_id", question_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

            let mut options = Vec::with_capacity(option_rows.len());
            for o_row in option_rows {
                options.push(QuizOption::new(
                    option_id_from_i64(o_row.try_get::<i64, _>("id").map_err(ser)?)?,
                    o_row.try_get::<String, _>("text").map_err(ser)?,
                ));
            }

            let point_value_i64: i64 = q_row.try_get("point_value").map_err(ser)?;
            let question = Question::new(
                question_id,
                q_row.try_get::<String, _>("text").map_err(ser)?,
                options,
                option_id_from_i64(q_row.try_get::<i64, _>("correct_option_id").map_err(ser)?)?,
                u32::try_from(point_value_i64).map_err(|_| {
                    StorageError::Serialization(format!("invalid point_value: {point_value_i64}"))
                })?,
            )
            .map_err(ser)?;
            questions.push(question);
        }

        Quiz::new(quiz_id, topic_id, title, questions).map_err(ser)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn get_lesson(
        &self,
        id: LessonId,
        visibility: Visibility,
    ) -> Result<Option<LessonRef>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, topic_id, title, order_index
            FROM lessons
            WHERE id = ?1 AND (?2 OR is_deleted = 0)
            ",
        )
        .bind(id_to_i64("lesson_id", id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn lessons_in_topic(
        &self,
        topic_id: TopicId,
        visibility: Visibility,
    ) -> Result<Vec<LessonRef>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic_id, title, order_index
            FROM lessons
            WHERE topic_id = ?1 AND (?2 OR is_deleted = 0)
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(id_to_i64("topic_id", topic_id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_lesson_row).collect()
    }

    async fn get_topic(
        &self,
        id: TopicId,
        visibility: Visibility,
    ) -> Result<Option<TopicRef>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                t.id,
                t.subject_id,
                t.order_index,
                (SELECT COUNT(*) FROM lessons l
                    WHERE l.topic_id = t.id AND (?2 OR l.is_deleted = 0)) AS lesson_count,
                EXISTS(SELECT 1 FROM quizzes q
                    WHERE q.topic_id = t.id AND (?2 OR q.is_deleted = 0)) AS has_quiz
            FROM topics t
            WHERE t.id = ?1 AND (?2 OR t.is_deleted = 0)
            ",
        )
        .bind(id_to_i64("topic_id", id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| map_topic_ref(&row)).transpose()
    }

    async fn topics_in_subject(
        &self,
        subject_id: SubjectId,
        visibility: Visibility,
    ) -> Result<Vec<TopicRef>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                t.id,
                t.subject_id,
                t.order_index,
                (SELECT COUNT(*) FROM lessons l
                    WHERE l.topic_id = t.id AND (?2 OR l.is_deleted = 0)) AS lesson_count,
                EXISTS(SELECT 1 FROM quizzes q
                    WHERE q.topic_id = t.id AND (?2 OR q.is_deleted = 0)) AS has_quiz
            FROM topics t
            WHERE t.subject_id = ?1 AND (?2 OR t.is_deleted = 0)
            ORDER BY t.order_index ASC, t.id ASC
            ",
        )
        .bind(id_to_i64("subject_id", subject_id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_topic_ref).collect()
    }

    async fn get_subject(
        &self,
        id: SubjectId,
        visibility: Visibility,
    ) -> Result<Option<SubjectRef>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                s.id,
                (SELECT COUNT(*) FROM topics t
                    WHERE t.subject_id = s.id AND (?2 OR t.is_deleted = 0)) AS topic_count
            FROM subjects s
            WHERE s.id = ?1 AND (?2 OR s.is_deleted = 0)
            ",
        )
        .bind(id_to_i64("subject_id", id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else { return Ok(None) };
        let topic_count: i64 = row.try_get("topic_count").map_err(ser)?;
        Ok(Some(SubjectRef {
            id,
            topic_count: u32::try_from(topic_count).unwrap_or(u32::MAX),
        }))
    }

    async fn quiz_for_topic(
        &self,
        topic_id: TopicId,
        visibility: Visibility,
    ) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, topic_id, title
            FROM quizzes
            WHERE topic_id = ?1 AND (?2 OR is_deleted = 0)
            ",
        )
        .bind(id_to_i64("topic_id", topic_id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => Ok(Some(self.load_quiz(&row).await?)),
            None => Ok(None),
        }
    }

    async fn get_quiz(
        &self,
        id: QuizId,
        visibility: Visibility,
    ) -> Result<Option<Quiz>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, topic_id, title
            FROM quizzes
            WHERE id = ?1 AND (?2 OR is_deleted = 0)
            ",
        )
        .bind(id_to_i64("quiz_id", id.value())?)
        .bind(visibility.includes_deleted())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => Ok(Some(self.load_quiz(&row).await?)),
            None => Ok(None),
        }
    }
}

fn map_topic_ref(row: &sqlx::sqlite::SqliteRow) -> Result<TopicRef, StorageError> {
    let lesson_count: i64 = row.try_get("lesson_count").map_err(ser)?;
    let order_index: i64 = row.try_get("order_index").map_err(ser)?;
    Ok(TopicRef {
        id: topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        subject_id: super::mapping::subject_id_from_i64(
            row.try_get::<i64, _>("subject_id").map_err(ser)?,
        )?,
        order_index: u32::try_from(order_index)
            .map_err(|_| StorageError::Serialization(format!("invalid order_index: {order_index}")))?,
        lesson_count: u32::try_from(lesson_count).unwrap_or(u32::MAX),
        has_quiz: row.try_get::<bool, _>("has_quiz").map_err(ser)?,
    })
}
