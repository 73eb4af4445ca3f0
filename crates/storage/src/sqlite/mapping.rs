use elearn_core::model::{
    AttemptId, LessonId, LessonProgress, LessonRef, OptionId, QuestionId, QuizId, SubjectId,
    SubjectProgress, TopicId, TopicProgress, UserId,
};
use sqlx::Row;

use crate::repository::{AttemptRecord, StorageError, SubmissionRecord};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    Ok(SubjectId::new(i64_to_u64("subject_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn option_id_from_i64(v: i64) -> Result<OptionId, StorageError> {
    Ok(OptionId::new(i64_to_u64("option_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn map_lesson_row(row: &sqlx::sqlite::SqliteRow) -> Result<LessonRef, StorageError> {
    Ok(LessonRef {
        id: lesson_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        order_index: i64_to_u32(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
    })
}

pub(crate) fn map_lesson_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LessonProgress, StorageError> {
    Ok(LessonProgress {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        lesson_id: lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        is_completed: row.try_get::<bool, _>("is_completed").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_topic_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TopicProgress, StorageError> {
    Ok(TopicProgress {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        is_completed: row.try_get::<bool, _>("is_completed").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_subject_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SubjectProgress, StorageError> {
    Ok(SubjectProgress {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        subject_id: subject_id_from_i64(row.try_get::<i64, _>("subject_id").map_err(ser)?)?,
        is_completed: row.try_get::<bool, _>("is_completed").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_attempt_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AttemptRecord, StorageError> {
    Ok(AttemptRecord {
        id: Some(attempt_id_from_i64(
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?),
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        quiz_id: quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
        total_questions: i64_to_u32(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        correct_answers: i64_to_u32(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        incorrect_answers: i64_to_u32(
            "incorrect_answers",
            row.try_get::<i64, _>("incorrect_answers").map_err(ser)?,
        )?,
        total_score: row.try_get("total_score").map_err(ser)?,
        is_passed: row.try_get::<bool, _>("is_passed").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

pub(crate) fn map_submission_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SubmissionRecord, StorageError> {
    Ok(SubmissionRecord {
        quiz_id: quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
        question_id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        selected_option_id: row
            .try_get::<Option<i64>, _>("selected_option_id")
            .map_err(ser)?
            .map(option_id_from_i64)
            .transpose()?,
        score: i64_to_u32("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
    })
}
