use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use elearn_core::model::{
    AttemptId, LessonId, LessonProgress, LessonRef, OptionId, QuestionId, Quiz, QuizId,
    SubjectId, SubjectProgress, SubjectRef, TopicId, TopicProgress, TopicRef, UserId, Visibility,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted shape for one graded quiz attempt.
///
/// `id` is assigned by the repository on insert; aggregates obey the grading
/// invariants (`correct + incorrect == total_questions`).
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: Option<AttemptId>,
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Percentage in 0..=100.
    pub total_score: f64,
    pub is_passed: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Persisted shape for one answered (or skipped) question within an attempt.
///
/// Submissions are immutable once written; the owning attempt id is filled
/// in by `record_attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub quiz_id: QuizId,
    pub question_id: QuestionId,
    pub selected_option_id: Option<OptionId>,
    pub score: u32,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Read-only access to the content hierarchy.
///
/// Every read takes an explicit `Visibility` so queries state whether
/// soft-deleted content counts. Ordered listings sort by `order_index`.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Fetch a lesson by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup itself fails; a missing lesson
    /// is `Ok(None)`.
    async fn get_lesson(
        &self,
        id: LessonId,
        visibility: Visibility,
    ) -> Result<Option<LessonRef>, StorageError>;

    /// All lessons of a topic, ordered by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn lessons_in_topic(
        &self,
        topic_id: TopicId,
        visibility: Visibility,
    ) -> Result<Vec<LessonRef>, StorageError>;

    /// Fetch a topic by id, with its lesson count and quiz flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_topic(
        &self,
        id: TopicId,
        visibility: Visibility,
    ) -> Result<Option<TopicRef>, StorageError>;

    /// All topics of a subject, ordered by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn topics_in_subject(
        &self,
        subject_id: SubjectId,
        visibility: Visibility,
    ) -> Result<Vec<TopicRef>, StorageError>;

    /// Fetch a subject by id, with its topic count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_subject(
        &self,
        id: SubjectId,
        visibility: Visibility,
    ) -> Result<Option<SubjectRef>, StorageError>;

    /// The topic's quiz with full answer keys, if one exists.
    ///
    /// Callers handing quiz content to a learner must strip the answer key
    /// through a view first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn quiz_for_topic(
        &self,
        topic_id: TopicId,
        visibility: Visibility,
    ) -> Result<Option<Quiz>, StorageError>;

    /// Fetch a quiz by id with full answer keys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_quiz(
        &self,
        id: QuizId,
        visibility: Visibility,
    ) -> Result<Option<Quiz>, StorageError>;
}

/// Per-user completion records with upsert-by-(user, entity) semantics.
///
/// No gating or cascade logic lives here; this is pure state storage.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Create or update the single record for (user, lesson) as completed.
    ///
    /// Idempotent: an already-completed record keeps its original
    /// `completed_at`, so duplicate submissions are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Create or update the single record for (user, topic) as completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_topic_progress(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Create or update the single record for (user, subject) as completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_subject_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Ids of the user's completed lessons within a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn completed_lesson_ids(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<HashSet<LessonId>, StorageError>;

    /// Ids of the user's completed topics within a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn completed_topic_ids(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<HashSet<TopicId>, StorageError>;

    /// Progress records for the given lessons; lessons without a record are
    /// simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn lesson_progress_for(
        &self,
        user_id: UserId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError>;

    /// The user's most recently completed lesson record, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn last_visited_lesson(
        &self,
        user_id: UserId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Topic-level record for (user, topic), if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_topic_progress(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicProgress>, StorageError>;

    /// Subject-level record for (user, subject), if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_subject_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Option<SubjectProgress>, StorageError>;
}

/// Enrollment membership checks. Enrollment management proper lives outside
/// the engine; `enroll` exists for seeding and tests.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// True if the user is enrolled in the subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn is_enrolled(&self, user_id: UserId, subject_id: SubjectId)
    -> Result<bool, StorageError>;

    /// Enroll the user; re-enrolling is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn enroll(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Quiz attempts and their per-question submissions.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist an attempt with all of its submissions as one unit.
    ///
    /// Either the attempt header, every submission, and the final aggregates
    /// all land, or nothing does.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any part of the unit fails; no partial
    /// state remains in that case.
    async fn record_attempt(
        &self,
        attempt: &AttemptRecord,
        submissions: &[SubmissionRecord],
    ) -> Result<AttemptId, StorageError>;

    /// The user's most recent attempt on a quiz, by submission time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn latest_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError>;

    /// Submissions belonging to an attempt, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn submissions_for(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Vec<SubmissionRecord>, StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct SubjectRow {
    deleted: bool,
}

#[derive(Debug, Clone)]
struct TopicRow {
    subject_id: SubjectId,
    order_index: u32,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct LessonRow {
    topic_id: TopicId,
    title: String,
    order_index: u32,
    deleted: bool,
}

#[derive(Default)]
struct State {
    subjects: HashMap<SubjectId, SubjectRow>,
    topics: HashMap<TopicId, TopicRow>,
    lessons: HashMap<LessonId, LessonRow>,
    quizzes: HashMap<QuizId, (Quiz, bool)>,
    enrollments: HashSet<(UserId, SubjectId)>,
    lesson_progress: HashMap<(UserId, LessonId), LessonProgress>,
    topic_progress: HashMap<(UserId, TopicId), TopicProgress>,
    subject_progress: HashMap<(UserId, SubjectId), SubjectProgress>,
    attempts: Vec<AttemptRecord>,
    submissions: HashMap<AttemptId, Vec<SubmissionRecord>>,
    next_attempt_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Seed a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn insert_subject(&self, id: SubjectId) -> Result<(), StorageError> {
        self.lock()?
            .subjects
            .insert(id, SubjectRow { deleted: false });
        Ok(())
    }

    /// Seed a topic under a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn insert_topic(
        &self,
        id: TopicId,
        subject_id: SubjectId,
        order_index: u32,
    ) -> Result<(), StorageError> {
        self.lock()?.topics.insert(
            id,
            TopicRow {
                subject_id,
                order_index,
                deleted: false,
            },
        );
        Ok(())
    }

    /// Seed a lesson under a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn insert_lesson(
        &self,
        id: LessonId,
        topic_id: TopicId,
        title: impl Into<String>,
        order_index: u32,
    ) -> Result<(), StorageError> {
        self.lock()?.lessons.insert(
            id,
            LessonRow {
                topic_id,
                title: title.into(),
                order_index,
                deleted: false,
            },
        );
        Ok(())
    }

    /// Seed a quiz (the topic it references gains `has_quiz`).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the topic already has a quiz.
    pub fn insert_quiz(&self, quiz: Quiz) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let topic_id = quiz.topic_id();
        if state
            .quizzes
            .values()
            .any(|(q, _)| q.topic_id() == topic_id)
        {
            return Err(StorageError::Conflict);
        }
        state.quizzes.insert(quiz.id(), (quiz, false));
        Ok(())
    }

    /// Soft-delete or restore a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    pub fn set_lesson_deleted(&self, id: LessonId, deleted: bool) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let row = state.lessons.get_mut(&id).ok_or(StorageError::NotFound)?;
        row.deleted = deleted;
        Ok(())
    }
}

fn visible(deleted: bool, visibility: Visibility) -> bool {
    !deleted || visibility.includes_deleted()
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn get_lesson(
        &self,
        id: LessonId,
        visibility: Visibility,
    ) -> Result<Option<LessonRef>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .lessons
            .get(&id)
            .filter(|row| visible(row.deleted, visibility))
            .map(|row| LessonRef {
                id,
                topic_id: row.topic_id,
                title: row.title.clone(),
                order_index: row.order_index,
            }))
    }

    async fn lessons_in_topic(
        &self,
        topic_id: TopicId,
        visibility: Visibility,
    ) -> Result<Vec<LessonRef>, StorageError> {
        let state = self.lock()?;
        let mut lessons: Vec<LessonRef> = state
            .lessons
            .iter()
            .filter(|(_, row)| row.topic_id == topic_id && visible(row.deleted, visibility))
            .map(|(id, row)| LessonRef {
                id: *id,
                topic_id,
                title: row.title.clone(),
                order_index: row.order_index,
            })
            .collect();
        lessons.sort_by_key(|l| (l.order_index, l.id));
        Ok(lessons)
    }

    async fn get_topic(
        &self,
        id: TopicId,
        visibility: Visibility,
    ) -> Result<Option<TopicRef>, StorageError> {
        let state = self.lock()?;
        let Some(row) = state
            .topics
            .get(&id)
            .filter(|row| visible(row.deleted, visibility))
        else {
            return Ok(None);
        };
        let lesson_count = state
            .lessons
            .values()
            .filter(|l| l.topic_id == id && visible(l.deleted, visibility))
            .count();
        let has_quiz = state
            .quizzes
            .values()
            .any(|(q, deleted)| q.topic_id() == id && visible(*deleted, visibility));
        Ok(Some(TopicRef {
            id,
            subject_id: row.subject_id,
            order_index: row.order_index,
            lesson_count: u32::try_from(lesson_count).unwrap_or(u32::MAX),
            has_quiz,
        }))
    }

    async fn topics_in_subject(
        &self,
        subject_id: SubjectId,
        visibility: Visibility,
    ) -> Result<Vec<TopicRef>, StorageError> {
        let ids: Vec<TopicId> = {
            let state = self.lock()?;
            let mut rows: Vec<(TopicId, u32)> = state
                .topics
                .iter()
                .filter(|(_, row)| {
                    row.subject_id == subject_id && visible(row.deleted, visibility)
                })
                .map(|(id, row)| (*id, row.order_index))
                .collect();
            rows.sort_by_key(|(id, order)| (*order, *id));
            rows.into_iter().map(|(id, _)| id).collect()
        };

        let mut topics = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(topic) = self.get_topic(id, visibility).await? {
                topics.push(topic);
            }
        }
        Ok(topics)
    }

    async fn get_subject(
        &self,
        id: SubjectId,
        visibility: Visibility,
    ) -> Result<Option<SubjectRef>, StorageError> {
        let state = self.lock()?;
        let Some(_) = state
            .subjects
            .get(&id)
            .filter(|row| visible(row.deleted, visibility))
        else {
            return Ok(None);
        };
        let topic_count = state
            .topics
            .values()
            .filter(|t| t.subject_id == id && visible(t.deleted, visibility))
            .count();
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
        let state = self.lock()?;
        Ok(state
            .quizzes
            .values()
            .find(|(q, deleted)| q.topic_id() == topic_id && visible(*deleted, visibility))
            .map(|(q, _)| q.clone()))
    }

    async fn get_quiz(
        &self,
        id: QuizId,
        visibility: Visibility,
    ) -> Result<Option<Quiz>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .quizzes
            .get(&id)
            .filter(|(_, deleted)| visible(*deleted, visibility))
            .map(|(q, _)| q.clone()))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_lesson_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .lesson_progress
            .entry((user_id, lesson_id))
            .and_modify(|p| {
                if !p.is_completed {
                    p.is_completed = true;
                    p.completed_at = Some(when);
                }
            })
            .or_insert_with(|| LessonProgress::completed(user_id, lesson_id, when));
        Ok(())
    }

    async fn upsert_topic_progress(
        &self,
        user_id: UserId,
        topic_id: TopicId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .topic_progress
            .entry((user_id, topic_id))
            .and_modify(|p| {
                if !p.is_completed {
                    p.is_completed = true;
                    p.completed_at = Some(when);
                }
            })
            .or_insert(TopicProgress {
                user_id,
                topic_id,
                is_completed: true,
                completed_at: Some(when),
            });
        Ok(())
    }

    async fn upsert_subject_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .subject_progress
            .entry((user_id, subject_id))
            .and_modify(|p| {
                if !p.is_completed {
                    p.is_completed = true;
                    p.completed_at = Some(when);
                }
            })
            .or_insert(SubjectProgress {
                user_id,
                subject_id,
                is_completed: true,
                completed_at: Some(when),
            });
        Ok(())
    }

    async fn completed_lesson_ids(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<HashSet<LessonId>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .lesson_progress
            .values()
            .filter(|p| {
                p.user_id == user_id
                    && p.is_completed
                    && state
                        .lessons
                        .get(&p.lesson_id)
                        .is_some_and(|l| l.topic_id == topic_id)
            })
            .map(|p| p.lesson_id)
            .collect())
    }

    async fn completed_topic_ids(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<HashSet<TopicId>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .topic_progress
            .values()
            .filter(|p| {
                p.user_id == user_id
                    && p.is_completed
                    && state
                        .topics
                        .get(&p.topic_id)
                        .is_some_and(|t| t.subject_id == subject_id)
            })
            .map(|p| p.topic_id)
            .collect())
    }

    async fn lesson_progress_for(
        &self,
        user_id: UserId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let state = self.lock()?;
        Ok(lesson_ids
            .iter()
            .filter_map(|id| state.lesson_progress.get(&(user_id, *id)).cloned())
            .collect())
    }

    async fn last_visited_lesson(
        &self,
        user_id: UserId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .lesson_progress
            .values()
            .filter(|p| p.user_id == user_id && p.completed_at.is_some())
            .max_by_key(|p| p.completed_at)
            .cloned())
    }

    async fn get_topic_progress(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicProgress>, StorageError> {
        let state = self.lock()?;
        Ok(state.topic_progress.get(&(user_id, topic_id)).cloned())
    }

    async fn get_subject_progress(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Option<SubjectProgress>, StorageError> {
        let state = self.lock()?;
        Ok(state.subject_progress.get(&(user_id, subject_id)).cloned())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn is_enrolled(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
    ) -> Result<bool, StorageError> {
        let state = self.lock()?;
        Ok(state.enrollments.contains(&(user_id, subject_id)))
    }

    async fn enroll(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        _when: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.enrollments.insert((user_id, subject_id));
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn record_attempt(
        &self,
        attempt: &AttemptRecord,
        submissions: &[SubmissionRecord],
    ) -> Result<AttemptId, StorageError> {
        let mut state = self.lock()?;
        state.next_attempt_id += 1;
        let id = AttemptId::new(state.next_attempt_id);
        let mut stored = attempt.clone();
        stored.id = Some(id);
        state.attempts.push(stored);
        state.submissions.insert(id, submissions.to_vec());
        Ok(id)
    }

    async fn latest_attempt(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<AttemptRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .max_by_key(|a| (a.submitted_at, a.id))
            .cloned())
    }

    async fn submissions_for(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Vec<SubmissionRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .submissions
            .get(&attempt_id)
            .cloned()
            .unwrap_or_default())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the engine's repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wraps an existing in-memory repository so callers keep the concrete
    /// handle for seeding.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let enrollments: Arc<dyn EnrollmentRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self {
            catalog,
            progress,
            enrollments,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elearn_core::model::{Question, QuizOption};
    use elearn_core::time::fixed_now;
    use chrono::Duration;

    fn seed_topic(repo: &InMemoryRepository) {
        repo.insert_subject(SubjectId::new(1)).unwrap();
        repo.insert_topic(TopicId::new(1), SubjectId::new(1), 0).unwrap();
        repo.insert_lesson(LessonId::new(1), TopicId::new(1), "Intro", 0)
            .unwrap();
        repo.insert_lesson(LessonId::new(2), TopicId::new(1), "Basics", 1)
            .unwrap();
    }

    fn build_quiz(id: u64, topic: u64) -> Quiz {
        let options: Vec<QuizOption> = (1..=3)
            .map(|i| QuizOption::new(OptionId::new(i), format!("o{i}")))
            .collect();
        let question =
            Question::new(QuestionId::new(1), "q", options, OptionId::new(1), 10).unwrap();
        Quiz::new(QuizId::new(id), TopicId::new(topic), "Quiz", vec![question]).unwrap()
    }

    #[tokio::test]
    async fn upsert_lesson_progress_is_idempotent() {
        let repo = InMemoryRepository::new();
        seed_topic(&repo);
        let user = UserId::new(7);
        let first = fixed_now();
        let later = first + Duration::hours(1);

        repo.upsert_lesson_progress(user, LessonId::new(1), first)
            .await
            .unwrap();
        repo.upsert_lesson_progress(user, LessonId::new(1), later)
            .await
            .unwrap();

        let records = repo
            .lesson_progress_for(user, &[LessonId::new(1)])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].completed_at, Some(first));
    }

    #[tokio::test]
    async fn lessons_in_topic_sorted_by_order_index() {
        let repo = InMemoryRepository::new();
        repo.insert_subject(SubjectId::new(1)).unwrap();
        repo.insert_topic(TopicId::new(1), SubjectId::new(1), 0).unwrap();
        repo.insert_lesson(LessonId::new(9), TopicId::new(1), "second", 1)
            .unwrap();
        repo.insert_lesson(LessonId::new(3), TopicId::new(1), "first", 0)
            .unwrap();

        let lessons = repo
            .lessons_in_topic(TopicId::new(1), Visibility::Active)
            .await
            .unwrap();
        let titles: Vec<&str> = lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[tokio::test]
    async fn soft_deleted_lessons_are_invisible_when_active() {
        let repo = InMemoryRepository::new();
        seed_topic(&repo);
        repo.set_lesson_deleted(LessonId::new(2), true).unwrap();

        let topic = repo
            .get_topic(TopicId::new(1), Visibility::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(topic.lesson_count, 1);

        let all = repo
            .get_topic(TopicId::new(1), Visibility::IncludeDeleted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(all.lesson_count, 2);
    }

    #[tokio::test]
    async fn second_quiz_for_topic_conflicts() {
        let repo = InMemoryRepository::new();
        seed_topic(&repo);
        repo.insert_quiz(build_quiz(1, 1)).unwrap();
        let err = repo.insert_quiz(build_quiz(2, 1)).unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn latest_attempt_orders_by_submission_time() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let base = AttemptRecord {
            id: None,
            user_id: user,
            quiz_id: QuizId::new(1),
            total_questions: 1,
            correct_answers: 0,
            incorrect_answers: 1,
            total_score: 0.0,
            is_passed: false,
            submitted_at: fixed_now(),
        };
        repo.record_attempt(&base, &[]).await.unwrap();

        let pass = AttemptRecord {
            correct_answers: 1,
            incorrect_answers: 0,
            total_score: 100.0,
            is_passed: true,
            submitted_at: fixed_now() + Duration::minutes(5),
            ..base.clone()
        };
        repo.record_attempt(&pass, &[]).await.unwrap();

        let latest = repo
            .latest_attempt(user, QuizId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert!(latest.is_passed);
    }
}
