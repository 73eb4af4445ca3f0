use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, SubjectId, TopicId, UserId};

/// Completion record for one (user, lesson) pair.
///
/// At most one record exists per pair; it is created on the first completion
/// event, updated in place afterwards, and never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// A completed record stamped at `when`.
    #[must_use]
    pub fn completed(user_id: UserId, lesson_id: LessonId, when: DateTime<Utc>) -> Self {
        Self {
            user_id,
            lesson_id,
            is_completed: true,
            completed_at: Some(when),
        }
    }
}

/// Completion record for one (user, topic) pair, maintained by the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Completion record for one (user, subject) pair, maintained by the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}
