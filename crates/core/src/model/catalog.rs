use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, SubjectId, TopicId};

//
// ─── VISIBILITY ────────────────────────────────────────────────────────────────
//

/// Explicit visibility predicate for catalog reads.
///
/// Soft-deleted content is filtered where the caller says so, not by an
/// implicit global filter, so each query documents what it counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only content that has not been soft-deleted.
    #[default]
    Active,
    /// All content, including soft-deleted rows.
    IncludeDeleted,
}

impl Visibility {
    /// Returns true if soft-deleted rows pass this predicate.
    #[must_use]
    pub fn includes_deleted(self) -> bool {
        matches!(self, Visibility::IncludeDeleted)
    }
}

//
// ─── CATALOG REFERENCES ────────────────────────────────────────────────────────
//

/// Read-only reference to a lesson, as seen by the progress engine.
///
/// `order_index` is the lesson's explicit rank within its topic and is the
/// only thing sequential unlocking keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRef {
    pub id: LessonId,
    pub topic_id: TopicId,
    pub title: String,
    pub order_index: u32,
}

/// Read-only reference to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRef {
    pub id: TopicId,
    pub subject_id: SubjectId,
    pub order_index: u32,
    /// Number of visible lessons in the topic.
    pub lesson_count: u32,
    /// Whether the topic carries a quiz.
    pub has_quiz: bool,
}

/// Read-only reference to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: SubjectId,
    /// Number of visible topics in the subject.
    pub topic_count: u32,
}
