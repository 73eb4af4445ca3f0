use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a newtype id over `u64` with the standard trait set.
///
/// All engine identifiers are opaque integers; ordering of content is
/// carried by explicit `order_index` fields, never by id magnitude.
macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new id from its raw value.
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value.
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map($name::new).map_err(|_| ParseIdError {
                    kind: $label.to_string(),
                })
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a user.
    UserId, "UserId"
);
entity_id!(
    /// Unique identifier for a subject (top of the content hierarchy).
    SubjectId, "SubjectId"
);
entity_id!(
    /// Unique identifier for a topic within a subject.
    TopicId, "TopicId"
);
entity_id!(
    /// Unique identifier for a lesson within a topic.
    LessonId, "LessonId"
);
entity_id!(
    /// Unique identifier for a quiz.
    QuizId, "QuizId"
);
entity_id!(
    /// Unique identifier for a question within a quiz.
    QuestionId, "QuestionId"
);
entity_id!(
    /// Unique identifier for an answer option within a question.
    OptionId, "OptionId"
);
entity_id!(
    /// Unique identifier for a graded quiz attempt.
    AttemptId, "AttemptId"
);

/// Error type for parsing an id from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_id_display() {
        let id = LessonId::new(42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_lesson_id_from_str() {
        let id: LessonId = "123".parse().unwrap();
        assert_eq!(id, LessonId::new(123));
    }

    #[test]
    fn test_user_id_from_str_invalid() {
        let result = "not-a-number".parse::<UserId>();
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_includes_kind() {
        assert_eq!(format!("{:?}", TopicId::new(7)), "TopicId(7)");
        assert_eq!(format!("{:?}", AttemptId::new(9)), "AttemptId(9)");
    }

    #[test]
    fn test_id_roundtrip() {
        let original = QuizId::new(42);
        let serialized = original.to_string();
        let deserialized: QuizId = serialized.parse().unwrap();
        assert_eq!(original, deserialized);
    }
}
