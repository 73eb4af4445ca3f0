use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Authoring invariant violations for quizzes and questions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("question {0} must have at least {MIN_OPTIONS} options")]
    TooFewOptions(QuestionId),

    #[error("question {0} must have at most {MAX_OPTIONS} options")]
    TooManyOptions(QuestionId),

    #[error("question {question} has duplicate option id {option}")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("correct option {option} does not belong to question {question}")]
    CorrectOptionNotInQuestion {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} must have a point value greater than zero")]
    InvalidPointValue(QuestionId),

    #[error("quiz title cannot be empty")]
    EmptyTitle,
}

/// Minimum number of options a question may carry.
pub const MIN_OPTIONS: usize = 3;
/// Maximum number of options a question may carry.
pub const MAX_OPTIONS: usize = 5;

//
// ─── OPTION ────────────────────────────────────────────────────────────────────
//

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: OptionId,
    pub text: String,
}

impl QuizOption {
    #[must_use]
    pub fn new(id: OptionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single quiz question with its options and answer key.
///
/// Construction enforces the authoring invariants: 3 to 5 options with
/// distinct ids, the correct option among them, and a positive point value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<QuizOption>,
    correct_option_id: OptionId,
    point_value: u32,
}

impl Question {
    /// Creates a question, validating the authoring invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the option count is outside 3..=5, option ids
    /// repeat, the correct option is not among the question's own options, or
    /// the point value is zero.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<QuizOption>,
        correct_option_id: OptionId,
        point_value: u32,
    ) -> Result<Self, QuizError> {
        if options.len() < MIN_OPTIONS {
            return Err(QuizError::TooFewOptions(id));
        }
        if options.len() > MAX_OPTIONS {
            return Err(QuizError::TooManyOptions(id));
        }
        for (i, option) in options.iter().enumerate() {
            if options[..i].iter().any(|o| o.id == option.id) {
                return Err(QuizError::DuplicateOption {
                    question: id,
                    option: option.id,
                });
            }
        }
        if !options.iter().any(|o| o.id == correct_option_id) {
            return Err(QuizError::CorrectOptionNotInQuestion {
                question: id,
                option: correct_option_id,
            });
        }
        if point_value == 0 {
            return Err(QuizError::InvalidPointValue(id));
        }

        Ok(Self {
            id,
            text: text.into(),
            options,
            correct_option_id,
            point_value,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[QuizOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_option_id(&self) -> OptionId {
        self.correct_option_id
    }

    #[must_use]
    pub fn point_value(&self) -> u32 {
        self.point_value
    }

    /// Returns true if the given option belongs to this question.
    #[must_use]
    pub fn has_option(&self, option_id: OptionId) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A topic's quiz: the full set of questions including answer keys.
///
/// This is the grading-side shape. Anything handed to a learner must go
/// through a view that strips `correct_option_id` and point values first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    topic_id: TopicId,
    title: String,
    questions: Vec<Question>,
}

impl Quiz {
    /// Creates a quiz from already-validated questions.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` if the title is blank.
    pub fn new(
        id: QuizId,
        topic_id: TopicId,
        title: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        Ok(Self {
            id,
            topic_id,
            title,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Looks up a question by id.
    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Sum of all question point values.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(Question::point_value).sum()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
