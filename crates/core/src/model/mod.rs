mod catalog;
mod ids;
mod progress;
mod quiz;

pub use catalog::{LessonRef, SubjectRef, TopicRef, Visibility};
pub use ids::{
    AttemptId, LessonId, OptionId, ParseIdError, QuestionId, QuizId, SubjectId, TopicId, UserId,
};
pub use progress::{LessonProgress, SubjectProgress, TopicProgress};
pub use quiz::{MAX_OPTIONS, MIN_OPTIONS, Question, Quiz, QuizError, QuizOption};
