use chrono::{DateTime, Utc};
use serde::Serialize;

use elearn_core::grading::GradedAttempt;
use elearn_core::model::{
    AttemptId, LessonId, LessonProgress, LessonRef, OptionId, QuestionId, Quiz, QuizId, TopicId,
};

//
// ─── QUIZ VIEWS ────────────────────────────────────────────────────────────────
//

/// Learner-facing option: id and text only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub text: String,
}

/// Learner-facing question. Deliberately omits `correct_option_id` and
/// the point value; those never leave the grading side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<OptionView>,
}

/// A quiz as handed to a learner about to take it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizView {
    pub id: QuizId,
    pub topic_id: TopicId,
    pub title: String,
    pub questions: Vec<QuestionView>,
}

impl QuizView {
    /// Project the grading-side quiz into its learner-facing shape,
    /// stripping the answer key.
    #[must_use]
    pub fn from_quiz(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id(),
            topic_id: quiz.topic_id(),
            title: quiz.title().to_owned(),
            questions: quiz
                .questions()
                .iter()
                .map(|q| QuestionView {
                    id: q.id(),
                    text: q.text().to_owned(),
                    options: q
                        .options()
                        .iter()
                        .map(|o| OptionView {
                            id: o.id,
                            text: o.text.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

//
// ─── RESULT VIEWS ──────────────────────────────────────────────────────────────
//

/// Per-question feedback returned after a submission is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerResultView {
    pub question_id: QuestionId,
    pub selected_option_id: Option<OptionId>,
    pub is_correct: bool,
    pub score: u32,
}

/// Outcome of a graded and persisted quiz submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitQuizOutcome {
    pub attempt_id: AttemptId,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Percentage in 0..=100.
    pub total_score: f64,
    pub is_passed: bool,
    pub per_question: Vec<AnswerResultView>,
}

impl SubmitQuizOutcome {
    #[must_use]
    pub fn from_graded(attempt_id: AttemptId, graded: &GradedAttempt) -> Self {
        Self {
            attempt_id,
            total_questions: graded.total_questions,
            correct_answers: graded.correct_answers,
            incorrect_answers: graded.incorrect_answers,
            total_score: graded.total_score,
            is_passed: graded.is_passed,
            per_question: graded
                .per_question
                .iter()
                .map(|r| AnswerResultView {
                    question_id: r.question_id,
                    selected_option_id: r.selected_option_id,
                    is_correct: r.is_correct,
                    score: r.score,
                })
                .collect(),
        }
    }
}

//
// ─── PROGRESS VIEWS ────────────────────────────────────────────────────────────
//

/// One lesson of a subject merged with the user's completion state.
///
/// Lessons without a progress record report `is_completed == false`
/// rather than being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonProgressItem {
    pub lesson_id: LessonId,
    pub topic_id: TopicId,
    pub title: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgressItem {
    /// Merge a catalog lesson with its (possibly absent) progress record.
    #[must_use]
    pub fn merge(lesson: &LessonRef, record: Option<&LessonProgress>) -> Self {
        Self {
            lesson_id: lesson.id,
            topic_id: lesson.topic_id,
            title: lesson.title.clone(),
            is_completed: record.is_some_and(|r| r.is_completed),
            completed_at: record.and_then(|r| r.completed_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elearn_core::model::{Question, QuizOption, UserId};
    use elearn_core::time::fixed_now;

    #[test]
    fn quiz_view_strips_answer_key() {
        let options: Vec<QuizOption> = (1..=3)
            .map(|i| QuizOption::new(OptionId::new(i), format!("o{i}")))
            .collect();
        let question =
            Question::new(QuestionId::new(1), "q", options, OptionId::new(2), 10).unwrap();
        let quiz = Quiz::new(QuizId::new(1), TopicId::new(1), "Quiz", vec![question]).unwrap();

        let view = QuizView::from_quiz(&quiz);
        assert_eq!(view.questions.len(), 1);
        assert_eq!(view.questions[0].options.len(), 3);
        assert_eq!(view.questions[0].text, "q");
    }

    #[test]
    fn merge_reports_incomplete_without_record() {
        let lesson = LessonRef {
            id: LessonId::new(1),
            topic_id: TopicId::new(1),
            title: "Intro".into(),
            order_index: 0,
        };
        let item = LessonProgressItem::merge(&lesson, None);
        assert!(!item.is_completed);
        assert_eq!(item.completed_at, None);

        let record = LessonProgress::completed(UserId::new(1), lesson.id, fixed_now());
        let item = LessonProgressItem::merge(&lesson, Some(&record));
        assert!(item.is_completed);
        assert_eq!(item.completed_at, Some(fixed_now()));
    }
}
