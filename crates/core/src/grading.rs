use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{OptionId, QuestionId, Quiz};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Validation failures for a quiz submission.
///
/// Validation is all-or-nothing: a single bad reference rejects the whole
/// submission, and callers must persist nothing on error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingError {
    #[error("quiz has no questions")]
    EmptyQuiz,

    #[error("submission contains no answers")]
    NoAnswers,

    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    OptionNotInQuestion {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} was answered more than once")]
    DuplicateAnswer(QuestionId),
}

//
// ─── CONFIGURATION ─────────────────────────────────────────────────────────────
//

/// How a correct answer is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoringMode {
    /// A correct answer earns the question's configured point value.
    #[default]
    Weighted,
    /// A correct answer earns a flat 100 points, an incorrect one 0.
    Uniform,
}

/// Grading configuration: pass threshold and per-question scoring.
///
/// The attempt score is always the percentage of correct answers over the
/// quiz's full question count; `scoring` only affects the per-question
/// scores recorded with each submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Minimum percentage score (0..=100) required to pass.
    pub pass_threshold: f64,
    pub scoring: ScoringMode,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 60.0,
            scoring: ScoringMode::Weighted,
        }
    }
}

impl GradingConfig {
    /// Config with a custom threshold and the default scoring mode.
    #[must_use]
    pub fn with_threshold(pass_threshold: f64) -> Self {
        Self {
            pass_threshold,
            ..Self::default()
        }
    }
}

//
// ─── SUBMISSION INPUT ──────────────────────────────────────────────────────────
//

/// One answered question within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option_id: OptionId,
}

impl Answer {
    #[must_use]
    pub fn new(question_id: QuestionId, selected_option_id: OptionId) -> Self {
        Self {
            question_id,
            selected_option_id,
        }
    }
}

//
// ─── GRADED RESULT ─────────────────────────────────────────────────────────────
//

/// Grading outcome for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    /// `None` when the question was left unanswered.
    pub selected_option_id: Option<OptionId>,
    pub is_correct: bool,
    /// Per-question score under the configured `ScoringMode`.
    pub score: u32,
}

/// Aggregated grading outcome for one submission.
///
/// Invariants: `correct_answers + incorrect_answers == total_questions`
/// (unanswered questions count as incorrect), `total_score` is computed
/// against the quiz's full question count, and
/// `is_passed == total_score >= pass_threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAttempt {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Percentage in 0..=100.
    pub total_score: f64,
    pub is_passed: bool,
    /// One entry per quiz question, in quiz order.
    pub per_question: Vec<QuestionResult>,
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Grades a submission against a quiz.
///
/// Validates every reference first so an invalid submission produces no
/// partial result, then grades each question of the quiz. Questions the
/// submission does not answer are graded incorrect.
///
/// # Errors
///
/// Returns `GradingError` naming the offending id when the submission is
/// empty, answers a question outside the quiz, selects an option outside
/// its question, or answers a question twice. `EmptyQuiz` is returned for
/// a quiz with no questions.
///
/// ```
/// # use elearn_core::grading::{grade_quiz, Answer, GradingConfig};
/// # use elearn_core::model::{OptionId, Question, QuestionId, Quiz, QuizId, QuizOption, TopicId};
/// let opts = |base: u64| {
///     (0..3)
///         .map(|i| QuizOption::new(OptionId::new(base + i), "o"))
///         .collect::<Vec<_>>()
/// };
/// let quiz = Quiz::new(
///     QuizId::new(1),
///     TopicId::new(1),
///     "Basics",
///     vec![
///         Question::new(QuestionId::new(1), "q1", opts(10), OptionId::new(10), 10).unwrap(),
///         Question::new(QuestionId::new(2), "q2", opts(20), OptionId::new(20), 10).unwrap(),
///     ],
/// )
/// .unwrap();
///
/// let graded = grade_quiz(
///     &quiz,
///     &[Answer::new(QuestionId::new(1), OptionId::new(10))],
///     &GradingConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(graded.correct_answers, 1);
/// assert_eq!(graded.incorrect_answers, 1);
/// assert_eq!(graded.total_score, 50.0);
/// assert!(!graded.is_passed);
/// ```
pub fn grade_quiz(
    quiz: &Quiz,
    answers: &[Answer],
    config: &GradingConfig,
) -> Result<GradedAttempt, GradingError> {
    let total_questions = u32::try_from(quiz.questions().len()).unwrap_or(u32::MAX);
    if total_questions == 0 {
        return Err(GradingError::EmptyQuiz);
    }
    if answers.is_empty() {
        return Err(GradingError::NoAnswers);
    }

    // Validate every reference before grading anything.
    for (i, answer) in answers.iter().enumerate() {
        let question = quiz
            .question(answer.question_id)
            .ok_or(GradingError::UnknownQuestion(answer.question_id))?;
        if !question.has_option(answer.selected_option_id) {
            return Err(GradingError::OptionNotInQuestion {
                question: answer.question_id,
                option: answer.selected_option_id,
            });
        }
        if answers[..i].iter().any(|a| a.question_id == answer.question_id) {
            return Err(GradingError::DuplicateAnswer(answer.question_id));
        }
    }

    let mut correct = 0u32;
    let mut per_question = Vec::with_capacity(quiz.questions().len());

    for question in quiz.questions() {
        let selected = answers
            .iter()
            .find(|a| a.question_id == question.id())
            .map(|a| a.selected_option_id);
        let is_correct = selected == Some(question.correct_option_id());
        if is_correct {
            correct += 1;
        }
        let score = if is_correct {
            match config.scoring {
                ScoringMode::Weighted => question.point_value(),
                ScoringMode::Uniform => 100,
            }
        } else {
            0
        };
        per_question.push(QuestionResult {
            question_id: question.id(),
            selected_option_id: selected,
            is_correct,
            score,
        });
    }

    let total_score = f64::from(correct) / f64::from(total_questions) * 100.0;
    Ok(GradedAttempt {
        total_questions,
        correct_answers: correct,
        incorrect_answers: total_questions - correct,
        total_score,
        is_passed: total_score >= config.pass_threshold,
        per_question,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuizId, QuizOption, TopicId};

    fn question(id: u64, points: u32) -> Question {
        let base = id * 10;
        let options = (0..3)
            .map(|i| QuizOption::new(OptionId::new(base + i), format!("o{i}")))
            .collect();
        // First option is always the correct one.
        Question::new(
            QuestionId::new(id),
            format!("question {id}"),
            options,
            OptionId::new(base),
            points,
        )
        .unwrap()
    }

    fn quiz(question_count: u64) -> Quiz {
        let questions = (1..=question_count).map(|i| question(i, 10)).collect();
        Quiz::new(QuizId::new(1), TopicId::new(1), "Quiz", questions).unwrap()
    }

    fn correct(id: u64) -> Answer {
        Answer::new(QuestionId::new(id), OptionId::new(id * 10))
    }

    fn wrong(id: u64) -> Answer {
        Answer::new(QuestionId::new(id), OptionId::new(id * 10 + 1))
    }

    #[test]
    fn grades_three_of_four_as_seventy_five() {
        let graded = grade_quiz(
            &quiz(4),
            &[correct(1), correct(2), correct(3), wrong(4)],
            &GradingConfig::default(),
        )
        .unwrap();

        assert_eq!(graded.total_questions, 4);
        assert_eq!(graded.correct_answers, 3);
        assert_eq!(graded.incorrect_answers, 1);
        assert_eq!(graded.total_score, 75.0);
        assert!(graded.is_passed);
    }

    #[test]
    fn unanswered_questions_count_as_incorrect() {
        let graded = grade_quiz(
            &quiz(5),
            &[correct(1), correct(2), correct(3)],
            &GradingConfig::default(),
        )
        .unwrap();

        assert_eq!(graded.total_questions, 5);
        assert_eq!(graded.correct_answers, 3);
        assert_eq!(graded.incorrect_answers, 2);
        assert_eq!(graded.total_score, 60.0);
        assert!(graded.is_passed);

        let unanswered: Vec<_> = graded
            .per_question
            .iter()
            .filter(|r| r.selected_option_id.is_none())
            .collect();
        assert_eq!(unanswered.len(), 2);
        assert!(unanswered.iter().all(|r| !r.is_correct && r.score == 0));
    }

    #[test]
    fn threshold_is_configurable() {
        let answers = [correct(1), correct(2), correct(3), wrong(4), wrong(5)];
        let strict = grade_quiz(&quiz(5), &answers, &GradingConfig::default()).unwrap();
        assert_eq!(strict.total_score, 60.0);
        assert!(strict.is_passed);

        let lenient = grade_quiz(&quiz(5), &answers[..3], &GradingConfig::with_threshold(50.0))
            .unwrap();
        assert_eq!(lenient.total_score, 60.0);
        assert!(lenient.is_passed);

        let failing =
            grade_quiz(&quiz(5), &answers[..2], &GradingConfig::with_threshold(50.0)).unwrap();
        assert_eq!(failing.total_score, 40.0);
        assert!(!failing.is_passed);
    }

    #[test]
    fn weighted_scoring_uses_point_values() {
        let questions = vec![question(1, 7), question(2, 3)];
        let quiz = Quiz::new(QuizId::new(1), TopicId::new(1), "Quiz", questions).unwrap();
        let graded = grade_quiz(&quiz, &[correct(1)], &GradingConfig::default()).unwrap();

        assert_eq!(graded.per_question[0].score, 7);
        assert_eq!(graded.per_question[1].score, 0);
    }

    #[test]
    fn uniform_scoring_is_flat_hundred() {
        let config = GradingConfig {
            scoring: ScoringMode::Uniform,
            ..GradingConfig::default()
        };
        let graded = grade_quiz(&quiz(2), &[correct(1), wrong(2)], &config).unwrap();

        assert_eq!(graded.per_question[0].score, 100);
        assert_eq!(graded.per_question[1].score, 0);
    }

    #[test]
    fn rejects_empty_submission() {
        let err = grade_quiz(&quiz(2), &[], &GradingConfig::default()).unwrap_err();
        assert_eq!(err, GradingError::NoAnswers);
    }

    #[test]
    fn rejects_quiz_without_questions() {
        let empty = Quiz::new(QuizId::new(1), TopicId::new(1), "Quiz", Vec::new()).unwrap();
        let err = grade_quiz(&empty, &[correct(1)], &GradingConfig::default()).unwrap_err();
        assert_eq!(err, GradingError::EmptyQuiz);
    }

    #[test]
    fn rejects_question_outside_quiz() {
        let err = grade_quiz(&quiz(2), &[correct(9)], &GradingConfig::default()).unwrap_err();
        assert_eq!(err, GradingError::UnknownQuestion(QuestionId::new(9)));
    }

    #[test]
    fn rejects_option_from_another_question() {
        let bad = Answer::new(QuestionId::new(1), OptionId::new(20));
        let err = grade_quiz(&quiz(2), &[bad], &GradingConfig::default()).unwrap_err();
        assert_eq!(
            err,
            GradingError::OptionNotInQuestion {
                question: QuestionId::new(1),
                option: OptionId::new(20),
            }
        );
    }

    #[test]
    fn rejects_duplicate_answers() {
        let err = grade_quiz(
            &quiz(2),
            &[correct(1), wrong(1)],
            &GradingConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, GradingError::DuplicateAnswer(QuestionId::new(1)));
    }

    #[test]
    fn aggregate_invariants_hold() {
        for answered in 1..=4u64 {
            let answers: Vec<_> = (1..=answered).map(correct).collect();
            let graded = grade_quiz(&quiz(4), &answers, &GradingConfig::default()).unwrap();
            assert_eq!(
                graded.correct_answers + graded.incorrect_answers,
                graded.total_questions
            );
            assert_eq!(graded.per_question.len() as u32, graded.total_questions);
        }
    }
}
