use elearn_core::grading::{Answer, GradingConfig, GradingError};
use elearn_core::model::{
    LessonId, OptionId, Question, QuestionId, Quiz, QuizId, QuizOption, SubjectId, TopicId, UserId,
};
use elearn_core::time::{fixed_clock, fixed_now};
use services::{AppServices, LockReason, QuizServiceError};
use storage::repository::{
    AttemptRepository, EnrollmentRepository, InMemoryRepository, ProgressRepository,
};

fn user() -> UserId {
    UserId::new(1)
}

fn subject() -> SubjectId {
    SubjectId::new(1)
}

/// Two questions; option `q * 10` is correct for question `q`.
fn build_quiz() -> Quiz {
    let question = |qid: u64| {
        let base = qid * 10;
        let options: Vec<QuizOption> = (0..3)
            .map(|i| QuizOption::new(OptionId::new(base + i), format!("o{i}")))
            .collect();
        Question::new(
            QuestionId::new(qid),
            format!("question {qid}"),
            options,
            OptionId::new(base),
            10,
        )
        .unwrap()
    };
    Quiz::new(
        QuizId::new(1),
        TopicId::new(1),
        "Quiz",
        vec![question(1), question(2)],
    )
    .unwrap()
}

async fn seed(repo: &InMemoryRepository) {
    repo.insert_subject(subject()).unwrap();
    repo.insert_topic(TopicId::new(1), subject(), 0).unwrap();
    repo.insert_lesson(LessonId::new(1), TopicId::new(1), "only", 0).unwrap();
    repo.insert_quiz(build_quiz()).unwrap();
    repo.enroll(user(), subject(), fixed_now()).await.unwrap();
}

async fn seed_with_lessons_done(repo: &InMemoryRepository) {
    seed(repo).await;
    repo.upsert_lesson_progress(user(), LessonId::new(1), fixed_now())
        .await
        .unwrap();
}

fn services_over(repo: InMemoryRepository) -> AppServices {
    AppServices::new_in_memory(repo, fixed_clock(), GradingConfig::default())
}

fn correct(q: u64) -> Answer {
    Answer::new(QuestionId::new(q), OptionId::new(q * 10))
}

fn wrong(q: u64) -> Answer {
    Answer::new(QuestionId::new(q), OptionId::new(q * 10 + 1))
}

#[tokio::test]
async fn take_quiz_hides_answer_key_until_unlocked() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo.clone());

    let err = app
        .quizzes()
        .take_quiz(user(), TopicId::new(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Locked(LockReason::TopicLessonsIncomplete(id)) if id == TopicId::new(1)
    ));

    repo.upsert_lesson_progress(user(), LessonId::new(1), fixed_now())
        .await
        .unwrap();
    let view = app.quizzes().take_quiz(user(), TopicId::new(1)).await.unwrap();
    assert_eq!(view.id, QuizId::new(1));
    assert_eq!(view.questions.len(), 2);
    assert!(view.questions.iter().all(|q| q.options.len() == 3));
}

#[tokio::test]
async fn failing_attempt_records_but_does_not_complete_topic() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = services_over(repo.clone());

    let outcome = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[wrong(1), wrong(2)])
        .await
        .unwrap();
    assert_eq!(outcome.total_score, 0.0);
    assert!(!outcome.is_passed);
    assert_eq!(
        outcome.correct_answers + outcome.incorrect_answers,
        outcome.total_questions
    );

    let latest = repo
        .latest_attempt(user(), QuizId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert!(!latest.is_passed);
    assert!(
        repo.get_topic_progress(user(), TopicId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn passing_attempt_cascades_topic_and_subject() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = services_over(repo.clone());

    let outcome = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1), correct(2)])
        .await
        .unwrap();
    assert_eq!(outcome.total_score, 100.0);
    assert!(outcome.is_passed);

    let topic = repo
        .get_topic_progress(user(), TopicId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert!(topic.is_completed);

    let subject = repo
        .get_subject_progress(user(), subject())
        .await
        .unwrap()
        .unwrap();
    assert!(subject.is_completed);
}

#[tokio::test]
async fn partial_answers_grade_unanswered_as_incorrect() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = services_over(repo);

    let outcome = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1)])
        .await
        .unwrap();
    assert_eq!(outcome.total_score, 50.0);
    assert!(!outcome.is_passed);
    assert_eq!(outcome.per_question[1].selected_option_id, None);
    assert!(!outcome.per_question[1].is_correct);
}

#[tokio::test]
async fn lenient_threshold_passes_what_default_fails() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = AppServices::new_in_memory(
        repo,
        fixed_clock(),
        GradingConfig::with_threshold(50.0),
    );

    let outcome = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1), wrong(2)])
        .await
        .unwrap();
    assert_eq!(outcome.total_score, 50.0);
    assert!(outcome.is_passed);
}

#[tokio::test]
async fn invalid_submission_persists_nothing() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = services_over(repo.clone());

    let stray = Answer::new(QuestionId::new(99), OptionId::new(990));
    let err = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1), stray])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Validation(GradingError::UnknownQuestion(id)) if id == QuestionId::new(99)
    ));

    let err = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Validation(GradingError::NoAnswers)
    ));

    let err = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1), wrong(1)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Validation(GradingError::DuplicateAnswer(id)) if id == QuestionId::new(1)
    ));

    assert!(
        repo.latest_attempt(user(), QuizId::new(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn submission_is_gated_like_taking() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo.clone());

    let err = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1), correct(2)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Locked(LockReason::TopicLessonsIncomplete(_))
    ));
    assert!(
        repo.latest_attempt(user(), QuizId::new(1))
            .await
            .unwrap()
            .is_none()
    );

    let stranger = UserId::new(42);
    let err = app
        .quizzes()
        .submit_quiz(stranger, QuizId::new(1), &[correct(1)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Locked(LockReason::NotEnrolled)
    ));
}

#[tokio::test]
async fn unknown_quiz_is_not_found() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = services_over(repo);

    let err = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(77), &[correct(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, QuizServiceError::NotFound));
}

#[tokio::test]
async fn retake_after_failure_keeps_latest_attempt() {
    let repo = InMemoryRepository::new();
    seed_with_lessons_done(&repo).await;
    let app = services_over(repo.clone());

    app.quizzes()
        .submit_quiz(user(), QuizId::new(1), &[wrong(1), wrong(2)])
        .await
        .unwrap();
    let outcome = app
        .quizzes()
        .submit_quiz(user(), QuizId::new(1), &[correct(1), correct(2)])
        .await
        .unwrap();
    assert!(outcome.is_passed);

    let latest = repo
        .latest_attempt(user(), QuizId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, Some(outcome.attempt_id));
    assert!(latest.is_passed);
}
