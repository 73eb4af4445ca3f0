use elearn_core::grading::GradingConfig;
use elearn_core::model::{
    LessonId, OptionId, Question, QuestionId, Quiz, QuizId, QuizOption, SubjectId, TopicId, UserId,
};
use elearn_core::time::{fixed_clock, fixed_now};
use services::{AppServices, LockReason, ProgressError};
use storage::repository::{EnrollmentRepository, InMemoryRepository, ProgressRepository};

fn user() -> UserId {
    UserId::new(1)
}

fn subject() -> SubjectId {
    SubjectId::new(1)
}

fn build_quiz(id: u64, topic: u64) -> Quiz {
    let options: Vec<QuizOption> = (1..=3)
        .map(|i| QuizOption::new(OptionId::new(id * 100 + i), format!("option {i}")))
        .collect();
    let question = Question::new(
        QuestionId::new(id),
        "question",
        options,
        OptionId::new(id * 100 + 1),
        10,
    )
    .unwrap();
    Quiz::new(QuizId::new(id), TopicId::new(topic), "Quiz", vec![question]).unwrap()
}

/// Subject 1 with two topics of two lessons each; topic 1 carries a quiz.
async fn seed(repo: &InMemoryRepository) {
    repo.insert_subject(subject()).unwrap();
    repo.insert_topic(TopicId::new(1), subject(), 0).unwrap();
    repo.insert_topic(TopicId::new(2), subject(), 1).unwrap();
    repo.insert_lesson(LessonId::new(1), TopicId::new(1), "1a", 0).unwrap();
    repo.insert_lesson(LessonId::new(2), TopicId::new(1), "1b", 1).unwrap();
    repo.insert_lesson(LessonId::new(3), TopicId::new(2), "2a", 0).unwrap();
    repo.insert_lesson(LessonId::new(4), TopicId::new(2), "2b", 1).unwrap();
    repo.insert_quiz(build_quiz(1, 1)).unwrap();
    repo.enroll(user(), subject(), fixed_now()).await.unwrap();
}

fn services_over(repo: InMemoryRepository) -> AppServices {
    AppServices::new_in_memory(repo, fixed_clock(), GradingConfig::default())
}

#[tokio::test]
async fn completing_out_of_order_is_locked() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo);

    let err = app
        .progress()
        .mark_lesson_completed(user(), LessonId::new(2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressError::Locked(LockReason::PreviousLessonIncomplete(id)) if id == LessonId::new(1)
    ));

    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();
    app.progress()
        .mark_lesson_completed(user(), LessonId::new(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn next_topic_is_locked_until_quiz_passed() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo);

    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();
    app.progress()
        .mark_lesson_completed(user(), LessonId::new(2))
        .await
        .unwrap();

    // Topic 1's lessons are done but its quiz is not passed.
    let err = app
        .progress()
        .mark_lesson_completed(user(), LessonId::new(3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressError::Locked(LockReason::TopicQuizNotPassed(id)) if id == TopicId::new(1)
    ));
}

#[tokio::test]
async fn unenrolled_user_is_locked() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo);
    let stranger = UserId::new(99);

    let err = app
        .progress()
        .mark_lesson_completed(stranger, LessonId::new(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressError::Locked(LockReason::NotEnrolled)
    ));
}

#[tokio::test]
async fn unknown_lesson_is_not_found() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo);

    let err = app
        .progress()
        .mark_lesson_completed(user(), LessonId::new(999))
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::NotFound));
}

#[tokio::test]
async fn topic_without_quiz_completes_from_lessons_alone() {
    // No quiz anywhere, so finishing lessons walks straight through both
    // topics and completes the subject.
    let repo = InMemoryRepository::new();
    repo.insert_subject(subject()).unwrap();
    repo.insert_topic(TopicId::new(1), subject(), 0).unwrap();
    repo.insert_lesson(LessonId::new(1), TopicId::new(1), "only", 0).unwrap();
    repo.enroll(user(), subject(), fixed_now()).await.unwrap();

    let app = services_over(repo.clone());
    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();

    let topic = repo
        .get_topic_progress(user(), TopicId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert!(topic.is_completed);
    assert_eq!(topic.completed_at, Some(fixed_now()));

    let subject = repo
        .get_subject_progress(user(), subject())
        .await
        .unwrap()
        .unwrap();
    assert!(subject.is_completed);
}

#[tokio::test]
async fn completion_is_idempotent() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo.clone());

    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();
    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();

    let records = repo
        .lesson_progress_for(user(), &[LessonId::new(1)])
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].completed_at, Some(fixed_now()));
}

#[tokio::test]
async fn user_progress_lists_every_lesson_with_state() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo);

    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();

    let items = app.progress().user_progress(user(), subject()).await.unwrap();
    assert_eq!(items.len(), 4);
    assert!(items[0].is_completed);
    assert!(items[1..].iter().all(|i| !i.is_completed));
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["1a", "1b", "2a", "2b"]);
}

#[tokio::test]
async fn last_visited_lesson_tracks_most_recent_completion() {
    let repo = InMemoryRepository::new();
    seed(&repo).await;
    let app = services_over(repo);

    let err = app.progress().last_visited_lesson(user()).await.unwrap_err();
    assert!(matches!(err, ProgressError::NotFound));

    app.progress()
        .mark_lesson_completed(user(), LessonId::new(1))
        .await
        .unwrap();
    let last = app.progress().last_visited_lesson(user()).await.unwrap();
    assert_eq!(last.lesson_id, LessonId::new(1));
    assert_eq!(last.title, "1a");
}
