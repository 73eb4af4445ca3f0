use chrono::Duration;
use elearn_core::model::{
    LessonId, OptionId, Question, QuestionId, Quiz, QuizId, QuizOption, SubjectId, TopicId,
    UserId, Visibility,
};
use elearn_core::time::fixed_now;
use storage::repository::{
    AttemptRecord, AttemptRepository, CatalogRepository, EnrollmentRepository,
    ProgressRepository, StorageError, SubmissionRecord,
};
use storage::sqlite::{LessonSeed, SqliteRepository, SubjectSeed, TopicSeed};

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_topic(repo: &SqliteRepository) {
    repo.insert_subject(&SubjectSeed {
        id: SubjectId::new(1),
        title: "Subject".into(),
    })
    .await
    .unwrap();
    repo.insert_topic(&TopicSeed {
        id: TopicId::new(1),
        subject_id: SubjectId::new(1),
        title: "Topic".into(),
        order_index: 0,
    })
    .await
    .unwrap();
    repo.insert_lesson(&LessonSeed {
        id: LessonId::new(1),
        topic_id: TopicId::new(1),
        title: "First".into(),
        order_index: 0,
    })
    .await
    .unwrap();
    repo.insert_lesson(&LessonSeed {
        id: LessonId::new(2),
        topic_id: TopicId::new(1),
        title: "Second".into(),
        order_index: 1,
    })
    .await
    .unwrap();
}

fn build_quiz(id: u64, topic: u64) -> Quiz {
    let question = |qid: u64, base: u64, points: u32| {
        let options: Vec<QuizOption> = (base..base + 3)
            .map(|i| QuizOption::new(OptionId::new(i), format!("option {i}")))
            .collect();
        Question::new(
            QuestionId::new(qid),
            format!("question {qid}"),
            options,
            OptionId::new(base),
            points,
        )
        .unwrap()
    };
    Quiz::new(
        QuizId::new(id),
        TopicId::new(topic),
        "Quiz",
        vec![question(1, 10, 10), question(2, 20, 5)],
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_catalog_roundtrip_preserves_order_and_visibility() {
    let repo = connect("memdb_catalog").await;
    seed_topic(&repo).await;

    let lessons = repo
        .lessons_in_topic(TopicId::new(1), Visibility::Active)
        .await
        .unwrap();
    let titles: Vec<&str> = lessons.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, ["First", "Second"]);

    repo.set_lesson_deleted(LessonId::new(2), true).await.unwrap();

    let topic = repo
        .get_topic(TopicId::new(1), Visibility::Active)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(topic.lesson_count, 1);
    assert!(!topic.has_quiz);

    let everything = repo
        .get_topic(TopicId::new(1), Visibility::IncludeDeleted)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(everything.lesson_count, 2);

    assert!(
        repo.get_lesson(LessonId::new(2), Visibility::Active)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.get_lesson(LessonId::new(2), Visibility::IncludeDeleted)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn sqlite_quiz_roundtrip_and_one_per_topic() {
    let repo = connect("memdb_quiz").await;
    seed_topic(&repo).await;

    repo.insert_quiz(&build_quiz(1, 1)).await.unwrap();

    let quiz = repo
        .quiz_for_topic(TopicId::new(1), Visibility::Active)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quiz.id(), QuizId::new(1));
    assert_eq!(quiz.questions().len(), 2);
    assert_eq!(quiz.total_points(), 15);
    let first = &quiz.questions()[0];
    assert_eq!(first.options().len(), 3);
    assert_eq!(first.correct_option_id(), OptionId::new(10));

    let err = repo.insert_quiz(&build_quiz(2, 1)).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_progress_upsert_keeps_first_completion_time() {
    let repo = connect("memdb_progress").await;
    seed_topic(&repo).await;
    let user = UserId::new(7);
    let first = fixed_now();
    let later = first + Duration::hours(2);

    repo.upsert_lesson_progress(user, LessonId::new(1), first)
        .await
        .unwrap();
    repo.upsert_lesson_progress(user, LessonId::new(1), later)
        .await
        .unwrap();

    let records = repo
        .lesson_progress_for(user, &[LessonId::new(1), LessonId::new(2)])
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].completed_at, Some(first));

    repo.upsert_lesson_progress(user, LessonId::new(2), later)
        .await
        .unwrap();
    let completed = repo
        .completed_lesson_ids(user, TopicId::new(1))
        .await
        .unwrap();
    assert_eq!(completed.len(), 2);

    let last = repo.last_visited_lesson(user).await.unwrap().unwrap();
    assert_eq!(last.lesson_id, LessonId::new(2));
}

#[tokio::test]
async fn sqlite_enrollment_is_idempotent() {
    let repo = connect("memdb_enroll").await;
    seed_topic(&repo).await;
    let user = UserId::new(3);

    assert!(!repo.is_enrolled(user, SubjectId::new(1)).await.unwrap());
    repo.enroll(user, SubjectId::new(1), fixed_now()).await.unwrap();
    repo.enroll(user, SubjectId::new(1), fixed_now()).await.unwrap();
    assert!(repo.is_enrolled(user, SubjectId::new(1)).await.unwrap());
}

#[tokio::test]
async fn sqlite_attempt_roundtrip_with_submissions() {
    let repo = connect("memdb_attempt").await;
    seed_topic(&repo).await;
    repo.insert_quiz(&build_quiz(1, 1)).await.unwrap();
    let user = UserId::new(5);

    let fail = AttemptRecord {
        id: None,
        user_id: user,
        quiz_id: QuizId::new(1),
        total_questions: 2,
        correct_answers: 0,
        incorrect_answers: 2,
        total_score: 0.0,
        is_passed: false,
        submitted_at: fixed_now(),
    };
    let fail_subs = [
        SubmissionRecord {
            quiz_id: QuizId::new(1),
            question_id: QuestionId::new(1),
            selected_option_id: Some(OptionId::new(11)),
            score: 0,
        },
        SubmissionRecord {
            quiz_id: QuizId::new(1),
            question_id: QuestionId::new(2),
            selected_option_id: None,
            score: 0,
        },
    ];
    repo.record_attempt(&fail, &fail_subs).await.unwrap();

    let pass = AttemptRecord {
        correct_answers: 2,
        incorrect_answers: 0,
        total_score: 100.0,
        is_passed: true,
        submitted_at: fixed_now() + Duration::minutes(10),
        ..fail.clone()
    };
    let pass_subs = [
        SubmissionRecord {
            quiz_id: QuizId::new(1),
            question_id: QuestionId::new(1),
            selected_option_id: Some(OptionId::new(10)),
            score: 10,
        },
        SubmissionRecord {
            quiz_id: QuizId::new(1),
            question_id: QuestionId::new(2),
            selected_option_id: Some(OptionId::new(20)),
            score: 5,
        },
    ];
    let pass_id = repo.record_attempt(&pass, &pass_subs).await.unwrap();

    let latest = repo
        .latest_attempt(user, QuizId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, Some(pass_id));
    assert!(latest.is_passed);
    assert_eq!(latest.correct_answers + latest.incorrect_answers, latest.total_questions);

    let submissions = repo.submissions_for(pass_id).await.unwrap();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].question_id, QuestionId::new(1));
    assert_eq!(submissions[0].selected_option_id, Some(OptionId::new(10)));
    assert_eq!(submissions[1].score, 5);
}
