use std::fmt;

use chrono::Utc;
use elearn_core::model::{
    LessonId, OptionId, Question, QuestionId, Quiz, QuizId, QuizOption, SubjectId, TopicId, UserId,
};
use storage::repository::EnrollmentRepository;
use storage::sqlite::{LessonSeed, SqliteRepository, SubjectSeed, TopicSeed};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("ELEARN_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_id = std::env::var("ELEARN_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = UserId::new(parsed);
                }
                "--help" | "-h" => {
                    eprintln!("Usage: seed [--db <sqlite_url>] [--user-id <id>]");
                    eprintln!("Environment: ELEARN_DB_URL, ELEARN_USER_ID");
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, user_id })
    }
}

fn sample_quiz() -> Quiz {
    let question = |qid: u64, text: &str, base: u64, correct: u64, points: u32| {
        let options = vec![
            QuizOption::new(OptionId::new(base), "ownership moves the value"),
            QuizOption::new(OptionId::new(base + 1), "the value is copied"),
            QuizOption::new(OptionId::new(base + 2), "the value is leaked"),
        ];
        Question::new(QuestionId::new(qid), text, options, OptionId::new(correct), points)
            .expect("sample question should satisfy authoring invariants")
    };

    Quiz::new(
        QuizId::new(1),
        TopicId::new(1),
        "Ownership basics",
        vec![
            question(1, "What happens when a non-Copy value is assigned?", 10, 10, 10),
            question(2, "What happens when an i32 is assigned?", 20, 21, 10),
            question(3, "What happens to a value at end of scope?", 30, 30, 5),
        ],
    )
    .expect("sample quiz should satisfy authoring invariants")
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;

    repo.insert_subject(&SubjectSeed {
        id: SubjectId::new(1),
        title: "Rust Fundamentals".into(),
    })
    .await?;

    repo.insert_topic(&TopicSeed {
        id: TopicId::new(1),
        subject_id: SubjectId::new(1),
        title: "Ownership".into(),
        order_index: 0,
    })
    .await?;
    repo.insert_topic(&TopicSeed {
        id: TopicId::new(2),
        subject_id: SubjectId::new(1),
        title: "Borrowing".into(),
        order_index: 1,
    })
    .await?;

    let lessons = [
        (1, 1, "Moves", 0),
        (2, 1, "Clones and copies", 1),
        (3, 2, "Shared references", 0),
        (4, 2, "Mutable references", 1),
    ];
    for (id, topic, title, order) in lessons {
        repo.insert_lesson(&LessonSeed {
            id: LessonId::new(id),
            topic_id: TopicId::new(topic),
            title: title.into(),
            order_index: order,
        })
        .await?;
    }

    repo.insert_quiz(&sample_quiz()).await?;

    repo.enroll(args.user_id, SubjectId::new(1), Utc::now())
        .await?;

    println!(
        "seeded subject 1 (2 topics, 4 lessons, 1 quiz); user {} enrolled",
        args.user_id
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(args).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
