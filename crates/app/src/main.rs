use std::fmt;

use elearn_core::grading::{Answer, GradingConfig};
use elearn_core::model::{
    LessonId, OptionId, Question, QuestionId, Quiz, QuizError, QuizId, QuizOption, SubjectId,
    TopicId, UserId,
};
use services::{AppServices, Clock};
use storage::repository::EnrollmentRepository;
use storage::sqlite::{LessonSeed, SqliteRepository, SubjectSeed, TopicSeed};

//
// ─── ARGUMENTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidAnswer { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidAnswer { raw } => {
                write!(f, "invalid --answer value: {raw} (expected question:option)")
            }
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

fn parse_u64(flag: &'static str, raw: &str) -> Result<u64, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId {
        flag,
        raw: raw.to_string(),
    })
}

/// `question:option` pair, e.g. `--answer 3:31`.
fn parse_answer(raw: &str) -> Result<Answer, ArgsError> {
    let invalid = || ArgsError::InvalidAnswer {
        raw: raw.to_string(),
    };
    let (question, option) = raw.split_once(':').ok_or_else(invalid)?;
    let question: u64 = question.trim().parse().map_err(|_| invalid())?;
    let option: u64 = option.trim().parse().map_err(|_| invalid())?;
    Ok(Answer::new(QuestionId::new(question), OptionId::new(option)))
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- seed            [--db <sqlite_url>] [--user <id>]");
    eprintln!("  cargo run -p app -- complete-lesson --user <id> --lesson <id>");
    eprintln!("  cargo run -p app -- progress        --user <id> --subject <id>");
    eprintln!("  cargo run -p app -- take-quiz       --user <id> --topic <id>");
    eprintln!("  cargo run -p app -- submit-quiz     --user <id> --quiz <id> --answer q:o ...");
    eprintln!("  cargo run -p app -- last-lesson     --user <id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3 (or ELEARN_DB_URL)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Seed,
    CompleteLesson,
    Progress,
    TakeQuiz,
    SubmitQuiz,
    LastLesson,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "seed" => Some(Self::Seed),
            "complete-lesson" => Some(Self::CompleteLesson),
            "progress" => Some(Self::Progress),
            "take-quiz" => Some(Self::TakeQuiz),
            "submit-quiz" => Some(Self::SubmitQuiz),
            "last-lesson" => Some(Self::LastLesson),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user: Option<u64>,
    lesson: Option<u64>,
    subject: Option<u64>,
    topic: Option<u64>,
    quiz: Option<u64>,
    answers: Vec<Answer>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("ELEARN_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url),
            user: None,
            lesson: None,
            subject: None,
            topic: None,
            quiz: None,
            answers: Vec::new(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    parsed.user = Some(parse_u64("--user", &require_value(args, "--user")?)?);
                }
                "--lesson" => {
                    parsed.lesson = Some(parse_u64("--lesson", &require_value(args, "--lesson")?)?);
                }
                "--subject" => {
                    parsed.subject =
                        Some(parse_u64("--subject", &require_value(args, "--subject")?)?);
                }
                "--topic" => {
                    parsed.topic = Some(parse_u64("--topic", &require_value(args, "--topic")?)?);
                }
                "--quiz" => {
                    parsed.quiz = Some(parse_u64("--quiz", &require_value(args, "--quiz")?)?);
                }
                "--answer" => {
                    parsed.answers.push(parse_answer(&require_value(args, "--answer")?)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn user(&self) -> Result<UserId, ArgsError> {
        self.user
            .map(UserId::new)
            .ok_or(ArgsError::MissingFlag { flag: "--user" })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── SEED DATA ─────────────────────────────────────────────────────────────────
//

fn algebra_quiz(
    quiz_id: u64,
    topic_id: u64,
    title: &str,
) -> Result<Quiz, Box<dyn std::error::Error>> {
    let question = |qid: u64, text: &str, correct: usize| -> Result<Question, QuizError> {
        let base = qid * 10;
        let options = vec![
            QuizOption::new(OptionId::new(base), "x = 1"),
            QuizOption::new(OptionId::new(base + 1), "x = 2"),
            QuizOption::new(OptionId::new(base + 2), "x = 3"),
        ];
        let correct_id = options[correct].id;
        Question::new(QuestionId::new(qid), text, options, correct_id, 10)
    };

    let offset = quiz_id * 100;
    Ok(Quiz::new(
        QuizId::new(quiz_id),
        TopicId::new(topic_id),
        title,
        vec![
            question(offset + 1, "Solve 2x = 4", 1)?,
            question(offset + 2, "Solve x + 2 = 3", 0)?,
        ],
    )?)
}

async fn seed(db_url: &str, user: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let repo = SqliteRepository::connect(db_url).await?;
    repo.migrate().await?;

    repo.insert_subject(&SubjectSeed {
        id: SubjectId::new(1),
        title: "Intro to Algebra".into(),
    })
    .await?;

    let topics = [(1, "Equations", 0), (2, "Inequalities", 1)];
    for (id, title, order) in topics {
        repo.insert_topic(&TopicSeed {
            id: TopicId::new(id),
            subject_id: SubjectId::new(1),
            title: title.into(),
            order_index: order,
        })
        .await?;
    }

    let lessons = [
        (1, 1, "Balancing both sides", 0),
        (2, 1, "Isolating the unknown", 1),
        (3, 2, "Flipping the sign", 0),
        (4, 2, "Compound inequalities", 1),
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

    repo.insert_quiz(&algebra_quiz(1, 1, "Equations check")?).await?;
    repo.insert_quiz(&algebra_quiz(2, 2, "Inequalities check")?).await?;

    repo.enroll(user, SubjectId::new(1), Clock::default_clock().now())
        .await?;

    println!("seeded subject 1 (2 topics, 4 lessons, 2 quizzes); user {user} enrolled");
    Ok(())
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next().as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;

    if cmd == Command::Seed {
        let user = args.user.map_or_else(|| UserId::new(1), UserId::new);
        return seed(&args.db_url, user).await;
    }

    let app = AppServices::new_sqlite(
        &args.db_url,
        Clock::default_clock(),
        GradingConfig::default(),
    )
    .await?;

    match cmd {
        Command::Seed => unreachable!("handled above"),
        Command::CompleteLesson => {
            let user = args.user()?;
            let lesson = args
                .lesson
                .map(LessonId::new)
                .ok_or(ArgsError::MissingFlag { flag: "--lesson" })?;
            app.progress().mark_lesson_completed(user, lesson).await?;
            println!("lesson {lesson} completed for user {user}");
        }
        Command::Progress => {
            let user = args.user()?;
            let subject = args
                .subject
                .map(SubjectId::new)
                .ok_or(ArgsError::MissingFlag { flag: "--subject" })?;
            let items = app.progress().user_progress(user, subject).await?;
            for item in items {
                let mark = if item.is_completed { "x" } else { " " };
                let when = item
                    .completed_at
                    .map_or_else(String::new, |t| format!("  ({t})"));
                println!("[{mark}] lesson {} - {}{when}", item.lesson_id, item.title);
            }
        }
        Command::TakeQuiz => {
            let user = args.user()?;
            let topic = args
                .topic
                .map(TopicId::new)
                .ok_or(ArgsError::MissingFlag { flag: "--topic" })?;
            let view = app.quizzes().take_quiz(user, topic).await?;
            println!("quiz {}: {}", view.id, view.title);
            for question in &view.questions {
                println!("  question {}: {}", question.id, question.text);
                for option in &question.options {
                    println!("    option {}: {}", option.id, option.text);
                }
            }
        }
        Command::SubmitQuiz => {
            let user = args.user()?;
            let quiz = args
                .quiz
                .map(QuizId::new)
                .ok_or(ArgsError::MissingFlag { flag: "--quiz" })?;
            let outcome = app.quizzes().submit_quiz(user, quiz, &args.answers).await?;
            let verdict = if outcome.is_passed { "PASSED" } else { "FAILED" };
            println!(
                "attempt {}: {:.1}% ({}/{} correct) - {verdict}",
                outcome.attempt_id,
                outcome.total_score,
                outcome.correct_answers,
                outcome.total_questions
            );
            for result in &outcome.per_question {
                let mark = if result.is_correct { "correct" } else { "incorrect" };
                println!("  question {}: {mark} (+{})", result.question_id, result.score);
            }
        }
        Command::LastLesson => {
            let user = args.user()?;
            let last = app.progress().last_visited_lesson(user).await?;
            let when = last
                .completed_at
                .map_or_else(String::new, |t| format!(" at {t}"));
            println!("lesson {} - {}{when}", last.lesson_id, last.title);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
