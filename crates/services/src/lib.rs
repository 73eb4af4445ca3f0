#![forbid(unsafe_code)]

pub mod app_services;
pub mod cascade;
pub mod error;
pub mod gate;
pub mod progress_service;
pub mod quiz_service;
pub mod view;

pub use elearn_core::Clock;

pub use app_services::AppServices;
pub use cascade::CompletionCascade;
pub use error::{AppServicesError, LockReason, ProgressError, QuizServiceError};
pub use gate::{GateDecision, PrerequisiteGate};
pub use progress_service::ProgressService;
pub use quiz_service::QuizService;
pub use view::{
    AnswerResultView, LessonProgressItem, OptionView, QuestionView, QuizView, SubmitQuizOutcome,
};
