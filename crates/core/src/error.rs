use thiserror::Error;

use crate::grading::GradingError;
use crate::model::QuizError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Grading(#[from] GradingError),
}
