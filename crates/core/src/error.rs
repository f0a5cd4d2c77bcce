use thiserror::Error;

use crate::grading::GradingError;
use crate::model::{CatalogError, ParseIdError, QuizError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
