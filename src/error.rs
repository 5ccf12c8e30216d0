use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed period: {0}")]
    MalformedPeriod(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Save failed: {0}")]
    WriteFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl AppError {
    /// Errors the user can resolve by retrying the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::SourceUnavailable(_) | AppError::WriteFailure(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
