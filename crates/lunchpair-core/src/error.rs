//! Error taxonomy shared by every Lunchpair crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LunchError>;

#[derive(Debug, Error)]
pub enum LunchError {
    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// The backend committed fewer rows than the batch held.
    #[error("partial write: {written} of {expected} rows committed")]
    PartialWrite { written: usize, expected: usize },

    #[error("mail error: {0}")]
    Mail(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LunchError {
    /// Whether this error was raised by input validation (caller's fault).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidCron(_))
    }
}
