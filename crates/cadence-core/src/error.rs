use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed recurrence rule: {0}")]
    MalformedRule(String),

    #[error("Series {series_id} already has an instance due {date}")]
    DuplicateOccurrence { series_id: Uuid, date: NaiveDate },
}

impl CoreError {
    /// Maps a unique-index violation on instance insertion to
    /// [`CoreError::DuplicateOccurrence`], leaving every other error untouched.
    pub(crate) fn from_insert(err: sqlx::Error, series_id: Uuid, date: NaiveDate) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CoreError::DuplicateOccurrence { series_id, date }
            }
            _ => CoreError::Database(err),
        }
    }
}
