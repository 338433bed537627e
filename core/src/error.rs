use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RopError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A demand record landed in a month bucket outside the classification window.
    /// Always a date-arithmetic defect; the run must stop.
    #[error("Invalid month {month} (range {from}-{to})")]
    DataInconsistency {
        month: NaiveDate,
        from:  NaiveDate,
        to:    NaiveDate,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid date '{0}' in source data")]
    InvalidDate(String),

    #[error("Date {date} shifted by {months} months is out of range")]
    DateOutOfRange { date: NaiveDate, months: i32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RopResult<T> = Result<T, RopError>;
