use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeTagError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed interval: stop {stop} is before start {start}")]
    MalformedInterval {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },

    #[error("interval starting at {0} is empty")]
    EmptyInterval(NaiveDateTime),

    #[error("category {0} not found")]
    CategoryNotFound(i64),

    #[error("category `{0}` not found")]
    UnknownCategory(String),

    #[error("tagged entry {0} not found")]
    TaggedEntryNotFound(i64),

    #[error("category `{0}` has sub categories")]
    CategoryHasChildren(String),

    #[error("category `{0}` still has tagged time")]
    CategoryHasTaggedTime(String),

    #[error("invalid parent category: {0}")]
    InvalidParent(String),

    #[error("category name must not be empty")]
    EmptyCategoryName,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TimeTagError>;
