use thiserror::Error;

use crate::models::EventId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("referenced event {0} does not exist")]
    Referential(EventId),

    #[error("an event with slug `{slug}` already exists")]
    Uniqueness { slug: String },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required and must be non-empty")]
    MissingField(&'static str),

    #[error("{0} is required and must be a non-empty array")]
    EmptyList(&'static str),

    #[error("invalid date format: {0:?}")]
    InvalidDate(String),

    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),

    #[error("invalid time value: {0:?}")]
    InvalidTimeValue(String),

    #[error("invalid email: {0:?}")]
    InvalidEmail(String),

    #[error("title {0:?} does not produce a usable slug")]
    EmptySlug(String),
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingField(field) | ValidationError::EmptyList(field) => *field,
            ValidationError::InvalidDate(_) => "date",
            ValidationError::InvalidTimeFormat(_) | ValidationError::InvalidTimeValue(_) => "time",
            ValidationError::InvalidEmail(_) => "email",
            ValidationError::EmptySlug(_) => "slug",
        }
    }
}

/// A failed connection attempt. Cloned out to every caller that awaited it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database connection failed: {message}")]
pub struct ConnectionError {
    message: String,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Connection failures are the only ones worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_failures_are_retryable() {
        assert!(Error::Connection(ConnectionError::new("refused")).is_retryable());

        let permanent = [
            Error::Validation(ValidationError::MissingField("title")),
            Error::Uniqueness {
                slug: "rust-meetup".into(),
            },
            Error::Referential(EventId::new()),
            Error::NotFound("event".into()),
            Error::Configuration("no uri".into()),
        ];
        for err in &permanent {
            assert!(!err.is_retryable(), "{err:?} should not be retryable");
        }
    }

    #[test]
    fn validation_errors_name_their_field() {
        assert_eq!(ValidationError::EmptyList("agenda").field(), "agenda");
        assert_eq!(ValidationError::InvalidTimeValue("25:00".into()).field(), "time");
        assert!(Error::from(ValidationError::InvalidEmail("x".into())).is_validation());
    }
}
