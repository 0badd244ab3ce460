use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::Database;
use crate::error::{Error, Result, ValidationError};
use crate::models::{Booking, BookingDraft, BookingId};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Trims the address and checks it has a basic `local@domain.tld` shape.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if EMAIL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidEmail(input.to_string()))
    }
}

/// Performs exactly one read against the store and writes nothing.
pub async fn prepare_booking(
    draft: BookingDraft,
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let email = validate_email(&draft.email)?;

    if !db.event_exists(draft.event_id).await? {
        return Err(Error::Referential(draft.event_id));
    }

    Ok(Booking {
        id: BookingId::new(),
        event_id: draft.event_id,
        email,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventId;

    #[test]
    fn accepts_basic_addresses() {
        assert_eq!(validate_email("a@b.co").unwrap(), "a@b.co");
        assert_eq!(
            validate_email("  dev.rel+events@example.org ").unwrap(),
            "dev.rel+events@example.org"
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in ["not-an-email", "a@b", "@b.co", "a@.co", "a b@c.de", "a@b@c.de", ""] {
            assert_eq!(
                validate_email(input),
                Err(ValidationError::InvalidEmail(input.to_string())),
                "input {input:?}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_event_is_a_referential_error() {
        let db = Database::open(":memory:").expect("open store");
        let missing = EventId::new();
        let draft = BookingDraft {
            event_id: missing,
            email: "a@b.co".into(),
        };

        match prepare_booking(draft, &db, Utc::now()).await {
            Err(Error::Referential(id)) => assert_eq!(id, missing),
            other => panic!("expected referential error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn email_is_checked_before_the_lookup() {
        let db = Database::open(":memory:").expect("open store");
        let draft = BookingDraft {
            event_id: EventId::new(),
            email: "not-an-email".into(),
        };

        let err = prepare_booking(draft, &db, Utc::now())
            .await
            .expect_err("invalid email");
        assert!(err.is_validation(), "got {err:?}");
    }
}
