use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Booking, Event, EventDraft, EventId};
use crate::schema;
use crate::utils;
use crate::validation;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    session_id: Uuid,
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Memory,
    Uri(String),
    Path(PathBuf),
}

impl Target {
    fn parse(uri: &str) -> Self {
        let uri = uri.trim();
        match uri {
            ":memory:" | "sqlite::memory:" | "sqlite://:memory:" => return Target::Memory,
            _ => {}
        }
        if uri.starts_with("file:") {
            return Target::Uri(uri.to_string());
        }
        let path = uri
            .strip_prefix("sqlite://")
            .or_else(|| uri.strip_prefix("sqlite:"))
            .unwrap_or(uri);
        Target::Path(PathBuf::from(path))
    }
}

impl Database {
    pub fn open(uri: &str) -> Result<Self> {
        let conn = match Target::parse(uri) {
            Target::Memory => Connection::open_in_memory()?,
            Target::Uri(uri) => Connection::open_with_flags(uri, OpenFlags::default())?,
            Target::Path(path) => {
                utils::ensure_parent(&path);
                Connection::open(path)?
            }
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        for collection in schema::collections() {
            conn.execute_batch(collection.ddl)?;
        }

        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                session_id: Uuid::new_v4(),
            }),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn same_session(a: &Database, b: &Database) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    async fn with_conn<F, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = inner.conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&conn)
        })
        .await
        .map_err(|err| Error::Task(err.to_string()))?
    }

    pub async fn insert_event(&self, event: Event) -> Result<Event> {
        self.with_conn(move |conn| {
            insert_event_row(conn, &event)?;
            Ok(event)
        })
        .await
    }

    /// Overwrites a persisted event with its re-normalized state.
    pub async fn replace_event(&self, event: Event) -> Result<Event> {
        self.with_conn(move |conn| {
            let payload = serde_json::to_string(&event)?;
            let changed = conn
                .execute(
                    "UPDATE events SET slug = ?2, payload = ?3, updated_at_utc = ?4 WHERE id = ?1",
                    params![
                        event.id.to_string(),
                        event.slug,
                        payload,
                        event.updated_at.to_rfc3339()
                    ],
                )
                .map_err(|err| write_error(err, &event.slug))?;
            if changed == 0 {
                return Err(Error::NotFound(format!("event {}", event.id)));
            }
            Ok(event)
        })
        .await
    }

    pub async fn find_event(&self, id: EventId) -> Result<Option<Event>> {
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM events WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            payload.map(decode).transpose()
        })
        .await
    }

    pub async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM events WHERE slug = ?1",
                    params![slug],
                    |row| row.get(0),
                )
                .optional()?;
            payload.map(decode).transpose()
        })
        .await
    }

    pub async fn event_exists(&self, id: EventId) -> Result<bool> {
        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    pub async fn list_events(&self) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT payload FROM events")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(decode(row?)?);
            }
            Ok(out)
        })
        .await
    }

    pub async fn count_events(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    pub async fn insert_booking(&self, booking: Booking) -> Result<Booking> {
        self.with_conn(move |conn| {
            let payload = serde_json::to_string(&booking)?;
            conn.execute(
                "INSERT INTO bookings (id, event_id, payload, created_at_utc, updated_at_utc)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    booking.id.to_string(),
                    booking.event_id.to_string(),
                    payload,
                    booking.created_at.to_rfc3339(),
                    booking.updated_at.to_rfc3339()
                ],
            )?;
            Ok(booking)
        })
        .await
    }

    pub async fn list_bookings_for_event(&self, event_id: EventId) -> Result<Vec<Booking>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT payload FROM bookings WHERE event_id = ?1 ORDER BY created_at_utc",
            )?;
            let rows = stmt.query_map(params![event_id.to_string()], |row| {
                row.get::<_, String>(0)
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(decode(row?)?);
            }
            Ok(out)
        })
        .await
    }

    /// Fills an empty `events` collection with the featured sample events,
    /// all or nothing.
    pub async fn seed_featured_if_empty(&self) -> Result<usize> {
        let now = Utc::now();
        let events = FEATURED
            .iter()
            .map(|sample| validation::prepare_event(featured_draft(sample, now), None, now))
            .collect::<Result<Vec<_>, _>>()?;

        let inserted = self
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                let count: i64 =
                    tx.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
                if count > 0 {
                    return Ok(0);
                }
                for event in &events {
                    insert_event_row(&tx, event)?;
                }
                tx.commit()?;
                Ok(events.len())
            })
            .await?;

        if inserted > 0 {
            tracing::info!(inserted, "seeded featured events");
        }
        Ok(inserted)
    }
}

fn insert_event_row(conn: &Connection, event: &Event) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    conn.execute(
        "INSERT INTO events (id, slug, payload, created_at_utc, updated_at_utc)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.id.to_string(),
            event.slug,
            payload,
            event.created_at.to_rfc3339(),
            event.updated_at.to_rfc3339()
        ],
    )
    .map_err(|err| write_error(err, &event.slug))?;
    Ok(())
}

fn decode<T: DeserializeOwned>(payload: String) -> Result<T> {
    serde_json::from_str(&payload).map_err(|err| {
        Error::Storage(rusqlite::Error::FromSqlConversionFailure(
            payload.len(),
            rusqlite::types::Type::Text,
            Box::new(err),
        ))
    })
}

fn write_error(err: rusqlite::Error, slug: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        let slug_key = schema::collection(Event::COLLECTION).and_then(|c| c.unique_key);
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            && slug_key.is_some_and(|key| message.contains(key))
        {
            tracing::warn!(slug, "slug already taken");
            return Error::Uniqueness {
                slug: slug.to_string(),
            };
        }
    }
    Error::Storage(err)
}

struct Featured {
    title: &'static str,
    image: &'static str,
    venue: &'static str,
    location: &'static str,
    days_ahead: i64,
    time: &'static str,
    mode: &'static str,
    tags: &'static [&'static str],
}

const FEATURED: [Featured; 3] = [
    Featured {
        title: "Open Source Hackathon",
        image: "/images/event1.png",
        venue: "Innovation Hub",
        location: "Berlin, Germany",
        days_ahead: 7,
        time: "9am",
        mode: "offline",
        tags: &["hackathon", "open-source"],
    },
    Featured {
        title: "Rust Systems Meetup",
        image: "/images/event2.png",
        venue: "Pine Box Hall",
        location: "Boise, ID",
        days_ahead: 14,
        time: "6:30pm",
        mode: "hybrid",
        tags: &["meetup", "rust"],
    },
    Featured {
        title: "Cloud Native Conference",
        image: "/images/event3.png",
        venue: "Convention Center",
        location: "Online",
        days_ahead: 30,
        time: "10:00",
        mode: "online",
        tags: &["conference", "cloud"],
    },
];

fn featured_draft(sample: &Featured, now: DateTime<Utc>) -> EventDraft {
    let start = now + ChronoDuration::days(sample.days_ahead);
    EventDraft {
        title: Some(sample.title.to_string()),
        description: Some(format!(
            "{} brings developers together for talks and hands-on sessions.",
            sample.title
        )),
        overview: Some(format!("Join {} at {}.", sample.title, sample.venue)),
        image: Some(sample.image.to_string()),
        venue: Some(sample.venue.to_string()),
        location: Some(sample.location.to_string()),
        date: Some(start.date_naive().to_string()),
        time: Some(sample.time.to_string()),
        mode: Some(sample.mode.to_string()),
        audience: Some("Developers".to_string()),
        agenda: Some(vec![
            "Registration".to_string(),
            "Keynote".to_string(),
            "Workshops".to_string(),
        ]),
        organizer: Some("Dev Events Community".to_string()),
        tags: Some(sample.tags.iter().map(|tag| tag.to_string()).collect()),
    }
}
