use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::models::{Booking, Event};

#[derive(Debug)]
pub struct Collection {
    pub name: &'static str,
    pub ddl: &'static str,
    /// `table.column` as SQLite names it in a unique-constraint failure.
    pub unique_key: Option<&'static str>,
}

const EVENTS_DDL: &str = "CREATE TABLE IF NOT EXISTS events(
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at_utc TEXT NOT NULL,
        updated_at_utc TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS events_slug_unique ON events(slug);";

const BOOKINGS_DDL: &str = "CREATE TABLE IF NOT EXISTS bookings(
        id TEXT PRIMARY KEY,
        event_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at_utc TEXT NOT NULL,
        updated_at_utc TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS bookings_event_id ON bookings(event_id);";

static REGISTRY: Lazy<Vec<Collection>> = Lazy::new(|| {
    vec![
        Collection {
            name: Event::COLLECTION,
            ddl: EVENTS_DDL,
            unique_key: Some("events.slug"),
        },
        Collection {
            name: Booking::COLLECTION,
            ddl: BOOKINGS_DDL,
            unique_key: None,
        },
    ]
});

static BY_NAME: Lazy<HashMap<&'static str, &'static Collection>> =
    Lazy::new(|| REGISTRY.iter().map(|c| (c.name, c)).collect());

pub fn collection(name: &str) -> Option<&'static Collection> {
    BY_NAME.get(name).copied()
}

pub fn collections() -> impl Iterator<Item = &'static Collection> {
    REGISTRY.iter()
}
