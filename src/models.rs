use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

macro_rules! document_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

document_id!(EventId);
document_id!(BookingId);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub overview: String,
    pub image: String,
    pub venue: String,
    pub location: String,
    pub date: String, // canonical UTC, millisecond precision
    pub time: String, // "HH:MM", 24-hour
    pub mode: String,
    pub audience: String,
    pub agenda: Vec<String>,
    pub organizer: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub const COLLECTION: &'static str = "events";

    pub fn card(&self) -> EventCard {
        EventCard {
            title: self.title.clone(),
            image: self.image.clone(),
            slug: self.slug.clone(),
            location: self.location.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
        }
    }
}

/// What the landing page shows for a featured event.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventCard {
    pub title: String,
    pub image: String,
    pub slug: String,
    pub location: String,
    pub date: String,
    pub time: String,
}

/// Raw event fields as supplied by a caller, before normalization.
///
/// Decoding from JSON is lenient on purpose: a field of the wrong type decodes
/// as absent, so it is rejected by validation rather than by the decoder.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDraft {
    #[serde(deserialize_with = "loose_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub overview: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub venue: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub location: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub time: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub audience: Option<String>,
    #[serde(deserialize_with = "loose_list")]
    pub agenda: Option<Vec<String>>,
    #[serde(deserialize_with = "loose_string")]
    pub organizer: Option<String>,
    #[serde(deserialize_with = "loose_list")]
    pub tags: Option<Vec<String>>,
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            title: Some(event.title.clone()),
            description: Some(event.description.clone()),
            overview: Some(event.overview.clone()),
            image: Some(event.image.clone()),
            venue: Some(event.venue.clone()),
            location: Some(event.location.clone()),
            date: Some(event.date.clone()),
            time: Some(event.time.clone()),
            mode: Some(event.mode.clone()),
            audience: Some(event.audience.clone()),
            agenda: Some(event.agenda.clone()),
            organizer: Some(event.organizer.clone()),
            tags: Some(event.tags.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub event_id: EventId,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub const COLLECTION: &'static str = "bookings";
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub event_id: EventId,
    pub email: String,
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        _ => None,
    })
}

fn loose_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_decodes_wrong_types_as_absent() {
        let draft: EventDraft = serde_json::from_value(json!({
            "title": 42,
            "venue": "Hall A",
            "agenda": "keynote",
            "tags": ["rust", 7],
        }))
        .expect("lenient decode");

        assert_eq!(draft.title, None);
        assert_eq!(draft.venue.as_deref(), Some("Hall A"));
        assert_eq!(draft.agenda, None);
        assert_eq!(draft.tags, None);
        assert_eq!(draft.organizer, None);
    }

    #[test]
    fn event_serializes_camel_case() {
        let now = Utc::now();
        let event = Event {
            id: EventId::new(),
            title: "RustConf".into(),
            slug: "rustconf".into(),
            description: "d".into(),
            overview: "o".into(),
            image: "/images/rustconf.png".into(),
            venue: "v".into(),
            location: "l".into(),
            date: "2024-01-05T00:00:00.000Z".into(),
            time: "09:00".into(),
            mode: "offline".into(),
            audience: "developers".into(),
            agenda: vec!["keynote".into()],
            organizer: "org".into(),
            tags: vec!["rust".into()],
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&event).expect("serialize");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());

        let card = event.card();
        assert_eq!(card.slug, "rustconf");
        assert_eq!(card.time, "09:00");
    }

    #[test]
    fn ids_parse_from_display() {
        let id = EventId::new();
        let parsed: EventId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
        assert!("not-an-id".parse::<EventId>().is_err());
    }
}
