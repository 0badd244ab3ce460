use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;
use crate::models::{Event, EventDraft, EventId};
use crate::utils;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([0-9]{1,2})(?::([0-9]{1,2}))?\s*(am|pm)?$").expect("valid time regex")
});

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
];

pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG_RE
        .replace_all(lowered.trim(), "-")
        .trim_matches('-')
        .to_string()
}

/// Rewrites a calendar date or date-time as its canonical UTC timestamp.
///
/// Values without an offset are read as UTC; bare dates land on midnight UTC.
pub fn normalize_date(input: &str) -> Result<String, ValidationError> {
    parse_date(input.trim())
        .map(|at| utils::canonical_timestamp(&at))
        .ok_or_else(|| ValidationError::InvalidDate(input.to_string()))
}

/// Normalizes `9`, `9:30`, `2:05pm`, `12 AM` and friends to 24-hour `HH:MM`.
pub fn normalize_time(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let bad_format = || ValidationError::InvalidTimeFormat(trimmed.to_string());

    let caps = TIME_RE.captures(trimmed).ok_or_else(bad_format)?;
    let mut hours: u32 = caps
        .get(1)
        .ok_or_else(bad_format)?
        .as_str()
        .parse()
        .map_err(|_| bad_format())?;
    let minutes: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| bad_format())?,
        None => 0,
    };

    if let Some(marker) = caps.get(3) {
        let is_pm = marker.as_str().eq_ignore_ascii_case("pm");
        if hours == 12 {
            hours = if is_pm { 12 } else { 0 };
        } else if is_pm {
            hours += 12;
        }
    }

    if hours > 23 || minutes > 59 {
        return Err(ValidationError::InvalidTimeValue(trimmed.to_string()));
    }
    Ok(format!("{:02}:{:02}", hours, minutes))
}

/// The slug is re-derived only when the title differs from the persisted one.
/// Slug uniqueness is left to the store's unique index.
pub fn prepare_event(
    draft: EventDraft,
    previous: Option<&Event>,
    now: DateTime<Utc>,
) -> Result<Event, ValidationError> {
    let EventDraft {
        title,
        description,
        overview,
        image,
        venue,
        location,
        date,
        time,
        mode,
        audience,
        agenda,
        organizer,
        tags,
    } = draft;

    let title = required("title", title)?.trim().to_string();
    let description = required("description", description)?;
    let overview = required("overview", overview)?;
    let image = required("image", image)?;
    let venue = required("venue", venue)?;
    let location = required("location", location)?;
    let date = required("date", date)?;
    let time = required("time", time)?;
    let mode = required("mode", mode)?;
    let audience = required("audience", audience)?;
    let organizer = required("organizer", organizer)?;

    let agenda = required_list("agenda", agenda)?;
    let tags = required_list("tags", tags)?;

    let slug = match previous {
        Some(prev) if prev.title == title => prev.slug.clone(),
        _ => {
            let slug = slugify(&title);
            if slug.is_empty() {
                return Err(ValidationError::EmptySlug(title));
            }
            slug
        }
    };

    let date = normalize_date(&date)?;
    let time = normalize_time(&time)?;

    let (id, created_at) = previous
        .map(|prev| (prev.id, prev.created_at))
        .unwrap_or_else(|| (EventId::new(), now));

    Ok(Event {
        id,
        title,
        slug,
        description,
        overview,
        image,
        venue,
        location,
        date,
        time,
        mode,
        audience,
        agenda,
        organizer,
        tags,
        created_at,
        updated_at: now,
    })
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn required_list(
    field: &'static str,
    value: Option<Vec<String>>,
) -> Result<Vec<String>, ValidationError> {
    match value {
        Some(items) if !items.is_empty() => Ok(items),
        _ => Err(ValidationError::EmptyList(field)),
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(text) {
        return Some(at.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS.iter() {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in DATE_FORMATS.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}
