use std::{fs, path::Path};

use chrono::{DateTime, SecondsFormat, Utc};

/// Canonical absolute-time form used for stored dates: `2024-01-05T00:00:00.000Z`.
pub fn canonical_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return;
        }
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(parent = %parent.display(), %err, "failed to create parent directory");
        }
    }
}

/// Truthy spellings accepted for boolean environment flags.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
