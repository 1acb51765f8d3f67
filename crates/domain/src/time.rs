//! Timestamps of automation definitions.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `created_at` / `updated_at`.
pub type Timestamp = DateTime<Utc>;

#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// The current time, or `previous` when the wall clock went backwards, so an
/// `updated_at` never precedes the value it replaces.
#[must_use]
pub fn advance(previous: Timestamp) -> Timestamp {
    now().max(previous)
}
