//! Database models.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision in
//! UTC, so lexical order matches chronological order.

pub mod analytics;
pub mod chat_message;
pub mod chat_session;
pub mod preference;
pub mod project;
pub mod user;

pub use analytics::ChatAnalytics;
pub use chat_message::ChatMessage;
pub use chat_session::ChatSession;
pub use preference::{Theme, UserPreference};
pub use project::{Project, ProjectMember, ProjectWithMembers};
pub use user::User;

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamp in the stored format.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today_date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
