//! HTTP request handlers
//!
//! Handlers authenticate through the `require_jwt` layer, which places the
//! current [`crate::db::models::User`] in the request extensions.

pub mod app;
pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod health;
pub mod preferences;
pub mod projects;
pub mod search;
pub mod sessions;

pub use app::{app_index, refresh_data};
pub use auth::{login, logout, me, register};
pub use chat::chat;
pub use dashboard::{analytics_dashboard, model_usage};
pub use health::{health, health_detailed};
pub use preferences::update_preferences;
pub use projects::{budget_statistics, project_dashboard, status_counts, validate_sheet};
pub use search::{clear_search_cache, search_metrics};
pub use sessions::{
    create_session, delete_session, export_session, get_session, list_sessions, reset_session,
    session_messages, switch_session,
};
