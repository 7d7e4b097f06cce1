//! Repositories: stateless async functions over the pool.

pub mod analytics_repo;
pub mod chat_message_repo;
pub mod chat_session_repo;
pub mod preference_repo;
pub mod project_repo;
pub mod user_repo;

pub use analytics_repo::ChatAnalyticsRepository;
pub use chat_message_repo::{ChatMessageRepository, DailyCount, ModelCount};
pub use chat_session_repo::{ChatSessionRepository, SessionActivity};
pub use preference_repo::UserPreferenceRepository;
pub use project_repo::ProjectRepository;
pub use user_repo::UserRepository;
