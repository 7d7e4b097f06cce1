//! API request and response bodies.

pub mod auth;
pub mod chat;
pub mod preference;
pub mod session;
pub mod system;

pub use auth::{LoginRequest, RegisterRequest, TokenResponse};
pub use chat::{ChatTurnRequest, ChatTurnResponse, HistoryEntry};
pub use preference::UpdatePreferencesRequest;
pub use session::{
    AppIndexResponse, ResetSessionResponse, SessionDetail, SessionListQuery, SessionSummary,
    SessionTranscript, SwitchSessionRequest,
};
pub use system::{
    ClearSearchCacheQuery, HealthResponse, IntegrationStatus, ProjectQuery, SearchMetricsQuery,
    SheetQuery,
};
