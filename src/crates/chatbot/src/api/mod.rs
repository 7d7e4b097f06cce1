//! JSON API served by axum
//!
//! - `/health`, `/api/v1/system/health` - liveness and integration status
//! - `/api/v1/auth/*` - registration and bearer tokens
//! - `/api/v1/chat`, `/api/v1/sessions/*` - chat turns and history
//! - `/api/v1/dashboard*`, `/api/v1/projects/*` - analytics and project views
//! - `/ws/chat/:room` - WebSocket chat rooms

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod ws;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use response::{PaginatedResponse, SuccessResponse};
pub use routes::{create_router, AppState};
