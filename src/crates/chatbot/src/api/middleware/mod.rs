//! Request processing layers: bearer authentication, CORS, tracing and
//! input validation helpers.

pub mod auth;
pub mod cors;
pub mod logging;
pub mod validation;

pub use auth::{bearer_token, require_jwt};
pub use cors::cors_layer;
pub use logging::logging_layer;
pub use validation::{normalize_pagination, validate_not_empty};
