//! CORS configuration.

use tower_http::cors::{Any, CorsLayer};

/// Browser clients may call the API from any origin; credentials travel in
/// the `Authorization` header, not cookies.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
