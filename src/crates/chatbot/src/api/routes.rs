//! API route definitions

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::api::middleware::{cors_layer, logging_layer, require_jwt};
use crate::api::{handlers, ws};
use crate::auth::AuthManager;
use crate::config::ChatConfig;
use crate::dashboard::DashboardService;
use crate::db::DatabaseConnection;
use crate::service::ChatbotService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub chatbot: Arc<ChatbotService>,
    pub dashboards: Arc<DashboardService>,
    pub auth: Arc<AuthManager>,
    pub rooms: Arc<ws::ChatRooms>,
    pub chat: ChatConfig,
    /// Reported by the health endpoints
    pub server_name: String,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        chatbot: ChatbotService,
        auth: AuthManager,
        chat: ChatConfig,
        server_name: impl Into<String>,
    ) -> Self {
        let dashboards = DashboardService::new(chatbot.sheets().clone());
        Self {
            db,
            chatbot: Arc::new(chatbot),
            dashboards: Arc::new(dashboards),
            auth: Arc::new(auth),
            rooms: Arc::new(ws::ChatRooms::new()),
            chat,
            server_name: server_name.into(),
        }
    }
}

/// Build the complete API router
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/me", get(handlers::me))
        .route("/api/v1/app", get(handlers::app_index))
        .route("/api/v1/chat", post(handlers::chat))
        .route("/api/v1/data/refresh", post(handlers::refresh_data))
        .route("/api/v1/dashboard", get(handlers::analytics_dashboard))
        .route("/api/v1/dashboard/model-usage", get(handlers::model_usage))
        .route(
            "/api/v1/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/api/v1/sessions/switch", post(handlers::switch_session))
        .route("/api/v1/sessions/reset", post(handlers::reset_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/v1/sessions/:id/messages", get(handlers::session_messages))
        .route("/api/v1/sessions/:id/export", get(handlers::export_session))
        .route("/api/v1/preferences", put(handlers::update_preferences))
        .route("/api/v1/projects/dashboard", get(handlers::project_dashboard))
        .route("/api/v1/projects/budget", get(handlers::budget_statistics))
        .route("/api/v1/projects/status-counts", get(handlers::status_counts))
        .route("/api/v1/projects/validate", get(handlers::validate_sheet))
        .route("/api/v1/search/metrics", get(handlers::search_metrics))
        .route("/api/v1/search/cache", delete(handlers::clear_search_cache))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_jwt));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/system/health", get(handlers::health_detailed))
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/ws/chat/:room", get(ws::chat_socket))
        .merge(protected)
        .with_state(state)
        .layer(cors_layer())
        .layer(logging_layer())
}
