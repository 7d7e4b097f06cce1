//! Health check endpoint handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use llm::ProviderKind;

use crate::api::models::{HealthResponse, IntegrationStatus};
use crate::api::{response, routes::AppState};
use crate::config::DataSourceKind;

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    response::ok(HealthResponse::new("ok", "unknown", state.server_name.clone()))
}

pub(crate) fn integration_status(state: &AppState) -> IntegrationStatus {
    let router = state.chatbot.router();
    IntegrationStatus {
        openai: router.is_configured(ProviderKind::OpenAi),
        gemini: router.is_configured(ProviderKind::Gemini),
        search: state.chatbot.search().is_some_and(|s| s.is_configured()),
        sheets: state.chatbot.sheets().is_configured(),
        data_source: match state.chatbot.data_source() {
            DataSourceKind::Sheets => "sheets".to_string(),
            DataSourceKind::Sql => "sql".to_string(),
        },
    }
}

/// GET /api/v1/system/health
///
/// Database connectivity plus which integrations are configured.
pub async fn health_detailed(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let integrations = integration_status(&state);
    match state.db.health_check().await {
        Ok(()) => {
            let health = HealthResponse::new("ok", "connected", state.server_name.clone())
                .with_integrations(integrations);
            (StatusCode::OK, Json(health))
        }
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            let health = HealthResponse::new("error", "error", state.server_name.clone())
                .with_integrations(integrations);
            (StatusCode::SERVICE_UNAVAILABLE, Json(health))
        }
    }
}
