//! Chat analytics.

use axum::{extract::State, response::IntoResponse, Extension};
use chrono::Utc;

use crate::analytics;
use crate::api::error::ApiResult;
use crate::api::{response, routes::AppState};
use crate::db::models::User;

/// GET /api/v1/dashboard
pub async fn analytics_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let dashboard = analytics::dashboard(state.db.pool(), user.id, Utc::now()).await?;
    Ok(response::ok(dashboard))
}

/// GET /api/v1/dashboard/model-usage
pub async fn model_usage(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<impl IntoResponse> {
    let usage = analytics::model_usage(state.db.pool(), user.id, Utc::now()).await?;
    Ok(response::ok(usage))
}
