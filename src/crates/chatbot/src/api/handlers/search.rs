//! Web search metrics and cache control.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{ClearSearchCacheQuery, SearchMetricsQuery};
use crate::api::{response, routes::AppState};

fn disabled() -> ApiError {
    ApiError::ServiceUnavailable("Web search is not enabled".to_string())
}

/// GET /api/v1/search/metrics?date=YYYYMMDD
pub async fn search_metrics(
    State(state): State<AppState>,
    Query(query): Query<SearchMetricsQuery>,
) -> ApiResult<impl IntoResponse> {
    if let Some(date) = query.date.as_deref() {
        if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::ValidationError(
                "date must be formatted YYYYMMDD".to_string(),
            ));
        }
    }
    let metrics = state
        .chatbot
        .search_metrics(query.date.as_deref())
        .ok_or_else(disabled)?;
    Ok(response::ok(metrics))
}

/// DELETE /api/v1/search/cache?query=
pub async fn clear_search_cache(
    State(state): State<AppState>,
    Query(query): Query<ClearSearchCacheQuery>,
) -> ApiResult<impl IntoResponse> {
    let target = query.query.as_deref().filter(|q| !q.trim().is_empty());
    if !state.chatbot.clear_search_cache(target) {
        return Err(disabled());
    }
    Ok(response::ok(json!({ "cleared": target.unwrap_or("all") })))
}
