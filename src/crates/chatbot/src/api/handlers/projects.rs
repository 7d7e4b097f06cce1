//! Project data views backed by Google Sheets.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

use crate::api::error::ApiResult;
use crate::api::models::{ProjectQuery, SheetQuery};
use crate::api::{response, routes::AppState};

/// GET /api/v1/projects/dashboard?project=&sheet=
///
/// One project's dashboard, or the overview when `project` is absent.
pub async fn project_dashboard(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<impl IntoResponse> {
    let project = query.project.as_deref().filter(|p| !p.trim().is_empty());
    let dashboard = state
        .dashboards
        .project_dashboard(project, query.sheet.as_deref())
        .await?;
    Ok(response::ok(dashboard))
}

/// GET /api/v1/projects/budget?sheet=
pub async fn budget_statistics(
    State(state): State<AppState>,
    Query(query): Query<SheetQuery>,
) -> ApiResult<impl IntoResponse> {
    let stats = state
        .chatbot
        .sheets()
        .get_budget_statistics(query.sheet.as_deref())
        .await?;
    Ok(response::ok(stats))
}

/// GET /api/v1/projects/status-counts?sheet=
pub async fn status_counts(
    State(state): State<AppState>,
    Query(query): Query<SheetQuery>,
) -> ApiResult<impl IntoResponse> {
    let counts = state
        .chatbot
        .sheets()
        .get_project_count_by_status(query.sheet.as_deref())
        .await?;
    Ok(response::ok(counts))
}

/// GET /api/v1/projects/validate?sheet=
pub async fn validate_sheet(
    State(state): State<AppState>,
    Query(query): Query<SheetQuery>,
) -> impl IntoResponse {
    let validation = state
        .chatbot
        .sheets()
        .validate_sheet_structure(query.sheet.as_deref())
        .await;
    response::ok(validation)
}
