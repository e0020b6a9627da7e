use axum::{extract::State, Json};

use crate::{api::error::ApiError, forecast::DashboardOverview, state::AppState};

/// GET /api/dashboard/overview
pub async fn overview(State(state): State<AppState>) -> Result<Json<DashboardOverview>, ApiError> {
    let overview = state.summaries.dashboard_overview().await?;
    Ok(Json(overview))
}
