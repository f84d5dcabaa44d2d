use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::CurrentUser;
use crate::services::analytics::Dashboard;

/// Role decides richness: support engineers get the base counts, admins and
/// viewers additionally get SLA, trend, and health sections.
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    let dashboard = state.analytics().dashboard(current_user.role).await?;

    Ok(Json(ApiResponse::success(dashboard)))
}
