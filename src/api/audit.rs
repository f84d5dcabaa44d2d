use std::sync::Arc;

use axum::{Json, extract::State};

use super::{ApiError, ApiResponse, AppState, AuditLogDto, AuditLogList};

pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AuditLogList>>, ApiError> {
    let rows = state.store().list_audit_logs().await?;

    Ok(Json(ApiResponse::success(AuditLogList {
        logs: rows.into_iter().map(AuditLogDto::from).collect(),
    })))
}
