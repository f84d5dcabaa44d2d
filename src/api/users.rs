use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, ApiResponse, AppState, UserDto, UserItem, UserList};
use crate::api::auth::CurrentUser;
use crate::api::validation::normalized_email;
use crate::db::UserChanges;
use crate::models::role::Role;

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<UserList>>, ApiError> {
    let users = state.store().list_users().await?;

    Ok(Json(ApiResponse::success(UserList {
        users: users.into_iter().map(UserDto::from).collect(),
    })))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let user = state
        .store()
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(ApiResponse::success(UserItem { user: user.into() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserItem>>), ApiError> {
    let email = normalized_email(body.email.as_deref().unwrap_or_default())?;

    let password = body.password.unwrap_or_default();
    if password.chars().count() < 6 {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    let role = match body.role.as_deref() {
        None => Role::Viewer,
        Some(value) => Role::parse(value).ok_or_else(|| ApiError::validation("Invalid role"))?,
    };

    let full_name = body
        .full_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if state.store().get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::validation("Email already exists."));
    }

    let user = state
        .store()
        .create_user(
            &email,
            &password,
            &full_name,
            role.as_str(),
            &state.config().security,
        )
        .await?;

    state.audit().record(
        Some(current_user.id),
        "create",
        "users",
        json!({ "userId": user.id, "email": user.email }),
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserItem { user: user.into() })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<String>,
    /// Untyped so a wrong-typed value reports the fixed message instead of
    /// a deserialization failure.
    pub is_active: Option<Value>,
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let role = match body.role.as_deref() {
        None => None,
        Some(value) => {
            let parsed = Role::parse(value).ok_or_else(|| ApiError::validation("Invalid role"))?;
            Some(parsed.as_str().to_string())
        }
    };

    let is_active = match &body.is_active {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(_) => return Err(ApiError::validation("isActive must be boolean")),
    };

    if is_active == Some(false) && id == current_user.id {
        return Err(ApiError::validation(
            "You cannot deactivate your own account.",
        ));
    }

    let changes = UserChanges {
        full_name: body.full_name.map(|name| name.trim().to_string()),
        role,
        is_active,
    };

    let user = state
        .store()
        .update_user(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    state.audit().record(
        Some(current_user.id),
        "update",
        "users",
        json!({ "userId": user.id, "email": user.email }),
    );

    Ok(Json(ApiResponse::success(UserItem { user: user.into() })))
}
