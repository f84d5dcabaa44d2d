use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use super::{ApiError, ApiResponse, AppState, TicketDto, TicketItem, TicketList};
use crate::api::auth::CurrentUser;
use crate::api::validation::{
    optional_text, optional_trimmed, required_customer_id, required_text,
};
use crate::db::{NewTicket, TicketChanges, TicketFilter};
use crate::models::ticket::{TicketPriority, TicketStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketListQuery {
    pub customer_id: Option<i32>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_engineer_id: Option<i32>,
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicketListQuery>,
) -> Result<Json<ApiResponse<TicketList>>, ApiError> {
    let filter = TicketFilter {
        customer_id: query.customer_id,
        status: optional_trimmed(query.status.as_deref()),
        priority: optional_trimmed(query.priority.as_deref()),
        assigned_engineer_id: query.assigned_engineer_id,
    };

    let rows = state.store().list_tickets(&filter).await?;

    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let mut comments = state.store().ticket_comments_for(&ids).await?;

    let tickets = rows
        .into_iter()
        .map(|row| {
            let ticket_comments = comments.remove(&row.id).unwrap_or_default();
            TicketDto::from_row(row, ticket_comments)
        })
        .collect();

    Ok(Json(ApiResponse::success(TicketList { tickets })))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<TicketItem>>, ApiError> {
    let ticket = fetch_ticket(&state, id).await?;
    Ok(Json(ApiResponse::success(TicketItem { ticket })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    /// Untyped so a missing or wrong-typed reference reports the fixed
    /// message.
    pub customer: Option<serde_json::Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub assigned_engineer: Option<i32>,
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(body): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TicketItem>>), ApiError> {
    let customer_id = required_customer_id(body.customer.as_ref())?;

    let title = required_text(body.title.as_deref(), "Title is required")?;
    let description = required_text(body.description.as_deref(), "Description is required")?;

    let priority = match optional_trimmed(body.priority.as_deref()) {
        None => TicketPriority::Medium,
        Some(value) => {
            TicketPriority::parse(&value).ok_or_else(|| ApiError::validation("Invalid priority"))?
        }
    };
    let severity = match optional_trimmed(body.severity.as_deref()) {
        None => TicketPriority::Medium,
        Some(value) => {
            TicketPriority::parse(&value).ok_or_else(|| ApiError::validation("Invalid severity"))?
        }
    };

    if !state.store().customer_exists(customer_id).await? {
        return Err(ApiError::validation("Customer not found."));
    }

    if let Some(engineer_id) = body.assigned_engineer {
        if !state.store().user_exists(engineer_id).await? {
            return Err(ApiError::validation("Assigned engineer not found."));
        }
    }

    let created = state
        .store()
        .create_ticket(NewTicket {
            customer_id,
            assigned_engineer_id: body.assigned_engineer,
            title,
            description,
            priority: priority.as_str().to_string(),
            severity: severity.as_str().to_string(),
            status: TicketStatus::Open.as_str().to_string(),
        })
        .await?;

    state.audit().record(
        Some(current_user.id),
        "create",
        "tickets",
        json!({ "ticketId": created.id, "title": created.title }),
    );

    let ticket = fetch_ticket(&state, created.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TicketItem { ticket })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    /// Absent means "leave alone"; an explicit `null` unassigns.
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_engineer: Option<Option<i32>>,
    pub resolution_notes: Option<String>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateTicketRequest>,
) -> Result<Json<ApiResponse<TicketItem>>, ApiError> {
    let title = optional_text(body.title.as_deref(), "Title cannot be empty")?;
    let description = optional_text(body.description.as_deref(), "Description cannot be empty")?;

    let priority = match optional_trimmed(body.priority.as_deref()) {
        None => None,
        Some(value) => Some(
            TicketPriority::parse(&value)
                .ok_or_else(|| ApiError::validation("Invalid priority"))?
                .as_str()
                .to_string(),
        ),
    };
    let severity = match optional_trimmed(body.severity.as_deref()) {
        None => None,
        Some(value) => Some(
            TicketPriority::parse(&value)
                .ok_or_else(|| ApiError::validation("Invalid severity"))?
                .as_str()
                .to_string(),
        ),
    };
    let status = match optional_trimmed(body.status.as_deref()) {
        None => None,
        Some(value) => Some(
            TicketStatus::parse(&value)
                .ok_or_else(|| ApiError::validation("Invalid status"))?
                .as_str()
                .to_string(),
        ),
    };

    if state.store().get_ticket(id).await?.is_none() {
        return Err(ApiError::not_found("Ticket"));
    }

    if let Some(Some(engineer_id)) = body.assigned_engineer {
        if !state.store().user_exists(engineer_id).await? {
            return Err(ApiError::validation("Assigned engineer not found."));
        }
    }

    let changes = TicketChanges {
        title,
        description,
        priority,
        severity,
        status,
        assigned_engineer_id: body.assigned_engineer,
        resolution_notes: body.resolution_notes,
    };

    state
        .store()
        .update_ticket(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    state.audit().record(
        Some(current_user.id),
        "update",
        "tickets",
        json!({ "ticketId": id }),
    );

    let ticket = fetch_ticket(&state, id).await?;
    Ok(Json(ApiResponse::success(TicketItem { ticket })))
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub text: Option<String>,
}

/// Appends a comment authored by the caller and responds with the refreshed
/// ticket.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(body): Json<AddCommentRequest>,
) -> Result<Json<ApiResponse<TicketItem>>, ApiError> {
    let text = required_text(body.text.as_deref(), "Comment text is required")?;

    if state.store().get_ticket(id).await?.is_none() {
        return Err(ApiError::not_found("Ticket"));
    }

    state
        .store()
        .add_ticket_comment(id, current_user.id, &text)
        .await?;

    state.audit().record(
        Some(current_user.id),
        "comment",
        "tickets",
        json!({ "ticketId": id }),
    );

    let ticket = fetch_ticket(&state, id).await?;
    Ok(Json(ApiResponse::success(TicketItem { ticket })))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if !state.store().delete_ticket(id).await? {
        return Err(ApiError::not_found("Ticket"));
    }

    state.audit().record(
        Some(current_user.id),
        "delete",
        "tickets",
        json!({ "ticketId": id }),
    );

    Ok(Json(ApiResponse::message("Ticket deleted successfully.")))
}

/// Joined ticket row plus its comments, shaped for the wire.
async fn fetch_ticket(state: &AppState, id: i32) -> Result<TicketDto, ApiError> {
    let row = state
        .store()
        .get_ticket(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;

    let comments = state.store().ticket_comments(id).await?;

    Ok(TicketDto::from_row(row, comments))
}
