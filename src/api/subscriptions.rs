use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, ApiResponse, AppState, SubscriptionDto, SubscriptionItem, SubscriptionList};
use crate::api::auth::CurrentUser;
use crate::api::validation::{
    normalized_date, optional_text, optional_trimmed, required_customer_id, required_text,
};
use crate::db::{NewSubscription, SubscriptionChanges};
use crate::models::subscription::SubscriptionStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionListQuery {
    pub customer_id: Option<i32>,
    pub status: Option<String>,
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscriptionListQuery>,
) -> Result<Json<ApiResponse<SubscriptionList>>, ApiError> {
    let status = optional_trimmed(query.status.as_deref());

    let subscriptions = state
        .store()
        .list_subscriptions(query.customer_id, status.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(SubscriptionList {
        subscriptions: subscriptions
            .into_iter()
            .map(SubscriptionDto::from)
            .collect(),
    })))
}

pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SubscriptionItem>>, ApiError> {
    let subscription = state
        .store()
        .get_subscription(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription"))?;

    Ok(Json(ApiResponse::success(SubscriptionItem {
        subscription: subscription.into(),
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetricsInput {
    pub storage_used: Option<f64>,
    pub api_calls: Option<i64>,
    pub seats_used: Option<i64>,
    pub custom: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    /// Untyped so a missing or wrong-typed reference reports the fixed
    /// message.
    pub customer: Option<Value>,
    pub plan_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub subscription_status: Option<String>,
    pub usage_metrics: Option<UsageMetricsInput>,
}

pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SubscriptionItem>>), ApiError> {
    let customer_id = required_customer_id(body.customer.as_ref())?;

    let plan_name = required_text(body.plan_name.as_deref(), "Plan name is required")?;

    let start_date = normalized_date(
        body.start_date.as_deref().unwrap_or_default(),
        "Valid start date is required",
    )?;
    let end_date = normalized_date(
        body.end_date.as_deref().unwrap_or_default(),
        "Valid end date is required",
    )?;

    let status = match optional_trimmed(body.subscription_status.as_deref()) {
        None => SubscriptionStatus::Active,
        Some(value) => SubscriptionStatus::parse(&value)
            .ok_or_else(|| ApiError::validation("Invalid subscription status"))?,
    };

    if !state.store().customer_exists(customer_id).await? {
        return Err(ApiError::validation("Customer not found."));
    }

    let metrics = body.usage_metrics.unwrap_or_default();
    let custom_metrics = metrics
        .custom
        .filter(|value| !value.is_null())
        .map(|value| value.to_string());

    let created = state
        .store()
        .create_subscription(NewSubscription {
            customer_id,
            plan_name,
            start_date,
            end_date,
            status: status.as_str().to_string(),
            storage_used: metrics.storage_used.unwrap_or_default(),
            api_calls: metrics.api_calls.unwrap_or_default(),
            seats_used: metrics.seats_used.unwrap_or_default(),
            custom_metrics,
        })
        .await?;

    state.audit().record(
        Some(current_user.id),
        "create",
        "subscriptions",
        json!({ "subscriptionId": created.id, "planName": created.plan_name }),
    );

    let subscription = state
        .store()
        .get_subscription(created.id)
        .await?
        .ok_or_else(|| {
            ApiError::internal(format!("Subscription {} missing after insert", created.id))
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SubscriptionItem {
            subscription: subscription.into(),
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub plan_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub subscription_status: Option<String>,
    pub usage_metrics: Option<UsageMetricsInput>,
}

pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateSubscriptionRequest>,
) -> Result<Json<ApiResponse<SubscriptionItem>>, ApiError> {
    let plan_name = optional_text(body.plan_name.as_deref(), "Plan name cannot be empty")?;

    let start_date = match body.start_date.as_deref() {
        None => None,
        Some(raw) => Some(normalized_date(raw, "Invalid start date")?),
    };
    let end_date = match body.end_date.as_deref() {
        None => None,
        Some(raw) => Some(normalized_date(raw, "Invalid end date")?),
    };

    let status = match optional_trimmed(body.subscription_status.as_deref()) {
        None => None,
        Some(value) => Some(
            SubscriptionStatus::parse(&value)
                .ok_or_else(|| ApiError::validation("Invalid subscription status"))?
                .as_str()
                .to_string(),
        ),
    };

    let metrics = body.usage_metrics.unwrap_or_default();
    let custom_metrics = metrics
        .custom
        .filter(|value| !value.is_null())
        .map(|value| value.to_string());

    let changes = SubscriptionChanges {
        plan_name,
        start_date,
        end_date,
        status,
        storage_used: metrics.storage_used,
        api_calls: metrics.api_calls,
        seats_used: metrics.seats_used,
        custom_metrics,
    };

    let updated = state
        .store()
        .update_subscription(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription"))?;

    state.audit().record(
        Some(current_user.id),
        "update",
        "subscriptions",
        json!({ "subscriptionId": updated.id, "planName": updated.plan_name }),
    );

    let subscription = state
        .store()
        .get_subscription(updated.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription"))?;

    Ok(Json(ApiResponse::success(SubscriptionItem {
        subscription: subscription.into(),
    })))
}

pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if !state.store().delete_subscription(id).await? {
        return Err(ApiError::not_found("Subscription"));
    }

    state.audit().record(
        Some(current_user.id),
        "delete",
        "subscriptions",
        json!({ "subscriptionId": id }),
    );

    Ok(Json(ApiResponse::message(
        "Subscription deleted successfully.",
    )))
}
