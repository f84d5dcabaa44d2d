use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, ApiResponse, AppState, CustomerDto, CustomerItem, CustomerList};
use crate::api::auth::CurrentUser;
use crate::api::validation::{is_valid_email, optional_text, optional_trimmed, required_text};
use crate::db::{CustomerChanges, CustomerFilter, NewCustomer};
use crate::models::customer::{AccountStatus, CustomerTag};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListQuery {
    pub search: Option<String>,
    pub region: Option<String>,
    pub industry: Option<String>,
    pub account_status: Option<String>,
    /// Comma-separated; matches customers carrying any of the named tags.
    pub tags: Option<String>,
}

pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<ApiResponse<CustomerList>>, ApiError> {
    let filter = CustomerFilter {
        search: optional_trimmed(query.search.as_deref()),
        region: optional_trimmed(query.region.as_deref()),
        industry: optional_trimmed(query.industry.as_deref()),
        account_status: optional_trimmed(query.account_status.as_deref()),
        tags: query
            .tags
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let customers = state.store().list_customers(&filter).await?;

    Ok(Json(ApiResponse::success(CustomerList {
        customers: customers.into_iter().map(CustomerDto::from).collect(),
    })))
}

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<CustomerItem>>, ApiError> {
    let customer = state
        .store()
        .get_customer(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer"))?;

    Ok(Json(ApiResponse::success(CustomerItem {
        customer: customer.into(),
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactDetailsInput {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    pub organization_name: Option<String>,
    pub contact_details: Option<ContactDetailsInput>,
    pub region: Option<String>,
    pub industry: Option<String>,
    pub account_status: Option<String>,
    /// Untyped so non-array input reports the fixed message.
    pub tags: Option<Value>,
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(body): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CustomerItem>>), ApiError> {
    let organization_name =
        required_text(body.organization_name.as_deref(), "Organization name is required")?;

    let contact = body.contact_details.unwrap_or_default();
    let contact_email = optional_trimmed(contact.email.as_deref());
    if let Some(email) = &contact_email {
        if !is_valid_email(email) {
            return Err(ApiError::validation("Invalid email"));
        }
    }

    let account_status = match optional_trimmed(body.account_status.as_deref()) {
        None => AccountStatus::Active,
        Some(value) => AccountStatus::parse(&value)
            .ok_or_else(|| ApiError::validation("Invalid account status"))?,
    };

    let tags = parse_tags(body.tags.as_ref())?.unwrap_or_default();
    let tags_json = serde_json::to_string(&tags).context("Failed to serialize tags")?;

    let customer = state
        .store()
        .create_customer(NewCustomer {
            organization_name,
            contact_email,
            contact_phone: optional_trimmed(contact.phone.as_deref()),
            contact_address: optional_trimmed(contact.address.as_deref()),
            region: optional_trimmed(body.region.as_deref()),
            industry: optional_trimmed(body.industry.as_deref()),
            account_status: account_status.as_str().to_string(),
            tags: tags_json,
        })
        .await?;

    state.audit().record(
        Some(current_user.id),
        "create",
        "customers",
        json!({ "customerId": customer.id, "organizationName": customer.organization_name }),
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CustomerItem {
            customer: customer.into(),
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    pub organization_name: Option<String>,
    pub contact_details: Option<ContactDetailsInput>,
    pub region: Option<String>,
    pub industry: Option<String>,
    pub account_status: Option<String>,
    pub tags: Option<Value>,
}

pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateCustomerRequest>,
) -> Result<Json<ApiResponse<CustomerItem>>, ApiError> {
    let organization_name = optional_text(
        body.organization_name.as_deref(),
        "Organization name cannot be empty",
    )?;

    let contact = body.contact_details.unwrap_or_default();
    let contact_email = optional_trimmed(contact.email.as_deref());
    if let Some(email) = &contact_email {
        if !is_valid_email(email) {
            return Err(ApiError::validation("Invalid email"));
        }
    }

    let account_status = match optional_trimmed(body.account_status.as_deref()) {
        None => None,
        Some(value) => Some(
            AccountStatus::parse(&value)
                .ok_or_else(|| ApiError::validation("Invalid account status"))?
                .as_str()
                .to_string(),
        ),
    };

    let tags_json = match parse_tags(body.tags.as_ref())? {
        None => None,
        Some(tags) => Some(serde_json::to_string(&tags).context("Failed to serialize tags")?),
    };

    let changes = CustomerChanges {
        organization_name,
        contact_email,
        contact_phone: optional_trimmed(contact.phone.as_deref()),
        contact_address: optional_trimmed(contact.address.as_deref()),
        region: optional_trimmed(body.region.as_deref()),
        industry: optional_trimmed(body.industry.as_deref()),
        account_status,
        tags: tags_json,
    };

    let customer = state
        .store()
        .update_customer(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer"))?;

    state.audit().record(
        Some(current_user.id),
        "update",
        "customers",
        json!({ "customerId": customer.id, "organizationName": customer.organization_name }),
    );

    Ok(Json(ApiResponse::success(CustomerItem {
        customer: customer.into(),
    })))
}

pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if !state.store().delete_customer(id).await? {
        return Err(ApiError::not_found("Customer"));
    }

    state.audit().record(
        Some(current_user.id),
        "delete",
        "customers",
        json!({ "customerId": id }),
    );

    Ok(Json(ApiResponse::message("Customer deleted successfully.")))
}

/// `None` means the field was absent; `Some(tags)` is the validated set.
fn parse_tags(value: Option<&Value>) -> Result<Option<Vec<String>>, ApiError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let Value::Array(items) = value else {
        return Err(ApiError::validation("Tags must be an array"));
    };

    let mut tags = Vec::with_capacity(items.len());
    for item in items {
        let tag = item
            .as_str()
            .and_then(CustomerTag::parse)
            .ok_or_else(|| ApiError::validation("Invalid tag"))?;
        tags.push(tag.as_str().to_string());
    }

    Ok(Some(tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(None).unwrap(), None);
        assert_eq!(
            parse_tags(Some(&json!(["enterprise", "trial"]))).unwrap(),
            Some(vec!["enterprise".to_string(), "trial".to_string()])
        );
        assert_eq!(parse_tags(Some(&json!([]))).unwrap(), Some(Vec::new()));
        assert!(parse_tags(Some(&json!("enterprise"))).is_err());
        assert!(parse_tags(Some(&json!(["gold"]))).is_err());
        assert!(parse_tags(Some(&json!([42]))).is_err());
    }
}
