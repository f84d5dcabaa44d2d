use serde::Serialize;
use serde_json::Value;

use crate::db::{AuditRow, CommentRow, SubscriptionWithCustomer, TicketRow, User};
use crate::entities::customers;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Success envelope with no payload, used by delete endpoints.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Identity shape embedded in login and session responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserDto>,
}

#[derive(Debug, Serialize)]
pub struct UserItem {
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct ContactDetailsDto {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: i32,
    pub organization_name: String,
    pub contact_details: ContactDetailsDto,
    pub region: String,
    pub industry: String,
    pub account_status: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<customers::Model> for CustomerDto {
    fn from(model: customers::Model) -> Self {
        let tags = serde_json::from_str(&model.tags).unwrap_or_default();

        Self {
            id: model.id,
            organization_name: model.organization_name,
            contact_details: ContactDetailsDto {
                email: model.contact_email.unwrap_or_default(),
                phone: model.contact_phone.unwrap_or_default(),
                address: model.contact_address.unwrap_or_default(),
            },
            region: model.region.unwrap_or_default(),
            industry: model.industry.unwrap_or_default(),
            account_status: model.account_status,
            tags,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerList {
    pub customers: Vec<CustomerDto>,
}

#[derive(Debug, Serialize)]
pub struct CustomerItem {
    pub customer: CustomerDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetricsDto {
    pub storage_used: f64,
    pub api_calls: i64,
    pub seats_used: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub id: i32,
    /// Raw customer foreign key; `customerName` is the joined display field.
    pub customer: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub plan_name: String,
    pub start_date: String,
    pub end_date: String,
    pub subscription_status: String,
    pub usage_metrics: UsageMetricsDto,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SubscriptionWithCustomer> for SubscriptionDto {
    fn from((model, customer): SubscriptionWithCustomer) -> Self {
        let custom = model
            .custom_metrics
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: model.id,
            customer: model.customer_id,
            customer_name: customer.map(|c| c.organization_name),
            plan_name: model.plan_name,
            start_date: model.start_date,
            end_date: model.end_date,
            subscription_status: model.status,
            usage_metrics: UsageMetricsDto {
                storage_used: model.storage_used,
                api_calls: model.api_calls,
                seats_used: model.seats_used,
                custom,
            },
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionList {
    pub subscriptions: Vec<SubscriptionDto>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionItem {
    pub subscription: SubscriptionDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i32,
    pub author: i32,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

impl From<CommentRow> for CommentDto {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            author: row.author_id,
            author_name: display_name(row.author_full_name, row.author_email),
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDto {
    pub id: i32,
    pub customer: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub severity: String,
    pub status: String,
    /// Always emitted; `null` means unassigned.
    pub assigned_engineer: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_engineer_name: Option<String>,
    pub comments: Vec<CommentDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TicketDto {
    pub fn from_row(row: TicketRow, comments: Vec<CommentRow>) -> Self {
        let assigned_engineer_name = row.assigned_engineer_id.map(|_| {
            format!(
                "{} ({})",
                row.engineer_full_name.clone().unwrap_or_default(),
                row.engineer_email.clone().unwrap_or_default()
            )
            .trim()
            .to_string()
        });

        Self {
            id: row.id,
            customer: row.customer_id,
            customer_name: row.customer_name,
            title: row.title,
            description: row.description,
            priority: row.priority,
            severity: row.severity,
            status: row.status,
            assigned_engineer: row.assigned_engineer_id,
            assigned_engineer_name,
            comments: comments.into_iter().map(CommentDto::from).collect(),
            resolution_notes: row.resolution_notes,
            resolved_at: row.resolved_at,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketList {
    pub tickets: Vec<TicketDto>,
}

#[derive(Debug, Serialize)]
pub struct TicketItem {
    pub ticket: TicketDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogUserDto {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogDto {
    pub id: i64,
    /// Always emitted; `null` when the acting user cannot be resolved.
    pub user: Option<AuditLogUserDto>,
    pub action: String,
    pub module_affected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub created_at: String,
}

impl From<AuditRow> for AuditLogDto {
    fn from(row: AuditRow) -> Self {
        let user = match (row.user_email, row.user_role) {
            (Some(email), Some(role)) => Some(AuditLogUserDto {
                id: row.user_id,
                full_name: row.user_full_name.unwrap_or_default(),
                email,
                role,
            }),
            _ => None,
        };

        let details = row
            .details
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: row.id,
            user,
            action: row.action,
            module_affected: row.module_affected,
            details,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogList {
    pub logs: Vec<AuditLogDto>,
}

/// Comment/author display fallback: full name, else email, else "Unknown".
/// Empty strings count as missing.
fn display_name(full_name: Option<String>, email: Option<String>) -> String {
    full_name
        .filter(|name| !name.is_empty())
        .or(email)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback_chain() {
        assert_eq!(
            display_name(Some("Jane Doe".to_string()), Some("jane@acme.io".to_string())),
            "Jane Doe"
        );
        assert_eq!(
            display_name(Some(String::new()), Some("jane@acme.io".to_string())),
            "jane@acme.io"
        );
        assert_eq!(display_name(None, None), "Unknown");
        assert_eq!(display_name(None, Some(String::new())), "Unknown");
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::<()>::error("Ticket not found.")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": false, "message": "Ticket not found."})
        );
    }

    #[test]
    fn test_delete_envelope_has_no_data_key() {
        let body =
            serde_json::to_value(ApiResponse::<()>::message("Customer deleted successfully."))
                .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": true, "message": "Customer deleted successfully."})
        );
    }
}
