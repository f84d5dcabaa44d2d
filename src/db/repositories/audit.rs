use anyhow::{Context, Result};
use sea_orm::{
    DatabaseConnection, EntityTrait, FromQueryResult, JoinType, QueryOrder, QuerySelect,
    RelationTrait, Set,
};

use crate::entities::{audit_logs, users};

/// Audit record with the acting user's display fields joined in.
#[derive(Debug, Clone, FromQueryResult)]
pub struct AuditRow {
    pub id: i64,
    pub user_id: i32,
    pub action: String,
    pub module_affected: String,
    pub details: Option<String>,
    pub created_at: String,
    pub user_full_name: Option<String>,
    pub user_email: Option<String>,
    pub user_role: Option<String>,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(
        &self,
        user_id: i32,
        action: &str,
        module_affected: &str,
        details: Option<String>,
    ) -> Result<()> {
        let active = audit_logs::ActiveModel {
            user_id: Set(user_id),
            action: Set(action.to_string()),
            module_affected: Set(module_affected.to_string()),
            details: Set(details),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        audit_logs::Entity::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert audit log")?;

        Ok(())
    }

    /// Full audit trail, newest first.
    pub async fn list(&self) -> Result<Vec<AuditRow>> {
        audit_logs::Entity::find()
            .select_only()
            .columns([
                audit_logs::Column::Id,
                audit_logs::Column::UserId,
                audit_logs::Column::Action,
                audit_logs::Column::ModuleAffected,
                audit_logs::Column::Details,
                audit_logs::Column::CreatedAt,
            ])
            .column_as(users::Column::FullName, "user_full_name")
            .column_as(users::Column::Email, "user_email")
            .column_as(users::Column::Role, "user_role")
            .join(JoinType::LeftJoin, audit_logs::Relation::Users.def())
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .into_model::<AuditRow>()
            .all(&self.conn)
            .await
            .context("Failed to list audit logs")
    }
}
