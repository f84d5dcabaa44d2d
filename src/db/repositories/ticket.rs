use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use std::collections::HashMap;

use crate::entities::{customers, ticket_comments, tickets, users};

/// Ticket row with joined display fields (owning customer, assigned engineer).
#[derive(Debug, Clone, FromQueryResult)]
pub struct TicketRow {
    pub id: i32,
    pub customer_id: i32,
    pub assigned_engineer_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub severity: String,
    pub status: String,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub customer_name: Option<String>,
    pub engineer_full_name: Option<String>,
    pub engineer_email: Option<String>,
}

/// Comment row with joined author display fields.
#[derive(Debug, Clone, FromQueryResult)]
pub struct CommentRow {
    pub id: i32,
    pub ticket_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created_at: String,
    pub author_full_name: Option<String>,
    pub author_email: Option<String>,
}

/// Minimal projection for SLA and trend derivation.
#[derive(Debug, Clone, FromQueryResult)]
pub struct ResolutionRow {
    pub priority: String,
    pub created_at: String,
    pub resolved_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub customer_id: Option<i32>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_engineer_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub customer_id: i32,
    pub assigned_engineer_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub severity: String,
    pub status: String,
}

/// Partial update. `assigned_engineer_id` distinguishes "leave alone" (None)
/// from "unassign" (Some(None)).
#[derive(Debug, Clone, Default)]
pub struct TicketChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub assigned_engineer_id: Option<Option<i32>>,
    pub resolution_notes: Option<String>,
}

pub struct TicketRepository {
    conn: DatabaseConnection,
}

impl TicketRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn row_query() -> sea_orm::Select<tickets::Entity> {
        tickets::Entity::find()
            .select_only()
            .columns([
                tickets::Column::Id,
                tickets::Column::CustomerId,
                tickets::Column::AssignedEngineerId,
                tickets::Column::Title,
                tickets::Column::Description,
                tickets::Column::Priority,
                tickets::Column::Severity,
                tickets::Column::Status,
                tickets::Column::ResolutionNotes,
                tickets::Column::ResolvedAt,
                tickets::Column::ClosedAt,
                tickets::Column::CreatedAt,
                tickets::Column::UpdatedAt,
            ])
            .column_as(customers::Column::OrganizationName, "customer_name")
            .column_as(users::Column::FullName, "engineer_full_name")
            .column_as(users::Column::Email, "engineer_email")
            .join(JoinType::LeftJoin, tickets::Relation::Customers.def())
            .join(JoinType::LeftJoin, tickets::Relation::Users.def())
    }

    /// Filtered list with display fields joined in, newest first.
    pub async fn list(&self, filter: &TicketFilter) -> Result<Vec<TicketRow>> {
        let mut query = Self::row_query()
            .order_by_desc(tickets::Column::CreatedAt)
            .order_by_desc(tickets::Column::Id);

        if let Some(customer_id) = filter.customer_id {
            query = query.filter(tickets::Column::CustomerId.eq(customer_id));
        }

        if let Some(status) = &filter.status {
            query = query.filter(tickets::Column::Status.eq(status));
        }

        if let Some(priority) = &filter.priority {
            query = query.filter(tickets::Column::Priority.eq(priority));
        }

        if let Some(engineer_id) = filter.assigned_engineer_id {
            query = query.filter(tickets::Column::AssignedEngineerId.eq(engineer_id));
        }

        query
            .into_model::<TicketRow>()
            .all(&self.conn)
            .await
            .context("Failed to list tickets")
    }

    pub async fn get(&self, id: i32) -> Result<Option<TicketRow>> {
        Self::row_query()
            .filter(tickets::Column::Id.eq(id))
            .into_model::<TicketRow>()
            .one(&self.conn)
            .await
            .context("Failed to query ticket by ID")
    }

    /// Comments for one ticket in insertion order, authors joined in.
    pub async fn comments_for(&self, ticket_id: i32) -> Result<Vec<CommentRow>> {
        ticket_comments::Entity::find()
            .select_only()
            .columns([
                ticket_comments::Column::Id,
                ticket_comments::Column::TicketId,
                ticket_comments::Column::AuthorId,
                ticket_comments::Column::Text,
                ticket_comments::Column::CreatedAt,
            ])
            .column_as(users::Column::FullName, "author_full_name")
            .column_as(users::Column::Email, "author_email")
            .join(JoinType::LeftJoin, ticket_comments::Relation::Users.def())
            .filter(ticket_comments::Column::TicketId.eq(ticket_id))
            .order_by_asc(ticket_comments::Column::Id)
            .into_model::<CommentRow>()
            .all(&self.conn)
            .await
            .context("Failed to query ticket comments")
    }

    /// Comments for a batch of tickets, grouped by ticket id.
    pub async fn comments_for_tickets(
        &self,
        ticket_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<CommentRow>>> {
        if ticket_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = ticket_comments::Entity::find()
            .select_only()
            .columns([
                ticket_comments::Column::Id,
                ticket_comments::Column::TicketId,
                ticket_comments::Column::AuthorId,
                ticket_comments::Column::Text,
                ticket_comments::Column::CreatedAt,
            ])
            .column_as(users::Column::FullName, "author_full_name")
            .column_as(users::Column::Email, "author_email")
            .join(JoinType::LeftJoin, ticket_comments::Relation::Users.def())
            .filter(ticket_comments::Column::TicketId.is_in(ticket_ids.to_vec()))
            .order_by_asc(ticket_comments::Column::Id)
            .into_model::<CommentRow>()
            .all(&self.conn)
            .await
            .context("Failed to query ticket comments")?;

        let mut grouped: HashMap<i32, Vec<CommentRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.ticket_id).or_default().push(row);
        }

        Ok(grouped)
    }

    pub async fn create(&self, data: NewTicket) -> Result<tickets::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = tickets::ActiveModel {
            customer_id: Set(data.customer_id),
            assigned_engineer_id: Set(data.assigned_engineer_id),
            title: Set(data.title),
            description: Set(data.description),
            priority: Set(data.priority),
            severity: Set(data.severity),
            status: Set(data.status),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert ticket")
    }

    /// Partial merge. Stamps `resolved_at`/`closed_at` on the first transition
    /// into those statuses; later updates never overwrite the stamps. Returns
    /// None when the ticket does not exist.
    pub async fn update(&self, id: i32, changes: TicketChanges) -> Result<Option<tickets::Model>> {
        let Some(ticket) = tickets::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query ticket for update")?
        else {
            return Ok(None);
        };

        let resolved_at = ticket.resolved_at.clone();
        let closed_at = ticket.closed_at.clone();

        let mut active: tickets::ActiveModel = ticket.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(priority) = changes.priority {
            active.priority = Set(priority);
        }
        if let Some(severity) = changes.severity {
            active.severity = Set(severity);
        }
        if let Some(resolution_notes) = changes.resolution_notes {
            active.resolution_notes = Set(Some(resolution_notes));
        }
        if let Some(assigned) = changes.assigned_engineer_id {
            active.assigned_engineer_id = Set(assigned);
        }
        if let Some(status) = changes.status {
            if status == "resolved" && resolved_at.is_none() {
                active.resolved_at = Set(Some(chrono::Utc::now().to_rfc3339()));
            }
            if status == "closed" && closed_at.is_none() {
                active.closed_at = Set(Some(chrono::Utc::now().to_rfc3339()));
            }
            active.status = Set(status);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update ticket")?;

        Ok(Some(model))
    }

    /// Append a comment and touch the parent ticket's update stamp.
    pub async fn add_comment(&self, ticket_id: i32, author_id: i32, text: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let comment = ticket_comments::ActiveModel {
            ticket_id: Set(ticket_id),
            author_id: Set(author_id),
            text: Set(text.to_string()),
            created_at: Set(now.clone()),
            ..Default::default()
        };
        comment
            .insert(&self.conn)
            .await
            .context("Failed to insert ticket comment")?;

        if let Some(ticket) = tickets::Entity::find_by_id(ticket_id)
            .one(&self.conn)
            .await
            .context("Failed to query ticket for comment touch")?
        {
            let mut active: tickets::ActiveModel = ticket.into();
            active.updated_at = Set(now);
            active
                .update(&self.conn)
                .await
                .context("Failed to touch ticket update stamp")?;
        }

        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = tickets::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete ticket")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_all(&self) -> Result<u64> {
        tickets::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count tickets")
    }

    pub async fn count_by_status(&self, status: &str) -> Result<u64> {
        tickets::Entity::find()
            .filter(tickets::Column::Status.eq(status))
            .count(&self.conn)
            .await
            .context("Failed to count tickets by status")
    }

    /// Resolved or closed tickets carrying a resolution stamp, for SLA tallies.
    pub async fn resolved_tickets(&self) -> Result<Vec<ResolutionRow>> {
        tickets::Entity::find()
            .select_only()
            .columns([
                tickets::Column::Priority,
                tickets::Column::CreatedAt,
                tickets::Column::ResolvedAt,
            ])
            .filter(tickets::Column::Status.is_in(["resolved", "closed"]))
            .filter(tickets::Column::ResolvedAt.is_not_null())
            .into_model::<ResolutionRow>()
            .all(&self.conn)
            .await
            .context("Failed to query resolved tickets")
    }

    /// Tickets resolved at or after the cutoff (RFC 3339), for trend bucketing.
    pub async fn resolved_since(&self, cutoff: &str) -> Result<Vec<ResolutionRow>> {
        tickets::Entity::find()
            .select_only()
            .columns([
                tickets::Column::Priority,
                tickets::Column::CreatedAt,
                tickets::Column::ResolvedAt,
            ])
            .filter(tickets::Column::Status.is_in(["resolved", "closed"]))
            .filter(tickets::Column::ResolvedAt.is_not_null())
            .filter(tickets::Column::ResolvedAt.gte(cutoff))
            .into_model::<ResolutionRow>()
            .all(&self.conn)
            .await
            .context("Failed to query recently resolved tickets")
    }
}
