use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::{customers, subscriptions};

/// Subscription plus the owning customer for display shaping.
pub type SubscriptionWithCustomer = (subscriptions::Model, Option<customers::Model>);

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub customer_id: i32,
    pub plan_name: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub storage_used: f64,
    pub api_calls: i64,
    pub seats_used: i64,
    pub custom_metrics: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionChanges {
    pub plan_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub storage_used: Option<f64>,
    pub api_calls: Option<i64>,
    pub seats_used: Option<i64>,
    pub custom_metrics: Option<String>,
}

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Filtered list with the owning customer joined in, most recent start first.
    pub async fn list(
        &self,
        customer_id: Option<i32>,
        status: Option<&str>,
    ) -> Result<Vec<SubscriptionWithCustomer>> {
        let mut query = subscriptions::Entity::find()
            .find_also_related(customers::Entity)
            .order_by_desc(subscriptions::Column::StartDate)
            .order_by_desc(subscriptions::Column::Id);

        if let Some(customer_id) = customer_id {
            query = query.filter(subscriptions::Column::CustomerId.eq(customer_id));
        }

        if let Some(status) = status {
            query = query.filter(subscriptions::Column::Status.eq(status));
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to list subscriptions")
    }

    pub async fn get(&self, id: i32) -> Result<Option<SubscriptionWithCustomer>> {
        let row = subscriptions::Entity::find_by_id(id)
            .find_also_related(customers::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query subscription by ID")?;

        Ok(row)
    }

    pub async fn create(&self, data: NewSubscription) -> Result<subscriptions::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = subscriptions::ActiveModel {
            customer_id: Set(data.customer_id),
            plan_name: Set(data.plan_name),
            start_date: Set(data.start_date),
            end_date: Set(data.end_date),
            status: Set(data.status),
            storage_used: Set(data.storage_used),
            api_calls: Set(data.api_calls),
            seats_used: Set(data.seats_used),
            custom_metrics: Set(data.custom_metrics),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert subscription")
    }

    /// Partial merge; returns None when the subscription does not exist.
    pub async fn update(
        &self,
        id: i32,
        changes: SubscriptionChanges,
    ) -> Result<Option<subscriptions::Model>> {
        let Some(subscription) = subscriptions::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query subscription for update")?
        else {
            return Ok(None);
        };

        let mut active: subscriptions::ActiveModel = subscription.into();
        if let Some(plan_name) = changes.plan_name {
            active.plan_name = Set(plan_name);
        }
        if let Some(start_date) = changes.start_date {
            active.start_date = Set(start_date);
        }
        if let Some(end_date) = changes.end_date {
            active.end_date = Set(end_date);
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(storage_used) = changes.storage_used {
            active.storage_used = Set(storage_used);
        }
        if let Some(api_calls) = changes.api_calls {
            active.api_calls = Set(api_calls);
        }
        if let Some(seats_used) = changes.seats_used {
            active.seats_used = Set(seats_used);
        }
        if let Some(custom_metrics) = changes.custom_metrics {
            active.custom_metrics = Set(Some(custom_metrics));
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update subscription")?;

        Ok(Some(model))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = subscriptions::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete subscription")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_all(&self) -> Result<u64> {
        subscriptions::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count subscriptions")
    }

    pub async fn count_by_status(&self, status: &str) -> Result<u64> {
        subscriptions::Entity::find()
            .filter(subscriptions::Column::Status.eq(status))
            .count(&self.conn)
            .await
            .context("Failed to count subscriptions by status")
    }
}
