use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::entities::customers;

/// Optional list-endpoint predicates; all absent means the full set.
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub region: Option<String>,
    pub industry: Option<String>,
    pub account_status: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub organization_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_address: Option<String>,
    pub region: Option<String>,
    pub industry: Option<String>,
    pub account_status: String,
    /// JSON array of tag strings.
    pub tags: String,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerChanges {
    pub organization_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_address: Option<String>,
    pub region: Option<String>,
    pub industry: Option<String>,
    pub account_status: Option<String>,
    pub tags: Option<String>,
}

pub struct CustomerRepository {
    conn: DatabaseConnection,
}

impl CustomerRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Filtered list, newest first. Text search matches organization name or
    /// contact email; the tag filter matches any overlap.
    pub async fn list(&self, filter: &CustomerFilter) -> Result<Vec<customers::Model>> {
        let mut query = customers::Entity::find()
            .order_by_desc(customers::Column::CreatedAt)
            .order_by_desc(customers::Column::Id);

        if let Some(search) = &filter.search {
            query = query.filter(
                Condition::any()
                    .add(customers::Column::OrganizationName.contains(search))
                    .add(customers::Column::ContactEmail.contains(search)),
            );
        }

        if let Some(region) = &filter.region {
            query = query.filter(customers::Column::Region.eq(region));
        }

        if let Some(industry) = &filter.industry {
            query = query.filter(customers::Column::Industry.eq(industry));
        }

        if let Some(status) = &filter.account_status {
            query = query.filter(customers::Column::AccountStatus.eq(status));
        }

        if !filter.tags.is_empty() {
            // Tags live in a JSON text column; match the quoted form.
            let mut any_tag = Condition::any();
            for tag in &filter.tags {
                any_tag = any_tag.add(customers::Column::Tags.contains(format!("\"{tag}\"")));
            }
            query = query.filter(any_tag);
        }

        query.all(&self.conn).await.context("Failed to list customers")
    }

    pub async fn get(&self, id: i32) -> Result<Option<customers::Model>> {
        customers::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query customer by ID")
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    pub async fn create(&self, data: NewCustomer) -> Result<customers::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = customers::ActiveModel {
            organization_name: Set(data.organization_name),
            contact_email: Set(data.contact_email),
            contact_phone: Set(data.contact_phone),
            contact_address: Set(data.contact_address),
            region: Set(data.region),
            industry: Set(data.industry),
            account_status: Set(data.account_status),
            tags: Set(data.tags),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert customer")
    }

    /// Partial merge; returns None when the customer does not exist.
    pub async fn update(&self, id: i32, changes: CustomerChanges) -> Result<Option<customers::Model>> {
        let Some(customer) = customers::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query customer for update")?
        else {
            return Ok(None);
        };

        let mut active: customers::ActiveModel = customer.into();
        if let Some(organization_name) = changes.organization_name {
            active.organization_name = Set(organization_name);
        }
        if let Some(contact_email) = changes.contact_email {
            active.contact_email = Set(Some(contact_email));
        }
        if let Some(contact_phone) = changes.contact_phone {
            active.contact_phone = Set(Some(contact_phone));
        }
        if let Some(contact_address) = changes.contact_address {
            active.contact_address = Set(Some(contact_address));
        }
        if let Some(region) = changes.region {
            active.region = Set(Some(region));
        }
        if let Some(industry) = changes.industry {
            active.industry = Set(Some(industry));
        }
        if let Some(account_status) = changes.account_status {
            active.account_status = Set(account_status);
        }
        if let Some(tags) = changes.tags {
            active.tags = Set(tags);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update customer")?;

        Ok(Some(model))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = customers::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete customer")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_all(&self) -> Result<u64> {
        customers::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count customers")
    }

    pub async fn count_by_status(&self, status: &str) -> Result<u64> {
        customers::Entity::find()
            .filter(customers::Column::AccountStatus.eq(status))
            .count(&self.conn)
            .await
            .context("Failed to count customers by status")
    }
}
