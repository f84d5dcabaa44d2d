use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::{customers, subscriptions, tickets};

pub mod migrator;
pub mod repositories;

pub use repositories::audit::AuditRow;
pub use repositories::customer::{CustomerChanges, CustomerFilter, NewCustomer};
pub use repositories::subscription::{
    NewSubscription, SubscriptionChanges, SubscriptionWithCustomer,
};
pub use repositories::ticket::{
    CommentRow, NewTicket, ResolutionRow, TicketChanges, TicketFilter, TicketRow,
};
pub use repositories::user::{User, UserChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn customer_repo(&self) -> repositories::customer::CustomerRepository {
        repositories::customer::CustomerRepository::new(self.conn.clone())
    }

    fn subscription_repo(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }

    fn ticket_repo(&self) -> repositories::ticket::TicketRepository {
        repositories::ticket::TicketRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_email_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_email_with_password(email).await
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: &str,
        config: &SecurityConfig,
    ) -> Result<User> {
        self.user_repo()
            .create(email, password, full_name, role, config)
            .await
    }

    pub async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>> {
        self.user_repo().update(id, changes).await
    }

    pub async fn user_exists(&self, id: i32) -> Result<bool> {
        self.user_repo().exists(id).await
    }

    // ------------------------------------------------------------------------
    // Customers
    // ------------------------------------------------------------------------

    pub async fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<customers::Model>> {
        self.customer_repo().list(filter).await
    }

    pub async fn get_customer(&self, id: i32) -> Result<Option<customers::Model>> {
        self.customer_repo().get(id).await
    }

    pub async fn customer_exists(&self, id: i32) -> Result<bool> {
        self.customer_repo().exists(id).await
    }

    pub async fn create_customer(&self, data: NewCustomer) -> Result<customers::Model> {
        self.customer_repo().create(data).await
    }

    pub async fn update_customer(
        &self,
        id: i32,
        changes: CustomerChanges,
    ) -> Result<Option<customers::Model>> {
        self.customer_repo().update(id, changes).await
    }

    pub async fn delete_customer(&self, id: i32) -> Result<bool> {
        self.customer_repo().delete(id).await
    }

    pub async fn count_customers(&self) -> Result<u64> {
        self.customer_repo().count_all().await
    }

    pub async fn count_customers_by_status(&self, status: &str) -> Result<u64> {
        self.customer_repo().count_by_status(status).await
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    pub async fn list_subscriptions(
        &self,
        customer_id: Option<i32>,
        status: Option<&str>,
    ) -> Result<Vec<SubscriptionWithCustomer>> {
        self.subscription_repo().list(customer_id, status).await
    }

    pub async fn get_subscription(&self, id: i32) -> Result<Option<SubscriptionWithCustomer>> {
        self.subscription_repo().get(id).await
    }

    pub async fn create_subscription(
        &self,
        data: NewSubscription,
    ) -> Result<subscriptions::Model> {
        self.subscription_repo().create(data).await
    }

    pub async fn update_subscription(
        &self,
        id: i32,
        changes: SubscriptionChanges,
    ) -> Result<Option<subscriptions::Model>> {
        self.subscription_repo().update(id, changes).await
    }

    pub async fn delete_subscription(&self, id: i32) -> Result<bool> {
        self.subscription_repo().delete(id).await
    }

    pub async fn count_subscriptions(&self) -> Result<u64> {
        self.subscription_repo().count_all().await
    }

    pub async fn count_subscriptions_by_status(&self, status: &str) -> Result<u64> {
        self.subscription_repo().count_by_status(status).await
    }

    // ------------------------------------------------------------------------
    // Tickets
    // ------------------------------------------------------------------------

    pub async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<TicketRow>> {
        self.ticket_repo().list(filter).await
    }

    pub async fn get_ticket(&self, id: i32) -> Result<Option<TicketRow>> {
        self.ticket_repo().get(id).await
    }

    pub async fn ticket_comments(&self, ticket_id: i32) -> Result<Vec<CommentRow>> {
        self.ticket_repo().comments_for(ticket_id).await
    }

    pub async fn ticket_comments_for(
        &self,
        ticket_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<CommentRow>>> {
        self.ticket_repo().comments_for_tickets(ticket_ids).await
    }

    pub async fn create_ticket(&self, data: NewTicket) -> Result<tickets::Model> {
        self.ticket_repo().create(data).await
    }

    pub async fn update_ticket(
        &self,
        id: i32,
        changes: TicketChanges,
    ) -> Result<Option<tickets::Model>> {
        self.ticket_repo().update(id, changes).await
    }

    pub async fn add_ticket_comment(
        &self,
        ticket_id: i32,
        author_id: i32,
        text: &str,
    ) -> Result<()> {
        self.ticket_repo().add_comment(ticket_id, author_id, text).await
    }

    pub async fn delete_ticket(&self, id: i32) -> Result<bool> {
        self.ticket_repo().delete(id).await
    }

    pub async fn count_tickets(&self) -> Result<u64> {
        self.ticket_repo().count_all().await
    }

    pub async fn count_tickets_by_status(&self, status: &str) -> Result<u64> {
        self.ticket_repo().count_by_status(status).await
    }

    pub async fn resolved_tickets(&self) -> Result<Vec<ResolutionRow>> {
        self.ticket_repo().resolved_tickets().await
    }

    pub async fn resolved_tickets_since(&self, cutoff: &str) -> Result<Vec<ResolutionRow>> {
        self.ticket_repo().resolved_since(cutoff).await
    }

    // ------------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------------

    pub async fn add_audit_log(
        &self,
        user_id: i32,
        action: &str,
        module_affected: &str,
        details: Option<String>,
    ) -> Result<()> {
        self.audit_repo()
            .add(user_id, action, module_affected, details)
            .await
    }

    pub async fn list_audit_logs(&self) -> Result<Vec<AuditRow>> {
        self.audit_repo().list().await
    }
}
