pub use super::audit_logs::Entity as AuditLogs;
pub use super::customers::Entity as Customers;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::ticket_comments::Entity as TicketComments;
pub use super::tickets::Entity as Tickets;
pub use super::users::Entity as Users;
