pub mod prelude;

pub mod audit_logs;
pub mod customers;
pub mod subscriptions;
pub mod ticket_comments;
pub mod tickets;
pub mod users;
