pub mod analytics;
pub use analytics::AnalyticsService;

pub mod audit;
pub use audit::AuditLogger;
