use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::Store;
use crate::models::customer::AccountStatus;
use crate::models::role::Role;
use crate::models::subscription::SubscriptionStatus;
use crate::models::ticket::{TicketPriority, TicketStatus};

#[derive(Debug, Clone, Serialize)]
pub struct CustomerCounts {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub suspended: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCounts {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
    pub cancelled: u64,
    pub trial: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCounts {
    pub total: u64,
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub closed: u64,
    pub open_or_in_progress: u64,
    pub resolved_or_closed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaStats {
    pub breached: u64,
    pub met: u64,
    pub total_assessed: u64,
    pub avg_resolution_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub week: String,
    pub avg_hours: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthBreakdown {
    pub subscription: i64,
    pub tickets: i64,
    pub customers: i64,
}

/// Dashboard payload. The extended sections stay None for support engineers
/// and are omitted from the serialized response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub customers: CustomerCounts,
    pub subscriptions: SubscriptionCounts,
    pub tickets: TicketCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla: Option<SlaStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_trends: Option<Vec<TrendPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_breakdown: Option<HealthBreakdown>,
}

pub struct AnalyticsService {
    store: Store,
}

impl AnalyticsService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Aggregate dashboard figures for the given role. Admin and viewer get
    /// the extended sections (SLA, trends, health score); support engineers
    /// get counts only.
    pub async fn dashboard(&self, role: Role) -> Result<Dashboard> {
        let store = &self.store;

        let customers = CustomerCounts {
            total: store.count_customers().await?,
            active: store
                .count_customers_by_status(AccountStatus::Active.as_str())
                .await?,
            inactive: store
                .count_customers_by_status(AccountStatus::Inactive.as_str())
                .await?,
            suspended: store
                .count_customers_by_status(AccountStatus::Suspended.as_str())
                .await?,
        };

        let subscriptions = SubscriptionCounts {
            total: store.count_subscriptions().await?,
            active: store
                .count_subscriptions_by_status(SubscriptionStatus::Active.as_str())
                .await?,
            expired: store
                .count_subscriptions_by_status(SubscriptionStatus::Expired.as_str())
                .await?,
            cancelled: store
                .count_subscriptions_by_status(SubscriptionStatus::Cancelled.as_str())
                .await?,
            trial: store
                .count_subscriptions_by_status(SubscriptionStatus::Trial.as_str())
                .await?,
            pending: store
                .count_subscriptions_by_status(SubscriptionStatus::Pending.as_str())
                .await?,
        };

        let open = store
            .count_tickets_by_status(TicketStatus::Open.as_str())
            .await?;
        let in_progress = store
            .count_tickets_by_status(TicketStatus::InProgress.as_str())
            .await?;
        let resolved = store
            .count_tickets_by_status(TicketStatus::Resolved.as_str())
            .await?;
        let closed = store
            .count_tickets_by_status(TicketStatus::Closed.as_str())
            .await?;
        let tickets = TicketCounts {
            total: store.count_tickets().await?,
            open,
            in_progress,
            resolved,
            closed,
            open_or_in_progress: open + in_progress,
            resolved_or_closed: resolved + closed,
        };

        let mut dashboard = Dashboard {
            customers,
            subscriptions,
            tickets,
            sla: None,
            resolution_trends: None,
            health_score: None,
            health_breakdown: None,
        };

        if role == Role::SupportEngineer {
            return Ok(dashboard);
        }

        // SLA tallies over every resolved/closed ticket with a resolution stamp.
        let resolved_rows = store.resolved_tickets().await?;
        let mut breached = 0u64;
        let mut met = 0u64;
        let mut total_hours = 0.0f64;
        let mut assessed = 0u64;

        for row in &resolved_rows {
            let Some(hours) = hours_between(&row.created_at, &row.resolved_at) else {
                continue;
            };
            let priority =
                TicketPriority::parse(&row.priority).unwrap_or(TicketPriority::Medium);

            total_hours += hours;
            assessed += 1;

            if is_breach(hours, priority) {
                breached += 1;
            } else {
                met += 1;
            }
        }

        let avg_resolution_hours = if assessed > 0 {
            total_hours / assessed as f64
        } else {
            0.0
        };

        // Weekly trend over the last 84 days, keyed by the week's Sunday.
        let cutoff = (Utc::now() - Duration::days(84)).to_rfc3339();
        let recent_rows = store.resolved_tickets_since(&cutoff).await?;
        let mut weeks: BTreeMap<String, (f64, u64)> = BTreeMap::new();

        for row in &recent_rows {
            let Ok(resolved_at) = DateTime::parse_from_rfc3339(&row.resolved_at) else {
                continue;
            };
            let Some(hours) = hours_between(&row.created_at, &row.resolved_at) else {
                continue;
            };
            let key = week_start_key(&resolved_at.with_timezone(&Utc));
            let bucket = weeks.entry(key).or_insert((0.0, 0));
            bucket.0 += hours;
            bucket.1 += 1;
        }

        let resolution_trends: Vec<TrendPoint> = weeks
            .into_iter()
            .map(|(week, (total, count))| TrendPoint {
                week,
                avg_hours: round1(total / count as f64),
                count,
            })
            .collect();

        let subscription =
            subscription_health(dashboard.subscriptions.active + dashboard.subscriptions.trial, dashboard.subscriptions.total);
        let ticket = ticket_health(
            dashboard.tickets.resolved_or_closed,
            dashboard.tickets.total,
            breached,
            assessed,
        );
        let customer = customer_health(dashboard.customers.active, dashboard.customers.total);

        dashboard.sla = Some(SlaStats {
            breached,
            met,
            total_assessed: assessed,
            avg_resolution_hours: round1(avg_resolution_hours),
        });
        dashboard.resolution_trends = Some(resolution_trends);
        dashboard.health_score = Some(health_score(subscription, ticket, customer));
        dashboard.health_breakdown = Some(HealthBreakdown {
            subscription,
            tickets: ticket,
            customers: customer,
        });

        Ok(dashboard)
    }
}

/// Resolution time in fractional hours; None when either stamp is unparseable.
fn hours_between(created_at: &str, resolved_at: &str) -> Option<f64> {
    let created = DateTime::parse_from_rfc3339(created_at).ok()?;
    let resolved = DateTime::parse_from_rfc3339(resolved_at).ok()?;
    Some((resolved - created).num_milliseconds() as f64 / 3_600_000.0)
}

/// Breach is strictly exceeding the target; resolving exactly on it still meets SLA.
const fn is_breach(hours: f64, priority: TicketPriority) -> bool {
    hours > priority.sla_target_hours()
}

/// `YYYY-MM-DD` of the Sunday starting the week containing the timestamp.
fn week_start_key(at: &DateTime<Utc>) -> String {
    let date = at.date_naive();
    let week_start = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    week_start.format("%Y-%m-%d").to_string()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn subscription_health(healthy: u64, total: u64) -> i64 {
    if total == 0 {
        return 100;
    }
    ((healthy as f64 / total as f64) * 100.0).round() as i64
}

fn ticket_health(resolved_or_closed: u64, total: u64, breached: u64, assessed: u64) -> i64 {
    if total == 0 {
        return 100;
    }
    let resolved_pct = (resolved_or_closed as f64 / total as f64) * 100.0;
    let sla_penalty = if assessed > 0 {
        (breached as f64 / assessed as f64) * 30.0
    } else {
        0.0
    };
    ((resolved_pct - sla_penalty).round() as i64).max(0)
}

fn customer_health(active: u64, total: u64) -> i64 {
    if total == 0 {
        return 100;
    }
    ((active as f64 / total as f64) * 100.0).round() as i64
}

/// Weighted composite, rounded then clamped to 0..=100.
fn health_score(subscription: i64, tickets: i64, customers: i64) -> i64 {
    let score = (subscription as f64 * 0.4 + tickets as f64 * 0.4 + customers as f64 * 0.2).round()
        as i64;
    score.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breach_is_strict() {
        assert!(!is_breach(4.0, TicketPriority::Critical));
        assert!(is_breach(4.01, TicketPriority::Critical));
        assert!(!is_breach(24.0, TicketPriority::High));
        assert!(is_breach(168.5, TicketPriority::Low));
    }

    #[test]
    fn test_hours_between() {
        let hours = hours_between("2026-01-01T00:00:00+00:00", "2026-01-01T04:00:00+00:00");
        assert_eq!(hours, Some(4.0));

        let fractional =
            hours_between("2026-01-01T00:00:00+00:00", "2026-01-01T00:30:00+00:00").unwrap();
        assert!((fractional - 0.5).abs() < f64::EPSILON);

        assert_eq!(hours_between("garbage", "2026-01-01T00:00:00+00:00"), None);
    }

    #[test]
    fn test_week_start_key_aligns_to_sunday() {
        // 2026-08-26 is a Wednesday; its week starts Sunday 2026-08-23.
        let wednesday = DateTime::parse_from_rfc3339("2026-08-26T15:30:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(week_start_key(&wednesday), "2026-08-23");

        let sunday = DateTime::parse_from_rfc3339("2026-08-23T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(week_start_key(&sunday), "2026-08-23");

        let saturday = DateTime::parse_from_rfc3339("2026-08-22T23:59:59+00:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(week_start_key(&saturday), "2026-08-16");
    }

    #[test]
    fn test_sub_scores_default_to_100_when_empty() {
        assert_eq!(subscription_health(0, 0), 100);
        assert_eq!(ticket_health(0, 0, 0, 0), 100);
        assert_eq!(customer_health(0, 0), 100);
    }

    #[test]
    fn test_subscription_health_counts_trial_as_healthy() {
        // 2 active + 1 trial of 4 total = 75%.
        assert_eq!(subscription_health(3, 4), 75);
        assert_eq!(subscription_health(1, 3), 33);
    }

    #[test]
    fn test_ticket_health_applies_sla_penalty_before_rounding() {
        // 1 of 3 resolved = 33.33%, full breach penalty 30 => round(3.33) = 3.
        assert_eq!(ticket_health(1, 3, 1, 1), 3);
        // Penalty can push the score negative; it clamps at zero.
        assert_eq!(ticket_health(1, 10, 1, 1), 0);
        // No assessed tickets means no penalty.
        assert_eq!(ticket_health(1, 2, 0, 0), 50);
    }

    #[test]
    fn test_health_score_weighting_and_clamp() {
        assert_eq!(health_score(100, 100, 100), 100);
        assert_eq!(health_score(0, 0, 0), 0);
        // 0.4*50 + 0.4*75 + 0.2*100 = 70.
        assert_eq!(health_score(50, 75, 100), 70);
        // 0.4*33 + 0.4*3 + 0.2*50 = 24.4 => 24.
        assert_eq!(health_score(33, 3, 50), 24);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(4.04), 4.0);
        // 0.25 * 10 = 2.5 exactly; rounds away from zero.
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(0.0), 0.0);
    }
}
