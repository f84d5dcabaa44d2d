pub mod analytics;
pub mod audit;
pub mod auth;
pub mod customers;
pub mod error;
pub mod observability;
pub mod rbac;
pub mod subscriptions;
pub mod tickets;
pub mod types;
pub mod users;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AnalyticsService, AuditLogger};

pub use error::ApiError;
pub use types::*;

/// Shared state behind every handler: configuration, the store facade, the
/// service layer, and the JWT signing secret.
pub struct AppState {
    config: Config,
    store: Store,
    analytics: AnalyticsService,
    audit: AuditLogger,
    jwt_secret: String,
    pub prometheus_handle: Option<PrometheusHandle>,
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    #[must_use]
    pub const fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
}

pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let jwt_secret = config.jwt_secret().unwrap_or_else(|| {
        warn!("No JWT secret configured; generated a random one, sessions will not survive restarts");
        random_secret()
    });

    let analytics = AnalyticsService::new(store.clone());
    let audit = AuditLogger::new(store.clone());

    Ok(Arc::new(AppState {
        config,
        store,
        analytics,
        audit,
        jwt_secret,
        prometheus_handle,
        start_time: Instant::now(),
    }))
}

fn random_secret() -> String {
    use rand::{Rng, distr::Alphanumeric};

    rand::rng()
        .sample_iter(Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Builds the full application router. Route groups carry their own RBAC
/// gates under a shared authentication gate; login, health, and metrics
/// stay outside it.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();
    let metrics_enabled = state.config().observability.metrics_enabled;

    let admin_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user).patch(users::update_user),
        )
        .route("/customers", post(customers::create_customer))
        .route(
            "/customers/{id}",
            patch(customers::update_customer).delete(customers::delete_customer),
        )
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route(
            "/subscriptions/{id}",
            patch(subscriptions::update_subscription).delete(subscriptions::delete_subscription),
        )
        .route("/audit", get(audit::list_audit_logs))
        .route_layer(middleware::from_fn(rbac::require_admin));

    let support_routes = Router::new()
        .route("/tickets", post(tickets::create_ticket))
        .route(
            "/tickets/{id}",
            patch(tickets::update_ticket).delete(tickets::delete_ticket),
        )
        .route("/tickets/{id}/comments", post(tickets::add_comment))
        .route_layer(middleware::from_fn(rbac::require_support));

    let read_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/customers", get(customers::list_customers))
        .route("/customers/{id}", get(customers::get_customer))
        .route("/subscriptions", get(subscriptions::list_subscriptions))
        .route("/subscriptions/{id}", get(subscriptions::get_subscription))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/analytics/dashboard", get(analytics::get_dashboard));

    let protected = Router::new()
        .merge(admin_routes)
        .merge(support_routes)
        .merge(read_routes)
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::auth_middleware,
        ));

    let api_router = Router::new()
        .merge(protected)
        .route("/auth/login", post(auth::login));

    let cors = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = cors_origins
            .iter()
            .filter_map(|origin| origin.parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let mut app = Router::new()
        .nest("/api", api_router)
        .route("/health", get(observability::health));

    if metrics_enabled {
        app = app.route("/metrics", get(observability::get_metrics));
    }

    app.layer(cors.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_requests))
        .layer(middleware::from_fn(observability::security_headers))
        .with_state(state)
}
