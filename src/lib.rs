pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;

use anyhow::Context;
pub use config::Config;
use db::Store;
use models::role::Role;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key, value)?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map_or("serve", String::as_str);

    match command {
        "serve" | "-s" | "--serve" => run_server(config, prometheus_handle).await,

        "seed-admin" => {
            if args.len() < 4 {
                println!("Usage: customer360 seed-admin <email> <password> [full name]");
                println!("Example: customer360 seed-admin admin@acme.com S3cret! \"Jane Admin\"");
                return Ok(());
            }
            let email = &args[2];
            let password = &args[3];
            let full_name = args
                .get(4..)
                .filter(|rest| !rest.is_empty())
                .map(|rest| rest.join(" "));
            cmd_seed_admin(&config, email, password, full_name.as_deref()).await
        }

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", command);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Customer360 - Customer Relationship & Support Backend");
    println!("Role-gated REST API for customers, subscriptions, and support tickets");
    println!();
    println!("USAGE:");
    println!("  customer360 [COMMAND] [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  serve             Start the API server (default when no command is given)");
    println!("  seed-admin <email> <password> [full name]");
    println!("                    Create an admin account if it does not exist yet");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  customer360                                   # Start the server");
    println!("  customer360 seed-admin admin@acme.com S3cret! # Bootstrap an admin account");
    println!("  customer360 init                              # Write config.toml with defaults");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to set the port, database path, JWT secret, etc.");
    println!("  The CUSTOMER360_JWT_SECRET environment variable overrides the configured secret.");
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("Customer360 v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = config.server.port;
    let state = api::create_app_state(config, prometheus_handle).await?;
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🌐 API server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}

async fn cmd_seed_admin(
    config: &Config,
    email: &str,
    password: &str,
    full_name: Option<&str>,
) -> anyhow::Result<()> {
    let email = api::validation::normalized_email(email)?;

    if password.chars().count() < 6 {
        anyhow::bail!("Password must be at least 6 characters");
    }

    let store = Store::new(&config.general.database_path).await?;

    if store.get_user_by_email(&email).await?.is_some() {
        println!("User {} already exists, nothing to do.", email);
        return Ok(());
    }

    let user = store
        .create_user(
            &email,
            password,
            full_name.unwrap_or("Administrator"),
            Role::Admin.as_str(),
            &config.security,
        )
        .await?;

    println!("✓ Created admin user: {} (ID: {})", user.email, user.id);

    Ok(())
}
