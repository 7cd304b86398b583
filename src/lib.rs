pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
pub use config::Config;
use db::Store;
use services::Scheduler;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // These must work before a valid config exists
    match args.get(1).map(String::as_str) {
        None | Some("help" | "-h" | "--help") => {
            print!("{}", help_text());
            return Ok(());
        }
        Some("init" | "--init") => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("Config file already exists.");
            }
            return Ok(());
        }
        Some(_) => {}
    }

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    init_tracing(&config);

    match args[1].as_str() {
        "serve" | "daemon" | "-d" | "--daemon" => run_daemon(config, prometheus_handle).await,

        "deactivate-users" => cmd_deactivate_users(&config).await,

        "grant-group" | "revoke-group" => {
            if args.len() < 4 {
                println!("Usage: lms {} <email> <group>", args[1]);
                println!(
                    "Example: lms {} alice@example.com {}",
                    args[1],
                    db::MODERATOR_GROUP
                );
                return Ok(());
            }
            let grant = args[1] == "grant-group";
            cmd_set_group(&config, &args[2], &args[3], grant).await
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print!("{}", help_text());
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn help_text() -> String {
    let group = db::MODERATOR_GROUP;
    format!(
        "LMS - Online course platform backend

USAGE:
  lms <COMMAND> [OPTIONS]

COMMANDS:
  serve, daemon                Run the HTTP API and background scheduler
  deactivate-users             Deactivate inactive accounts once and exit
  grant-group <email> <group>  Add a user to a permission group
  revoke-group <email> <group> Remove a user from a permission group
  init                         Create default config file
  help                         Show this help message

GROUPS:
  {group:<28} Can view and edit every course, lesson and payment

EXAMPLES:
  lms init                                # Write config.toml
  lms serve                               # Start the API
  lms grant-group alice@example.com {group}
  lms deactivate-users                    # Run the inactivity sweep now
"
    )
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("LMS v{} starting...", env!("CARGO_PKG_VERSION"));

    let shared = Arc::new(SharedState::new(config.clone()).await?);

    let scheduler = Arc::new(Scheduler::new(
        shared.store.clone(),
        config.scheduler.clone(),
    ));
    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = scheduler.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let app = api::router(api::create_app_state(shared, prometheus_handle));
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("Web server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }

    scheduler.stop();
    if tokio::time::timeout(std::time::Duration::from_secs(10), scheduler_handle)
        .await
        .is_err()
    {
        error!("Scheduler did not stop within 10s");
    }
    if let Some(handle) = server_handle {
        handle.abort();
    }

    info!("Stopped");
    Ok(())
}

async fn cmd_deactivate_users(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let scheduler = Scheduler::new(store, config.scheduler.clone());
    let count = scheduler.run_once().await?;

    println!(
        "✓ Deactivated {} user(s) inactive for more than {} days",
        count, config.scheduler.inactive_days
    );
    Ok(())
}

async fn cmd_set_group(
    config: &Config,
    email: &str,
    group: &str,
    grant: bool,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let email = email.trim().to_lowercase();
    let Some(user) = store.get_user_by_email(&email).await? else {
        println!("No user with email: {email}");
        return Ok(());
    };

    if grant {
        store.add_user_to_group(user.id, group).await?;
        println!("✓ Added {} (ID: {}) to '{}'", user.email, user.id, group);
    } else if store.remove_user_from_group(user.id, group).await? {
        println!("✓ Removed {} (ID: {}) from '{}'", user.email, user.id, group);
    } else {
        println!("{} is not a member of '{}'", user.email, group);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_names_the_seeded_moderator_group() {
        let help = help_text();
        let example = format!("grant-group alice@example.com {}\n", db::MODERATOR_GROUP);
        assert!(help.contains(&example));
        assert!(!help.contains("moderators"));
    }
}
