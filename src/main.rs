//! TinyMQ admin API server.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tinymq_admin::auth::initialize_admin_user;
use tinymq_admin::config::Config;
use tinymq_admin::db::DatabaseService;
use tinymq_admin::rest_server::run_rest_server;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// REST API over the TinyMQ broker database
#[derive(Parser, Debug)]
#[command(name = "tinymq-api")]
#[command(version)]
#[command(about = "REST API for accessing TinyMQ broker's database", long_about = None)]
struct Args {
    /// Bind address, overrides API_HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides API_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file, overrides DATABASE_PATH
    #[arg(long)]
    db_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(host) = args.host {
        config.api_host = host;
    }
    if let Some(port) = args.port {
        config.api_port = port;
    }
    if let Some(path) = args.db_path {
        config.database_path = path;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_path,
        "Starting TinyMQ API"
    );

    let db_service = DatabaseService::new(&config.database_path, config.db_pool_size)
        .with_context(|| format!("Failed to open database '{}'", config.database_path))?;
    db_service.initialize_db().context("Database initialization failed")?;
    info!("Database initialized successfully.");

    match initialize_admin_user(&db_service, &config) {
        Ok(true) => info!(username = %config.default_admin_username, "Default admin user bootstrapped"),
        Ok(false) => {}
        Err(e) => return Err(e).context("Failed to create the default admin user"),
    }

    info!(host = %config.api_host, port = config.api_port, "Serving REST API");
    run_rest_server(db_service, config)
        .await
        .map_err(|e| anyhow!("REST server failed: {}", e))?;

    info!("REST API shut down.");
    Ok(())
}
