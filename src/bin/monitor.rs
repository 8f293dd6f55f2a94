//! TinyMQ desktop monitor.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Desktop monitor for the TinyMQ admin API
#[derive(Parser, Debug)]
#[command(name = "tinymq-monitor")]
#[command(version)]
#[command(about = "Desktop monitor for a TinyMQ broker", long_about = None)]
struct Args {
    /// API host shown on the login screen
    #[arg(long, env = "TINYMQ_API_HOST", default_value = "localhost")]
    host: String,

    /// API port shown on the login screen
    #[arg(long, env = "TINYMQ_API_PORT", default_value_t = 8000)]
    port: u16,

    /// Username shown on the login screen
    #[arg(long, env = "TINYMQ_API_USER", default_value = "admin")]
    username: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).with_target(true).init();

    // requests run here; the window owns the main thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("monitor-io")
        .build()
        .context("Failed to start the async runtime")?;

    info!(host = %args.host, port = args.port, "Starting TinyMQ Monitor");
    tinymq_admin::gui::run(runtime.handle().clone(), args.host, args.port, args.username)
        .map_err(|e| anyhow!("Monitor window failed: {}", e))?;

    info!("Monitor closed");
    Ok(())
}
