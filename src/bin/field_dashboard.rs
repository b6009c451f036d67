use anyhow::Context;
use clap::Parser;
use field_monitor::ui::run_dashboard;
use field_monitor::{FieldClient, FieldMonitor, MonitorConfig, SessionStore};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive field health dashboard", long_about = None)]
struct Args {
    /// Backend URL (or set FIELD_MONITOR_API_URL env var)
    #[arg(long, name = "api_url")]
    api_url: Option<String>,

    /// Session database path (or set FIELD_MONITOR_SESSION_DB env var)
    #[arg(long, name = "session_db")]
    session_db: Option<String>,

    /// Log file; the terminal belongs to the dashboard
    #[arg(long, name = "log_file", default_value = "field_dashboard.log")]
    log_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, name = "log_level", default_value = "info")]
    log_level: String,
}

// Example usage:
// FIELD_MONITOR_USERNAME=agronomist FIELD_MONITOR_PASSWORD=secret ./target/release/field_dashboard
// ./target/release/field_dashboard --api_url https://fields.example.com --log_level debug

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("failed to open log file {}", args.log_file))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(format!("field_monitor={}", args.log_level))
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    let mut config = MonitorConfig::from_env()?;
    if let Some(url) = args.api_url {
        config = config.with_api_url(url);
    }
    if let Some(path) = args.session_db {
        config = config.with_session_db_path(path);
    }
    info!("Starting dashboard against {}", config.api_url);

    let session = Arc::new(SessionStore::open(&config.session_db_path)?);
    let client = FieldClient::new(&config, Arc::clone(&session))?;
    let monitor = FieldMonitor::new(Arc::new(client), session);

    run_dashboard(monitor, config).await
}
