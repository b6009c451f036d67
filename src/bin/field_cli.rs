use anyhow::{anyhow, bail, Context};
use clap::Parser;
use field_monitor::client::{FieldBackend, FieldClient};
use field_monitor::models::{DateRange, Provider};
use field_monitor::{MonitorConfig, SessionStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query the field health backend", long_about = None, rename_all = "snake_case")]
struct Args {
    /// Command to execute: login, logout, get_fields, get_field, analyze, trend
    #[arg(short, long)]
    command: String,

    /// Backend URL (or set FIELD_MONITOR_API_URL env var)
    #[arg(long, name = "api_url")]
    api_url: Option<String>,

    /// Session database path (or set FIELD_MONITOR_SESSION_DB env var)
    #[arg(long, name = "session_db")]
    session_db: Option<String>,

    /// Username for login (or set FIELD_MONITOR_USERNAME env var)
    #[arg(long)]
    username: Option<String>,

    /// Password for login (or set FIELD_MONITOR_PASSWORD env var)
    #[arg(long)]
    password: Option<String>,

    /// Field ID (for get_field, analyze and trend commands)
    #[arg(long, name = "field_id")]
    field_id: Option<String>,

    /// Imagery provider: liss_iv, hr_data or eos_04 (analyze only; omit for backend default)
    #[arg(long)]
    provider: Option<String>,

    /// Start date, YYYY-MM-DD
    #[arg(long, name = "start_date")]
    start_date: Option<String>,

    /// End date, YYYY-MM-DD
    #[arg(long, name = "end_date")]
    end_date: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, name = "log_level", default_value = "info")]
    log_level: String,
}

// example usage:
// ./target/release/field_cli --command login --username agronomist --password secret
// ./target/release/field_cli --command get_fields
// ./target/release/field_cli --command get_field --field_id 17
// ./target/release/field_cli --command analyze --field_id 17 --provider liss_iv --start_date 2024-01-01 --end_date 2024-03-31
// ./target/release/field_cli --command trend --field_id 17 --start_date 2024-01-01
// ./target/release/field_cli --command logout

fn require_field_id(args: &Args) -> anyhow::Result<&str> {
    args.field_id
        .as_deref()
        .ok_or_else(|| anyhow!("field_id required for {}", args.command))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(format!("field_monitor={}", args.log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = MonitorConfig::from_env()?;
    if let Some(url) = &args.api_url {
        config = config.with_api_url(url.clone());
    }
    if let Some(path) = &args.session_db {
        config = config.with_session_db_path(path.clone());
    }

    let session = Arc::new(
        SessionStore::open(&config.session_db_path)
            .with_context(|| format!("failed to open session store at {}", config.session_db_path))?,
    );
    let client = FieldClient::new(&config, Arc::clone(&session))?;
    let date_range = DateRange::parse(args.start_date.as_deref(), args.end_date.as_deref())?;

    let result = match args.command.as_str() {
        "login" => {
            let username = args.username.clone().or(config.username.clone());
            let password = args.password.clone().or(config.password.clone());
            let (Some(username), Some(password)) = (username, password) else {
                bail!("username and password required for login");
            };
            let token = client.request_token(&username, &password).await?;
            session.set_credential(&token.access_token)?;
            info!("Signed in as {}", username);
            println!("Signed in as {}", username);
            Ok(())
        }
        "logout" => {
            session.clear()?;
            println!("Signed out");
            Ok(())
        }
        "get_fields" => client
            .list_fields()
            .await
            .map(|fields| println!("{}", serde_json::to_string_pretty(&fields).unwrap_or_default())),
        "get_field" => {
            let field_id = require_field_id(&args)?;
            client
                .get_field(field_id)
                .await
                .map(|field| println!("{}", serde_json::to_string_pretty(&field).unwrap_or_default()))
        }
        "analyze" => {
            let field_id = require_field_id(&args)?;
            let provider = args.provider.as_deref().map(str::parse::<Provider>).transpose()?;
            client
                .analyze_field(field_id, provider, &date_range)
                .await
                .map(|result| println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default()))
        }
        "trend" => {
            let field_id = require_field_id(&args)?;
            client
                .field_trend(field_id, &date_range)
                .await
                .map(|series| println!("{}", serde_json::to_string_pretty(&series).unwrap_or_default()))
        }
        other => bail!(
            "unknown command '{}' (expected login, logout, get_fields, get_field, analyze or trend)",
            other
        ),
    };

    if let Err(e) = result {
        if e.is_auth() {
            // A rejected credential is never reused
            warn!("Clearing rejected credential");
            session.clear()?;
            eprintln!("{}. Run: field_cli --command login", e.user_message());
        } else {
            eprintln!("{}: {}", args.command, e.user_message());
        }
        std::process::exit(1);
    }

    Ok(())
}
