use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_DB: &str = "field_monitor_session.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub api_url: String,
    pub session_db_path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_db_path: DEFAULT_SESSION_DB.to_string(),
            username: None,
            password: None,
            timeout_secs: None,
        }
    }
}

impl MonitorConfig {
    /// Creates a config from environment variables, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let api_url = std::env::var("FIELD_MONITOR_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let session_db_path = std::env::var("FIELD_MONITOR_SESSION_DB")
            .unwrap_or_else(|_| DEFAULT_SESSION_DB.to_string());

        let timeout_secs = match std::env::var("FIELD_MONITOR_TIMEOUT_SECS") {
            Ok(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                MonitorError::InvalidArgument(format!(
                    "FIELD_MONITOR_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            api_url,
            session_db_path,
            username: std::env::var("FIELD_MONITOR_USERNAME").ok(),
            password: std::env::var("FIELD_MONITOR_PASSWORD").ok(),
            timeout_secs,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_session_db_path(mut self, path: impl Into<String>) -> Self {
        self.session_db_path = path.into();
        self
    }

    /// Username/password pair used for re-authentication, when both are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
