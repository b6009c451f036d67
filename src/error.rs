use crate::controller::RequestToken;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Missing or rejected bearer credential. Routes to re-authentication.
    #[error("Authentication required: {0}")]
    Auth(String),

    /// Non-success response from the backend.
    #[error("Request failed: {0}")]
    Fetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Selection references a field absent from the last-loaded registry.
    #[error("Field not found: {0}")]
    NotFound(String),

    /// Response for a superseded trigger. Never shown to the user.
    #[error("Stale response for request {token} (current: {current:?})")]
    StaleResponse {
        token: RequestToken,
        current: Option<RequestToken>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl MonitorError {
    pub fn is_auth(&self) -> bool {
        matches!(self, MonitorError::Auth(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, MonitorError::StaleResponse { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MonitorError::NotFound(_))
    }

    /// Transport failures and non-success statuses both count as fetch errors.
    pub fn is_fetch(&self) -> bool {
        matches!(self, MonitorError::Fetch(_) | MonitorError::Http(_) | MonitorError::Json(_))
    }

    /// Text suitable for inline display in a panel.
    pub fn user_message(&self) -> String {
        match self {
            MonitorError::Auth(_) => "Session expired, please sign in again".to_string(),
            MonitorError::Fetch(msg) => msg.clone(),
            MonitorError::Http(e) if e.is_timeout() => "Request timed out".to_string(),
            MonitorError::Http(e) if e.is_connect() => "Could not reach the server".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
