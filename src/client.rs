use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::models::{AnalysisResult, DateRange, Field, Provider, TokenResponse, TrendSeries};
use crate::session::SessionStore;

// ===== BACKEND SEAM =====

/// Read-only field analytics backend. `FieldClient` is the HTTP implementation;
/// the orchestration layer only depends on this trait.
#[async_trait]
pub trait FieldBackend: Send + Sync {
    async fn list_fields(&self) -> Result<Vec<Field>>;

    async fn get_field(&self, field_id: &str) -> Result<Field>;

    async fn analyze_field(
        &self,
        field_id: &str,
        provider: Option<Provider>,
        date_range: &DateRange,
    ) -> Result<AnalysisResult>;

    async fn field_trend(&self, field_id: &str, date_range: &DateRange) -> Result<TrendSeries>;

    /// Exchanges username/password for a bearer credential. The credential is
    /// returned, not stored.
    async fn request_token(&self, username: &str, password: &str) -> Result<TokenResponse>;
}

// ===== CLIENT IMPLEMENTATION =====

#[derive(Debug, Clone)]
pub struct FieldClient {
    base_url: Url,
    http: reqwest::Client,
    session: Arc<SessionStore>,
}

impl FieldClient {
    /// Creates a new FieldClient for the backend at `config.api_url`.
    pub fn new(config: &MonitorConfig, session: Arc<SessionStore>) -> Result<Self> {
        let base_url = Url::parse(&config.api_url)?;
        if base_url.cannot_be_a_base() {
            return Err(MonitorError::InvalidArgument(format!(
                "API URL '{}' cannot be used as a base URL",
                config.api_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Builds an endpoint URL from path segments; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MonitorError::InvalidArgument("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> Result<String> {
        self.session
            .get_credential()?
            .ok_or_else(|| MonitorError::Auth("no stored credential".to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let credential = self.bearer()?;
        debug!("GET {}", url.path());

        let response = self
            .http
            .get(url)
            .bearer_auth(credential)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected the stored credential");
            return Err(MonitorError::Auth("credential rejected by server".to_string()));
        }
        Self::decode(status, response).await
    }

    async fn decode<T: DeserializeOwned>(status: StatusCode, response: reqwest::Response) -> Result<T> {
        let body = response.text().await?;

        if !status.is_success() {
            // Surface the backend's `detail`/`message` if it sent one
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("detail")
                        .or_else(|| v.get("message"))
                        .or_else(|| v.get("error"))
                        .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
                });
            return Err(MonitorError::Fetch(match detail {
                Some(detail) => format!("HTTP {} - {}", status, detail),
                None => format!("HTTP {}", status),
            }));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            MonitorError::Fetch(format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl FieldBackend for FieldClient {
    async fn list_fields(&self) -> Result<Vec<Field>> {
        let url = self.endpoint(&["api", "fields"])?;
        self.get_json(url, &[]).await
    }

    async fn get_field(&self, field_id: &str) -> Result<Field> {
        let url = self.endpoint(&["api", "fields", field_id])?;
        match self.get_json(url, &[]).await {
            Err(MonitorError::Fetch(msg)) if msg.starts_with("HTTP 404") => {
                Err(MonitorError::NotFound(field_id.to_string()))
            }
            other => other,
        }
    }

    async fn analyze_field(
        &self,
        field_id: &str,
        provider: Option<Provider>,
        date_range: &DateRange,
    ) -> Result<AnalysisResult> {
        let url = self.endpoint(&["api", "fields", field_id, "analyze"])?;
        let mut query = Vec::new();
        if let Some(provider) = provider {
            query.push(("provider", provider.as_str().to_string()));
        }
        query.extend(date_range.query_params());
        self.get_json(url, &query).await
    }

    async fn field_trend(&self, field_id: &str, date_range: &DateRange) -> Result<TrendSeries> {
        let url = self.endpoint(&["api", "fields", field_id, "trend"])?;
        self.get_json(url, &date_range.query_params()).await
    }

    async fn request_token(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let url = self.endpoint(&["token"])?;
        let response = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MonitorError::Auth("invalid credentials".to_string()));
        }
        let token: TokenResponse = Self::decode(status, response).await?;
        if token.access_token.trim().is_empty() {
            return Err(MonitorError::Auth("server returned an empty access token".to_string()));
        }
        debug!("Obtained access token for {}", username);
        Ok(token)
    }
}
