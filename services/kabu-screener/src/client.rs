//! Screening query boundary.
//!
//! The backend is a black box reached through `GET /api/enhanced-screening`
//! with the `FilterSet` as query parameters. It answers with
//! `{status, data, count}` on success and `{status: "error", message}` or a
//! non-2xx status on failure.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use kabu_common::config::ScreenerConfig;

use crate::filter::FilterSet;
use crate::record::StockRecord;

/// Path of the screening endpoint relative to the backend base URL.
pub const SCREENING_PATH: &str = "api/enhanced-screening";

// ============================================================================
// Errors
// ============================================================================

/// Why a screening query produced no result set.
///
/// An empty match list is not an error; it is an `Ok` with no records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreeningError {
    /// A previous submission has not finished yet
    #[error("a screening query is already running")]
    AlreadyRunning,

    /// The backend base URL could not be used
    #[error("invalid screening service URL: {0}")]
    InvalidUrl(String),

    /// Connection failed, DNS, TLS, reset...
    #[error("could not reach screening service: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout
    #[error("screening query timed out")]
    Timeout,

    /// Non-2xx response
    #[error("screening service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response whose body reports `status: "error"`
    #[error("screening failed: {0}")]
    Backend(String),

    /// The body was not a screening response
    #[error("malformed screening response: {0}")]
    Decode(String),
}

impl ScreeningError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Result of one successful query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreeningResponse {
    pub records: Vec<StockRecord>,
    /// Effective data date, taken from the first record
    pub data_date: Option<String>,
}

impl ScreeningResponse {
    pub fn new(records: Vec<StockRecord>) -> Self {
        let data_date = records.first().and_then(|r| r.stock_date.clone());
        Self { records, data_date }
    }
}

/// Wire envelope of the screening endpoint.
#[derive(Debug, Deserialize)]
struct ScreeningEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<Vec<StockRecord>>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl ScreeningEnvelope {
    fn error_message(&self) -> Option<String> {
        let base = self.message.clone().or_else(|| self.error.clone())?;
        Some(match &self.details {
            Some(details) => format!("{} ({})", base, details),
            None => base,
        })
    }

    fn into_response(self) -> Result<ScreeningResponse, ScreeningError> {
        if self.status.as_deref() == Some("error") {
            let message = self
                .error_message()
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ScreeningError::Backend(message));
        }

        let records = match self.data {
            Some(records) => records,
            None => {
                return Err(match self.error_message() {
                    Some(message) => ScreeningError::Backend(message),
                    None => ScreeningError::Decode("response has no data array".into()),
                })
            }
        };

        if let Some(count) = self.count {
            if count != records.len() {
                warn!(count, received = records.len(), "Screening count does not match data length");
            }
        }

        Ok(ScreeningResponse::new(records))
    }
}

/// Decode a screening response body.
pub fn parse_response(body: &str) -> Result<ScreeningResponse, ScreeningError> {
    let envelope: ScreeningEnvelope =
        serde_json::from_str(body).map_err(|e| ScreeningError::Decode(e.to_string()))?;
    envelope.into_response()
}

// ============================================================================
// Client Trait
// ============================================================================

/// Executes one screening query per explicit run.
#[async_trait]
pub trait ScreeningClient: Send + Sync {
    /// Run the query. Never returns a partial result.
    async fn run(&self, criteria: &FilterSet) -> Result<ScreeningResponse, ScreeningError>;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// `reqwest`-backed screening client.
pub struct HttpScreeningClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpScreeningClient {
    /// Create a client for the given backend base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ScreeningError> {
        let base = parse_base_url(base_url)?;
        let endpoint = base
            .join(SCREENING_PATH)
            .map_err(|e| ScreeningError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ScreeningError::from_reqwest)?;

        Ok(Self { client, endpoint })
    }

    /// Create from config
    pub fn from_config(config: &ScreenerConfig) -> Result<Self, ScreeningError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Parse a base URL so that relative joins keep its path.
pub fn parse_base_url(base_url: &str) -> Result<Url, ScreeningError> {
    let mut normalized = base_url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| ScreeningError::InvalidUrl(format!("{}: {}", base_url, e)))
}

#[async_trait]
impl ScreeningClient for HttpScreeningClient {
    async fn run(&self, criteria: &FilterSet) -> Result<ScreeningResponse, ScreeningError> {
        debug!(endpoint = %self.endpoint, params = criteria.len(), "Sending screening query");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&criteria.to_query_pairs())
            .send()
            .await
            .map_err(ScreeningError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(ScreeningError::from_reqwest)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ScreeningEnvelope>(&body)
                .ok()
                .and_then(|e| e.error_message())
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(ScreeningError::Http {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"{
            "status": "success",
            "count": 2,
            "data": [
                {"code": "7203", "name": "トヨタ自動車", "stock_date": "2025-01-10", "price": 2500},
                {"code": "6758", "name": "ソニーグループ", "stock_date": "2025-01-10"}
            ]
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.records.len(), 2);
        assert_eq!(response.data_date.as_deref(), Some("2025-01-10"));
    }

    #[test]
    fn test_parse_empty_is_success() {
        let response = parse_response(r#"{"status": "success", "data": [], "count": 0}"#).unwrap();
        assert!(response.records.is_empty());
        assert_eq!(response.data_date, None);
    }

    #[test]
    fn test_parse_backend_error() {
        let err = parse_response(r#"{"status": "error", "message": "no such table"}"#).unwrap_err();
        assert_eq!(err, ScreeningError::Backend("no such table".into()));

        let err = parse_response(
            r#"{"error": "スクリーニングの実行に失敗しました", "details": "locked"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScreeningError::Backend("スクリーニングの実行に失敗しました (locked)".into())
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response("<html>"), Err(ScreeningError::Decode(_))));
        assert!(matches!(
            parse_response(r#"{"status": "success"}"#),
            Err(ScreeningError::Decode(_))
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client =
            HttpScreeningClient::new("http://localhost:5000/kabu", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:5000/kabu/api/enhanced-screening"
        );
    }

    #[tokio::test]
    async fn test_request_build_failure_is_transport() {
        let err = reqwest::get("not a url").await.unwrap_err();
        assert!(err.is_builder());
        assert!(matches!(
            ScreeningError::from_reqwest(err),
            ScreeningError::Transport(_)
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpScreeningClient::new("not a url", Duration::from_secs(5)),
            Err(ScreeningError::InvalidUrl(_))
        ));
    }
}
