//! Client for the classify/summarize service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use url::Url;
use crate::Result;
use crate::error::Error;
use crate::protocol::Summary;

/// Why a summarize call produced no result. `Display` is the message handed back to the panel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(String),
}

/// The remote categorization and summarization capability
#[async_trait]
pub trait SummaryApi: Send + Sync {
    /// One POST, no retries
    async fn classify_summarize(&self, text: &str) -> std::result::Result<Summary, ApiError>;
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    ok: bool,
}

/// HTTP client for `POST /classify_summarize`
#[derive(Clone)]
pub struct HttpSummarizer {
    base: Url,
    client: Client,
}

impl HttpSummarizer {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL {:?}: {}", base_url, e)))?;

        // Url::join replaces the last segment unless the path ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            client: Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid API path {}: {}", path, e)))
    }

    pub fn classify_url(&self) -> Result<Url> {
        self.endpoint("classify_summarize")
    }

    /// Ask the service whether it is up (`GET /health`)
    pub async fn health(&self) -> Result<bool> {
        let response = self.client.get(self.endpoint("health")?).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let health: HealthResponse = response.json().await?;
        Ok(health.ok)
    }
}

#[async_trait]
impl SummaryApi for HttpSummarizer {
    async fn classify_summarize(&self, text: &str) -> std::result::Result<Summary, ApiError> {
        let url = self.classify_url().map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = self.client
            .post(url)
            .json(&SummarizeRequest { text })
            .send()
            .await
            .map_err(|e| {
                error!("summarize request failed: {}", e);
                ApiError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("API Error: {} {}", status.as_u16(), body);
            return Err(ApiError::Status(status.as_u16()));
        }

        let summary: Summary = response.json().await.map_err(|e| {
            error!("summarize response unreadable: {}", e);
            ApiError::Transport(e.to_string())
        })?;

        info!(
            "API response: {} categories, {} chars of summary",
            summary.categories.len(),
            summary.summary.len()
        );
        Ok(summary)
    }
}

/// Summary API returning canned results.
#[cfg(test)]
pub struct FakeSummaryApi {
    outcomes: std::sync::Mutex<std::collections::VecDeque<std::result::Result<Summary, ApiError>>>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FakeSummaryApi {
    pub fn new(outcomes: Vec<std::result::Result<Summary, ApiError>>) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(outcomes.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Texts received so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SummaryApi for FakeSummaryApi {
    async fn classify_summarize(&self, text: &str) -> std::result::Result<Summary, ApiError> {
        self.calls.lock().unwrap().push(text.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("No more fake responses".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];
            // Read until the JSON body has arrived
            loop {
                let n = socket.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..n]);
                let text = String::from_utf8_lossy(&request);
                if n == 0 || text.ends_with('}') || text.starts_with("GET") && text.contains("\r\n\r\n") {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_string()
        });

        (base, handle)
    }

    #[tokio::test]
    async fn test_success() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"categories": ["Work"], "summary": "Confirm attendance by Friday."}"#,
        )
        .await;

        let api = HttpSummarizer::new(&base).unwrap();
        let summary = api.classify_summarize("Please confirm.").await.unwrap();
        assert_eq!(summary.categories, vec!["Work"]);
        assert_eq!(summary.summary, "Confirm attendance by Friday.");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /classify_summarize HTTP/1.1"));
        assert!(request.contains(r#"{"text":"Please confirm."}"#));
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let (base, _server) = serve_once("500 Internal Server Error", r#"{"error": "model crashed"}"#).await;

        let api = HttpSummarizer::new(&base).unwrap();
        let err = api.classify_summarize("hello").await.unwrap_err();
        assert_eq!(err, ApiError::Status(500));
        assert_eq!(err.to_string(), "HTTP 500");
    }

    #[tokio::test]
    async fn test_unexpected_body_is_transport_error() {
        let (base, _server) = serve_once("200 OK", r#"{"error": "nope"}"#).await;

        let api = HttpSummarizer::new(&base).unwrap();
        let err = api.classify_summarize("hello").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Bind and drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();

        let api = HttpSummarizer::new(&format!("http://127.0.0.1:{}", port)).unwrap();
        let err = api.classify_summarize("hello").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref m) if !m.is_empty()));
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _server) = serve_once("200 OK", r#"{"ok": true}"#).await;
        assert!(HttpSummarizer::new(&base).unwrap().health().await.unwrap());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = HttpSummarizer::new("http://summaries.local/api").unwrap();
        assert_eq!(api.classify_url().unwrap().as_str(), "http://summaries.local/api/classify_summarize");

        let api = HttpSummarizer::new("http://127.0.0.1:8000").unwrap();
        assert_eq!(api.classify_url().unwrap().as_str(), "http://127.0.0.1:8000/classify_summarize");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(HttpSummarizer::new("not a url"), Err(Error::Config(_))));
    }
}
