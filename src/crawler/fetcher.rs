use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use thiserror::Error;

use crate::cli::config::FetchSettings;

/// Classified fetch failures. These are rendered into the outcome's error
/// string; they never propagate as panics or raw errors past the fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("response body exceeds {0} bytes")]
    ContentTooLarge(usize),
    #[error("request failed: {0}")]
    Transport(String),
}

/// Result of a fetch attempt, success or failure.
///
/// A completed HTTP exchange is a success regardless of status code; only
/// transport-level failures (DNS, connect, TLS, timeout, redirect limit)
/// populate `error`. A non-HTML response is a success with `html = None`.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// HTTP status code, when a response was received
    pub status: Option<u16>,

    /// Content type reported by the server
    pub content_type: Option<String>,

    /// URL actually reached, after redirects
    pub final_url: String,

    /// Document body, present only for HTML-compatible responses
    pub html: Option<String>,

    /// Human-readable failure classification
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failure(url: &str, error: FetchError) -> Self {
        Self {
            status: None,
            content_type: None,
            final_url: url.to_string(),
            html: None,
            error: Some(error.to_string()),
        }
    }
}

/// Seam for fetching documents, so the worker loop can be driven against a
/// canned fetcher in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Production fetcher backed by a pooled reqwest client with bounded total
/// time and bounded redirect count.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_redirects: usize,
    max_content_size: usize,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );

        let timeout = Duration::from_secs(settings.timeout_secs);

        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            timeout,
            max_redirects: settings.max_redirects,
            max_content_size: settings.max_content_size,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_redirect() {
            FetchError::TooManyRedirects(self.max_redirects)
        } else {
            // Strip the url from the message; the caller already knows it
            FetchError::Transport(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::failure(url, self.classify(e)),
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        // Non-HTML resources are legitimately skipped, not failed
        let html_compatible = content_type
            .as_deref()
            .map(is_html_content_type)
            .unwrap_or(false);

        if !html_compatible {
            return FetchOutcome {
                status: Some(status),
                content_type,
                final_url,
                html: None,
                error: None,
            };
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_content_size {
                return FetchOutcome::failure(
                    url,
                    FetchError::ContentTooLarge(self.max_content_size),
                );
            }
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::failure(url, self.classify(e)),
        };

        if body.len() > self.max_content_size {
            return FetchOutcome::failure(url, FetchError::ContentTooLarge(self.max_content_size));
        }

        FetchOutcome {
            status: Some(status),
            content_type,
            final_url,
            html: Some(body),
            error: None,
        }
    }
}

/// Whether a content type can be parsed as an HTML document
fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}
