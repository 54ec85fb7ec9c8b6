//! HTTP client wrapper.
//!
//! Wraps reqwest with the engine's user agent and connect timeout, and maps
//! HTTP status codes onto retryable and permanent errors.

use crate::config::{AppConfig, NetworkConfig};
use crate::error::{BoardlibError, Result};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

/// HTTP client used for artifact downloads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| BoardlibError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self { client })
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Make a GET request, failing on any non-success status.
    ///
    /// Transient statuses map to a retryable `Network` error; everything
    /// else is a permanent `DownloadFailed`.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                BoardlibError::Timeout(NetworkConfig::CONNECT_TIMEOUT)
            } else {
                BoardlibError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    source: Some(e),
                }
            }
        })?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);
        if status.is_success() {
            return Ok(response);
        }

        if Self::is_retryable_status(status) {
            Err(BoardlibError::Network {
                message: format!("GET {} returned {}", url, status),
                source: None,
            })
        } else {
            Err(BoardlibError::DownloadFailed {
                url: url.to_string(),
                message: format!("server returned {}", status),
            })
        }
    }

    /// Check if an HTTP status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }
}
