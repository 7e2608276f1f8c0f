use super::stats::{TransportStats, TransportStatsSnapshot};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use url::Url;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request timeout: {0}")]
    RequestTimeout(String),
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub health_timeout: Duration,
    pub max_idle_connections: usize,
    pub keep_alive_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
            max_idle_connections: 20,
            keep_alive_timeout: Duration::from_secs(60),
            user_agent: format!("cargolink/{}", crate::VERSION),
        }
    }
}

/// Shared HTTP client for every outbound call the pipeline makes.
/// Cloning is cheap; the underlying connection pool and counters are shared.
#[derive(Debug, Clone)]
pub struct TransportClient {
    client: Client,
    config: TransportConfig,
    stats: Arc<TransportStats>,
}

impl TransportClient {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.keep_alive_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| {
                TransportError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            stats: Arc::new(TransportStats::new()),
        })
    }

    /// Best-effort connectivity probe against the peer's health endpoint.
    /// Short timeout, never retried; the outcome is counted and returned.
    pub async fn check_health(&self, base_url: &Url) -> Result<(), TransportError> {
        let health_url = endpoint_url(base_url, "api/health");

        let response = timeout(
            self.config.health_timeout,
            self.client.get(health_url).send(),
        )
        .await
        .map_err(|_| TransportError::RequestTimeout("Health probe timeout".to_string()))?
        .map_err(TransportError::NetworkError)?;

        let success = response.status().is_success();
        self.stats.record_health(success);

        if success {
            Ok(())
        } else {
            Err(TransportError::HttpError {
                status: response.status().as_u16(),
                message: format!("Health probe failed: {}", response.status()),
            })
        }
    }

    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn counters(&self) -> &TransportStats {
        &self.stats
    }
}

/// Appends a relative path to a base URL, keeping any path prefix the base
/// already carries.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let trimmed = path.trim_start_matches('/');
    if url.path().ends_with('/') {
        url.set_path(&format!("{}{}", url.path(), trimmed));
    } else {
        url.set_path(&format!("{}/{}", url.path(), trimmed));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_cleanly() {
        let base: Url = "http://relay-node:3001".parse().unwrap();
        assert_eq!(
            endpoint_url(&base, "api/receive-compressed").as_str(),
            "http://relay-node:3001/api/receive-compressed"
        );

        let with_slash: Url = "http://relay-node:3001/".parse().unwrap();
        assert_eq!(
            endpoint_url(&with_slash, "/api/health").as_str(),
            "http://relay-node:3001/api/health"
        );

        let with_prefix: Url = "http://relay-node:3001/edge".parse().unwrap();
        assert_eq!(
            endpoint_url(&with_prefix, "api/health").as_str(),
            "http://relay-node:3001/edge/api/health"
        );
    }

    #[test]
    fn client_builds_with_defaults() {
        let client = TransportClient::new(TransportConfig::default());
        assert!(client.is_ok());
    }
}
