//! Registrar client trait and HTTP implementation

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::error::{RegistrarError, Result};
use crate::types::{DomainAvailability, TldListResponse, TldPriceInfo};

/// Operations the pricing backend needs from a registrar API
#[async_trait]
pub trait RegistrarClient: Send + Sync {
    /// Code of the registrar this client talks to
    fn code(&self) -> &str;

    /// TLDs the registrar sells, with its current prices
    async fn get_supported_tlds(&self) -> Result<Vec<TldPriceInfo>>;

    /// Check whether a domain can be registered
    async fn check_availability(&self, domain: &str) -> Result<DomainAvailability>;
}

/// JSON-over-HTTP registrar client
///
/// Expects `GET {base}/tlds` and `GET {base}/domains/{name}/availability`.
pub struct HttpRegistrarClient {
    http_client: Client,
    base_url: String,
    code: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpRegistrarClient {
    /// Create a new registrar client
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let client = HttpRegistrarClient::new("acme", "https://api.acme.test/v1", None, 30_000)?;
    /// ```
    pub fn new(
        code: &str,
        base_url: &str,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(RegistrarError::Config(format!(
                "Empty base URL for registrar '{}'",
                code
            )));
        }

        let http_client = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| RegistrarError::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            code: code.to_string(),
            api_key,
            timeout_ms,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self), fields(registrar = %self.code))]
    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Registrar request: GET {}", url);

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RegistrarError::Timeout(self.timeout_ms)
            } else {
                RegistrarError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("Registrar {} rejected credentials", self.code);
            return Err(RegistrarError::Unauthorized);
        }
        if !status.is_success() {
            error!("Registrar HTTP error: status={}", status);
            return Err(RegistrarError::HttpError(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            RegistrarError::ParseError(format!("Failed to read response body: {}", e))
        })?;

        serde_json::from_str(&body)
            .map_err(|e| RegistrarError::ParseError(format!("Failed to parse JSON: {}", e)))
    }
}

#[async_trait]
impl RegistrarClient for HttpRegistrarClient {
    fn code(&self) -> &str {
        &self.code
    }

    async fn get_supported_tlds(&self) -> Result<Vec<TldPriceInfo>> {
        let response: TldListResponse = self.get_json("/tlds").await?;
        debug!(
            "Registrar {} reported {} TLDs",
            self.code,
            response.tlds.len()
        );
        Ok(response.tlds)
    }

    async fn check_availability(&self, domain: &str) -> Result<DomainAvailability> {
        let domain = domain.trim().to_ascii_lowercase();
        if domain.is_empty() || domain.contains('/') {
            return Err(RegistrarError::Config(format!(
                "Invalid domain name '{}'",
                domain
            )));
        }

        self.get_json(&format!("/domains/{}/availability", domain))
            .await
    }
}
