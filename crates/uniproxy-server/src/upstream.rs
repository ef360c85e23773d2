//! Universalis API client

use std::time::Duration;

use uniproxy_core::UpstreamError;
use uniproxy_http::CachedPayload;

const USER_AGENT: &str = concat!("uniproxy/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin upstream client. Each call is one GET consumed as JSON; status
/// handling maps straight onto the proxy's error taxonomy.
#[derive(Debug, Clone)]
pub struct UniversalisClient {
    base: String,
    client: reqwest::Client,
}

impl UniversalisClient {
    pub fn new(base: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Market aggregate for a datacenter and a canonical id list
    pub async fn aggregated(
        &self,
        datacenter: &str,
        ids_csv: &str,
    ) -> Result<CachedPayload, UpstreamError> {
        self.get_json(&format!("/api/v2/aggregated/{datacenter}/{ids_csv}"))
            .await
    }

    /// Static datacenter list
    pub async fn data_centers(&self) -> Result<CachedPayload, UpstreamError> {
        self.get_json("/api/v2/data-centers").await
    }

    /// Static world list
    pub async fn worlds(&self) -> Result<CachedPayload, UpstreamError> {
        self.get_json("/api/v2/worlds").await
    }

    async fn get_json(&self, path: &str) -> Result<CachedPayload, UpstreamError> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(UpstreamError::RateLimited);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        // The body is kept verbatim but must at least be JSON
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .map_err(|e| UpstreamError::Transport(format!("invalid upstream JSON: {e}")))?;

        Ok(CachedPayload::json(bytes.to_vec()))
    }
}
