//! HTTP discovery endpoints of a debug port.
//!
//! Wraps `GET /json/version` (liveness, browser endpoint) and
//! `GET /json/list` (attachable targets) using [`reqwest`].

use std::time::Duration;

use crate::error::CdpError;
use crate::messages::{TargetInfo, VersionInfo};

/// Upper bound on a single discovery request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for one local debug port.
#[derive(Debug, Clone)]
pub struct CdpApi {
    client: reqwest::Client,
    port: u16,
}

impl CdpApi {
    pub fn new(port: u16) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    /// Browser version and browser-level WebSocket endpoint.
    pub async fn version(&self) -> Result<VersionInfo, CdpError> {
        self.get_json("/json/version").await
    }

    /// All targets currently exposed on the port.
    pub async fn targets(&self) -> Result<Vec<TargetInfo>, CdpError> {
        self.get_json("/json/list").await
    }

    /// First page target that can be attached to.
    pub async fn page_target(&self) -> Result<TargetInfo, CdpError> {
        self.targets()
            .await?
            .into_iter()
            .find(TargetInfo::is_attachable_page)
            .ok_or(CdpError::NoTarget { port: self.port })
    }

    /// Whether something answering like a debug port listens here.
    /// Never fails.
    pub async fn probe(&self) -> bool {
        match self.version().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(port = self.port, error = %e, "Debug port probe failed");
                false
            }
        }
    }

    // ---- private helpers ----

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, CdpError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CdpError::Protocol(format!(
                "GET {path} on port {} returned {status}",
                self.port
            )));
        }
        Ok(response.json::<T>().await?)
    }

    fn map_request_error(&self, err: reqwest::Error) -> CdpError {
        if err.is_connect() {
            CdpError::ConnectionRefused { port: self.port }
        } else {
            CdpError::Http(err)
        }
    }
}
