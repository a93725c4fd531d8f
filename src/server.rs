//! Consumed server endpoints.
//!
//! The verification subsystem consumes two endpoints on the authoritative
//! server:
//!
//! - **Verify**: `POST {base}/api/tickets/verify` with
//!   `{qrPayload, deviceId}`, answering `{valid, ticket?, error?, fraudReason?}`.
//! - **Sync**: `POST {base}/api/tickets/sync` with a serialized
//!   [`OfflineVerificationEvent`]; any 2xx means accepted (or already
//!   absorbed by the idempotency key).
//!
//! [`VerifyApi`] is the port; [`HttpVerifyApi`] is the production `reqwest`
//! implementation. Transport failures and non-2xx statuses surface as
//! [`VerifyError::Network`], which the coordinator treats as "fall back to
//! offline", never as a scan rejection.

use crate::error::{Result, VerifyError};
use crate::types::{OfflineVerificationEvent, Ticket};
use serde::{Deserialize, Serialize};

/// Request body for the server verify endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Raw scanned token, exactly as read from the QR code.
    pub qr_payload: String,
    /// Device performing the scan.
    pub device_id: String,
}

/// Response body from the server verify endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the server accepted the scan.
    pub valid: bool,
    /// The authoritative ticket record, present on acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    /// Rejection code, present when `valid` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Fraud-specific rejection code; takes precedence over `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_reason: Option<String>,
}

/// Port for the authoritative verification server.
pub trait VerifyApi: Send + Sync {
    /// Submit a scan for online verification.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Network`] on transport failure or an
    /// uninterpretable response; the coordinator falls back to offline
    /// verification in that case.
    fn verify_scan(
        &self,
        request: &VerifyRequest,
    ) -> impl std::future::Future<Output = Result<VerifyResponse>> + Send;

    /// Replay one offline verification event.
    ///
    /// The server deduplicates on the `(ticketId, timestamp)` idempotency
    /// key, so at-least-once submission is safe.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Network`] on transport failure or a non-2xx
    /// status; the event stays queued for the next sync window.
    fn submit_boarding(
        &self,
        event: &OfflineVerificationEvent,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// `reqwest`-backed implementation of [`VerifyApi`].
#[derive(Debug, Clone)]
pub struct HttpVerifyApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVerifyApi {
    /// Create an API client for the given base URL (no trailing slash).
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Use a preconfigured `reqwest` client (custom TLS, proxies, etc.).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl VerifyApi for HttpVerifyApi {
    async fn verify_scan(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        let response = self
            .client
            .post(self.url("/api/tickets/verify"))
            .json(request)
            .send()
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::Network(format!(
                "verify endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<VerifyResponse>()
            .await
            .map_err(|e| VerifyError::Network(format!("unreadable verify response: {e}")))
    }

    async fn submit_boarding(&self, event: &OfflineVerificationEvent) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/tickets/sync"))
            .json(event)
            .send()
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::Network(format!(
                "sync endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
