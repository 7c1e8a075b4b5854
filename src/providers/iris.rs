//! Circle Iris API attestation provider.

use alloy_primitives::{hex::FromHex, Bytes, B256};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument, trace, Instrument};
use url::Url;

use super::{api_url, circle_iris_url};
use crate::chain::Network;
use crate::error::{Result, VaaError};
use crate::spans;
use crate::traits::CircleAttestationProvider;

const DEFAULT_RETRY_AFTER_SECS: u64 = 300;

/// Fetches CCTP attestations from Circle's Iris API.
///
/// # Examples
///
/// ```rust,no_run
/// use alloy_primitives::B256;
/// use vaa_rs::providers::IrisAttestationProvider;
/// use vaa_rs::traits::CircleAttestationProvider;
/// use vaa_rs::Network;
///
/// # async fn example() -> vaa_rs::Result<()> {
/// let provider = IrisAttestationProvider::for_network(Network::Testnet)?;
/// let attestation = provider.get_circle_attestation(B256::ZERO).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IrisAttestationProvider {
    base_url: Url,
    client: Client,
}

impl IrisAttestationProvider {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Production API on mainnet, sandbox on testnet; `CIRCLE_IRIS_API_URL` overrides both.
    pub fn for_network(network: Network) -> Result<Self> {
        Ok(Self::new(circle_iris_url(network)?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn attestation_url(&self, message_hash: B256) -> Result<Url> {
        let hash = message_hash.to_string();
        api_url(&self.base_url, ["v1", "attestations", hash.as_str()])
    }
}

#[async_trait]
impl CircleAttestationProvider for IrisAttestationProvider {
    #[instrument(skip(self), fields(message_hash = %message_hash))]
    async fn get_circle_attestation(&self, message_hash: B256) -> Result<Option<Bytes>> {
        let url = self.attestation_url(message_hash)?;
        trace!(url = %url, "Requesting attestation from Iris API");

        let response = self
            .client
            .get(url.clone())
            .send()
            .instrument(spans::http_request("GET", &url))
            .await
            .map_err(VaaError::Network)?;
        let status = response.status();
        trace!(status_code = %status, "Received response from Iris API");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            debug!(retry_after_seconds, "Rate limited by Iris API");
            return Err(VaaError::RateLimitExceeded {
                retry_after_seconds,
            });
        }

        // Iris does not know the message until the burn is indexed
        if status == StatusCode::NOT_FOUND {
            debug!("Attestation not found");
            return Ok(None);
        }

        response.error_for_status_ref()?;
        let attestation: AttestationResponse = response.json().await.map_err(VaaError::Network)?;
        debug!(status = ?attestation.status, "Attestation response parsed");
        attestation.into_ready()
    }
}

/// Body of `GET /v1/attestations/{hash}`
///
/// **API Quirk**: Iris sometimes returns the string `"PENDING"` for the
/// attestation field instead of `null` while the attestation is not ready.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationResponse {
    status: AttestationStatus,
    #[serde(default, deserialize_with = "deserialize_optional_bytes_or_pending")]
    attestation: Option<Bytes>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum AttestationStatus {
    Complete,
    Pending,
    PendingConfirmations,
    Failed,
}

impl AttestationResponse {
    fn into_ready(self) -> Result<Option<Bytes>> {
        match self.status {
            AttestationStatus::Complete => Ok(self.attestation),
            AttestationStatus::Pending | AttestationStatus::PendingConfirmations => Ok(None),
            AttestationStatus::Failed => Err(VaaError::AttestationFailed {
                reason: "Circle reported the attestation as failed".to_string(),
            }),
        }
    }
}

/// Hex with or without `0x` → `Some`; null, missing, empty or "PENDING" → `None`.
fn deserialize_optional_bytes_or_pending<'de, D>(deserializer: D) -> std::result::Result<Option<Bytes>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;

    match opt {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("pending") => Ok(None),
        Some(s) => {
            let bytes = Bytes::from_hex(s).map_err(serde::de::Error::custom)?;
            Ok(Some(bytes))
        }
    }
}
