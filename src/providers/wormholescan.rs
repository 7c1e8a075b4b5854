//! Wormholescan API VAA provider.

use alloy_primitives::{hex, Bytes};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, trace, Instrument};
use url::Url;

use super::{api_url, wormholescan_url};
use crate::chain::Network;
use crate::error::{Result, VaaError};
use crate::spans;
use crate::traits::VaaProvider;
use crate::vaa::WormholeMessageId;

/// Seconds to back off when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 300;

/// Fetches signed VAAs from Wormholescan.
///
/// # Examples
///
/// ```rust,no_run
/// use vaa_rs::providers::WormholescanVaaProvider;
/// use vaa_rs::traits::VaaProvider;
/// use vaa_rs::{Chain, Network, UniversalAddress, WormholeMessageId};
///
/// # async fn example() -> vaa_rs::Result<()> {
/// let provider = WormholescanVaaProvider::for_network(Network::Mainnet)?;
/// let id = WormholeMessageId {
///     chain: Chain::Sui,
///     emitter: "0xccceeb29348f71bdd22ffef43a2a19c1f5b5e17c5cca5411529120182672ade5".parse()?,
///     sequence: 196_444,
/// };
/// let vaa = provider.get_vaa_bytes(&id).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WormholescanVaaProvider {
    base_url: Url,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedVaaResponse {
    vaa_bytes: String,
}

impl WormholescanVaaProvider {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Provider for the public API of `network`, honoring `WORMHOLESCAN_API_URL`.
    pub fn for_network(network: Network) -> Result<Self> {
        Ok(Self::new(wormholescan_url(network)?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/v1/signed_vaa/{chain}/{emitter}/{sequence}`, emitter as bare hex.
    fn vaa_url(&self, id: &WormholeMessageId) -> Result<Url> {
        let chain = id.chain.as_u16().to_string();
        let emitter = hex::encode(id.emitter.as_bytes());
        let sequence = id.sequence.to_string();
        api_url(&self.base_url, ["v1", "signed_vaa", &chain, &emitter, &sequence])
    }
}

#[async_trait]
impl VaaProvider for WormholescanVaaProvider {
    #[instrument(skip(self), fields(message_id = %id))]
    async fn get_vaa_bytes(&self, id: &WormholeMessageId) -> Result<Option<Bytes>> {
        let url = self.vaa_url(id)?;
        trace!(url = %url, "Requesting signed VAA from Wormholescan");

        let response = self
            .client
            .get(url.clone())
            .send()
            .instrument(spans::http_request("GET", &url))
            .await
            .map_err(VaaError::Network)?;
        let status = response.status();
        trace!(status_code = %status, "Received response from Wormholescan");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            debug!(retry_after_seconds, "Rate limited by Wormholescan");
            return Err(VaaError::RateLimitExceeded {
                retry_after_seconds,
            });
        }

        // the guardians have not signed it yet
        if status == StatusCode::NOT_FOUND {
            debug!("VAA not found");
            return Ok(None);
        }

        response.error_for_status_ref()?;
        let body: SignedVaaResponse = response.json().await.map_err(VaaError::Network)?;
        decode_vaa_bytes(&body).map(Some)
    }
}

fn decode_vaa_bytes(body: &SignedVaaResponse) -> Result<Bytes> {
    let bytes = STANDARD.decode(body.vaa_bytes.trim())?;
    debug!(vaa_length_bytes = bytes.len(), "Signed VAA decoded");
    Ok(bytes.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::UniversalAddress;
    use crate::chain::Chain;

    #[test]
    fn test_vaa_url() {
        let provider =
            WormholescanVaaProvider::new(Url::parse(super::super::WORMHOLESCAN_MAINNET_URL).unwrap());
        let id = WormholeMessageId {
            chain: Chain::Sui,
            emitter: UniversalAddress::new([0xab; 32]),
            sequence: 196_444,
        };
        insta::assert_snapshot!(
            provider.vaa_url(&id).unwrap(),
            @"https://api.wormholescan.io/v1/signed_vaa/21/abababababababababababababababababababababababababababababababab/196444"
        );
    }

    #[test]
    fn test_decode_response() {
        let body: SignedVaaResponse =
            serde_json::from_str(r#"{"vaaBytes":"AQAAAAQN","id":"21/ab/1"}"#).unwrap();
        assert_eq!(
            decode_vaa_bytes(&body).unwrap(),
            Bytes::from_static(&[0x01, 0x00, 0x00, 0x00, 0x04, 0x0d])
        );
    }

    #[test]
    fn test_invalid_base64() {
        let body = SignedVaaResponse {
            vaa_bytes: "not base64!".to_string(),
        };
        assert!(matches!(decode_vaa_bytes(&body), Err(VaaError::Base64(_))));
    }
}
