use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, B256};
use bon::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use crate::chain::{Chain, Network};
use crate::error::{Result, VaaError};
use crate::payload::{payload_registry, PayloadRegistry};
use crate::providers::TokioClock;
use crate::spans;
use crate::traits::{ChainContext, CircleAttestationProvider, Clock, VaaProvider};
use crate::vaa::{PayloadSelector, Vaa, WormholeMessageId};

use super::poll::poll_until_ready;
use super::{PollingConfig, TransactionId};

/// Everything a transfer needs: chains, attestation sources, time and polling policy.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use vaa_rs::providers::WormholescanVaaProvider;
/// use vaa_rs::{Network, PollingConfig, Wormhole};
///
/// # fn example() -> vaa_rs::Result<()> {
/// let wormhole = Wormhole::builder()
///     .network(Network::Testnet)
///     .vaa_provider(Arc::new(WormholescanVaaProvider::for_network(Network::Testnet)?))
///     .polling(PollingConfig::from_env()?)
///     .build();
/// assert!(wormhole.chain(vaa_rs::Chain::Sepolia).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Builder)]
pub struct Wormhole {
    #[builder(default)]
    network: Network,
    #[builder(default)]
    chains: Vec<Arc<dyn ChainContext>>,
    vaa_provider: Arc<dyn VaaProvider>,
    circle_attestation_provider: Option<Arc<dyn CircleAttestationProvider>>,
    #[builder(default = Arc::new(TokioClock::new()) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
    /// Polling of guardian-signed VAAs
    #[builder(default)]
    polling: PollingConfig,
    /// Polling of Circle attestations, which take minutes rather than seconds
    #[builder(default = PollingConfig::circle_attestation())]
    circle_polling: PollingConfig,
    #[builder(default = payload_registry())]
    registry: Arc<PayloadRegistry>,
    /// Parent of every transfer's cancellation token
    #[builder(default)]
    cancellation: CancellationToken,
}

impl fmt::Debug for Wormhole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wormhole")
            .field("network", &self.network)
            .field("chains", &self.chains().collect::<Vec<_>>())
            .field("polling", &self.polling)
            .field("circle_polling", &self.circle_polling)
            .finish_non_exhaustive()
    }
}

impl Wormhole {
    pub fn network(&self) -> Network {
        self.network
    }

    /// Chains with a configured context, in configuration order.
    pub fn chains(&self) -> impl Iterator<Item = Chain> + '_ {
        self.chains.iter().map(|context| context.chain())
    }

    pub fn chain(&self, chain: Chain) -> Result<Arc<dyn ChainContext>> {
        self.chains
            .iter()
            .find(|context| context.chain() == chain)
            .cloned()
            .ok_or_else(|| VaaError::ChainNotSupported {
                chain: chain.to_string(),
            })
    }

    pub fn registry(&self) -> &Arc<PayloadRegistry> {
        &self.registry
    }

    pub fn polling(&self) -> PollingConfig {
        self.polling
    }

    pub fn circle_polling(&self) -> PollingConfig {
        self.circle_polling
    }

    /// Cancelling this token aborts every pending attestation poll.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Polls the VAA provider until the signed VAA for `id` is available.
    pub async fn get_vaa_bytes(&self, id: &WormholeMessageId, timeout: Option<Duration>) -> Result<Bytes> {
        self.poll_vaa_bytes(id, timeout, &self.cancellation)
            .instrument(spans::get_vaa(
                id,
                self.polling.max_attempts,
                self.polling.poll_interval_secs,
            ))
            .await
    }

    /// Polls for the VAA of `id` and decodes it with this context's registry.
    pub async fn get_vaa<'a>(
        &self,
        id: &WormholeMessageId,
        selector: impl Into<PayloadSelector<'a>>,
        timeout: Option<Duration>,
    ) -> Result<Vaa> {
        self.fetch_vaa(id, selector.into(), timeout, &self.cancellation)
            .await
    }

    pub(crate) async fn fetch_vaa(
        &self,
        id: &WormholeMessageId,
        selector: PayloadSelector<'_>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Vaa> {
        let span = spans::get_vaa(id, self.polling.max_attempts, self.polling.poll_interval_secs);
        async {
            let bytes = self.poll_vaa_bytes(id, timeout, cancel).await?;
            let vaa = Vaa::deserialize_with(&self.registry, selector, &bytes).map_err(|e| {
                spans::record_error(&e);
                error!(error = %e, vaa_length_bytes = bytes.len(), event = "vaa_decode_failed");
                e
            })?;
            info!(
                payload = %vaa.payload_literal(),
                guardian_set = vaa.guardian_set(),
                signatures = vaa.signatures().len(),
                event = "vaa_fetched"
            );
            Ok(vaa)
        }
        .instrument(span)
        .await
    }

    async fn poll_vaa_bytes(
        &self,
        id: &WormholeMessageId,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        poll_until_ready(self.clock.as_ref(), &self.polling, timeout, cancel, |_| {
            self.vaa_provider.get_vaa_bytes(id)
        })
        .await
    }

    /// Polls Circle's attestation service for the message with hash `message_hash`.
    pub async fn get_circle_attestation(&self, message_hash: B256, timeout: Option<Duration>) -> Result<Bytes> {
        self.fetch_circle_attestation(message_hash, timeout, &self.cancellation)
            .await
    }

    pub(crate) async fn fetch_circle_attestation(
        &self,
        message_hash: B256,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let provider = self.circle_attestation_provider.as_ref().ok_or_else(|| {
            VaaError::InvalidConfig("no Circle attestation provider configured".to_string())
        })?;
        let span = spans::get_circle_attestation(
            &message_hash,
            self.circle_polling.max_attempts,
            self.circle_polling.poll_interval_secs,
        );
        async {
            let attestation = poll_until_ready(
                self.clock.as_ref(),
                &self.circle_polling,
                timeout,
                cancel,
                |_| provider.get_circle_attestation(message_hash),
            )
            .await?;
            info!(
                attestation_length_bytes = attestation.len(),
                event = "circle_attestation_fetched"
            );
            Ok(attestation)
        }
        .instrument(span)
        .await
    }

    /// Wormhole messages emitted in `txid`.
    pub async fn parse_message_ids(&self, txid: &TransactionId) -> Result<Vec<WormholeMessageId>> {
        let context = self.chain(txid.chain)?;
        async {
            let ids = context.parse_transaction(txid).await.map_err(|e| {
                spans::record_error(&e);
                error!(error = %e, event = "transaction_parse_failed");
                e
            })?;
            info!(messages = ids.len(), event = "message_ids_parsed");
            Ok(ids)
        }
        .instrument(spans::parse_transaction(txid))
        .await
    }

    /// Raw Circle messages emitted in `txid`.
    pub async fn parse_circle_messages(&self, txid: &TransactionId) -> Result<Vec<Bytes>> {
        let context = self.chain(txid.chain)?;
        async {
            let messages = context.parse_circle_transaction(txid).await.map_err(|e| {
                spans::record_error(&e);
                error!(error = %e, event = "transaction_parse_failed");
                e
            })?;
            info!(messages = messages.len(), event = "circle_messages_parsed");
            Ok(messages)
        }
        .instrument(spans::parse_transaction(txid))
        .await
    }
}
