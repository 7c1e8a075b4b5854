//! EVM chain context backed by an Alloy provider.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::Provider;
use alloy_rpc_types::Log;
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use bon::Builder;
use tracing::{debug, error, instrument};

use crate::address::UniversalAddress;
use crate::chain::Chain;
use crate::error::{Result, VaaError};
use crate::spans;
use crate::traits::{
    not_supported, AutomaticCircleBridgeClient, AutomaticTokenBridgeClient, ChainContext,
    CircleBridgeClient, TokenBridgeClient,
};
use crate::transfer::TransactionId;
use crate::vaa::WormholeMessageId;

sol! {
    /// Emitted by the Wormhole core bridge for every published message.
    event LogMessagePublished(
        address indexed sender,
        uint64 sequence,
        uint32 nonce,
        bytes payload,
        uint8 consistencyLevel
    );

    /// Emitted by Circle's MessageTransmitter for every CCTP message.
    event MessageSent(bytes message);
}

/// An EVM chain: receipts come from `provider`, bridge clients are injected.
///
/// # Examples
///
/// ```rust,no_run
/// use alloy_primitives::address;
/// use alloy_provider::ProviderBuilder;
/// use vaa_rs::providers::EvmChainContext;
/// use vaa_rs::Chain;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = ProviderBuilder::new().connect("http://localhost:8545").await?;
/// let ethereum = EvmChainContext::builder()
///     .chain(Chain::Ethereum)
///     .provider(provider)
///     .core_bridge(address!("98f3c9e6E3fAce36bAAd05FE09d375Ef1464288B"))
///     .message_transmitter(address!("0a992d191DEeC32aFe36203Ad87D7d289a738F81"))
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Builder)]
pub struct EvmChainContext<P> {
    chain: Chain,
    provider: P,
    core_bridge: Address,
    message_transmitter: Option<Address>,
    token_bridge: Option<Arc<dyn TokenBridgeClient>>,
    automatic_token_bridge: Option<Arc<dyn AutomaticTokenBridgeClient>>,
    circle_bridge: Option<Arc<dyn CircleBridgeClient>>,
    automatic_circle_bridge: Option<Arc<dyn AutomaticCircleBridgeClient>>,
}

impl<P> fmt::Debug for EvmChainContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmChainContext")
            .field("chain", &self.chain)
            .field("core_bridge", &self.core_bridge)
            .field("message_transmitter", &self.message_transmitter)
            .finish_non_exhaustive()
    }
}

impl<P> EvmChainContext<P>
where
    P: Provider + Send + Sync,
{
    /// Returns a reference to the underlying Alloy provider.
    pub fn inner(&self) -> &P {
        &self.provider
    }

    async fn receipt_logs(&self, txid: &TransactionId) -> Result<Vec<Log>> {
        if txid.chain != self.chain {
            return Err(VaaError::InvalidTransfer(format!(
                "transaction {txid} is not on {}",
                self.chain
            )));
        }
        let hash: B256 = txid.txid.parse()?;
        let receipt = self.provider.get_transaction_receipt(hash).await.map_err(|e| {
            spans::record_error_with_context(
                "ReceiptRetrievalFailed",
                &format!("Failed to get transaction receipt: {e}"),
                Some("RPC call to get_transaction_receipt failed"),
            );
            error!(error = %e, event = "transaction_receipt_retrieval_failed");
            VaaError::from(e)
        })?;

        match receipt {
            Some(receipt) => Ok(receipt.inner.logs().to_vec()),
            None => {
                error!(event = "transaction_not_found");
                Err(VaaError::TransactionFailed {
                    reason: format!("transaction {txid} not found"),
                })
            }
        }
    }
}

#[async_trait]
impl<P> ChainContext for EvmChainContext<P>
where
    P: Provider + Send + Sync,
{
    fn chain(&self) -> Chain {
        self.chain
    }

    fn token_bridge(&self) -> Result<Arc<dyn TokenBridgeClient>> {
        self.token_bridge
            .clone()
            .ok_or_else(|| not_supported("TokenBridge", self.chain))
    }

    fn automatic_token_bridge(&self) -> Result<Arc<dyn AutomaticTokenBridgeClient>> {
        self.automatic_token_bridge
            .clone()
            .ok_or_else(|| not_supported("AutomaticTokenBridge", self.chain))
    }

    fn circle_bridge(&self) -> Result<Arc<dyn CircleBridgeClient>> {
        self.circle_bridge
            .clone()
            .ok_or_else(|| not_supported("CircleBridge", self.chain))
    }

    fn automatic_circle_bridge(&self) -> Result<Arc<dyn AutomaticCircleBridgeClient>> {
        self.automatic_circle_bridge
            .clone()
            .ok_or_else(|| not_supported("AutomaticCircleBridge", self.chain))
    }

    #[instrument(skip(self), fields(txid = %txid))]
    async fn parse_transaction(&self, txid: &TransactionId) -> Result<Vec<WormholeMessageId>> {
        let logs = self.receipt_logs(txid).await?;
        message_ids_from_logs(self.chain, self.core_bridge, &logs)
    }

    #[instrument(skip(self), fields(txid = %txid))]
    async fn parse_circle_transaction(&self, txid: &TransactionId) -> Result<Vec<Bytes>> {
        let transmitter = self
            .message_transmitter
            .ok_or_else(|| not_supported("CircleBridge", self.chain))?;
        let logs = self.receipt_logs(txid).await?;
        circle_messages_from_logs(transmitter, &logs)
    }
}

/// Ids of the Wormhole messages `core_bridge` published in `logs`, in log order.
pub fn message_ids_from_logs(chain: Chain, core_bridge: Address, logs: &[Log]) -> Result<Vec<WormholeMessageId>> {
    let ids = logs
        .iter()
        .filter(|log| log.address() == core_bridge && has_topic(log, LogMessagePublished::SIGNATURE_HASH))
        .map(|log| -> Result<WormholeMessageId> {
            let event = LogMessagePublished::decode_log_data(log.data())?;
            Ok(WormholeMessageId {
                chain,
                emitter: UniversalAddress::from(event.sender),
                sequence: event.sequence,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(available_logs = logs.len(), messages = ids.len(), event = "message_ids_extracted");
    Ok(ids)
}

fn circle_messages_from_logs(transmitter: Address, logs: &[Log]) -> Result<Vec<Bytes>> {
    let messages = logs
        .iter()
        .filter(|log| log.address() == transmitter && has_topic(log, MessageSent::SIGNATURE_HASH))
        .map(|log| -> Result<Bytes> { Ok(MessageSent::decode_log_data(log.data())?.message) })
        .collect::<Result<Vec<_>>>()?;
    debug!(available_logs = logs.len(), messages = messages.len(), event = "circle_messages_extracted");
    Ok(messages)
}

fn has_topic(log: &Log, topic: B256) -> bool {
    log.topics().first().is_some_and(|first| *first == topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const CORE: Address = address!("98f3c9e6E3fAce36bAAd05FE09d375Ef1464288B");
    const TRANSMITTER: Address = address!("0a992d191DEeC32aFe36203Ad87D7d289a738F81");

    fn log(address: Address, data: alloy_primitives::LogData) -> Log {
        Log {
            inner: alloy_primitives::Log { address, data },
            ..Default::default()
        }
    }

    fn published(sender: Address, sequence: u64) -> alloy_primitives::LogData {
        LogMessagePublished {
            sender,
            sequence,
            nonce: 0,
            payload: Bytes::from_static(b"hello"),
            consistencyLevel: 1,
        }
        .encode_log_data()
    }

    #[test]
    fn test_message_ids_in_log_order() {
        let sender = address!("3ee18B2214AFF97000D974cf647E7C347E8fa585");
        let logs = vec![
            log(CORE, published(sender, 9)),
            // same event from a contract that is not the core bridge
            log(TRANSMITTER, published(sender, 1)),
            log(
                TRANSMITTER,
                MessageSent {
                    message: Bytes::from_static(b"cctp"),
                }
                .encode_log_data(),
            ),
            log(CORE, published(sender, 10)),
        ];

        let ids = message_ids_from_logs(Chain::Ethereum, CORE, &logs).unwrap();
        let sequences: Vec<u64> = ids.iter().map(|id| id.sequence).collect();
        assert_eq!(sequences, vec![9, 10]);
        assert_eq!(ids[0].emitter, UniversalAddress::from(sender));
        assert_eq!(ids[0].chain, Chain::Ethereum);

        let messages = circle_messages_from_logs(TRANSMITTER, &logs).unwrap();
        assert_eq!(messages, vec![Bytes::from_static(b"cctp")]);
    }

    #[test]
    fn test_no_messages() {
        let logs = vec![log(
            CORE,
            alloy_primitives::LogData::new_unchecked(vec![B256::from(U256::from(1))], Bytes::new()),
        )];
        assert!(message_ids_from_logs(Chain::Ethereum, CORE, &logs)
            .unwrap()
            .is_empty());
    }
}
