use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::chain::{Chain, ChainAddress};
use crate::error::{Result, VaaError};
use crate::protocol::circle::{CircleMessage, DomainId};
use crate::protocol::circle_integration;
use crate::spans;
use crate::traits::{CircleTransferRequest, Signer};
use crate::vaa::WormholeMessageId;

use super::{
    require_signer_chain, require_state, sign_send_wait, AttestationId, TokenAddress,
    TransactionId, TransferAttestation, TransferDetails, TransferState, Wormhole,
    WormholeTransfer,
};

const KIND: &str = "CircleTransfer";

/// A CCTP message emitted on the source chain and, once issued, Circle's
/// attestation of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleAttestation {
    pub message: Bytes,
    /// keccak256 of `message`, the key of the attestation service
    pub message_hash: B256,
    pub attestation: Option<Bytes>,
}

impl CircleAttestation {
    pub fn pending(message: Bytes) -> Result<Self> {
        let (_, message_hash) = CircleMessage::deserialize(&message)?;
        Ok(Self {
            message,
            message_hash,
            attestation: None,
        })
    }
}

/// A USDC transfer over CCTP.
///
/// Manual transfers wait for Circle's attestation and mint on the destination
/// chain with [`complete_transfer`](WormholeTransfer::complete_transfer).
/// Automatic transfers go through the Wormhole Circle integration: the burn
/// is wrapped in a VAA and a relayer mints, so completing them here fails.
pub struct CircleTransfer {
    wormhole: Arc<Wormhole>,
    details: TransferDetails,
    state: TransferState,
    txids: Vec<TransactionId>,
    /// Circle messages of a manual transfer
    messages: Vec<CircleAttestation>,
    /// Circle integration VAAs of an automatic transfer
    vaas: Vec<TransferAttestation>,
    redeemed: usize,
    cancel: CancellationToken,
}

impl CircleTransfer {
    pub fn new(wormhole: Arc<Wormhole>, details: TransferDetails) -> Result<Self> {
        details.validate()?;
        if !details.automatic() && details.payload().is_some() {
            return Err(VaaError::InvalidTransfer(
                "manual Circle transfers cannot carry a payload".to_string(),
            ));
        }
        let from = details.from().chain;
        let to = details.to().chain;
        require_domain(from)?;
        require_domain(to)?;

        let source = wormhole.chain(from)?;
        wormhole.chain(to)?;
        if details.automatic() {
            source.automatic_circle_bridge()?;
        } else {
            source.circle_bridge()?;
        }
        Ok(Self::with_state(wormhole, details, TransferState::Created))
    }

    /// Rebuilds an automatic transfer from its Circle integration message.
    pub async fn from_message_id(
        wormhole: Arc<Wormhole>,
        id: WormholeMessageId,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let vaa = wormhole.get_vaa(&id, circle_integration::literal(), timeout).await?;
        let payload = vaa.payload();
        let network = wormhole.network();
        let (source_domain, _) = circle_integration::circle_message_key(payload).ok_or_else(|| {
            VaaError::InvalidTransfer("Circle integration payload has no known source domain".to_string())
        })?;
        let target_domain = u32::try_from(payload.u64_field("targetDomain")?)
            .map_err(|_| VaaError::InvalidTransfer("target domain out of range".to_string()))
            .and_then(DomainId::try_from)?;
        let token = payload.field("token")?;

        let details = TransferDetails::builder()
            .token(TokenAddress::Token(token.address_field("address")?))
            .amount(token.u256_field("amount")?)
            .from(ChainAddress::new(
                source_domain.chain(network),
                payload.address_field("caller")?,
            ))
            .to(ChainAddress::new(
                target_domain.chain(network),
                payload.address_field("mintRecipient")?,
            ))
            .automatic(true)
            .build();
        info!(message_id = %id, event = "transfer_recovered");

        let mut transfer = Self::with_state(wormhole, details, TransferState::Attested);
        transfer.vaas.push(TransferAttestation { id, vaa: Some(vaa) });
        Ok(transfer)
    }

    /// Rebuilds a transfer from its source transaction.
    ///
    /// A transaction that emitted a Wormhole message is taken as an automatic
    /// transfer. Otherwise its CCTP messages are decoded and their
    /// attestations fetched, which bounds the call by `timeout`.
    pub async fn from_transaction(
        wormhole: Arc<Wormhole>,
        txid: TransactionId,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let ids = wormhole.parse_message_ids(&txid).await?;
        if let Some(id) = ids.first().copied() {
            let mut transfer = Self::from_message_id(wormhole, id, timeout).await?;
            transfer.txids.push(txid);
            return Ok(transfer);
        }

        let raw = wormhole.parse_circle_messages(&txid).await?;
        let first = raw.first().ok_or_else(|| {
            VaaError::InvalidTransfer(format!("no Circle message emitted in {txid}"))
        })?;
        let (message, _) = CircleMessage::deserialize(first)?;
        let network = wormhole.network();
        let details = TransferDetails::builder()
            .token(TokenAddress::Token(message.payload.burn_token))
            .amount(message.payload.amount)
            .from(ChainAddress::new(
                message.source_domain.chain(network),
                message.payload.message_sender,
            ))
            .to(ChainAddress::new(
                message.destination_domain.chain(network),
                message.payload.mint_recipient,
            ))
            .build();

        let mut transfer = Self::with_state(wormhole, details, TransferState::Initiated);
        transfer.txids.push(txid);
        transfer.messages = raw
            .into_iter()
            .map(CircleAttestation::pending)
            .collect::<Result<_>>()?;
        transfer.fetch_attestation(timeout).await?;
        Ok(transfer)
    }

    fn with_state(wormhole: Arc<Wormhole>, details: TransferDetails, state: TransferState) -> Self {
        let cancel = wormhole.cancellation_token().child_token();
        Self {
            wormhole,
            details,
            state,
            txids: Vec::new(),
            messages: Vec::new(),
            vaas: Vec::new(),
            redeemed: 0,
            cancel,
        }
    }

    /// Circle messages of a manual transfer, in emission order.
    pub fn circle_attestations(&self) -> &[CircleAttestation] {
        &self.messages
    }

    /// Circle integration VAAs of an automatic transfer.
    pub fn attestations(&self) -> &[TransferAttestation] {
        &self.vaas
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn last_txid(&self) -> Result<TransactionId> {
        self.txids.last().cloned().ok_or_else(|| {
            VaaError::InvalidTransfer("transfer has no source transaction".to_string())
        })
    }

    async fn parse_messages(&mut self) -> Result<()> {
        let last = self.last_txid()?;
        if self.details.automatic() {
            let ids = self.wormhole.parse_message_ids(&last).await?;
            if ids.is_empty() {
                return Err(no_message(&last));
            }
            self.vaas = ids.into_iter().map(TransferAttestation::pending).collect();
        } else {
            let raw = self.wormhole.parse_circle_messages(&last).await?;
            if raw.is_empty() {
                return Err(no_message(&last));
            }
            self.messages = raw
                .into_iter()
                .map(CircleAttestation::pending)
                .collect::<Result<_>>()?;
        }
        Ok(())
    }

    async fn fetch_circle_attestations(&mut self, timeout: Option<Duration>) -> Result<()> {
        let wormhole = Arc::clone(&self.wormhole);
        let cancel = self.cancel.clone();
        let fetches = self.messages.iter().map(|message| {
            let wormhole = &wormhole;
            let cancel = &cancel;
            async move {
                match &message.attestation {
                    Some(attestation) => Ok(attestation.clone()),
                    None => {
                        wormhole
                            .fetch_circle_attestation(message.message_hash, timeout, cancel)
                            .await
                    }
                }
            }
        });
        let attestations = try_join_all(fetches).await?;
        for (message, attestation) in self.messages.iter_mut().zip(attestations) {
            message.attestation = Some(attestation);
        }
        Ok(())
    }

    async fn fetch_vaas(&mut self, timeout: Option<Duration>) -> Result<()> {
        let wormhole = Arc::clone(&self.wormhole);
        let cancel = self.cancel.clone();
        let fetches = self.vaas.iter().map(|attestation| {
            let wormhole = &wormhole;
            let cancel = &cancel;
            async move {
                match &attestation.vaa {
                    Some(vaa) => Ok(vaa.clone()),
                    None => {
                        wormhole
                            .fetch_vaa(
                                &attestation.id,
                                circle_integration::literal().into(),
                                timeout,
                                cancel,
                            )
                            .await
                    }
                }
            }
        });
        let vaas = try_join_all(fetches).await?;
        for (attestation, vaa) in self.vaas.iter_mut().zip(vaas) {
            attestation.vaa = Some(vaa);
        }
        Ok(())
    }
}

#[async_trait]
impl WormholeTransfer for CircleTransfer {
    fn state(&self) -> TransferState {
        self.state
    }

    fn details(&self) -> &TransferDetails {
        &self.details
    }

    fn transactions(&self) -> &[TransactionId] {
        &self.txids
    }

    fn attestation_ids(&self) -> Vec<AttestationId> {
        if self.details.automatic() {
            self.vaas
                .iter()
                .map(|attestation| AttestationId::Wormhole(attestation.id))
                .collect()
        } else {
            self.messages
                .iter()
                .map(|message| AttestationId::Circle(message.message_hash))
                .collect()
        }
    }

    async fn initiate_transfer(&mut self, signer: &dyn Signer) -> Result<Vec<TransactionId>> {
        require_state("initiate", self.state, &[TransferState::Created])?;
        let from = self.details.from();
        let to = self.details.to();
        let span = spans::initiate_transfer(KIND, &from, &to, &self.details.amount());
        async {
            require_signer_chain(signer, from.chain)?;
            let source = self.wormhole.chain(from.chain)?;
            let request = CircleTransferRequest {
                sender: signer.address(),
                recipient: to,
                amount: self.details.amount(),
                payload: self.details.payload().cloned(),
                native_gas: self.details.native_gas(),
            };
            let txids = if self.details.automatic() {
                let client = source.automatic_circle_bridge()?;
                sign_send_wait(client.transfer(request), signer).await?
            } else {
                let client = source.circle_bridge()?;
                sign_send_wait(client.transfer(request), signer).await?
            };
            if txids.is_empty() {
                return Err(VaaError::TransactionFailed {
                    reason: "bridge produced no transactions".to_string(),
                });
            }

            self.txids.extend(txids.iter().cloned());
            self.state = TransferState::Initiated;
            info!(transactions = txids.len(), event = "transfer_initiated");

            self.parse_messages().await.map_err(|e| {
                spans::record_error(&e);
                e
            })?;
            Ok(txids)
        }
        .instrument(span)
        .await
    }

    async fn fetch_attestation(&mut self, timeout: Option<Duration>) -> Result<Vec<AttestationId>> {
        require_state(
            "fetch attestation",
            self.state,
            &[TransferState::Initiated, TransferState::Attested],
        )?;
        let pending = self.attestation_ids().len();
        async {
            if pending == 0 {
                self.parse_messages().await?;
            }
            if self.details.automatic() {
                self.fetch_vaas(timeout).await?;
            } else {
                self.fetch_circle_attestations(timeout).await?;
            }
            self.state = TransferState::Attested;
            let ids = self.attestation_ids();
            info!(attestations = ids.len(), event = "transfer_attested");
            Ok(ids)
        }
        .instrument(spans::fetch_attestation(KIND, pending))
        .await
    }

    async fn complete_transfer(&mut self, signer: &dyn Signer) -> Result<Vec<TransactionId>> {
        require_state(
            "complete",
            self.state,
            &[TransferState::Attested, TransferState::Redeemed],
        )?;
        if self.details.automatic() {
            return Err(VaaError::InvalidTransfer(
                "automatic Circle transfers are completed by the relayer".to_string(),
            ));
        }
        let to = self.details.to();
        let span = spans::complete_transfer(KIND, &to, self.messages.len());
        async {
            require_signer_chain(signer, to.chain)?;
            let client = self.wormhole.chain(to.chain)?.circle_bridge()?;
            let mut sent = Vec::new();

            for index in self.redeemed..self.messages.len() {
                let message = self.messages[index].clone();
                let attestation = message.attestation.ok_or(VaaError::InvalidStateTransition {
                    operation: "complete",
                    state: self.state,
                })?;
                let txids = sign_send_wait(
                    client.redeem(signer.address(), message.message, attestation),
                    signer,
                )
                .await?;

                self.txids.extend(txids.iter().cloned());
                sent.extend(txids);
                self.redeemed = index + 1;
                self.state = if self.redeemed == self.messages.len() {
                    TransferState::Completed
                } else {
                    TransferState::Redeemed
                };
                debug!(redeemed = self.redeemed, event = "attestation_redeemed");
            }

            info!(transactions = sent.len(), event = "transfer_completed");
            Ok(sent)
        }
        .instrument(span)
        .await
    }
}

fn require_domain(chain: Chain) -> Result<DomainId> {
    DomainId::from_chain(chain).ok_or_else(|| VaaError::ChainNotSupported {
        chain: format!("{chain} (no CCTP domain)"),
    })
}

fn no_message(txid: &TransactionId) -> VaaError {
    VaaError::TransactionFailed {
        reason: format!("no attestable message emitted in {txid}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::UniversalAddress;
    use crate::layout::Value;
    use crate::protocol::circle::BurnMessage;
    use crate::testing::{
        FakeChainContext, FakeCircleAttestationProvider, FakeCircleBridge, FakeClock,
        FakeResponse, FakeSigner, FakeVaaProvider,
    };
    use crate::traits::ChainContext;
    use crate::vaa::Vaa;
    use alloy_primitives::U256;

    const USDC: UniversalAddress = UniversalAddress::new([0xcc; 32]);

    struct Harness {
        wormhole: Arc<Wormhole>,
        vaas: FakeVaaProvider,
        iris: FakeCircleAttestationProvider,
        ethereum: FakeChainContext,
        base: FakeChainContext,
    }

    fn harness() -> Harness {
        let vaas = FakeVaaProvider::new();
        let iris = FakeCircleAttestationProvider::new();
        let ethereum = FakeChainContext::new(Chain::Ethereum)
            .with_circle_bridge(FakeCircleBridge::new(Chain::Ethereum));
        let base =
            FakeChainContext::new(Chain::Base).with_circle_bridge(FakeCircleBridge::new(Chain::Base));
        let wormhole = Wormhole::builder()
            .chains(vec![
                Arc::new(ethereum.clone()) as Arc<dyn ChainContext>,
                Arc::new(base.clone()),
                Arc::new(FakeChainContext::new(Chain::Bsc)),
            ])
            .vaa_provider(Arc::new(vaas.clone()))
            .circle_attestation_provider(Arc::new(iris.clone()))
            .clock(Arc::new(FakeClock::new()))
            .build();
        Harness {
            wormhole: Arc::new(wormhole),
            vaas,
            iris,
            ethereum,
            base,
        }
    }

    fn details(automatic: bool) -> TransferDetails {
        TransferDetails::builder()
            .token(TokenAddress::Token(USDC))
            .amount(U256::from(1_000_000u64))
            .from(ChainAddress::new(Chain::Ethereum, UniversalAddress::new([1; 32])))
            .to(ChainAddress::new(Chain::Base, UniversalAddress::new([2; 32])))
            .automatic(automatic)
            .build()
    }

    fn circle_message(nonce: u64) -> Bytes {
        CircleMessage {
            source_domain: DomainId::Ethereum,
            destination_domain: DomainId::Base,
            nonce,
            sender: UniversalAddress::new([0x11; 32]),
            recipient: UniversalAddress::new([0x22; 32]),
            destination_caller: UniversalAddress::ZERO,
            payload: BurnMessage {
                burn_token: USDC,
                mint_recipient: UniversalAddress::new([2; 32]),
                amount: U256::from(1_000_000u64),
                message_sender: UniversalAddress::new([1; 32]),
            },
        }
        .serialize()
        .unwrap()
        .into()
    }

    fn integration_vaa(id: WormholeMessageId) -> Bytes {
        let payload = Value::object([
            (
                "token",
                Value::object([
                    ("address", Value::Address(USDC)),
                    ("amount", Value::from(U256::from(1_000_000u64))),
                ]),
            ),
            ("sourceDomain", Value::Uint(0)),
            ("targetDomain", Value::Uint(6)),
            ("nonce", Value::Uint(5)),
            ("caller", Value::Address(UniversalAddress::new([1; 32]))),
            ("mintRecipient", Value::Address(UniversalAddress::new([2; 32]))),
            ("payload", Value::Bytes(Vec::new())),
        ]);
        Vaa::create()
            .payload_literal(circle_integration::literal())
            .payload(payload)
            .emitter_chain(id.chain)
            .emitter_address(id.emitter)
            .sequence(id.sequence)
            .build()
            .unwrap()
            .serialize()
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_manual_lifecycle() {
        let h = harness();
        let message = circle_message(1);
        let (_, hash) = CircleMessage::deserialize(&message).unwrap();
        h.ethereum.emit_circle_messages(vec![message.clone()]);
        h.iris.add_response_sequence(
            hash,
            vec![FakeResponse::Pending, FakeResponse::Ready(Bytes::from_static(&[0xaa; 65]))],
        );

        let mut transfer = CircleTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap();
        assert_eq!(transfer.attestation_ids(), vec![AttestationId::Circle(hash)]);

        transfer.fetch_attestation(None).await.unwrap();
        assert_eq!(transfer.state(), TransferState::Attested);
        assert_eq!(
            transfer.circle_attestations()[0].attestation.as_ref().map(|b| b.len()),
            Some(65)
        );

        transfer
            .complete_transfer(&FakeSigner::new(Chain::Base))
            .await
            .unwrap();
        assert_eq!(transfer.state(), TransferState::Completed);
        let redeemed = h.base.circle_bridge_fake().unwrap().redeemed();
        assert_eq!(redeemed, vec![(message, Bytes::from_static(&[0xaa; 65]))]);
    }

    #[tokio::test]
    async fn test_automatic_lifecycle_stops_at_attested() {
        let h = harness();
        let id = WormholeMessageId {
            chain: Chain::Ethereum,
            emitter: UniversalAddress::new([0xee; 32]),
            sequence: 77,
        };
        h.ethereum.emit_messages(vec![id]);
        h.vaas.add_vaa(id, integration_vaa(id));

        let mut transfer = CircleTransfer::new(h.wormhole.clone(), details(true)).unwrap();
        transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap();
        let ids = transfer.fetch_attestation(None).await.unwrap();
        assert_eq!(ids, vec![AttestationId::Wormhole(id)]);

        let err = transfer
            .complete_transfer(&FakeSigner::new(Chain::Base))
            .await
            .unwrap_err();
        assert!(matches!(err, VaaError::InvalidTransfer(_)));
        assert_eq!(transfer.state(), TransferState::Attested);
    }

    #[tokio::test]
    async fn test_from_message_id() {
        let h = harness();
        let id = WormholeMessageId {
            chain: Chain::Ethereum,
            emitter: UniversalAddress::new([0xee; 32]),
            sequence: 3,
        };
        h.vaas.add_vaa(id, integration_vaa(id));

        let transfer = CircleTransfer::from_message_id(h.wormhole.clone(), id, None)
            .await
            .unwrap();
        assert_eq!(transfer.state(), TransferState::Attested);
        assert!(transfer.details().automatic());
        assert_eq!(transfer.details().to().chain, Chain::Base);
        assert_eq!(transfer.details().amount(), U256::from(1_000_000u64));
    }

    #[tokio::test]
    async fn test_from_transaction_fetches_circle_attestation() {
        let h = harness();
        let message = circle_message(9);
        let (_, hash) = CircleMessage::deserialize(&message).unwrap();
        h.ethereum.add_circle_transaction("0xburn", vec![message]);
        h.iris
            .add_response_sequence(hash, vec![FakeResponse::Ready(Bytes::from_static(b"sig"))]);

        let transfer = CircleTransfer::from_transaction(
            h.wormhole.clone(),
            TransactionId::new(Chain::Ethereum, "0xburn"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(transfer.state(), TransferState::Attested);
        assert!(!transfer.details().automatic());
        assert_eq!(transfer.details().from().chain, Chain::Ethereum);
        assert_eq!(transfer.details().to().address, UniversalAddress::new([2; 32]));
    }

    #[tokio::test]
    async fn test_failed_attestation_is_not_retried() {
        let h = harness();
        let message = circle_message(2);
        let (_, hash) = CircleMessage::deserialize(&message).unwrap();
        h.ethereum.emit_circle_messages(vec![message]);
        h.iris
            .add_response_sequence(hash, vec![FakeResponse::Failed("burn reverted".to_string())]);

        let mut transfer = CircleTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap();
        let err = transfer.fetch_attestation(None).await.unwrap_err();
        assert!(matches!(err, VaaError::AttestationFailed { .. }));
        assert_eq!(transfer.state(), TransferState::Initiated);
    }

    #[test]
    fn test_chain_without_domain_rejected() {
        let h = harness();
        let details = TransferDetails::builder()
            .token(TokenAddress::Token(USDC))
            .amount(U256::from(1u64))
            .from(ChainAddress::new(Chain::Ethereum, UniversalAddress::new([1; 32])))
            .to(ChainAddress::new(Chain::Bsc, UniversalAddress::new([2; 32])))
            .build();
        assert!(matches!(
            CircleTransfer::new(h.wormhole, details),
            Err(VaaError::ChainNotSupported { .. })
        ));
    }

    #[test]
    fn test_manual_payload_rejected() {
        let h = harness();
        let details = TransferDetails::builder()
            .token(TokenAddress::Token(USDC))
            .amount(U256::from(1u64))
            .from(ChainAddress::new(Chain::Ethereum, UniversalAddress::new([1; 32])))
            .to(ChainAddress::new(Chain::Base, UniversalAddress::new([2; 32])))
            .payload(Bytes::from_static(b"memo"))
            .build();
        assert!(matches!(
            CircleTransfer::new(h.wormhole, details),
            Err(VaaError::InvalidTransfer(_))
        ));
    }
}
