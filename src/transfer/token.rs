use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::chain::ChainAddress;
use crate::error::{Result, VaaError};
use crate::layout::Value;
use crate::payload::{PayloadDiscriminator, PayloadLiteral};
use crate::protocol::{automatic_token_bridge, token_bridge};
use crate::spans;
use crate::traits::{Signer, TokenTransferRequest};
use crate::vaa::{Vaa, WormholeMessageId};

use super::{
    require_signer_chain, require_state, sign_send_wait, AttestationId, TokenAddress,
    TransactionId, TransferAttestation, TransferDetails, TransferState, Wormhole,
    WormholeTransfer,
};

const KIND: &str = "TokenTransfer";

/// A token bridge transfer, manual or relayed.
///
/// Manual transfers are redeemed by the caller with
/// [`complete_transfer`](WormholeTransfer::complete_transfer); automatic ones
/// are addressed to the relayer contract of the destination chain, which
/// redeems them itself.
pub struct TokenTransfer {
    wormhole: Arc<Wormhole>,
    details: TransferDetails,
    state: TransferState,
    txids: Vec<TransactionId>,
    attestations: Vec<TransferAttestation>,
    /// Attestations redeemed so far, always a prefix of `attestations`
    redeemed: usize,
    cancel: CancellationToken,
}

impl TokenTransfer {
    /// A fresh outbound transfer.
    ///
    /// Fails if the details are inconsistent, either chain is not configured,
    /// or the source chain lacks the bridge the transfer needs.
    pub fn new(wormhole: Arc<Wormhole>, details: TransferDetails) -> Result<Self> {
        details.validate()?;
        let source = wormhole.chain(details.from().chain)?;
        wormhole.chain(details.to().chain)?;
        if details.automatic() {
            source.automatic_token_bridge()?;
        } else {
            source.token_bridge()?;
        }
        Ok(Self::with_state(wormhole, details, TransferState::Created, Vec::new()))
    }

    /// Rebuilds a transfer from the id of its Wormhole message, fetching the VAA.
    ///
    /// The resulting transfer is `Attested`. Its details come from the VAA,
    /// which cannot tell everything: the sender of a plain `Transfer` is not on
    /// the wire, so `from` holds the emitting token bridge instead, and the
    /// amount is the bridge's 8-decimal normalized amount.
    pub async fn from_message_id(
        wormhole: Arc<Wormhole>,
        id: WormholeMessageId,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let bytes = wormhole.get_vaa_bytes(&id, timeout).await?;
        let vaa = decode_transfer_vaa(&wormhole, &bytes)?;
        let details = details_from_vaa(&vaa)?;
        info!(
            message_id = %id,
            payload = %vaa.payload_literal(),
            automatic = details.automatic(),
            event = "transfer_recovered"
        );
        Ok(Self::with_state(
            wormhole,
            details,
            TransferState::Attested,
            vec![TransferAttestation { id, vaa: Some(vaa) }],
        ))
    }

    /// Rebuilds a transfer from its source transaction.
    ///
    /// Only the first Wormhole message of the transaction is followed.
    pub async fn from_transaction(
        wormhole: Arc<Wormhole>,
        txid: TransactionId,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let ids = wormhole.parse_message_ids(&txid).await?;
        let id = *ids.first().ok_or_else(|| {
            VaaError::InvalidTransfer(format!("no Wormhole message emitted in {txid}"))
        })?;
        if ids.len() > 1 {
            debug!(messages = ids.len(), event = "extra_messages_ignored");
        }
        let mut transfer = Self::from_message_id(wormhole, id, timeout).await?;
        transfer.txids.push(txid);
        Ok(transfer)
    }

    fn with_state(
        wormhole: Arc<Wormhole>,
        details: TransferDetails,
        state: TransferState,
        attestations: Vec<TransferAttestation>,
    ) -> Self {
        let cancel = wormhole.cancellation_token().child_token();
        Self {
            wormhole,
            details,
            state,
            txids: Vec::new(),
            attestations,
            redeemed: 0,
            cancel,
        }
    }

    pub fn attestations(&self) -> &[TransferAttestation] {
        &self.attestations
    }

    /// Cancelling the returned token aborts this transfer's attestation polling.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn expected_literal(&self) -> PayloadLiteral {
        if self.details.automatic() {
            automatic_token_bridge::literal()
        } else if self.details.payload().is_some() {
            token_bridge::literal(token_bridge::TRANSFER_WITH_PAYLOAD)
        } else {
            token_bridge::literal(token_bridge::TRANSFER)
        }
    }

    async fn parse_attestations(&mut self) -> Result<()> {
        let last = self.txids.last().cloned().ok_or_else(|| {
            VaaError::InvalidTransfer("transfer has no source transaction".to_string())
        })?;
        let ids = self.wormhole.parse_message_ids(&last).await?;
        if ids.is_empty() {
            return Err(VaaError::TransactionFailed {
                reason: format!("no Wormhole message emitted in {last}"),
            });
        }
        self.attestations = ids.into_iter().map(TransferAttestation::pending).collect();
        Ok(())
    }
}

#[async_trait]
impl WormholeTransfer for TokenTransfer {
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
        self.attestations
            .iter()
            .map(|attestation| AttestationId::Wormhole(attestation.id))
            .collect()
    }

    /// Sends the transfer and records the emitted message ids.
    ///
    /// Once the source transactions are sent the transfer is `Initiated` even
    /// if recovering the message ids fails; `fetch_attestation` retries that.
    async fn initiate_transfer(&mut self, signer: &dyn Signer) -> Result<Vec<TransactionId>> {
        require_state("initiate", self.state, &[TransferState::Created])?;
        let from = self.details.from();
        let to = self.details.to();
        let span = spans::initiate_transfer(KIND, &from, &to, &self.details.amount());
        async {
            require_signer_chain(signer, from.chain)?;
            let source = self.wormhole.chain(from.chain)?;
            let request = TokenTransferRequest {
                sender: signer.address(),
                recipient: to,
                token: self.details.token(),
                amount: self.details.amount(),
                payload: self.details.payload().cloned(),
                native_gas: self.details.native_gas(),
            };
            let txids = if self.details.automatic() {
                let client = source.automatic_token_bridge()?;
                sign_send_wait(client.transfer(request), signer).await?
            } else {
                let client = source.token_bridge()?;
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

            self.parse_attestations().await.map_err(|e| {
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
        let span = spans::fetch_attestation(KIND, self.attestations.len());
        async {
            if self.attestations.is_empty() {
                self.parse_attestations().await?;
            }

            let literal = self.expected_literal();
            let wormhole = Arc::clone(&self.wormhole);
            let cancel = self.cancel.clone();
            let fetches = self.attestations.iter().map(|attestation| {
                let literal = literal.clone();
                let wormhole = &wormhole;
                let cancel = &cancel;
                async move {
                    match &attestation.vaa {
                        Some(vaa) => Ok(vaa.clone()),
                        None => {
                            wormhole
                                .fetch_vaa(&attestation.id, literal.into(), timeout, cancel)
                                .await
                        }
                    }
                }
            });
            let vaas = try_join_all(fetches).await?;

            for (attestation, vaa) in self.attestations.iter_mut().zip(vaas) {
                attestation.vaa = Some(vaa);
            }
            self.state = TransferState::Attested;
            info!(attestations = self.attestations.len(), event = "transfer_attested");
            Ok(self.attestation_ids())
        }
        .instrument(span)
        .await
    }

    async fn complete_transfer(&mut self, signer: &dyn Signer) -> Result<Vec<TransactionId>> {
        require_state(
            "complete",
            self.state,
            &[TransferState::Attested, TransferState::Redeemed],
        )?;
        let to = self.details.to();
        let span = spans::complete_transfer(KIND, &to, self.attestations.len());
        async {
            require_signer_chain(signer, to.chain)?;
            let destination = self.wormhole.chain(to.chain)?;
            let mut sent = Vec::new();

            for index in self.redeemed..self.attestations.len() {
                let vaa = self.attestations[index].vaa.clone().ok_or(
                    VaaError::InvalidStateTransition {
                        operation: "complete",
                        state: self.state,
                    },
                )?;
                let relayed = *vaa.payload_literal() == automatic_token_bridge::literal();
                let manual = [token_bridge::TRANSFER, token_bridge::TRANSFER_WITH_PAYLOAD]
                    .iter()
                    .any(|name| *vaa.payload_literal() == token_bridge::literal(name));
                if !(relayed && self.details.automatic() || manual && !self.details.automatic()) {
                    return Err(VaaError::WrongPayload {
                        operation: "complete",
                        literal: vaa.payload_literal().to_string(),
                    });
                }

                let txids = if relayed {
                    let client = destination.automatic_token_bridge()?;
                    sign_send_wait(client.redeem(signer.address(), vaa), signer).await?
                } else {
                    let client = destination.token_bridge()?;
                    sign_send_wait(client.redeem(signer.address(), vaa), signer).await?
                };

                self.txids.extend(txids.iter().cloned());
                sent.extend(txids);
                self.redeemed = index + 1;
                self.state = if self.redeemed == self.attestations.len() {
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

/// Decodes a token bridge VAA, telling relayed transfers from manual ones.
///
/// `TransferWithPayload` and `TransferWithRelay` share their wire shape; a
/// transfer counts as relayed when it is addressed to the relayer of a
/// configured destination chain and its payload parses as relay instructions.
fn decode_transfer_vaa(wormhole: &Wormhole, bytes: &[u8]) -> Result<Vaa> {
    let registry = wormhole.registry();
    let discriminator = PayloadDiscriminator::new(
        registry,
        [
            token_bridge::literal(token_bridge::TRANSFER),
            token_bridge::literal(token_bridge::TRANSFER_WITH_PAYLOAD),
        ],
    )?;
    let vaa = Vaa::deserialize_with(registry, &discriminator, bytes)?;
    if vaa.payload_name() != token_bridge::TRANSFER_WITH_PAYLOAD {
        return Ok(vaa);
    }

    let recipient = token_bridge::transfer_recipient(vaa.payload())?;
    let relayer = wormhole
        .chain(recipient.chain)
        .and_then(|context| context.automatic_token_bridge())
        .map(|client| client.relayer_address());
    match relayer {
        Ok(relayer) if automatic_token_bridge::is_relayed(&recipient.address, &relayer) => {
            Ok(Vaa::deserialize_with(registry, automatic_token_bridge::literal(), bytes).unwrap_or(vaa))
        }
        _ => Ok(vaa),
    }
}

fn details_from_vaa(vaa: &Vaa) -> Result<TransferDetails> {
    let payload = vaa.payload();
    let token = token_bridge::transfer_token(payload)?;
    let recipient = token_bridge::transfer_recipient(payload)?;
    let amount = payload.field("token")?.u256_field("amount")?;
    let builder = TransferDetails::builder()
        .token(TokenAddress::Token(token.address))
        .amount(amount);

    let details = match vaa.payload_literal() {
        literal if *literal == automatic_token_bridge::literal() => {
            let relay = payload.field("payload")?;
            let native_gas = relay.u256_field("toNativeTokenAmount")?;
            builder
                .from(ChainAddress::new(vaa.emitter_chain(), payload.address_field("from")?))
                .to(ChainAddress::new(recipient.chain, relay.address_field("targetRecipient")?))
                .automatic(true)
                .maybe_native_gas((!native_gas.is_zero()).then_some(native_gas))
                .build()
        }
        literal if literal.name() == token_bridge::TRANSFER_WITH_PAYLOAD => builder
            .from(ChainAddress::new(vaa.emitter_chain(), payload.address_field("from")?))
            .to(recipient)
            .payload(payload_bytes(payload)?)
            .build(),
        _ => builder
            .from(ChainAddress::new(vaa.emitter_chain(), vaa.emitter_address()))
            .to(recipient)
            .build(),
    };
    Ok(details)
}

fn payload_bytes(payload: &Value) -> Result<alloy_primitives::Bytes> {
    Ok(payload.bytes_field("payload")?.to_vec().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::UniversalAddress;
    use crate::chain::Chain;
    use crate::testing::{FakeChainContext, FakeClock, FakeSigner, FakeTokenBridge, FakeVaaProvider};
    use crate::traits::ChainContext;
    use alloy_primitives::{Bytes, U256};

    const RELAYER: UniversalAddress = UniversalAddress::new([0x77; 32]);

    struct Harness {
        wormhole: Arc<Wormhole>,
        vaas: FakeVaaProvider,
        ethereum: FakeChainContext,
        solana: FakeChainContext,
    }

    fn harness() -> Harness {
        let vaas = FakeVaaProvider::new();
        let ethereum = FakeChainContext::new(Chain::Ethereum)
            .with_token_bridge(FakeTokenBridge::new(Chain::Ethereum).with_relayer(RELAYER));
        let solana = FakeChainContext::new(Chain::Solana)
            .with_token_bridge(FakeTokenBridge::new(Chain::Solana).with_relayer(RELAYER));
        let wormhole = Wormhole::builder()
            .chains(vec![
                Arc::new(ethereum.clone()) as Arc<dyn ChainContext>,
                Arc::new(solana.clone()),
            ])
            .vaa_provider(Arc::new(vaas.clone()))
            .clock(Arc::new(FakeClock::new()))
            .build();
        Harness {
            wormhole: Arc::new(wormhole),
            vaas,
            ethereum,
            solana,
        }
    }

    fn message_id(sequence: u64) -> WormholeMessageId {
        WormholeMessageId {
            chain: Chain::Ethereum,
            emitter: UniversalAddress::new([0xee; 32]),
            sequence,
        }
    }

    fn details(automatic: bool) -> TransferDetails {
        TransferDetails::builder()
            .token(TokenAddress::Token(UniversalAddress::new([0xaa; 32])))
            .amount(U256::from(5_000u64))
            .from(ChainAddress::new(Chain::Ethereum, UniversalAddress::new([1; 32])))
            .to(ChainAddress::new(Chain::Solana, UniversalAddress::new([2; 32])))
            .automatic(automatic)
            .build()
    }

    fn transfer_payload(to: UniversalAddress) -> Value {
        Value::object([
            (
                "token",
                Value::object([
                    ("amount", Value::from(U256::from(5_000u64))),
                    ("address", Value::Address(UniversalAddress::new([0xaa; 32]))),
                    ("chain", Value::Chain(Chain::Ethereum)),
                ]),
            ),
            (
                "to",
                Value::object([
                    ("address", Value::Address(to)),
                    ("chain", Value::Chain(Chain::Solana)),
                ]),
            ),
        ])
    }

    fn vaa_bytes(id: WormholeMessageId, literal: PayloadLiteral, payload: Value) -> Bytes {
        Vaa::create()
            .payload_literal(literal)
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

    fn manual_vaa(id: WormholeMessageId) -> Bytes {
        let Value::Object(mut payload) = transfer_payload(UniversalAddress::new([2; 32])) else {
            unreachable!()
        };
        payload.insert("fee".to_string(), Value::from(U256::ZERO));
        vaa_bytes(id, token_bridge::literal(token_bridge::TRANSFER), Value::Object(payload))
    }

    fn relayed_vaa(id: WormholeMessageId) -> Bytes {
        let Value::Object(mut payload) = transfer_payload(RELAYER) else {
            unreachable!()
        };
        payload.insert("from".to_string(), Value::Address(UniversalAddress::new([1; 32])));
        payload.insert(
            "payload".to_string(),
            Value::object([
                ("targetRelayerFee", Value::from(U256::from(10u64))),
                ("toNativeTokenAmount", Value::from(U256::from(7u64))),
                ("targetRecipient", Value::Address(UniversalAddress::new([2; 32]))),
            ]),
        );
        vaa_bytes(id, automatic_token_bridge::literal(), Value::Object(payload))
    }

    #[tokio::test]
    async fn test_manual_lifecycle() {
        let h = harness();
        h.ethereum.emit_messages(vec![message_id(1)]);
        h.vaas.add_vaa(message_id(1), manual_vaa(message_id(1)));

        let mut transfer = TokenTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        assert_eq!(transfer.state(), TransferState::Created);

        let source = FakeSigner::new(Chain::Ethereum);
        let txids = transfer.initiate_transfer(&source).await.unwrap();
        assert_eq!(txids.len(), 2, "approve and transfer");
        assert_eq!(transfer.state(), TransferState::Initiated);
        assert_eq!(
            transfer.attestation_ids(),
            vec![AttestationId::Wormhole(message_id(1))]
        );

        transfer.fetch_attestation(None).await.unwrap();
        assert_eq!(transfer.state(), TransferState::Attested);
        let vaa = transfer.attestations()[0].vaa.as_ref().unwrap();
        assert_eq!(vaa.payload_name(), token_bridge::TRANSFER);

        let destination = FakeSigner::new(Chain::Solana);
        let redeemed = transfer.complete_transfer(&destination).await.unwrap();
        assert_eq!(redeemed.len(), 1);
        assert_eq!(transfer.state(), TransferState::Completed);
        assert_eq!(transfer.transactions().len(), 3);
        assert_eq!(h.solana.token_bridge_fake().unwrap().redeemed().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_calls_do_not_mutate() {
        let h = harness();
        let mut transfer = TokenTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        let signer = FakeSigner::new(Chain::Solana);

        let err = transfer.complete_transfer(&signer).await.unwrap_err();
        assert!(matches!(
            err,
            VaaError::InvalidStateTransition {
                operation: "complete",
                state: TransferState::Created
            }
        ));
        let err = transfer.fetch_attestation(None).await.unwrap_err();
        assert!(matches!(err, VaaError::InvalidStateTransition { .. }));
        assert_eq!(transfer.state(), TransferState::Created);
        assert!(transfer.transactions().is_empty());
        assert!(signer.batches().is_empty());
    }

    #[tokio::test]
    async fn test_initiate_requires_source_signer() {
        let h = harness();
        let mut transfer = TokenTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        let err = transfer
            .initiate_transfer(&FakeSigner::new(Chain::Solana))
            .await
            .unwrap_err();
        assert!(matches!(err, VaaError::InvalidTransfer(_)));
        assert_eq!(transfer.state(), TransferState::Created);
    }

    #[tokio::test]
    async fn test_unconfigured_chain_rejected() {
        let h = harness();
        let details = TransferDetails::builder()
            .token(TokenAddress::Native)
            .amount(U256::from(1u64))
            .from(ChainAddress::new(Chain::Ethereum, UniversalAddress::new([1; 32])))
            .to(ChainAddress::new(Chain::Sui, UniversalAddress::new([2; 32])))
            .build();
        assert!(matches!(
            TokenTransfer::new(h.wormhole, details),
            Err(VaaError::ChainNotSupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_message_id_detects_relayed_transfer() {
        let h = harness();
        h.vaas.add_vaa(message_id(9), relayed_vaa(message_id(9)));

        let transfer = TokenTransfer::from_message_id(h.wormhole.clone(), message_id(9), None)
            .await
            .unwrap();
        assert_eq!(transfer.state(), TransferState::Attested);
        let details = transfer.details();
        assert!(details.automatic());
        assert_eq!(details.native_gas(), Some(U256::from(7u64)));
        assert_eq!(details.to().address, UniversalAddress::new([2; 32]));
        assert_eq!(details.from().address, UniversalAddress::new([1; 32]));
        assert_eq!(
            transfer.attestations()[0].vaa.as_ref().unwrap().payload_literal(),
            &automatic_token_bridge::literal()
        );
    }

    #[tokio::test]
    async fn test_from_transaction_and_manual_redeem() {
        let h = harness();
        h.ethereum.add_transaction("0xsource", vec![message_id(4)]);
        h.vaas.add_vaa(message_id(4), manual_vaa(message_id(4)));

        let mut transfer = TokenTransfer::from_transaction(
            h.wormhole.clone(),
            TransactionId::new(Chain::Ethereum, "0xsource"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(transfer.transactions().len(), 1);
        // sender is not on the wire for plain transfers
        assert_eq!(transfer.details().from().address, message_id(4).emitter);

        let err = transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap_err();
        assert!(matches!(err, VaaError::InvalidStateTransition { .. }));

        transfer
            .complete_transfer(&FakeSigner::new(Chain::Solana))
            .await
            .unwrap();
        assert_eq!(transfer.state(), TransferState::Completed);
    }

    #[tokio::test]
    async fn test_transaction_without_message() {
        let h = harness();
        let err = TokenTransfer::from_transaction(
            h.wormhole.clone(),
            TransactionId::new(Chain::Ethereum, "0xempty"),
            None,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, VaaError::InvalidTransfer(_)));
    }

    #[tokio::test]
    async fn test_missing_message_ids_recovered_on_fetch() {
        let h = harness();
        h.vaas.add_vaa(message_id(2), manual_vaa(message_id(2)));
        let mut transfer = TokenTransfer::new(h.wormhole.clone(), details(false)).unwrap();

        // receipt not indexed yet
        let err = transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap_err();
        assert!(matches!(err, VaaError::TransactionFailed { .. }));
        assert_eq!(transfer.state(), TransferState::Initiated);

        h.ethereum.emit_messages(vec![message_id(2)]);
        let ids = transfer.fetch_attestation(None).await.unwrap();
        assert_eq!(ids, vec![AttestationId::Wormhole(message_id(2))]);
        assert_eq!(transfer.state(), TransferState::Attested);
    }

    #[tokio::test]
    async fn test_multiple_messages_keep_order() {
        let h = harness();
        let ids = vec![message_id(12), message_id(10), message_id(11)];
        h.ethereum.emit_messages(ids.clone());
        for id in &ids {
            h.vaas.add_vaa(*id, manual_vaa(*id));
        }
        let mut transfer = TokenTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap();
        transfer.fetch_attestation(None).await.unwrap();

        let sequences: Vec<u64> = transfer
            .attestations()
            .iter()
            .map(|attestation| attestation.vaa.as_ref().unwrap().sequence())
            .collect();
        assert_eq!(sequences, vec![12, 10, 11]);

        let redeemed = transfer
            .complete_transfer(&FakeSigner::new(Chain::Solana))
            .await
            .unwrap();
        assert_eq!(redeemed.len(), 3);
        assert_eq!(transfer.state(), TransferState::Completed);
    }

    #[tokio::test]
    async fn test_partial_redemption_resumes() {
        let h = harness();
        let ids = vec![message_id(20), message_id(21)];
        h.ethereum.emit_messages(ids.clone());
        for id in &ids {
            h.vaas.add_vaa(*id, manual_vaa(*id));
        }
        let mut transfer = TokenTransfer::new(h.wormhole.clone(), details(false)).unwrap();
        transfer
            .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
            .await
            .unwrap();
        transfer.fetch_attestation(None).await.unwrap();

        let flaky = FakeSigner::new(Chain::Solana).fail_after(1);
        let err = transfer.complete_transfer(&flaky).await.unwrap_err();
        assert!(matches!(err, VaaError::TransactionFailed { .. }));
        assert_eq!(transfer.state(), TransferState::Redeemed);

        let redeemed = transfer
            .complete_transfer(&FakeSigner::new(Chain::Solana))
            .await
            .unwrap();
        assert_eq!(redeemed.len(), 1);
        assert_eq!(transfer.state(), TransferState::Completed);
    }

    #[tokio::test]
    async fn test_wrong_payload_detected() {
        let h = harness();
        h.vaas.add_vaa(message_id(30), relayed_vaa(message_id(30)));
        let mut transfer = TokenTransfer::from_message_id(h.wormhole.clone(), message_id(30), None)
            .await
            .unwrap();
        // a manual transfer cannot redeem a relayed VAA
        transfer.details.automatic = false;

        let err = transfer
            .complete_transfer(&FakeSigner::new(Chain::Solana))
            .await
            .unwrap_err();
        assert!(matches!(err, VaaError::WrongPayload { .. }));
        assert_eq!(transfer.state(), TransferState::Attested);
    }
}
