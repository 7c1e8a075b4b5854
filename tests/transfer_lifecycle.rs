//! End-to-end transfer flows against the in-memory fakes
//!
//! Every test builds its own [`Wormhole`] context, so the fakes never share
//! state between tests.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Bytes, U256};
use vaa_rs::layout::{field, Item, Layout};
use vaa_rs::protocol::circle::{BurnMessage, CircleMessage, DomainId};
use vaa_rs::protocol::token_bridge;
use vaa_rs::testing::{
    FakeChainContext, FakeCircleAttestationProvider, FakeCircleBridge, FakeClock, FakeResponse,
    FakeSigner, FakeTokenBridge, FakeVaaProvider,
};
use vaa_rs::traits::ChainContext;
use vaa_rs::transfer::TokenAddress;
use vaa_rs::{
    payload_registry, AttestationId, Chain, ChainAddress, CircleTransfer, PayloadLiteral,
    PayloadRegistry, PayloadSchema, TokenTransfer, TransactionId, TransferDetails, TransferState,
    UniversalAddress, Vaa, VaaError, Value, Wormhole, WormholeMessageId, WormholeTransfer,
};

const TOKEN: UniversalAddress = UniversalAddress::new([0xaa; 32]);
const SENDER: UniversalAddress = UniversalAddress::new([0x01; 32]);
const RECIPIENT: UniversalAddress = UniversalAddress::new([0x02; 32]);

struct Setup {
    wormhole: Arc<Wormhole>,
    vaas: FakeVaaProvider,
    iris: FakeCircleAttestationProvider,
    clock: FakeClock,
    ethereum: FakeChainContext,
    solana: FakeChainContext,
    base: FakeChainContext,
}

fn setup() -> Setup {
    let vaas = FakeVaaProvider::new();
    let iris = FakeCircleAttestationProvider::new();
    let clock = FakeClock::new();
    let ethereum = FakeChainContext::new(Chain::Ethereum)
        .with_token_bridge(FakeTokenBridge::new(Chain::Ethereum))
        .with_circle_bridge(FakeCircleBridge::new(Chain::Ethereum));
    let solana =
        FakeChainContext::new(Chain::Solana).with_token_bridge(FakeTokenBridge::new(Chain::Solana));
    let base =
        FakeChainContext::new(Chain::Base).with_circle_bridge(FakeCircleBridge::new(Chain::Base));

    let wormhole = Wormhole::builder()
        .chains(vec![
            Arc::new(ethereum.clone()) as Arc<dyn ChainContext>,
            Arc::new(solana.clone()),
            Arc::new(base.clone()),
        ])
        .vaa_provider(Arc::new(vaas.clone()))
        .circle_attestation_provider(Arc::new(iris.clone()))
        .clock(Arc::new(clock.clone()))
        .build();

    Setup {
        wormhole: Arc::new(wormhole),
        vaas,
        iris,
        clock,
        ethereum,
        solana,
        base,
    }
}

fn message_id(sequence: u64) -> WormholeMessageId {
    WormholeMessageId {
        chain: Chain::Ethereum,
        emitter: UniversalAddress::new([0xee; 32]),
        sequence,
    }
}

fn token_details() -> TransferDetails {
    TransferDetails::builder()
        .token(TokenAddress::Token(TOKEN))
        .amount(U256::from(5_000u64))
        .from(ChainAddress::new(Chain::Ethereum, SENDER))
        .to(ChainAddress::new(Chain::Solana, RECIPIENT))
        .build()
}

fn transfer_vaa(id: WormholeMessageId) -> Bytes {
    let payload = Value::object([
        (
            "token",
            Value::object([
                ("amount", Value::from(U256::from(5_000u64))),
                ("address", Value::Address(TOKEN)),
                ("chain", Value::Chain(Chain::Ethereum)),
            ]),
        ),
        (
            "to",
            Value::object([
                ("address", Value::Address(RECIPIENT)),
                ("chain", Value::Chain(Chain::Solana)),
            ]),
        ),
        ("fee", Value::from(U256::ZERO)),
    ]);
    Vaa::create()
        .payload_literal(token_bridge::literal(token_bridge::TRANSFER))
        .payload(payload)
        .emitter_chain(id.chain)
        .emitter_address(id.emitter)
        .sequence(id.sequence)
        .timestamp(1_700_000_000)
        .build()
        .unwrap()
        .serialize()
        .unwrap()
        .into()
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
            burn_token: TOKEN,
            mint_recipient: RECIPIENT,
            amount: U256::from(1_000_000u64),
            message_sender: SENDER,
        },
    }
    .serialize()
    .unwrap()
    .into()
}

#[tokio::test]
async fn test_token_transfer_waits_for_guardians() {
    let s = setup();
    s.ethereum.emit_messages(vec![message_id(42)]);
    s.vaas
        .add_pending_then_ready(message_id(42), 2, transfer_vaa(message_id(42)));

    let mut transfer = TokenTransfer::new(s.wormhole.clone(), token_details()).unwrap();
    let source = FakeSigner::new(Chain::Ethereum);
    transfer.initiate_transfer(&source).await.unwrap();

    // approval and transfer go out together
    let batches = source.batches();
    assert_eq!(batches.len(), 1);
    let labels: Vec<&str> = batches[0].iter().map(|tx| tx.description.as_str()).collect();
    assert_eq!(labels, vec!["ERC20.approve", "TokenBridge.transferTokens"]);

    let ids = transfer.fetch_attestation(None).await.unwrap();
    assert_eq!(ids, vec![AttestationId::Wormhole(message_id(42))]);
    assert_eq!(transfer.state(), TransferState::Attested);
    assert_eq!(s.vaas.call_count(&message_id(42)), 3);
    assert_eq!(
        s.clock.sleep_log(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );

    let destination = FakeSigner::new(Chain::Solana);
    transfer.complete_transfer(&destination).await.unwrap();
    assert_eq!(transfer.state(), TransferState::Completed);

    let redeemed = s.solana.token_bridge_fake().unwrap().redeemed();
    assert_eq!(redeemed.len(), 1);
    assert_eq!(redeemed[0].id(), message_id(42));
}

#[tokio::test]
async fn test_rate_limit_waits_for_retry_after() {
    let s = setup();
    s.ethereum.emit_messages(vec![message_id(1)]);
    s.vaas.add_response_sequence(
        message_id(1),
        vec![
            FakeResponse::RateLimited {
                retry_after_seconds: 30,
            },
            FakeResponse::Ready(transfer_vaa(message_id(1))),
        ],
    );

    let mut transfer = TokenTransfer::new(s.wormhole.clone(), token_details()).unwrap();
    transfer
        .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
        .await
        .unwrap();
    transfer.fetch_attestation(None).await.unwrap();

    assert_eq!(s.clock.sleep_log(), vec![Duration::from_secs(30)]);
}

#[tokio::test]
async fn test_timeout_leaves_transfer_initiated() {
    let s = setup();
    s.ethereum.emit_messages(vec![message_id(7)]);

    let mut transfer = TokenTransfer::new(s.wormhole.clone(), token_details()).unwrap();
    transfer
        .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
        .await
        .unwrap();

    // 2s then 4s of backoff; the second wait would end past the deadline
    let err = transfer
        .fetch_attestation(Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, VaaError::AttestationTimeout { attempts: 2 }), "{err}");
    assert_eq!(transfer.state(), TransferState::Initiated);
    assert_eq!(s.clock.sleep_log(), vec![Duration::from_secs(2)]);

    // the VAA shows up later and the same transfer picks it up
    s.vaas.add_vaa(message_id(7), transfer_vaa(message_id(7)));
    transfer.fetch_attestation(None).await.unwrap();
    assert_eq!(transfer.state(), TransferState::Attested);
}

#[tokio::test]
async fn test_context_cancellation_stops_polling() {
    let s = setup();
    s.ethereum.emit_messages(vec![message_id(3)]);

    let mut transfer = TokenTransfer::new(s.wormhole.clone(), token_details()).unwrap();
    transfer
        .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
        .await
        .unwrap();

    s.wormhole.cancellation_token().cancel();
    let err = transfer.fetch_attestation(None).await.unwrap_err();
    assert!(matches!(err, VaaError::Cancelled));
    assert_eq!(s.vaas.call_count(&message_id(3)), 0);
    assert_eq!(transfer.state(), TransferState::Initiated);
}

#[tokio::test]
async fn test_resume_from_source_transaction() {
    let s = setup();
    s.ethereum.add_transaction("0xfeed", vec![message_id(9)]);
    s.vaas.add_vaa(message_id(9), transfer_vaa(message_id(9)));

    let txid = TransactionId::new(Chain::Ethereum, "0xfeed");
    let mut transfer = TokenTransfer::from_transaction(s.wormhole.clone(), txid, None)
        .await
        .unwrap();
    assert_eq!(transfer.state(), TransferState::Attested);
    assert_eq!(transfer.details().to(), ChainAddress::new(Chain::Solana, RECIPIENT));
    assert_eq!(transfer.details().amount(), U256::from(5_000u64));

    transfer
        .complete_transfer(&FakeSigner::new(Chain::Solana))
        .await
        .unwrap();
    assert_eq!(transfer.state(), TransferState::Completed);
}

#[tokio::test]
async fn test_manual_circle_transfer() {
    let s = setup();
    let message = circle_message(11);
    let hash = keccak256(&message);
    s.ethereum.emit_circle_messages(vec![message.clone()]);
    s.iris.add_response_sequence(
        hash,
        vec![
            FakeResponse::Pending,
            FakeResponse::Pending,
            FakeResponse::Ready(Bytes::from_static(&[0xab; 65])),
        ],
    );

    let details = TransferDetails::builder()
        .token(TokenAddress::Token(TOKEN))
        .amount(U256::from(1_000_000u64))
        .from(ChainAddress::new(Chain::Ethereum, SENDER))
        .to(ChainAddress::new(Chain::Base, RECIPIENT))
        .build();
    let mut transfer = CircleTransfer::new(s.wormhole.clone(), details).unwrap();

    transfer
        .initiate_transfer(&FakeSigner::new(Chain::Ethereum))
        .await
        .unwrap();
    assert_eq!(transfer.attestation_ids(), vec![AttestationId::Circle(hash)]);

    transfer.fetch_attestation(None).await.unwrap();
    // Circle polling waits a minute between attempts
    assert_eq!(
        s.clock.sleep_log(),
        vec![Duration::from_secs(60), Duration::from_secs(60)]
    );

    transfer
        .complete_transfer(&FakeSigner::new(Chain::Base))
        .await
        .unwrap();
    assert_eq!(transfer.state(), TransferState::Completed);
    assert_eq!(
        s.base.circle_bridge_fake().unwrap().redeemed(),
        vec![(message, Bytes::from_static(&[0xab; 65]))]
    );
}

#[tokio::test]
async fn test_private_registry_is_isolated() {
    let vaas = FakeVaaProvider::new();
    let registry = PayloadRegistry::new();
    let ping = PayloadLiteral::new("Demo", "Ping");
    registry
        .register(
            ping.clone(),
            PayloadSchema::Layout(Layout::new(vec![
                field("id", Item::uint(1).fixed(0x2au8)),
                field("value", Item::uint(1)),
            ])),
        )
        .unwrap();
    let wormhole = Wormhole::builder()
        .vaa_provider(Arc::new(vaas.clone()))
        .clock(Arc::new(FakeClock::new()))
        .registry(Arc::new(registry))
        .build();

    // the bytes are built as a raw payload; only the private registry knows `Demo:Ping`
    let id = message_id(5);
    let bytes: Bytes = Vaa::create()
        .payload_literal(PayloadLiteral::bare("Uint8Array"))
        .payload(Value::Bytes(vec![0x2a, 0x07]))
        .emitter_chain(id.chain)
        .emitter_address(id.emitter)
        .sequence(id.sequence)
        .build()
        .unwrap()
        .serialize()
        .unwrap()
        .into();
    vaas.add_vaa(id, bytes.clone());

    let vaa = wormhole.get_vaa(&id, ping.clone(), None).await.unwrap();
    assert_eq!(vaa.payload().u64_field("value").unwrap(), 7);
    assert!(vaa.payload().get("id").is_none());

    assert!(!payload_registry().contains(&ping));
    let err = Vaa::deserialize(ping, &bytes).unwrap_err();
    assert!(matches!(err, VaaError::PayloadNotRegistered { .. }));
}
