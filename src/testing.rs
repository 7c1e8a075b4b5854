//! Fakes of the [`crate::traits`] seams for exercising transfers offline
//!
//! Every fake is cheap to clone and clones share state, so a test can hand
//! one copy to a [`Wormhole`](crate::Wormhole) context and keep another to
//! script responses and inspect what was called. Scenarios covered:
//! - attestations that stay pending for a while, then arrive
//! - rate limiting with a retry-after hint
//! - hard attestation failures
//! - transactions that emit several messages, or none
//! - signers that fail part way through a redemption

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::address::UniversalAddress;
use crate::chain::Chain;
use crate::error::{Result, VaaError};
use crate::traits::{
    not_supported, AutomaticCircleBridgeClient, AutomaticTokenBridgeClient, ChainContext,
    CircleAttestationProvider, CircleBridgeClient, CircleTransferRequest, Clock, Signer,
    TokenBridgeClient, TokenTransferRequest, TxStream, UnsignedTransaction, VaaProvider,
};
use crate::transfer::{TokenAddress, TransactionId};
use crate::vaa::{Vaa, WormholeMessageId};

// ============================================================================
// Scripted responses
// ============================================================================

/// One scripted answer of an attestation source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeResponse {
    Pending,
    RateLimited { retry_after_seconds: u64 },
    Ready(Bytes),
    Failed(String),
}

impl FakeResponse {
    fn into_result(self) -> Result<Option<Bytes>> {
        match self {
            Self::Pending => Ok(None),
            Self::RateLimited {
                retry_after_seconds,
            } => Err(VaaError::RateLimitExceeded {
                retry_after_seconds,
            }),
            Self::Ready(bytes) => Ok(Some(bytes)),
            Self::Failed(reason) => Err(VaaError::AttestationFailed { reason }),
        }
    }
}

/// Response sequences keyed by what is being attested.
///
/// Each call returns the next response; the last one repeats. Unknown keys
/// are pending forever.
#[derive(Debug)]
struct Script<K> {
    responses: HashMap<K, Vec<FakeResponse>>,
    calls: HashMap<K, usize>,
}

impl<K> Default for Script<K> {
    fn default() -> Self {
        Self {
            responses: HashMap::new(),
            calls: HashMap::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq + Copy> Script<K> {
    fn set(&mut self, key: K, responses: Vec<FakeResponse>) {
        self.responses.insert(key, responses);
        self.calls.insert(key, 0);
    }

    fn next(&mut self, key: K) -> FakeResponse {
        let calls = self.calls.entry(key).or_insert(0);
        let index = *calls;
        *calls += 1;
        match self.responses.get(&key) {
            Some(sequence) => sequence
                .get(index)
                .or(sequence.last())
                .cloned()
                .unwrap_or(FakeResponse::Pending),
            None => FakeResponse::Pending,
        }
    }

    fn call_count(&self, key: K) -> usize {
        self.calls.get(&key).copied().unwrap_or(0)
    }
}

// ============================================================================
// Fake VAA Provider
// ============================================================================

/// A VAA source answering from scripted sequences.
#[derive(Clone, Debug, Default)]
pub struct FakeVaaProvider {
    script: Arc<Mutex<Script<WormholeMessageId>>>,
}

impl FakeVaaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response_sequence(&self, id: WormholeMessageId, responses: Vec<FakeResponse>) {
        self.script.lock().unwrap().set(id, responses);
    }

    /// The VAA is available on the first call.
    pub fn add_vaa(&self, id: WormholeMessageId, vaa: impl Into<Bytes>) {
        self.add_response_sequence(id, vec![FakeResponse::Ready(vaa.into())]);
    }

    /// `pending` calls report "not yet", the next ones return the VAA.
    pub fn add_pending_then_ready(&self, id: WormholeMessageId, pending: usize, vaa: impl Into<Bytes>) {
        let mut responses = vec![FakeResponse::Pending; pending];
        responses.push(FakeResponse::Ready(vaa.into()));
        self.add_response_sequence(id, responses);
    }

    pub fn call_count(&self, id: &WormholeMessageId) -> usize {
        self.script.lock().unwrap().call_count(*id)
    }
}

#[async_trait]
impl VaaProvider for FakeVaaProvider {
    async fn get_vaa_bytes(&self, id: &WormholeMessageId) -> Result<Option<Bytes>> {
        let response = self.script.lock().unwrap().next(*id);
        response.into_result()
    }
}

// ============================================================================
// Fake Circle Attestation Provider
// ============================================================================

/// A Circle attestation source answering from scripted sequences.
#[derive(Clone, Debug, Default)]
pub struct FakeCircleAttestationProvider {
    script: Arc<Mutex<Script<B256>>>,
}

impl FakeCircleAttestationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response_sequence(&self, message_hash: B256, responses: Vec<FakeResponse>) {
        self.script.lock().unwrap().set(message_hash, responses);
    }

    pub fn add_attestation(&self, message_hash: B256, attestation: impl Into<Bytes>) {
        self.add_response_sequence(message_hash, vec![FakeResponse::Ready(attestation.into())]);
    }

    pub fn call_count(&self, message_hash: B256) -> usize {
        self.script.lock().unwrap().call_count(message_hash)
    }
}

#[async_trait]
impl CircleAttestationProvider for FakeCircleAttestationProvider {
    async fn get_circle_attestation(&self, message_hash: B256) -> Result<Option<Bytes>> {
        let response = self.script.lock().unwrap().next(message_hash);
        response.into_result()
    }
}

// ============================================================================
// Fake Signer
// ============================================================================

#[derive(Debug, Default)]
struct SignerState {
    batches: Vec<Vec<UnsignedTransaction>>,
    sent: u64,
    /// Successful `sign_and_send` calls left before failing
    remaining: Option<usize>,
}

/// A signer that records batches and hands out sequential transaction hashes.
#[derive(Clone, Debug)]
pub struct FakeSigner {
    chain: Chain,
    address: UniversalAddress,
    state: Arc<Mutex<SignerState>>,
}

impl FakeSigner {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            address: UniversalAddress::new([0x5e; 32]),
            state: Arc::default(),
        }
    }

    pub fn with_address(mut self, address: UniversalAddress) -> Self {
        self.address = address;
        self
    }

    /// Fails every `sign_and_send` call after the first `calls`.
    pub fn fail_after(self, calls: usize) -> Self {
        self.state.lock().unwrap().remaining = Some(calls);
        self
    }

    /// Batches sent so far, in order.
    pub fn batches(&self) -> Vec<Vec<UnsignedTransaction>> {
        self.state.lock().unwrap().batches.clone()
    }
}

#[async_trait]
impl Signer for FakeSigner {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn address(&self) -> UniversalAddress {
        self.address
    }

    async fn sign_and_send(&self, transactions: Vec<UnsignedTransaction>) -> Result<Vec<TransactionId>> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.remaining.as_mut() {
            if *remaining == 0 {
                return Err(VaaError::TransactionFailed {
                    reason: "simulated revert".to_string(),
                });
            }
            *remaining -= 1;
        }

        let mut txids = Vec::with_capacity(transactions.len());
        for _ in &transactions {
            state.sent += 1;
            txids.push(TransactionId::new(self.chain, format!("{:#066x}", state.sent)));
        }
        state.batches.push(transactions);
        Ok(txids)
    }
}

// ============================================================================
// Fake Bridges
// ============================================================================

fn unsigned(chain: Chain, description: &str, data: Bytes, stackable: bool) -> UnsignedTransaction {
    UnsignedTransaction {
        chain,
        description: description.to_string(),
        data,
        stackable,
    }
}

fn tx_stream(transactions: Vec<UnsignedTransaction>) -> TxStream<'static> {
    stream::iter(transactions.into_iter().map(Ok)).boxed()
}

#[derive(Debug, Default)]
struct TokenBridgeState {
    transfers: Vec<TokenTransferRequest>,
    redeemed: Vec<Vaa>,
}

/// Token bridge and, with a relayer configured, token bridge relayer.
///
/// Transfers of a token emit a stackable approval before the transfer itself.
#[derive(Clone, Debug)]
pub struct FakeTokenBridge {
    chain: Chain,
    relayer: Option<UniversalAddress>,
    state: Arc<Mutex<TokenBridgeState>>,
}

impl FakeTokenBridge {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            relayer: None,
            state: Arc::default(),
        }
    }

    /// Enables the relayer, at `relayer`.
    pub fn with_relayer(mut self, relayer: UniversalAddress) -> Self {
        self.relayer = Some(relayer);
        self
    }

    pub fn transfers(&self) -> Vec<TokenTransferRequest> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn redeemed(&self) -> Vec<Vaa> {
        self.state.lock().unwrap().redeemed.clone()
    }

    fn send(&self, request: TokenTransferRequest, method: &str) -> TxStream<'_> {
        let mut transactions = Vec::new();
        if matches!(request.token, TokenAddress::Token(_)) {
            transactions.push(unsigned(self.chain, "ERC20.approve", Bytes::new(), true));
        }
        transactions.push(unsigned(self.chain, method, Bytes::new(), false));
        self.state.lock().unwrap().transfers.push(request);
        tx_stream(transactions)
    }

    fn receive(&self, vaa: Vaa, method: &str) -> TxStream<'_> {
        let data = vaa.serialize().map(Bytes::from);
        self.state.lock().unwrap().redeemed.push(vaa);
        match data {
            Ok(data) => tx_stream(vec![unsigned(self.chain, method, data, false)]),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}

impl TokenBridgeClient for FakeTokenBridge {
    fn transfer(&self, request: TokenTransferRequest) -> TxStream<'_> {
        self.send(request, "TokenBridge.transferTokens")
    }

    fn redeem(&self, _sender: UniversalAddress, vaa: Vaa) -> TxStream<'_> {
        self.receive(vaa, "TokenBridge.completeTransfer")
    }
}

impl AutomaticTokenBridgeClient for FakeTokenBridge {
    fn relayer_address(&self) -> UniversalAddress {
        self.relayer.unwrap_or(UniversalAddress::ZERO)
    }

    fn transfer(&self, request: TokenTransferRequest) -> TxStream<'_> {
        self.send(request, "TokenBridgeRelayer.transferTokensWithRelay")
    }

    fn redeem(&self, _sender: UniversalAddress, vaa: Vaa) -> TxStream<'_> {
        self.receive(vaa, "TokenBridgeRelayer.completeTransferWithRelay")
    }
}

#[derive(Debug, Default)]
struct CircleBridgeState {
    transfers: Vec<CircleTransferRequest>,
    redeemed: Vec<(Bytes, Bytes)>,
}

/// CCTP token messenger and Circle integration.
#[derive(Clone, Debug)]
pub struct FakeCircleBridge {
    chain: Chain,
    state: Arc<Mutex<CircleBridgeState>>,
}

impl FakeCircleBridge {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            state: Arc::default(),
        }
    }

    pub fn transfers(&self) -> Vec<CircleTransferRequest> {
        self.state.lock().unwrap().transfers.clone()
    }

    /// `(message, attestation)` pairs minted so far.
    pub fn redeemed(&self) -> Vec<(Bytes, Bytes)> {
        self.state.lock().unwrap().redeemed.clone()
    }

    fn send(&self, request: CircleTransferRequest, method: &str) -> TxStream<'_> {
        self.state.lock().unwrap().transfers.push(request);
        tx_stream(vec![
            unsigned(self.chain, "ERC20.approve", Bytes::new(), true),
            unsigned(self.chain, method, Bytes::new(), false),
        ])
    }
}

impl CircleBridgeClient for FakeCircleBridge {
    fn transfer(&self, request: CircleTransferRequest) -> TxStream<'_> {
        self.send(request, "TokenMessenger.depositForBurn")
    }

    fn redeem(&self, _sender: UniversalAddress, message: Bytes, attestation: Bytes) -> TxStream<'_> {
        self.state
            .lock()
            .unwrap()
            .redeemed
            .push((message.clone(), attestation));
        tx_stream(vec![unsigned(
            self.chain,
            "MessageTransmitter.receiveMessage",
            message,
            false,
        )])
    }
}

impl AutomaticCircleBridgeClient for FakeCircleBridge {
    fn transfer(&self, request: CircleTransferRequest) -> TxStream<'_> {
        self.send(request, "CircleIntegration.transferTokensWithPayload")
    }
}

// ============================================================================
// Fake Chain Context
// ============================================================================

#[derive(Debug, Default)]
struct ChainState {
    transactions: HashMap<String, Vec<WormholeMessageId>>,
    circle_transactions: HashMap<String, Vec<Bytes>>,
    emitted: Vec<WormholeMessageId>,
    circle_emitted: Vec<Bytes>,
}

/// A chain whose transactions emit scripted messages.
///
/// Transactions registered with [`add_transaction`](Self::add_transaction)
/// answer with their own messages; any other transaction, such as one a
/// [`FakeSigner`] just sent, answers with the messages set by
/// [`emit_messages`](Self::emit_messages).
#[derive(Clone, Debug)]
pub struct FakeChainContext {
    chain: Chain,
    token_bridge: Option<FakeTokenBridge>,
    circle_bridge: Option<FakeCircleBridge>,
    state: Arc<Mutex<ChainState>>,
}

impl FakeChainContext {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            token_bridge: None,
            circle_bridge: None,
            state: Arc::default(),
        }
    }

    pub fn with_token_bridge(mut self, bridge: FakeTokenBridge) -> Self {
        self.token_bridge = Some(bridge);
        self
    }

    pub fn with_circle_bridge(mut self, bridge: FakeCircleBridge) -> Self {
        self.circle_bridge = Some(bridge);
        self
    }

    pub fn token_bridge_fake(&self) -> Option<FakeTokenBridge> {
        self.token_bridge.clone()
    }

    pub fn circle_bridge_fake(&self) -> Option<FakeCircleBridge> {
        self.circle_bridge.clone()
    }

    pub fn add_transaction(&self, txid: &str, ids: Vec<WormholeMessageId>) {
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(txid.to_string(), ids);
    }

    pub fn add_circle_transaction(&self, txid: &str, messages: Vec<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .circle_transactions
            .insert(txid.to_string(), messages);
    }

    /// Wormhole messages of every unregistered transaction.
    pub fn emit_messages(&self, ids: Vec<WormholeMessageId>) {
        self.state.lock().unwrap().emitted = ids;
    }

    /// Circle messages of every unregistered transaction.
    pub fn emit_circle_messages(&self, messages: Vec<Bytes>) {
        self.state.lock().unwrap().circle_emitted = messages;
    }
}

#[async_trait]
impl ChainContext for FakeChainContext {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn token_bridge(&self) -> Result<Arc<dyn TokenBridgeClient>> {
        match &self.token_bridge {
            Some(bridge) => Ok(Arc::new(bridge.clone())),
            None => Err(not_supported("TokenBridge", self.chain)),
        }
    }

    fn automatic_token_bridge(&self) -> Result<Arc<dyn AutomaticTokenBridgeClient>> {
        match &self.token_bridge {
            Some(bridge) if bridge.relayer.is_some() => Ok(Arc::new(bridge.clone())),
            _ => Err(not_supported("AutomaticTokenBridge", self.chain)),
        }
    }

    fn circle_bridge(&self) -> Result<Arc<dyn CircleBridgeClient>> {
        match &self.circle_bridge {
            Some(bridge) => Ok(Arc::new(bridge.clone())),
            None => Err(not_supported("CircleBridge", self.chain)),
        }
    }

    fn automatic_circle_bridge(&self) -> Result<Arc<dyn AutomaticCircleBridgeClient>> {
        match &self.circle_bridge {
            Some(bridge) => Ok(Arc::new(bridge.clone())),
            None => Err(not_supported("AutomaticCircleBridge", self.chain)),
        }
    }

    async fn parse_transaction(&self, txid: &TransactionId) -> Result<Vec<WormholeMessageId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .get(&txid.txid)
            .unwrap_or(&state.emitted)
            .clone())
    }

    async fn parse_circle_transaction(&self, txid: &TransactionId) -> Result<Vec<Bytes>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .circle_transactions
            .get(&txid.txid)
            .unwrap_or(&state.circle_emitted)
            .clone())
    }
}

// ============================================================================
// Fake Clock
// ============================================================================

/// A fake clock that allows fast-forwarding time in tests.
///
/// Sleeping returns at once and advances the clock by the requested duration.
#[derive(Clone, Debug)]
pub struct FakeClock {
    current_time: Arc<Mutex<Instant>>,
    sleep_log: Arc<Mutex<Vec<Duration>>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            current_time: Arc::new(Mutex::new(Instant::now())),
            sleep_log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast-forward the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.lock().unwrap();
        *time += duration;
    }

    /// Every sleep requested so far, in order
    pub fn sleep_log(&self) -> Vec<Duration> {
        self.sleep_log.lock().unwrap().clone()
    }

    pub fn total_sleep_time(&self) -> Duration {
        self.sleep_log.lock().unwrap().iter().sum()
    }

    pub fn sleep_count(&self) -> usize {
        self.sleep_log.lock().unwrap().len()
    }

    pub fn clear_sleep_log(&self) {
        self.sleep_log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.sleep_log.lock().unwrap().push(duration);
        self.advance(duration);
    }

    fn now(&self) -> Instant {
        *self.current_time.lock().unwrap()
    }
}
