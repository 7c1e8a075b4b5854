//! Seams to the outside world.
//!
//! Everything that talks to a chain, a signer, or an attestation service is
//! reached through the traits in this module. Production implementations live
//! in [`crate::providers`]; [`crate::testing`] has fakes that script responses
//! and record calls, so transfer flows can be exercised without a network.
//!
//! # Example: a VAA source backed by a map
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use alloy_primitives::Bytes;
//! use async_trait::async_trait;
//! use vaa_rs::traits::VaaProvider;
//! use vaa_rs::{Result, WormholeMessageId};
//!
//! struct Cached(HashMap<WormholeMessageId, Bytes>);
//!
//! #[async_trait]
//! impl VaaProvider for Cached {
//!     async fn get_vaa_bytes(&self, id: &WormholeMessageId) -> Result<Option<Bytes>> {
//!         Ok(self.0.get(id).cloned())
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{Bytes, B256, U256};
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::address::UniversalAddress;
use crate::chain::{Chain, ChainAddress};
use crate::error::{Result, VaaError};
use crate::transfer::{TokenAddress, TransactionId};
use crate::vaa::{Vaa, WormholeMessageId};

/// A transaction built by a bridge client, ready to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain: Chain,
    /// Short human-readable label, e.g. `"TokenBridge.transferTokens"`
    pub description: String,
    /// Platform-specific encoding the signer understands
    pub data: Bytes,
    /// Whether the transaction may be sent in one batch with the ones after it
    pub stackable: bool,
}

/// Lazy sequence of transactions produced by a bridge client.
pub type TxStream<'a> = BoxStream<'a, Result<UnsignedTransaction>>;

/// Source of signed VAAs.
#[async_trait]
pub trait VaaProvider: Send + Sync {
    /// Fetches the signed VAA for `id`.
    ///
    /// Returns `Ok(None)` while the VAA is not available yet; errors are
    /// reserved for failures that retrying will not fix (except
    /// [`VaaError::RateLimitExceeded`]).
    async fn get_vaa_bytes(&self, id: &WormholeMessageId) -> Result<Option<Bytes>>;
}

/// Source of Circle CCTP attestations.
#[async_trait]
pub trait CircleAttestationProvider: Send + Sync {
    /// Fetches the attestation of the Circle message with keccak256 hash
    /// `message_hash`, or `Ok(None)` while it is still pending.
    async fn get_circle_attestation(&self, message_hash: B256) -> Result<Option<Bytes>>;
}

/// Time source, so polling can be fast-forwarded in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Signs and broadcasts transactions on one chain.
#[async_trait]
pub trait Signer: Send + Sync {
    fn chain(&self) -> Chain;

    fn address(&self) -> UniversalAddress;

    /// Signs, sends and waits for `transactions`, returning their ids in order.
    async fn sign_and_send(&self, transactions: Vec<UnsignedTransaction>) -> Result<Vec<TransactionId>>;
}

/// Outbound token transfer handed to a bridge client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransferRequest {
    pub sender: UniversalAddress,
    pub recipient: ChainAddress,
    pub token: TokenAddress,
    pub amount: U256,
    pub payload: Option<Bytes>,
    /// Native gas the relayer should drop off at the recipient (automatic only)
    pub native_gas: Option<U256>,
}

/// Outbound USDC transfer handed to a Circle bridge client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleTransferRequest {
    pub sender: UniversalAddress,
    pub recipient: ChainAddress,
    pub amount: U256,
    pub payload: Option<Bytes>,
    pub native_gas: Option<U256>,
}

/// Manual token bridge: the user redeems on the destination chain.
pub trait TokenBridgeClient: Send + Sync {
    fn transfer(&self, request: TokenTransferRequest) -> TxStream<'_>;

    /// Redeems a `TokenBridge:Transfer` or `TokenBridge:TransferWithPayload` VAA.
    fn redeem(&self, sender: UniversalAddress, vaa: Vaa) -> TxStream<'_>;
}

/// Token bridge relayer: the relayer redeems on the user's behalf.
pub trait AutomaticTokenBridgeClient: Send + Sync {
    /// Contract transfers are addressed to on the destination chain.
    fn relayer_address(&self) -> UniversalAddress;

    fn transfer(&self, request: TokenTransferRequest) -> TxStream<'_>;

    /// Redeems a `AutomaticTokenBridge:TransferWithRelay` VAA.
    fn redeem(&self, sender: UniversalAddress, vaa: Vaa) -> TxStream<'_>;
}

/// Manual CCTP: burn on the source chain, mint with Circle's attestation.
pub trait CircleBridgeClient: Send + Sync {
    fn transfer(&self, request: CircleTransferRequest) -> TxStream<'_>;

    fn redeem(&self, sender: UniversalAddress, message: Bytes, attestation: Bytes) -> TxStream<'_>;
}

/// CCTP through the Wormhole Circle integration, completed by a relayer.
pub trait AutomaticCircleBridgeClient: Send + Sync {
    fn transfer(&self, request: CircleTransferRequest) -> TxStream<'_>;
}

/// Everything the transfer machinery needs from one chain.
///
/// Bridge clients default to [`VaaError::ProtocolNotSupported`] so contexts
/// only implement the protocols deployed on their chain.
#[async_trait]
pub trait ChainContext: Send + Sync {
    fn chain(&self) -> Chain;

    fn token_bridge(&self) -> Result<Arc<dyn TokenBridgeClient>> {
        Err(not_supported("TokenBridge", self.chain()))
    }

    fn automatic_token_bridge(&self) -> Result<Arc<dyn AutomaticTokenBridgeClient>> {
        Err(not_supported("AutomaticTokenBridge", self.chain()))
    }

    fn circle_bridge(&self) -> Result<Arc<dyn CircleBridgeClient>> {
        Err(not_supported("CircleBridge", self.chain()))
    }

    fn automatic_circle_bridge(&self) -> Result<Arc<dyn AutomaticCircleBridgeClient>> {
        Err(not_supported("AutomaticCircleBridge", self.chain()))
    }

    /// Wormhole messages emitted by the core bridge in `txid`.
    async fn parse_transaction(&self, txid: &TransactionId) -> Result<Vec<WormholeMessageId>>;

    /// Raw Circle messages emitted by the MessageTransmitter in `txid`.
    async fn parse_circle_transaction(&self, txid: &TransactionId) -> Result<Vec<Bytes>> {
        let _ = txid;
        Err(not_supported("CircleBridge", self.chain()))
    }
}

pub(crate) fn not_supported(protocol: &str, chain: Chain) -> VaaError {
    VaaError::ProtocolNotSupported {
        protocol: protocol.to_string(),
        chain,
    }
}
