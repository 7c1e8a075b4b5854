//! Cross-chain transfer orchestration
//!
//! A transfer moves through [`TransferState`] one step at a time:
//!
//! ```text
//! Created --initiate_transfer--> Initiated --fetch_attestation--> Attested --complete_transfer--> Completed
//!                                                                     \--(partially redeemed)--> Redeemed
//! ```
//!
//! Transfers rebuilt from a message id or a source transaction start in
//! `Attested`. Every operation checks the current state before doing any work
//! and fails with [`VaaError::InvalidStateTransition`] without touching the
//! transfer when called out of order.

mod batch;
mod circle;
mod config;
mod context;
mod poll;
mod token;

use std::fmt;
use std::time::Duration;

use alloy_primitives::{Bytes, B256, U256};
use async_trait::async_trait;
use bon::Builder;

use crate::address::UniversalAddress;
use crate::chain::{Chain, ChainAddress};
use crate::error::{Result, VaaError};
use crate::traits::Signer;
use crate::vaa::Vaa;

pub use self::batch::{sign_send_wait, TxBatcher};
pub use self::circle::{CircleAttestation, CircleTransfer};
pub use self::config::{
    PollingConfig, ENV_BACKOFF_MULTIPLIER, ENV_MAX_ATTEMPTS, ENV_MAX_INTERVAL_SECS,
    ENV_POLL_INTERVAL_SECS,
};
pub use self::context::Wormhole;
pub use self::token::TokenTransfer;
pub use crate::vaa::WormholeMessageId;

/// Lifecycle of a transfer; only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransferState {
    Created,
    Initiated,
    Attested,
    /// Some, but not all, attestations have been redeemed.
    Redeemed,
    Completed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "Created",
            Self::Initiated => "Initiated",
            Self::Attested => "Attested",
            Self::Redeemed => "Redeemed",
            Self::Completed => "Completed",
        })
    }
}

/// Token being sent, relative to the source chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenAddress {
    /// The chain's gas token
    Native,
    Token(UniversalAddress),
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Token(address) => address.fmt(f),
        }
    }
}

/// Transaction hash qualified by its chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId {
    pub chain: Chain,
    pub txid: String,
}

impl TransactionId {
    pub fn new(chain: Chain, txid: impl Into<String>) -> Self {
        Self {
            chain,
            txid: txid.into(),
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.txid)
    }
}

/// What a transfer waits on between initiation and completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationId {
    /// A guardian-signed VAA
    Wormhole(WormholeMessageId),
    /// A Circle attestation, keyed by the keccak256 hash of the CCTP message
    Circle(B256),
}

impl fmt::Display for AttestationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wormhole(id) => id.fmt(f),
            Self::Circle(hash) => hash.fmt(f),
        }
    }
}

/// A Wormhole message of a transfer and, once fetched, its VAA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAttestation {
    pub id: WormholeMessageId,
    pub vaa: Option<Vaa>,
}

impl TransferAttestation {
    pub fn pending(id: WormholeMessageId) -> Self {
        Self { id, vaa: None }
    }
}

/// What to send, from where, to whom
///
/// # Examples
///
/// ```rust
/// use alloy_primitives::U256;
/// use vaa_rs::transfer::{TokenAddress, TransferDetails};
/// use vaa_rs::{Chain, ChainAddress, UniversalAddress};
///
/// let details = TransferDetails::builder()
///     .token(TokenAddress::Native)
///     .amount(U256::from(1_000_000u64))
///     .from(ChainAddress::new(Chain::Ethereum, UniversalAddress::new([1; 32])))
///     .to(ChainAddress::new(Chain::Solana, UniversalAddress::new([2; 32])))
///     .automatic(true)
///     .native_gas(U256::from(5_000u64))
///     .build();
/// assert!(details.validate().is_ok());
/// ```
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct TransferDetails {
    token: TokenAddress,
    amount: U256,
    from: ChainAddress,
    to: ChainAddress,
    payload: Option<Bytes>,
    /// Whether a relayer completes the transfer on the destination chain
    #[builder(default)]
    automatic: bool,
    /// Native gas for the relayer to drop off at the recipient
    native_gas: Option<U256>,
}

impl TransferDetails {
    pub fn token(&self) -> TokenAddress {
        self.token
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn from(&self) -> ChainAddress {
        self.from
    }

    pub fn to(&self) -> ChainAddress {
        self.to
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn automatic(&self) -> bool {
        self.automatic
    }

    pub fn native_gas(&self) -> Option<U256> {
        self.native_gas
    }

    /// Checks the combination of options, independently of any chain configuration.
    pub fn validate(&self) -> Result<()> {
        if self.from.chain == self.to.chain {
            return Err(VaaError::InvalidTransfer(format!(
                "source and destination are both {}",
                self.from.chain
            )));
        }
        if self.automatic && self.payload.is_some() {
            return Err(VaaError::InvalidTransfer(
                "automatic transfers cannot carry a payload".to_string(),
            ));
        }
        if self.native_gas.is_some() && !self.automatic {
            return Err(VaaError::InvalidTransfer(
                "native gas drop-off requires an automatic transfer".to_string(),
            ));
        }
        Ok(())
    }
}

/// A transfer driven through its lifecycle by the caller.
///
/// Calls on the same transfer must not overlap; each takes `&mut self`.
#[async_trait]
pub trait WormholeTransfer: Send {
    fn state(&self) -> TransferState;

    fn details(&self) -> &TransferDetails;

    /// Source and destination transactions submitted so far, in order.
    fn transactions(&self) -> &[TransactionId];

    fn attestation_ids(&self) -> Vec<AttestationId>;

    /// Sends the source chain transactions. Valid only in `Created`.
    async fn initiate_transfer(&mut self, signer: &dyn Signer) -> Result<Vec<TransactionId>>;

    /// Waits for every attestation. Valid in `Initiated` and `Attested`.
    ///
    /// `timeout` bounds the total time spent waiting, on top of the attempt
    /// limit of the polling configuration.
    async fn fetch_attestation(&mut self, timeout: Option<Duration>) -> Result<Vec<AttestationId>>;

    /// Redeems on the destination chain. Valid in `Attested` and `Redeemed`.
    async fn complete_transfer(&mut self, signer: &dyn Signer) -> Result<Vec<TransactionId>>;
}

pub(crate) fn require_state(
    operation: &'static str,
    state: TransferState,
    allowed: &[TransferState],
) -> Result<()> {
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(VaaError::InvalidStateTransition { operation, state })
    }
}

pub(crate) fn require_signer_chain(signer: &dyn Signer, chain: Chain) -> Result<()> {
    if signer.chain() == chain {
        Ok(())
    } else {
        Err(VaaError::InvalidTransfer(format!(
            "signer is on {}, expected {chain}",
            signer.chain()
        )))
    }
}
