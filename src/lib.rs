//! # vaa-rs
//!
//! A Rust toolkit for Wormhole cross-chain messaging: the VAA envelope, a
//! declarative binary layout engine, a registry of protocol payloads and the
//! token and Circle (CCTP) transfer lifecycles built on top of them.
//!
//! ## Parsing a VAA
//!
//! ```rust
//! use vaa_rs::{Chain, PayloadLiteral, UniversalAddress, Vaa, Value};
//!
//! # fn example() -> vaa_rs::Result<()> {
//! let vaa = Vaa::create()
//!     .payload_literal(PayloadLiteral::bare("Uint8Array"))
//!     .payload(Value::Bytes(b"hello".to_vec()))
//!     .emitter_chain(Chain::Ethereum)
//!     .emitter_address(UniversalAddress::new([0x11; 32]))
//!     .sequence(7)
//!     .build()?;
//!
//! let bytes = vaa.serialize()?;
//! let parsed = Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes)?;
//! assert_eq!(parsed.sequence(), 7);
//! assert_eq!(parsed.hash(), vaa.hash());
//! # Ok(())
//! # }
//! ```
//!
//! ## Transfers
//!
//! A [`Wormhole`] context holds one [`ChainContext`](traits::ChainContext) per
//! chain plus the attestation sources. [`TokenTransfer`] and
//! [`CircleTransfer`] drive a transfer through
//! [`TransferState::Created`] → `Initiated` → `Attested` → `Completed`:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use vaa_rs::providers::WormholescanVaaProvider;
//! use vaa_rs::traits::{ChainContext, Signer};
//! use vaa_rs::transfer::TransferDetails;
//! use vaa_rs::{Network, TokenTransfer, Wormhole, WormholeTransfer};
//!
//! # async fn example(
//! #     ethereum: Arc<dyn ChainContext>,
//! #     solana: Arc<dyn ChainContext>,
//! #     eth_signer: &dyn Signer,
//! #     sol_signer: &dyn Signer,
//! #     details: TransferDetails,
//! # ) -> vaa_rs::Result<()> {
//! let wormhole = Arc::new(
//!     Wormhole::builder()
//!         .network(Network::Testnet)
//!         .chains(vec![ethereum, solana])
//!         .vaa_provider(Arc::new(WormholescanVaaProvider::for_network(Network::Testnet)?))
//!         .build(),
//! );
//!
//! let mut transfer = TokenTransfer::new(wormhole, details)?;
//! transfer.initiate_transfer(eth_signer).await?;
//! transfer.fetch_attestation(Some(Duration::from_secs(600))).await?;
//! transfer.complete_transfer(sol_signer).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`layout`]: declarative binary layouts and the dynamic [`Value`] they decode to
//! - [`payload`] and [`protocol`]: the payload registry and the built-in protocol payloads
//! - [`traits`]: the seams to chains, signers, attestation APIs and time
//! - [`providers`]: production implementations of those seams
//! - [`testing`]: in-memory fakes for tests
//! - [`spans`]: tracing spans used across the crate

pub mod address;
pub mod chain;
mod error;
pub mod layout;
pub mod payload;
pub mod protocol;
pub mod providers;
pub mod spans;
pub mod testing;
pub mod traits;
pub mod transfer;
mod vaa;

pub use address::{AddressFormat, UniversalAddress};
pub use chain::{
    estimate_finalized_block, finality_threshold, Chain, ChainAddress, ConsistencyLevel, Network,
    Platform,
};
pub use error::{Result, VaaError};
pub use layout::Value;
pub use payload::{
    deserialize_payload, get_payload_layout, payload_registry, register_payload_type,
    serialize_payload, PayloadDiscriminator, PayloadLiteral, PayloadRegistry, PayloadSchema,
};
pub use transfer::{
    AttestationId, CircleTransfer, PollingConfig, TokenTransfer, TransactionId, TransferDetails,
    TransferState, Wormhole, WormholeTransfer,
};
pub use vaa::{PayloadSelector, Signature, Vaa, VaaDigest, WormholeMessageId, VAA_VERSION};
