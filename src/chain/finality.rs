//! Consistency levels and finality estimation
//!
//! A VAA's `consistency_level` byte is chain specific. This module interprets
//! it as one of three named levels and estimates the source block at which a
//! message emitted at block `N` becomes eligible for attestation.

use std::fmt;

use super::{Chain, Platform};

/// EVM consistency level requesting attestation without waiting for finality
pub const EVM_CONSISTENCY_INSTANT: u8 = 200;
/// EVM consistency level requesting attestation at the `safe` block tag
pub const EVM_CONSISTENCY_SAFE: u8 = 201;
/// Solana `confirmed` commitment
pub const SOLANA_CONSISTENCY_CONFIRMED: u8 = 0;

/// Named finality requirement
///
/// # Example
///
/// ```rust
/// use vaa_rs::{Chain, ConsistencyLevel};
///
/// assert_eq!(ConsistencyLevel::from_raw(Chain::Ethereum, 200), ConsistencyLevel::Instant);
/// assert_eq!(ConsistencyLevel::from_raw(Chain::Ethereum, 201), ConsistencyLevel::Safe);
/// assert_eq!(ConsistencyLevel::from_raw(Chain::Ethereum, 1), ConsistencyLevel::Finalized);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    /// Attested as soon as the block is seen
    Instant,
    /// Attested once the block reaches the chain's safe checkpoint
    Safe,
    /// Attested once the block is final
    Finalized,
}

impl ConsistencyLevel {
    /// Interprets a raw consistency byte for the given emitter chain.
    pub fn from_raw(chain: Chain, raw: u8) -> Self {
        match chain.platform() {
            Platform::Evm => match raw {
                EVM_CONSISTENCY_INSTANT => Self::Instant,
                EVM_CONSISTENCY_SAFE => Self::Safe,
                _ => Self::Finalized,
            },
            Platform::Solana => match raw {
                SOLANA_CONSISTENCY_CONFIRMED => Self::Instant,
                _ => Self::Finalized,
            },
            _ => Self::Instant,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Safe => "safe",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of blocks after which a block is considered final.
///
/// Chains with instant finality return `0`.
pub const fn finality_threshold(chain: Chain) -> u64 {
    match chain {
        Chain::Ethereum | Chain::Sepolia | Chain::Holesky => 64,
        Chain::Solana | Chain::Pythnet => 32,
        Chain::Polygon | Chain::PolygonSepolia => 512,
        Chain::Bsc => 15,
        _ => 0,
    }
}

/// Estimates the block at which a message emitted at `from_block` is attested.
///
/// `Instant` levels resolve at `from_block`, `Safe` levels at the next
/// multiple of the finality threshold, and `Finalized` levels a full threshold
/// later.
///
/// # Example
///
/// ```rust
/// use vaa_rs::{estimate_finalized_block, Chain, ConsistencyLevel};
///
/// assert_eq!(estimate_finalized_block(Chain::Ethereum, ConsistencyLevel::Safe, 100), 128);
/// assert_eq!(estimate_finalized_block(Chain::Ethereum, ConsistencyLevel::Finalized, 100), 164);
/// ```
pub fn estimate_finalized_block(chain: Chain, level: ConsistencyLevel, from_block: u64) -> u64 {
    let threshold = finality_threshold(chain);
    match level {
        ConsistencyLevel::Instant => from_block,
        ConsistencyLevel::Safe => from_block.saturating_add(blocks_to_next_multiple(from_block, threshold)),
        ConsistencyLevel::Finalized => from_block.saturating_add(threshold),
    }
}

fn blocks_to_next_multiple(block: u64, threshold: u64) -> u64 {
    if threshold == 0 {
        return 0;
    }
    (threshold - block % threshold) % threshold
}
