//! Wormhole chain identifiers, platforms and networks
//!
//! Wormhole identifies every chain with a `u16` id that appears on the wire in
//! VAA envelopes and payloads. This module provides a strongly-typed enum for
//! those ids plus the platform each chain runs on, which decides how a
//! [`UniversalAddress`](crate::UniversalAddress) is rendered natively.

mod finality;

use std::fmt;
use std::str::FromStr;

use alloy_chains::NamedChain;

use crate::address::UniversalAddress;
use crate::error::{Result, VaaError};

pub use finality::{estimate_finalized_block, finality_threshold, ConsistencyLevel};

/// Wormhole chain identifier
///
/// # Example
///
/// ```rust
/// use vaa_rs::Chain;
///
/// assert_eq!(Chain::Ethereum.as_u16(), 2);
/// assert_eq!(Chain::from_u16(21), Some(Chain::Sui));
/// assert_eq!("Solana".parse::<Chain>().unwrap(), Chain::Solana);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
#[non_exhaustive]
pub enum Chain {
    Solana = 1,
    Ethereum = 2,
    Terra = 3,
    Bsc = 4,
    Polygon = 5,
    Avalanche = 6,
    Oasis = 7,
    Algorand = 8,
    Aurora = 9,
    Fantom = 10,
    Karura = 11,
    Acala = 12,
    Klaytn = 13,
    Celo = 14,
    Near = 15,
    Moonbeam = 16,
    Terra2 = 18,
    Injective = 19,
    Osmosis = 20,
    Sui = 21,
    Aptos = 22,
    Arbitrum = 23,
    Optimism = 24,
    Gnosis = 25,
    Pythnet = 26,
    Xpla = 28,
    Btc = 29,
    Base = 30,
    Sei = 32,
    Scroll = 34,
    Mantle = 35,
    Blast = 36,
    XLayer = 37,
    Linea = 38,
    Berachain = 39,
    Unichain = 44,
    Worldchain = 45,
    Wormchain = 3104,
    Cosmoshub = 4000,
    Evmos = 4001,
    Kujira = 4002,
    Neutron = 4003,
    Celestia = 4004,
    Noble = 4009,
    Sepolia = 10002,
    ArbitrumSepolia = 10003,
    BaseSepolia = 10004,
    OptimismSepolia = 10005,
    Holesky = 10006,
    PolygonSepolia = 10007,
}

impl Chain {
    /// Every known chain in id order.
    pub const ALL: &'static [Chain] = &[
        Self::Solana,
        Self::Ethereum,
        Self::Terra,
        Self::Bsc,
        Self::Polygon,
        Self::Avalanche,
        Self::Oasis,
        Self::Algorand,
        Self::Aurora,
        Self::Fantom,
        Self::Karura,
        Self::Acala,
        Self::Klaytn,
        Self::Celo,
        Self::Near,
        Self::Moonbeam,
        Self::Terra2,
        Self::Injective,
        Self::Osmosis,
        Self::Sui,
        Self::Aptos,
        Self::Arbitrum,
        Self::Optimism,
        Self::Gnosis,
        Self::Pythnet,
        Self::Xpla,
        Self::Btc,
        Self::Base,
        Self::Sei,
        Self::Scroll,
        Self::Mantle,
        Self::Blast,
        Self::XLayer,
        Self::Linea,
        Self::Berachain,
        Self::Unichain,
        Self::Worldchain,
        Self::Wormchain,
        Self::Cosmoshub,
        Self::Evmos,
        Self::Kujira,
        Self::Neutron,
        Self::Celestia,
        Self::Noble,
        Self::Sepolia,
        Self::ArbitrumSepolia,
        Self::BaseSepolia,
        Self::OptimismSepolia,
        Self::Holesky,
        Self::PolygonSepolia,
    ];

    /// Returns the numeric Wormhole chain id
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Attempts to create a Chain from its Wormhole chain id
    ///
    /// Id `0` is not a chain; governance payloads use it to mean "every chain".
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Solana),
            2 => Some(Self::Ethereum),
            3 => Some(Self::Terra),
            4 => Some(Self::Bsc),
            5 => Some(Self::Polygon),
            6 => Some(Self::Avalanche),
            7 => Some(Self::Oasis),
            8 => Some(Self::Algorand),
            9 => Some(Self::Aurora),
            10 => Some(Self::Fantom),
            11 => Some(Self::Karura),
            12 => Some(Self::Acala),
            13 => Some(Self::Klaytn),
            14 => Some(Self::Celo),
            15 => Some(Self::Near),
            16 => Some(Self::Moonbeam),
            18 => Some(Self::Terra2),
            19 => Some(Self::Injective),
            20 => Some(Self::Osmosis),
            21 => Some(Self::Sui),
            22 => Some(Self::Aptos),
            23 => Some(Self::Arbitrum),
            24 => Some(Self::Optimism),
            25 => Some(Self::Gnosis),
            26 => Some(Self::Pythnet),
            28 => Some(Self::Xpla),
            29 => Some(Self::Btc),
            30 => Some(Self::Base),
            32 => Some(Self::Sei),
            34 => Some(Self::Scroll),
            35 => Some(Self::Mantle),
            36 => Some(Self::Blast),
            37 => Some(Self::XLayer),
            38 => Some(Self::Linea),
            39 => Some(Self::Berachain),
            44 => Some(Self::Unichain),
            45 => Some(Self::Worldchain),
            3104 => Some(Self::Wormchain),
            4000 => Some(Self::Cosmoshub),
            4001 => Some(Self::Evmos),
            4002 => Some(Self::Kujira),
            4003 => Some(Self::Neutron),
            4004 => Some(Self::Celestia),
            4009 => Some(Self::Noble),
            10002 => Some(Self::Sepolia),
            10003 => Some(Self::ArbitrumSepolia),
            10004 => Some(Self::BaseSepolia),
            10005 => Some(Self::OptimismSepolia),
            10006 => Some(Self::Holesky),
            10007 => Some(Self::PolygonSepolia),
            _ => None,
        }
    }

    /// Returns the canonical chain name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Solana => "Solana",
            Self::Ethereum => "Ethereum",
            Self::Terra => "Terra",
            Self::Bsc => "Bsc",
            Self::Polygon => "Polygon",
            Self::Avalanche => "Avalanche",
            Self::Oasis => "Oasis",
            Self::Algorand => "Algorand",
            Self::Aurora => "Aurora",
            Self::Fantom => "Fantom",
            Self::Karura => "Karura",
            Self::Acala => "Acala",
            Self::Klaytn => "Klaytn",
            Self::Celo => "Celo",
            Self::Near => "Near",
            Self::Moonbeam => "Moonbeam",
            Self::Terra2 => "Terra2",
            Self::Injective => "Injective",
            Self::Osmosis => "Osmosis",
            Self::Sui => "Sui",
            Self::Aptos => "Aptos",
            Self::Arbitrum => "Arbitrum",
            Self::Optimism => "Optimism",
            Self::Gnosis => "Gnosis",
            Self::Pythnet => "Pythnet",
            Self::Xpla => "Xpla",
            Self::Btc => "Btc",
            Self::Base => "Base",
            Self::Sei => "Sei",
            Self::Scroll => "Scroll",
            Self::Mantle => "Mantle",
            Self::Blast => "Blast",
            Self::XLayer => "Xlayer",
            Self::Linea => "Linea",
            Self::Berachain => "Berachain",
            Self::Unichain => "Unichain",
            Self::Worldchain => "Worldchain",
            Self::Wormchain => "Wormchain",
            Self::Cosmoshub => "Cosmoshub",
            Self::Evmos => "Evmos",
            Self::Kujira => "Kujira",
            Self::Neutron => "Neutron",
            Self::Celestia => "Celestia",
            Self::Noble => "Noble",
            Self::Sepolia => "Sepolia",
            Self::ArbitrumSepolia => "ArbitrumSepolia",
            Self::BaseSepolia => "BaseSepolia",
            Self::OptimismSepolia => "OptimismSepolia",
            Self::Holesky => "Holesky",
            Self::PolygonSepolia => "PolygonSepolia",
        }
    }

    /// Returns the platform (execution environment) the chain runs on
    pub const fn platform(self) -> Platform {
        match self {
            Self::Solana | Self::Pythnet => Platform::Solana,
            Self::Terra
            | Self::Terra2
            | Self::Injective
            | Self::Osmosis
            | Self::Xpla
            | Self::Sei
            | Self::Wormchain
            | Self::Cosmoshub
            | Self::Evmos
            | Self::Kujira
            | Self::Neutron
            | Self::Celestia
            | Self::Noble => Platform::Cosmwasm,
            Self::Algorand => Platform::Algorand,
            Self::Near => Platform::Near,
            Self::Sui => Platform::Sui,
            Self::Aptos => Platform::Aptos,
            Self::Btc => Platform::Btc,
            _ => Platform::Evm,
        }
    }

    /// Maps an EVM chain to its alloy [`NamedChain`] on the given network
    ///
    /// Returns `None` for non-EVM chains and for chains without a
    /// deployment on that network.
    pub fn evm_chain(self, network: Network) -> Option<NamedChain> {
        use Network::*;
        let named = match (self, network) {
            (Self::Ethereum, Mainnet) => NamedChain::Mainnet,
            (Self::Ethereum, Testnet) | (Self::Sepolia, _) => NamedChain::Sepolia,
            (Self::Holesky, _) => NamedChain::Holesky,
            (Self::Arbitrum, Mainnet) => NamedChain::Arbitrum,
            (Self::Arbitrum, Testnet) | (Self::ArbitrumSepolia, _) => NamedChain::ArbitrumSepolia,
            (Self::Optimism, Mainnet) => NamedChain::Optimism,
            (Self::Optimism, Testnet) | (Self::OptimismSepolia, _) => NamedChain::OptimismSepolia,
            (Self::Base, Mainnet) => NamedChain::Base,
            (Self::Base, Testnet) | (Self::BaseSepolia, _) => NamedChain::BaseSepolia,
            (Self::Polygon, Mainnet) => NamedChain::Polygon,
            (Self::Polygon, Testnet) | (Self::PolygonSepolia, _) => NamedChain::PolygonAmoy,
            (Self::Avalanche, Mainnet) => NamedChain::Avalanche,
            (Self::Avalanche, Testnet) => NamedChain::AvalancheFuji,
            (Self::Bsc, Mainnet) => NamedChain::BinanceSmartChain,
            (Self::Bsc, Testnet) => NamedChain::BinanceSmartChainTestnet,
            (Self::Linea, Mainnet) => NamedChain::Linea,
            (Self::Unichain, Mainnet) => NamedChain::Unichain,
            (Self::Moonbeam, Mainnet) => NamedChain::Moonbeam,
            (Self::Celo, Mainnet) => NamedChain::Celo,
            (Self::Gnosis, Mainnet) => NamedChain::Gnosis,
            (Self::Fantom, Mainnet) => NamedChain::Fantom,
            (Self::Scroll, Mainnet) => NamedChain::Scroll,
            (Self::Mantle, Mainnet) => NamedChain::Mantle,
            (Self::Blast, Mainnet) => NamedChain::Blast,
            _ => return None,
        };
        Some(named)
    }

    /// EIP-155 chain id of [`evm_chain`](Self::evm_chain).
    pub fn evm_chain_id(self, network: Network) -> Option<u64> {
        self.evm_chain(network).map(|named| named as u64)
    }
}

impl From<Chain> for u16 {
    #[inline]
    fn from(chain: Chain) -> Self {
        chain.as_u16()
    }
}

impl TryFrom<u16> for Chain {
    type Error = VaaError;

    fn try_from(value: u16) -> Result<Self> {
        Self::from_u16(value).ok_or_else(|| VaaError::ChainNotSupported {
            chain: format!("chain id {value}"),
        })
    }
}

impl FromStr for Chain {
    type Err = VaaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|chain| chain.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| VaaError::ChainNotSupported {
                chain: s.to_string(),
            })
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Execution environment family of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Evm,
    Solana,
    Cosmwasm,
    Algorand,
    Aptos,
    Sui,
    Near,
    Btc,
}

impl Platform {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Evm => "Evm",
            Self::Solana => "Solana",
            Self::Cosmwasm => "Cosmwasm",
            Self::Algorand => "Algorand",
            Self::Aptos => "Aptos",
            Self::Sui => "Sui",
            Self::Near => "Near",
            Self::Btc => "Btc",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wormhole deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "Mainnet",
            Self::Testnet => "Testnet",
            Self::Devnet => "Devnet",
        })
    }
}

impl FromStr for Network {
    type Err = VaaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            other => Err(VaaError::InvalidConfig(format!("unknown network: {other}"))),
        }
    }
}

/// An address qualified by the chain it lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainAddress {
    pub chain: Chain,
    pub address: UniversalAddress,
}

impl ChainAddress {
    pub const fn new(chain: Chain, address: UniversalAddress) -> Self {
        Self { chain, address }
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}
