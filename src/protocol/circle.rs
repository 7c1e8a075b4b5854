//! Circle CCTP messages
//!
//! Circle's MessageTransmitter emits a `MessageSent(bytes)` event whose body
//! is a v1 message header wrapping a burn message. The message is attested by
//! Circle's own service rather than by guardians, so it never travels inside
//! a VAA; it is registered as `CircleBridge:Message` so the same layout
//! machinery decodes it.
//!
//! Reference: <https://developers.circle.com/stablecoins/message-format>

use std::fmt;

use alloy_primitives::{keccak256, B256, U256};

use crate::address::UniversalAddress;
use crate::chain::{Chain, Network};
use crate::error::{Result, VaaError};
use crate::layout::{
    amount_item, deserialize_layout_exact, field, serialize_layout, universal_address_item, Item,
    Layout, LayoutError, Value,
};
use crate::payload::{PayloadLiteral, PayloadRegistry};

pub const PROTOCOL: &str = "CircleBridge";

pub const MESSAGE: &str = "Message";

pub fn literal() -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, MESSAGE)
}

/// CCTP domain of a chain
///
/// Circle numbers chains independently of Wormhole; both the message header
/// and the Circle integration payload carry these ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[non_exhaustive]
pub enum DomainId {
    Ethereum = 0,
    Avalanche = 1,
    Optimism = 2,
    Arbitrum = 3,
    Noble = 4,
    Solana = 5,
    Base = 6,
    Polygon = 7,
    Sui = 8,
    Aptos = 9,
    Unichain = 10,
    Linea = 11,
    WorldChain = 14,
}

impl DomainId {
    pub const ALL: [DomainId; 13] = [
        Self::Ethereum,
        Self::Avalanche,
        Self::Optimism,
        Self::Arbitrum,
        Self::Noble,
        Self::Solana,
        Self::Base,
        Self::Polygon,
        Self::Sui,
        Self::Aptos,
        Self::Unichain,
        Self::Linea,
        Self::WorldChain,
    ];

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ethereum),
            1 => Some(Self::Avalanche),
            2 => Some(Self::Optimism),
            3 => Some(Self::Arbitrum),
            4 => Some(Self::Noble),
            5 => Some(Self::Solana),
            6 => Some(Self::Base),
            7 => Some(Self::Polygon),
            8 => Some(Self::Sui),
            9 => Some(Self::Aptos),
            10 => Some(Self::Unichain),
            11 => Some(Self::Linea),
            14 => Some(Self::WorldChain),
            _ => None,
        }
    }

    /// Wormhole chain this domain lives on in `network`.
    ///
    /// Testnet domains share ids with mainnet but map to the Sepolia
    /// deployments where Wormhole assigns those a separate chain id.
    pub const fn chain(self, network: Network) -> Chain {
        match (self, network) {
            (Self::Ethereum, Network::Mainnet) => Chain::Ethereum,
            (Self::Ethereum, _) => Chain::Sepolia,
            (Self::Optimism, Network::Mainnet) => Chain::Optimism,
            (Self::Optimism, _) => Chain::OptimismSepolia,
            (Self::Arbitrum, Network::Mainnet) => Chain::Arbitrum,
            (Self::Arbitrum, _) => Chain::ArbitrumSepolia,
            (Self::Base, Network::Mainnet) => Chain::Base,
            (Self::Base, _) => Chain::BaseSepolia,
            (Self::Polygon, Network::Mainnet) => Chain::Polygon,
            (Self::Polygon, _) => Chain::PolygonSepolia,
            (Self::Avalanche, _) => Chain::Avalanche,
            (Self::Noble, _) => Chain::Noble,
            (Self::Solana, _) => Chain::Solana,
            (Self::Sui, _) => Chain::Sui,
            (Self::Aptos, _) => Chain::Aptos,
            (Self::Unichain, _) => Chain::Unichain,
            (Self::Linea, _) => Chain::Linea,
            (Self::WorldChain, _) => Chain::Worldchain,
        }
    }

    /// Inverse of [`DomainId::chain`], for any network.
    pub fn from_chain(chain: Chain) -> Option<Self> {
        Self::ALL.into_iter().find(|domain| {
            [Network::Mainnet, Network::Testnet]
                .into_iter()
                .any(|network| domain.chain(network) == chain)
        })
    }
}

impl From<DomainId> for u32 {
    #[inline]
    fn from(domain: DomainId) -> Self {
        domain.as_u32()
    }
}

impl TryFrom<u32> for DomainId {
    type Error = VaaError;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_u32(value).ok_or_else(|| VaaError::ChainNotSupported {
            chain: format!("CCTP domain {value}"),
        })
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.as_u32())
    }
}

pub fn burn_message_layout() -> Layout {
    Layout::new(vec![
        field("version", Item::uint(4).fixed(0u32)),
        field("burnToken", universal_address_item()),
        field("mintRecipient", universal_address_item()),
        field("amount", amount_item()),
        field("messageSender", universal_address_item()),
    ])
}

pub fn message_layout() -> Layout {
    Layout::new(vec![
        field("version", Item::uint(4).fixed(0u32)),
        field("sourceDomain", Item::uint(4)),
        field("destinationDomain", Item::uint(4)),
        field("nonce", Item::uint(8)),
        field("sender", universal_address_item()),
        field("recipient", universal_address_item()),
        field("destinationCaller", universal_address_item()),
        field("payload", Item::object(burn_message_layout())),
    ])
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(PROTOCOL, MESSAGE, message_layout())
}

/// Body of a USDC burn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnMessage {
    pub burn_token: UniversalAddress,
    pub mint_recipient: UniversalAddress,
    pub amount: U256,
    pub message_sender: UniversalAddress,
}

/// Decoded v1 CCTP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleMessage {
    pub source_domain: DomainId,
    pub destination_domain: DomainId,
    pub nonce: u64,
    pub sender: UniversalAddress,
    pub recipient: UniversalAddress,
    pub destination_caller: UniversalAddress,
    pub payload: BurnMessage,
}

impl CircleMessage {
    /// Decodes a message and returns it with its keccak256 hash, the key
    /// Circle's attestation service indexes it by.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, B256)> {
        let value = deserialize_layout_exact(&message_layout(), bytes)?;
        Ok((Self::from_value(&value)?, keccak256(bytes)))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serialize_layout(&message_layout(), &self.to_value())?)
    }

    pub fn hash(&self) -> Result<B256> {
        Ok(keccak256(self.serialize()?))
    }

    fn from_value(value: &Value) -> std::result::Result<Self, LayoutError> {
        let body = value.field("payload")?;
        Ok(Self {
            source_domain: domain_field(value, "sourceDomain")?,
            destination_domain: domain_field(value, "destinationDomain")?,
            nonce: value.u64_field("nonce")?,
            sender: value.address_field("sender")?,
            recipient: value.address_field("recipient")?,
            destination_caller: value.address_field("destinationCaller")?,
            payload: BurnMessage {
                burn_token: body.address_field("burnToken")?,
                mint_recipient: body.address_field("mintRecipient")?,
                amount: body.u256_field("amount")?,
                message_sender: body.address_field("messageSender")?,
            },
        })
    }

    fn to_value(&self) -> Value {
        Value::object([
            ("sourceDomain", Value::from(self.source_domain.as_u32())),
            ("destinationDomain", Value::from(self.destination_domain.as_u32())),
            ("nonce", Value::from(self.nonce)),
            ("sender", Value::Address(self.sender)),
            ("recipient", Value::Address(self.recipient)),
            ("destinationCaller", Value::Address(self.destination_caller)),
            (
                "payload",
                Value::object([
                    ("burnToken", Value::Address(self.payload.burn_token)),
                    ("mintRecipient", Value::Address(self.payload.mint_recipient)),
                    ("amount", Value::from(self.payload.amount)),
                    ("messageSender", Value::Address(self.payload.message_sender)),
                ]),
            ),
        ])
    }
}

fn domain_field(value: &Value, key: &str) -> std::result::Result<DomainId, LayoutError> {
    let raw = value.u64_field(key)?;
    u32::try_from(raw)
        .ok()
        .and_then(DomainId::from_u32)
        .ok_or_else(|| LayoutError::Conversion {
            field: key.to_string(),
            reason: format!("unknown CCTP domain {raw}"),
        })
}
