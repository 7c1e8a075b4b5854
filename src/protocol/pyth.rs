//! Pyth price attestation payloads

use crate::error::Result;
use crate::layout::{field, Item, Layout};
use crate::payload::{PayloadLiteral, PayloadRegistry};

pub const PROTOCOL: &str = "Pyth";

pub const WORMHOLE_MERKLE_ROOT: &str = "WormholeMerkleRoot";
pub const PRICE_FEED_MESSAGE: &str = "PriceFeedMessage";

/// Magic of an accumulator update ("Accumulator Update Wormhole Verification").
pub const ACCUMULATOR_MAGIC: [u8; 4] = *b"AUWV";

pub fn literal(name: &str) -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, name)
}

pub fn wormhole_merkle_root_layout() -> Layout {
    Layout::new(vec![
        field("magic", Item::bytes(4).fixed(ACCUMULATOR_MAGIC)),
        field("updateType", Item::uint(1).fixed(0u8)),
        field("slot", Item::uint(8)),
        field("ringSize", Item::uint(4)),
        field("root", Item::bytes(20)),
    ])
}

pub fn price_feed_message_layout() -> Layout {
    Layout::new(vec![
        field("messageType", Item::uint(1).fixed(0u8)),
        field("feedId", Item::bytes(32)),
        field("price", Item::int(8)),
        field("confidence", Item::uint(8)),
        field("exponent", Item::int(4)),
        field("publishTime", Item::int(8)),
        field("prevPublishTime", Item::int(8)),
        field("emaPrice", Item::int(8)),
        field("emaConfidence", Item::uint(8)),
    ])
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(
        PROTOCOL,
        WORMHOLE_MERKLE_ROOT,
        wormhole_merkle_root_layout(),
    )?;
    registry.register_payload_type(PROTOCOL, PRICE_FEED_MESSAGE, price_feed_message_layout())
}
