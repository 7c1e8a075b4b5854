//! Native Token Transfer payloads
//!
//! A Wormhole transceiver message nests three levels of length-prefixed
//! data: transceiver envelope, manager message, and the token transfer
//! itself. Each level starts with a 4-byte magic prefix.

use crate::error::Result;
use crate::layout::{chain_item, field, universal_address_item, Item, Layout};
use crate::payload::{PayloadLiteral, PayloadRegistry};

pub const PROTOCOL: &str = "Ntt";

pub const WORMHOLE_TRANSFER: &str = "WormholeTransfer";
pub const TRANSCEIVER_REGISTRATION: &str = "TransceiverRegistration";

pub const WORMHOLE_TRANSCEIVER_PREFIX: [u8; 4] = [0x99, 0x45, 0xff, 0x10];
pub const NATIVE_TOKEN_TRANSFER_PREFIX: [u8; 4] = [0x99, 0x4e, 0x54, 0x54];
pub const TRANSCEIVER_REGISTRATION_PREFIX: [u8; 4] = [0x18, 0xfc, 0x67, 0xc2];

pub fn literal(name: &str) -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, name)
}

fn prefix(magic: [u8; 4]) -> crate::layout::Field {
    field("prefix", Item::bytes(4).fixed(magic))
}

/// Amount scaled to at most 8 decimals, with the decimals it was scaled to.
pub fn trimmed_amount_layout() -> Layout {
    Layout::new(vec![
        field("decimals", Item::uint(1)),
        field("amount", Item::uint(8)),
    ])
}

pub fn native_token_transfer_layout() -> Layout {
    Layout::new(vec![
        prefix(NATIVE_TOKEN_TRANSFER_PREFIX),
        field("trimmedAmount", Item::object(trimmed_amount_layout())),
        field("sourceToken", universal_address_item()),
        field("recipientAddress", universal_address_item()),
        field("recipientChain", chain_item()),
    ])
}

pub fn manager_message_layout() -> Layout {
    Layout::new(vec![
        field("id", Item::bytes(32)),
        field("sender", universal_address_item()),
        field(
            "payload",
            Item::prefixed_bytes(2).with_layout(native_token_transfer_layout()),
        ),
    ])
}

pub fn wormhole_transfer_layout() -> Layout {
    Layout::new(vec![
        prefix(WORMHOLE_TRANSCEIVER_PREFIX),
        field("sourceNttManager", universal_address_item()),
        field("recipientNttManager", universal_address_item()),
        field(
            "nttManagerPayload",
            Item::prefixed_bytes(2).with_layout(manager_message_layout()),
        ),
        field("transceiverPayload", Item::prefixed_bytes(2)),
    ])
}

pub fn transceiver_registration_layout() -> Layout {
    Layout::new(vec![
        prefix(TRANSCEIVER_REGISTRATION_PREFIX),
        field("transceiverChainId", chain_item()),
        field("transceiverAddress", universal_address_item()),
    ])
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(PROTOCOL, WORMHOLE_TRANSFER, wormhole_transfer_layout())?;
    registry.register_payload_type(
        PROTOCOL,
        TRANSCEIVER_REGISTRATION,
        transceiver_registration_layout(),
    )
}
