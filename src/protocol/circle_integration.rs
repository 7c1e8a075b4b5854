//! Wormhole Circle integration payloads
//!
//! The integration contract wraps a CCTP burn in a VAA so a relayer can
//! redeem both the Circle message and the Wormhole message in one call.

use crate::error::Result;
use crate::layout::{amount_item, field, universal_address_item, Item, Layout, Value};
use crate::payload::{PayloadLiteral, PayloadRegistry};

use super::circle::DomainId;

pub const PROTOCOL: &str = "CircleIntegration";

pub const TRANSFER_WITH_PAYLOAD: &str = "TransferWithPayload";

pub fn literal() -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, TRANSFER_WITH_PAYLOAD)
}

pub fn transfer_with_payload_layout() -> Layout {
    Layout::new(vec![
        field("payloadId", Item::uint(1).fixed(1u8)),
        field(
            "token",
            Item::object(Layout::new(vec![
                field("address", universal_address_item()),
                field("amount", amount_item()),
            ])),
        ),
        field("sourceDomain", Item::uint(4)),
        field("targetDomain", Item::uint(4)),
        field("nonce", Item::uint(8)),
        field("caller", universal_address_item()),
        field("mintRecipient", universal_address_item()),
        field("payload", Item::prefixed_bytes(2)),
    ])
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(PROTOCOL, TRANSFER_WITH_PAYLOAD, transfer_with_payload_layout())
}

/// `(sourceDomain, nonce)` of a decoded payload, the pair that identifies its Circle message.
pub fn circle_message_key(payload: &Value) -> Option<(DomainId, u64)> {
    let domain = payload
        .get("sourceDomain")?
        .as_u64()
        .and_then(|domain| u32::try_from(domain).ok())
        .and_then(DomainId::from_u32)?;
    Some((domain, payload.get("nonce")?.as_u64()?))
}
