//! Portal token bridge payloads
//!
//! | id | payload |
//! |----|---------|
//! | 1  | `Transfer` |
//! | 2  | `AttestMeta` |
//! | 3  | `TransferWithPayload` |

use crate::chain::ChainAddress;
use crate::error::Result;
use crate::layout::{
    amount_item, chain_item, field, fixed_string_item, universal_address_item, Alignment, Item,
    Layout, LayoutError, Value,
};
use crate::payload::{PayloadLiteral, PayloadRegistry};

pub const PROTOCOL: &str = "TokenBridge";

pub const TRANSFER: &str = "Transfer";
pub const ATTEST_META: &str = "AttestMeta";
pub const TRANSFER_WITH_PAYLOAD: &str = "TransferWithPayload";

pub fn literal(name: &str) -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, name)
}

fn payload_id(id: u8) -> crate::layout::Field {
    field("payloadId", Item::uint(1).fixed(id))
}

/// `{ amount, address, chain }` of the bridged token.
pub(crate) fn token_layout() -> Layout {
    Layout::new(vec![
        field("amount", amount_item()),
        field("address", universal_address_item()),
        field("chain", chain_item()),
    ])
}

pub(crate) fn chain_address_layout() -> Layout {
    Layout::new(vec![
        field("address", universal_address_item()),
        field("chain", chain_item()),
    ])
}

fn transfer_common() -> Layout {
    Layout::new(vec![
        field("token", Item::object(token_layout())),
        field("to", Item::object(chain_address_layout())),
    ])
}

pub fn transfer_layout() -> Layout {
    Layout::new(vec![payload_id(1)])
        .extend(transfer_common())
        .extend(Layout::new(vec![field("fee", amount_item())]))
}

pub fn attest_meta_layout() -> Layout {
    Layout::new(vec![
        payload_id(2),
        field("token", Item::object(chain_address_layout())),
        field("decimals", Item::uint(1)),
        field("symbol", fixed_string_item(32, Alignment::Left)),
        field("name", fixed_string_item(32, Alignment::Left)),
    ])
}

/// `TransferWithPayload` whose trailing `payload` is decoded with `payload`.
pub fn transfer_with_payload_layout_with(payload: Item) -> Layout {
    Layout::new(vec![payload_id(3)])
        .extend(transfer_common())
        .extend(Layout::new(vec![
            field("from", universal_address_item()),
            field("payload", payload),
        ]))
}

pub fn transfer_with_payload_layout() -> Layout {
    transfer_with_payload_layout_with(Item::remainder_bytes())
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(PROTOCOL, TRANSFER, transfer_layout())?;
    registry.register_payload_type(PROTOCOL, ATTEST_META, attest_meta_layout())?;
    registry.register_payload_type(PROTOCOL, TRANSFER_WITH_PAYLOAD, transfer_with_payload_layout())
}

/// Destination (`to`) of a decoded transfer payload.
pub fn transfer_recipient(payload: &Value) -> std::result::Result<ChainAddress, LayoutError> {
    let to = payload.field("to")?;
    Ok(ChainAddress::new(to.chain_field("chain")?, to.address_field("address")?))
}

/// Bridged token (`token.chain`, `token.address`) of a decoded transfer payload.
pub fn transfer_token(payload: &Value) -> std::result::Result<ChainAddress, LayoutError> {
    let token = payload.field("token")?;
    Ok(ChainAddress::new(
        token.chain_field("chain")?,
        token.address_field("address")?,
    ))
}
