//! Generic relayer payloads

use crate::error::Result;
use crate::layout::{
    amount_item, chain_item, field, sequence_item, universal_address_item, Item, Layout,
    LengthSpec, SwitchCase,
};
use crate::payload::{PayloadLiteral, PayloadRegistry};

pub const PROTOCOL: &str = "Relayer";

pub const DELIVERY_INSTRUCTION: &str = "DeliveryInstruction";
pub const REDELIVERY_INSTRUCTION: &str = "RedeliveryInstruction";

pub fn literal(name: &str) -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, name)
}

/// Key of a VAA: `(chain, emitterAddress, sequence)`.
pub fn vaa_key_layout() -> Layout {
    Layout::new(vec![
        field("chain", chain_item()),
        field("emitterAddress", universal_address_item()),
        field("sequence", sequence_item()),
    ])
}

/// Key of a CCTP message, length-prefixed so unknown key types can be skipped.
pub fn cctp_key_layout() -> Layout {
    Layout::new(vec![
        field("size", Item::uint(4).fixed(12u32)),
        field("domain", Item::uint(4)),
        field("nonce", Item::uint(8)),
    ])
}

pub fn message_key_item() -> Item {
    Item::switch(
        1,
        "keyType",
        vec![
            SwitchCase::named(1, "VAA", vaa_key_layout()),
            SwitchCase::named(2, "CCTP", cctp_key_layout()),
        ],
    )
}

/// EVM `executionInfo`: `(version 0, gasLimit, targetChainRefundPerGasUnused)`.
pub fn evm_execution_info_layout() -> Layout {
    Layout::new(vec![
        field("version", Item::uint(1).fixed(0u8)),
        field("gasLimit", amount_item()),
        field("targetChainRefundPerGasUnused", amount_item()),
    ])
}

pub fn delivery_instruction_layout() -> Layout {
    Layout::new(vec![
        field("payloadId", Item::uint(1).fixed(1u8)),
        field("targetChain", chain_item()),
        field("targetAddress", universal_address_item()),
        field("payload", Item::prefixed_bytes(4)),
        field("requestedReceiverValue", amount_item()),
        field("extraReceiverValue", amount_item()),
        field("executionInfo", Item::prefixed_bytes(4)),
        field("refundChain", chain_item()),
        field("refundAddress", universal_address_item()),
        field("refundDeliveryProvider", universal_address_item()),
        field("sourceDeliveryProvider", universal_address_item()),
        field("senderAddress", universal_address_item()),
        field(
            "messageKeys",
            Item::array(LengthSpec::prefixed(1), message_key_item()),
        ),
    ])
}

pub fn redelivery_instruction_layout() -> Layout {
    Layout::new(vec![
        field("payloadId", Item::uint(1).fixed(2u8)),
        field("deliveryVaaKey", Item::object(vaa_key_layout())),
        field("targetChain", chain_item()),
        field("newRequestedReceiverValue", amount_item()),
        field("newEncodedExecutionInfo", Item::prefixed_bytes(4)),
        field("newSourceDeliveryProvider", universal_address_item()),
        field("newSenderAddress", universal_address_item()),
    ])
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(PROTOCOL, DELIVERY_INSTRUCTION, delivery_instruction_layout())?;
    registry.register_payload_type(
        PROTOCOL,
        REDELIVERY_INSTRUCTION,
        redelivery_instruction_layout(),
    )
}
