//! Token bridge relayer payloads
//!
//! An automatic transfer is a token bridge `TransferWithPayload` addressed to
//! the relayer contract, whose payload carries the relaying instructions. On
//! the wire it is indistinguishable from any other `TransferWithPayload` with
//! a well-formed 97-byte payload, so decoders pick it by comparing the
//! recipient with the known relayer address.

use super::token_bridge;
use crate::address::UniversalAddress;
use crate::error::Result;
use crate::layout::{amount_item, field, universal_address_item, Item, Layout};
use crate::payload::{PayloadLiteral, PayloadRegistry};

pub const PROTOCOL: &str = "AutomaticTokenBridge";

pub const TRANSFER_WITH_RELAY: &str = "TransferWithRelay";

pub fn literal() -> PayloadLiteral {
    PayloadLiteral::new(PROTOCOL, TRANSFER_WITH_RELAY)
}

pub fn relay_instructions_layout() -> Layout {
    Layout::new(vec![
        field("version", Item::uint(1).fixed(1u8)),
        field("targetRelayerFee", amount_item()),
        field("toNativeTokenAmount", amount_item()),
        field("targetRecipient", universal_address_item()),
    ])
}

pub fn transfer_with_relay_layout() -> Layout {
    token_bridge::transfer_with_payload_layout_with(
        Item::remainder_bytes().with_layout(relay_instructions_layout()),
    )
}

pub(crate) fn register(registry: &PayloadRegistry) -> Result<()> {
    registry.register_payload_type(PROTOCOL, TRANSFER_WITH_RELAY, transfer_with_relay_layout())
}

/// Whether a transfer addressed to `recipient` is meant for the relayer at `relayer`.
///
/// This is the only signal available on the wire; a manual transfer that
/// happens to target the relayer contract is classified as automatic.
pub fn is_relayed(recipient: &UniversalAddress, relayer: &UniversalAddress) -> bool {
    recipient == relayer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::layout::{deserialize_layout_exact, serialize_layout, Value};
    use crate::payload::PayloadDiscriminator;
    use alloy_primitives::U256;

    fn relayed_transfer() -> Value {
        let relayer = UniversalAddress::new([0x77; 32]);
        Value::object([
            (
                "token",
                Value::object([
                    ("amount", Value::from(U256::from(5_000_000u64))),
                    ("address", Value::Address(UniversalAddress::new([0x11; 32]))),
                    ("chain", Value::Chain(Chain::Ethereum)),
                ]),
            ),
            (
                "to",
                Value::object([
                    ("address", Value::Address(relayer)),
                    ("chain", Value::Chain(Chain::Avalanche)),
                ]),
            ),
            ("from", Value::Address(UniversalAddress::new([0x22; 32]))),
            (
                "payload",
                Value::object([
                    ("targetRelayerFee", Value::from(U256::from(100u64))),
                    ("toNativeTokenAmount", Value::from(U256::ZERO)),
                    ("targetRecipient", Value::Address(UniversalAddress::new([0x33; 32]))),
                ]),
            ),
        ])
    }

    #[test]
    fn test_nested_relay_instructions() {
        let value = relayed_transfer();
        let bytes = serialize_layout(&transfer_with_relay_layout(), &value).unwrap();
        assert_eq!(bytes.len(), 1 + 66 + 34 + 32 + 97);
        assert_eq!(bytes[133], 1, "relay instructions version");
        assert_eq!(deserialize_layout_exact(&transfer_with_relay_layout(), &bytes).unwrap(), value);
    }

    #[test]
    fn test_ambiguous_with_plain_transfer_with_payload() {
        let registry = PayloadRegistry::new();
        token_bridge::register(&registry).unwrap();
        register(&registry).unwrap();
        let bytes = serialize_layout(&transfer_with_relay_layout(), &relayed_transfer()).unwrap();

        let discriminator = PayloadDiscriminator::new(
            &registry,
            [token_bridge::literal(token_bridge::TRANSFER_WITH_PAYLOAD), literal()],
        )
        .unwrap();
        assert!(discriminator.discriminate(&bytes).is_err());

        let all = discriminator.allow_ambiguous(true).discriminate_all(&bytes).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_is_relayed() {
        let relayer = UniversalAddress::new([0x77; 32]);
        assert!(is_relayed(&relayer, &relayer));
        assert!(!is_relayed(&UniversalAddress::ZERO, &relayer));
    }
}
