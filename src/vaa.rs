//! VAA envelope
//!
//! Wire format, all integers big-endian:
//!
//! ```text
//! version u8 (=1) | guardianSet u32 | sigCount u8 | sigCount x (guardianIndex u8, signature [65])
//! timestamp u32 | nonce u32 | emitterChain u16 | emitterAddress [32] | sequence u64 | consistencyLevel u8
//! payload ..
//! ```
//!
//! The first line is the header, the second the body envelope. The VAA hash
//! covers the envelope and payload only, so it does not change as guardian
//! signatures are added.

use std::fmt;

use alloy_primitives::{keccak256, FixedBytes, B256};
use bon::bon;

use crate::address::UniversalAddress;
use crate::chain::{Chain, ConsistencyLevel};
use crate::error::{Result, VaaError};
use crate::layout::{
    chain_item, deserialize_layout, field, sequence_item, serialize_layout_into, signature_item,
    universal_address_item, Item, Layout, LayoutError, LengthSpec, Value,
};
use crate::payload::{payload_registry, PayloadDiscriminator, PayloadLiteral, PayloadRegistry};

/// The only VAA version in use.
pub const VAA_VERSION: u8 = 1;

/// Guardian signature over the VAA digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub guardian_index: u8,
    /// Recoverable secp256k1 signature, `r || s || v`
    pub signature: FixedBytes<65>,
}

/// Hashes of a VAA body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaaDigest {
    /// keccak256 of the body
    pub hash: B256,
    /// keccak256 of `hash`, the message guardians sign
    pub secp256k_hash: B256,
}

/// Identifies a Wormhole message independently of its signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WormholeMessageId {
    pub chain: Chain,
    pub emitter: UniversalAddress,
    pub sequence: u64,
}

impl fmt::Display for WormholeMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.chain.as_u16(), self.emitter, self.sequence)
    }
}

/// How the payload of a VAA being decoded is identified
#[derive(Debug, Clone)]
pub enum PayloadSelector<'a> {
    /// The caller knows the payload type.
    Literal(PayloadLiteral),
    /// The payload type is recovered from its bytes.
    Discriminator(&'a PayloadDiscriminator),
}

impl From<PayloadLiteral> for PayloadSelector<'_> {
    fn from(literal: PayloadLiteral) -> Self {
        Self::Literal(literal)
    }
}

impl<'a> From<&'a PayloadDiscriminator> for PayloadSelector<'a> {
    fn from(discriminator: &'a PayloadDiscriminator) -> Self {
        Self::Discriminator(discriminator)
    }
}

fn header_layout() -> Layout {
    Layout::new(vec![
        field("version", Item::uint(1)),
        field("guardianSet", Item::uint(4)),
        field(
            "signatures",
            Item::array(
                LengthSpec::prefixed(1),
                Item::object(Layout::new(vec![
                    field("guardianIndex", Item::uint(1)),
                    field("signature", signature_item()),
                ])),
            ),
        ),
    ])
}

fn envelope_layout() -> Layout {
    Layout::new(vec![
        field("timestamp", Item::uint(4)),
        field("nonce", Item::uint(4)),
        field("emitterChain", chain_item()),
        field("emitterAddress", universal_address_item()),
        field("sequence", sequence_item()),
        field("consistencyLevel", Item::uint(1)),
    ])
}

/// Signed, decoded VAA
///
/// Immutable once built: either decoded from bytes with
/// [`Vaa::deserialize`] or assembled with [`Vaa::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vaa {
    guardian_set: u32,
    signatures: Vec<Signature>,
    timestamp: u32,
    nonce: u32,
    emitter_chain: Chain,
    emitter_address: UniversalAddress,
    sequence: u64,
    consistency_level: u8,
    payload_literal: PayloadLiteral,
    payload: Value,
    hash: B256,
}

#[bon]
impl Vaa {
    /// Assembles a VAA, serializing `payload` with the globally registered
    /// layout of `payload_literal` to compute its hash.
    ///
    /// ```rust
    /// use vaa_rs::{Chain, PayloadLiteral, UniversalAddress, Vaa, Value};
    ///
    /// let vaa = Vaa::create()
    ///     .payload_literal(PayloadLiteral::bare("Uint8Array"))
    ///     .payload(Value::Bytes(b"hello".to_vec()))
    ///     .emitter_chain(Chain::Solana)
    ///     .emitter_address(UniversalAddress::ZERO)
    ///     .sequence(1)
    ///     .build()
    ///     .unwrap();
    /// let bytes = vaa.serialize().unwrap();
    /// assert_eq!(Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes).unwrap(), vaa);
    /// ```
    #[builder(finish_fn = build)]
    pub fn create(
        payload_literal: PayloadLiteral,
        payload: Value,
        emitter_chain: Chain,
        emitter_address: UniversalAddress,
        #[builder(default)] sequence: u64,
        #[builder(default)] guardian_set: u32,
        #[builder(default)] signatures: Vec<Signature>,
        #[builder(default)] timestamp: u32,
        #[builder(default)] nonce: u32,
        #[builder(default)] consistency_level: u8,
    ) -> Result<Self> {
        check_signature_order(signatures.iter().map(|sig| sig.guardian_index))?;
        let mut vaa = Self {
            guardian_set,
            signatures,
            timestamp,
            nonce,
            emitter_chain,
            emitter_address,
            sequence,
            consistency_level,
            payload_literal,
            payload,
            hash: B256::ZERO,
        };
        let body = vaa.serialize_body(&payload_registry())?;
        vaa.hash = keccak256(&body);
        Ok(vaa)
    }
}

impl Vaa {
    /// Decodes `bytes` with the global payload registry.
    pub fn deserialize<'a>(selector: impl Into<PayloadSelector<'a>>, bytes: &[u8]) -> Result<Self> {
        Self::deserialize_with(&payload_registry(), selector, bytes)
    }

    /// Decodes `bytes`, resolving a literal selector in `registry`.
    ///
    /// The header is decoded and its signature order checked before anything
    /// else is read, so a VAA with unordered signatures is rejected without
    /// touching the payload.
    pub fn deserialize_with<'a>(
        registry: &PayloadRegistry,
        selector: impl Into<PayloadSelector<'a>>,
        bytes: &[u8],
    ) -> Result<Self> {
        let version = *bytes.first().ok_or_else(|| LayoutError::Truncated {
            field: "version".to_string(),
            offset: 0,
            needed: 1,
            available: 0,
        })?;
        if version != VAA_VERSION {
            return Err(VaaError::UnsupportedVersion(version));
        }

        let (header, body_offset) = deserialize_layout(&header_layout(), bytes, 0)?;
        let signatures = header
            .field("signatures")?
            .as_list()
            .unwrap_or_default()
            .iter()
            .map(signature_from_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        check_signature_order(signatures.iter().map(|sig| sig.guardian_index))?;

        let (envelope, payload_offset) = deserialize_layout(&envelope_layout(), bytes, body_offset)?;
        let payload_bytes = &bytes[payload_offset..];
        let payload_literal = match selector.into() {
            PayloadSelector::Literal(literal) => literal,
            PayloadSelector::Discriminator(discriminator) => discriminator
                .discriminate(payload_bytes)?
                .ok_or(VaaError::NoMatchingPayload)?,
        };
        let payload = registry.get(&payload_literal)?.deserialize(payload_bytes)?;

        Ok(Self {
            guardian_set: u32_field(&header, "guardianSet")?,
            signatures,
            timestamp: u32_field(&envelope, "timestamp")?,
            nonce: u32_field(&envelope, "nonce")?,
            emitter_chain: envelope.chain_field("emitterChain")?,
            emitter_address: envelope.address_field("emitterAddress")?,
            sequence: envelope.u64_field("sequence")?,
            consistency_level: u8_field(&envelope, "consistencyLevel")?,
            payload_literal,
            payload,
            hash: keccak256(&bytes[body_offset..]),
        })
    }

    /// Encodes the VAA with the global payload registry.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.serialize_with(&payload_registry())
    }

    pub fn serialize_with(&self, registry: &PayloadRegistry) -> Result<Vec<u8>> {
        let signatures = self
            .signatures
            .iter()
            .map(|sig| {
                Value::object([
                    ("guardianIndex", Value::from(sig.guardian_index)),
                    ("signature", Value::Bytes(sig.signature.to_vec())),
                ])
            })
            .collect();
        let header = Value::object([
            ("version", Value::from(VAA_VERSION)),
            ("guardianSet", Value::from(self.guardian_set)),
            ("signatures", Value::List(signatures)),
        ]);
        let mut out = Vec::new();
        serialize_layout_into(&header_layout(), &header, &mut out)?;
        out.extend(self.serialize_body(registry)?);
        Ok(out)
    }

    fn serialize_body(&self, registry: &PayloadRegistry) -> Result<Vec<u8>> {
        let envelope = Value::object([
            ("timestamp", Value::from(self.timestamp)),
            ("nonce", Value::from(self.nonce)),
            ("emitterChain", Value::Chain(self.emitter_chain)),
            ("emitterAddress", Value::Address(self.emitter_address)),
            ("sequence", Value::from(self.sequence)),
            ("consistencyLevel", Value::from(self.consistency_level)),
        ]);
        let mut body = Vec::new();
        serialize_layout_into(&envelope_layout(), &envelope, &mut body)?;
        body.extend(registry.get(&self.payload_literal)?.serialize(&self.payload)?);
        Ok(body)
    }

    pub fn guardian_set(&self) -> u32 {
        self.guardian_set
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn emitter_chain(&self) -> Chain {
        self.emitter_chain
    }

    pub fn emitter_address(&self) -> UniversalAddress {
        self.emitter_address
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn consistency_level(&self) -> u8 {
        self.consistency_level
    }

    pub fn payload_literal(&self) -> &PayloadLiteral {
        &self.payload_literal
    }

    /// Name of the payload without its protocol, e.g. `"Transfer"`.
    pub fn payload_name(&self) -> &str {
        self.payload_literal.name()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// keccak256 of the body (envelope and payload).
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn digest(&self) -> VaaDigest {
        VaaDigest {
            hash: self.hash,
            secp256k_hash: keccak256(self.hash),
        }
    }

    pub fn id(&self) -> WormholeMessageId {
        WormholeMessageId {
            chain: self.emitter_chain,
            emitter: self.emitter_address,
            sequence: self.sequence,
        }
    }

    /// Finality the emitter requested, interpreted for the emitter chain.
    pub fn finality(&self) -> ConsistencyLevel {
        ConsistencyLevel::from_raw(self.emitter_chain, self.consistency_level)
    }
}

fn check_signature_order(indices: impl IntoIterator<Item = u8>) -> Result<()> {
    let mut previous: Option<u8> = None;
    for index in indices {
        if let Some(previous) = previous.filter(|previous| index <= *previous) {
            return Err(VaaError::SignatureOrder { previous, index });
        }
        previous = Some(index);
    }
    Ok(())
}

fn signature_from_value(value: &Value) -> std::result::Result<Signature, LayoutError> {
    Ok(Signature {
        guardian_index: u8_field(value, "guardianIndex")?,
        signature: FixedBytes::from_slice(value.bytes_field("signature")?),
    })
}

fn u8_field(value: &Value, key: &str) -> std::result::Result<u8, LayoutError> {
    u8::try_from(value.u64_field(key)?).map_err(|_| LayoutError::ValueOutOfRange {
        field: key.to_string(),
        size: 1,
    })
}

fn u32_field(value: &Value, key: &str) -> std::result::Result<u32, LayoutError> {
    u32::try_from(value.u64_field(key)?).map_err(|_| LayoutError::ValueOutOfRange {
        field: key.to_string(),
        size: 4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::token_bridge;
    use alloy_primitives::U256;

    fn signature(index: u8) -> Signature {
        Signature {
            guardian_index: index,
            signature: FixedBytes::repeat_byte(index),
        }
    }

    fn raw_vaa(signatures: Vec<Signature>) -> Vaa {
        Vaa::create()
            .payload_literal(PayloadLiteral::bare("Uint8Array"))
            .payload(Value::Bytes(vec![0xde, 0xad]))
            .emitter_chain(Chain::Ethereum)
            .emitter_address(UniversalAddress::new([4; 32]))
            .sequence(77)
            .guardian_set(3)
            .signatures(signatures)
            .timestamp(1_700_000_000)
            .nonce(9)
            .consistency_level(201)
            .build()
            .unwrap()
    }

    #[test]
    fn test_wire_layout() {
        let vaa = raw_vaa(vec![signature(0), signature(2)]);
        let bytes = vaa.serialize().unwrap();

        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &3u32.to_be_bytes());
        assert_eq!(bytes[5], 2);
        assert_eq!(bytes[6], 0);
        assert_eq!(bytes[72], 2);
        let body = &bytes[6 + 2 * 66..];
        assert_eq!(&body[..4], &1_700_000_000u32.to_be_bytes());
        assert_eq!(&body[8..10], &[0, 2]);
        assert_eq!(&body[42..50], &77u64.to_be_bytes());
        assert_eq!(body[50], 201);
        assert_eq!(&body[51..], &[0xde, 0xad]);
        assert_eq!(vaa.hash(), keccak256(body));
    }

    #[test]
    fn test_roundtrip_preserves_everything() {
        let vaa = raw_vaa(vec![signature(1), signature(5), signature(18)]);
        let bytes = vaa.serialize().unwrap();
        let decoded = Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes).unwrap();
        assert_eq!(decoded, vaa);
        assert_eq!(decoded.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_unordered_signatures_rejected_on_decode() {
        let mut bytes = raw_vaa(vec![signature(1), signature(2)]).serialize().unwrap();
        // swap the guardian indices in place
        bytes[6] = 2;
        bytes[72] = 1;
        let err = Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes).unwrap_err();
        assert!(matches!(err, VaaError::SignatureOrder { previous: 2, index: 1 }));

        bytes[72] = 2;
        let err = Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes).unwrap_err();
        assert!(matches!(err, VaaError::SignatureOrder { previous: 2, index: 2 }));
    }

    #[test]
    fn test_unordered_signatures_rejected_on_create() {
        let err = Vaa::create()
            .payload_literal(PayloadLiteral::bare("Uint8Array"))
            .payload(Value::Bytes(vec![]))
            .emitter_chain(Chain::Solana)
            .emitter_address(UniversalAddress::ZERO)
            .signatures(vec![signature(3), signature(0)])
            .build()
            .unwrap_err();
        assert!(matches!(err, VaaError::SignatureOrder { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = raw_vaa(vec![]).serialize().unwrap();
        bytes[0] = 2;
        assert!(matches!(
            Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes),
            Err(VaaError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &[]),
            Err(VaaError::Layout(LayoutError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_truncated_signatures() {
        let bytes = raw_vaa(vec![signature(0)]).serialize().unwrap();
        assert!(matches!(
            Vaa::deserialize(PayloadLiteral::bare("Uint8Array"), &bytes[..40]),
            Err(VaaError::Layout(LayoutError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_discriminated_payload() {
        let transfer = Value::object([
            (
                "token",
                Value::object([
                    ("amount", Value::from(U256::from(10u64))),
                    ("address", Value::Address(UniversalAddress::new([1; 32]))),
                    ("chain", Value::Chain(Chain::Ethereum)),
                ]),
            ),
            (
                "to",
                Value::object([
                    ("address", Value::Address(UniversalAddress::new([2; 32]))),
                    ("chain", Value::Chain(Chain::Solana)),
                ]),
            ),
            ("fee", Value::from(U256::ZERO)),
        ]);
        let vaa = Vaa::create()
            .payload_literal(token_bridge::literal(token_bridge::TRANSFER))
            .payload(transfer)
            .emitter_chain(Chain::Ethereum)
            .emitter_address(UniversalAddress::new([9; 32]))
            .build()
            .unwrap();
        let bytes = vaa.serialize().unwrap();

        let registry = payload_registry();
        let discriminator =
            PayloadDiscriminator::for_protocols(&registry, &[token_bridge::PROTOCOL]).unwrap();
        let decoded = Vaa::deserialize(&discriminator, &bytes).unwrap();
        assert_eq!(decoded.payload_name(), "Transfer");
        assert_eq!(decoded, vaa);

        let nothing = PayloadDiscriminator::for_protocols(&registry, &["Pyth"]).unwrap();
        assert!(matches!(
            Vaa::deserialize(&nothing, &bytes),
            Err(VaaError::NoMatchingPayload)
        ));
    }

    #[test]
    fn test_digest_and_id() {
        let vaa = raw_vaa(vec![]);
        let digest = vaa.digest();
        assert_eq!(digest.hash, vaa.hash());
        assert_eq!(digest.secp256k_hash, keccak256(vaa.hash()));
        assert_eq!(
            vaa.id(),
            WormholeMessageId {
                chain: Chain::Ethereum,
                emitter: UniversalAddress::new([4; 32]),
                sequence: 77,
            }
        );
        assert_eq!(vaa.finality(), ConsistencyLevel::Safe);
    }

    #[test]
    fn test_message_id_display() {
        let id = WormholeMessageId {
            chain: Chain::Sui,
            emitter: UniversalAddress::new([0xab; 32]),
            sequence: 5,
        };
        insta::assert_snapshot!(id, @"21/0xabababababababababababababababababababababababababababababababab/5");
    }
}
