//! Reusable items and conversions shared by protocol layouts.

use super::{Conversion, ConversionError, Item, Value};
use crate::address::UniversalAddress;
use crate::chain::Chain;

/// 32-byte [`UniversalAddress`].
pub fn universal_address_item() -> Item {
    Item::bytes(32).convert(UniversalAddressConversion)
}

/// 2-byte Wormhole chain id decoded as [`Value::Chain`].
pub fn chain_item() -> Item {
    Item::uint(2).convert(ChainConversion { allow_any: false })
}

/// Like [`chain_item`], but id `0` ("all chains") decodes as [`Value::Null`].
pub fn chain_or_any_item() -> Item {
    Item::uint(2).convert(ChainConversion { allow_any: true })
}

/// 32-byte token amount.
pub fn amount_item() -> Item {
    Item::uint(32)
}

/// 8-byte emitter sequence number.
pub fn sequence_item() -> Item {
    Item::uint(8)
}

/// 65-byte recoverable secp256k1 signature.
pub fn signature_item() -> Item {
    Item::bytes(65)
}

/// ASCII string stored zero-padded in exactly `size` bytes.
pub fn fixed_string_item(size: usize, alignment: Alignment) -> Item {
    Item::bytes(size).convert(FixedStringConversion { size, alignment })
}

/// Pads `s` into `size` bytes, e.g. for a fixed governance module name.
pub fn fixed_string_bytes(
    s: &str,
    size: usize,
    alignment: Alignment,
) -> Result<Vec<u8>, ConversionError> {
    if s.len() > size {
        return Err(ConversionError::new(format!(
            "string {s:?} longer than {size} bytes"
        )));
    }
    let padding = vec![0u8; size - s.len()];
    Ok(match alignment {
        Alignment::Left => [s.as_bytes(), padding.as_slice()].concat(),
        Alignment::Right => [padding.as_slice(), s.as_bytes()].concat(),
    })
}

/// Where the text sits inside a zero-padded fixed-length string field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Text first, zero padding after
    Left,
    /// Zero padding first, text after
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct UniversalAddressConversion;

impl Conversion for UniversalAddressConversion {
    fn name(&self) -> &'static str {
        "UniversalAddress"
    }

    fn decode(&self, raw: Value) -> Result<Value, ConversionError> {
        let bytes = raw
            .as_bytes()
            .ok_or_else(|| ConversionError::new("address expects bytes"))?;
        UniversalAddress::from_slice(bytes)
            .map(Value::Address)
            .map_err(|err| ConversionError::new(err.to_string()))
    }

    fn encode(&self, value: &Value) -> Result<Value, ConversionError> {
        value
            .as_address()
            .map(|address| Value::Bytes(address.as_bytes().to_vec()))
            .ok_or_else(|| ConversionError::new(format!("expected address, got {}", value.kind())))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChainConversion {
    pub allow_any: bool,
}

impl Conversion for ChainConversion {
    fn name(&self) -> &'static str {
        "Chain"
    }

    fn decode(&self, raw: Value) -> Result<Value, ConversionError> {
        let id = raw
            .as_u64()
            .and_then(|id| u16::try_from(id).ok())
            .ok_or_else(|| ConversionError::new("chain id expects a u16"))?;
        if id == 0 && self.allow_any {
            return Ok(Value::Null);
        }
        Chain::from_u16(id)
            .map(Value::Chain)
            .ok_or_else(|| ConversionError::new(format!("unknown chain id {id}")))
    }

    fn encode(&self, value: &Value) -> Result<Value, ConversionError> {
        match value {
            Value::Chain(chain) => Ok(Value::Uint(chain.as_u16().into())),
            Value::Null if self.allow_any => Ok(Value::Uint(0)),
            other => Err(ConversionError::new(format!(
                "expected chain, got {}",
                other.kind()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedStringConversion {
    pub size: usize,
    pub alignment: Alignment,
}

impl Conversion for FixedStringConversion {
    fn name(&self) -> &'static str {
        "FixedString"
    }

    fn decode(&self, raw: Value) -> Result<Value, ConversionError> {
        let bytes = raw
            .as_bytes()
            .ok_or_else(|| ConversionError::new("fixed string expects bytes"))?;
        let text = match self.alignment {
            Alignment::Left => {
                let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                &bytes[..end]
            }
            Alignment::Right => {
                let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
                &bytes[start..]
            }
        };
        std::str::from_utf8(text)
            .map(|s| Value::String(s.to_string()))
            .map_err(|err| ConversionError::new(format!("invalid utf-8: {err}")))
    }

    fn encode(&self, value: &Value) -> Result<Value, ConversionError> {
        let text = value
            .as_str()
            .ok_or_else(|| ConversionError::new(format!("expected string, got {}", value.kind())))?;
        fixed_string_bytes(text, self.size, self.alignment).map(Value::Bytes)
    }
}
