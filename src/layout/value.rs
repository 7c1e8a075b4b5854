use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::{hex, I256, U256};

use super::LayoutError;
use crate::address::UniversalAddress;
use crate::chain::Chain;

/// Dynamic value produced and consumed by layouts
///
/// Integers of up to 8 bytes decode as [`Value::Uint`] / [`Value::Int`];
/// wider ones as [`Value::BigUint`] / [`Value::BigInt`]. Encoding accepts
/// either representation as long as the number fits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Uint(u64),
    BigUint(U256),
    Int(i64),
    BigInt(I256),
    Bytes(Vec<u8>),
    String(String),
    Address(UniversalAddress),
    Chain(Chain),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Builds an object from `(name, value)` pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Uint(_) | Self::BigUint(_) => "unsigned integer",
            Self::Int(_) | Self::BigInt(_) => "signed integer",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Address(_) => "address",
            Self::Chain(_) => "chain",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }

    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Self::Uint(v) => Some(U256::from(*v)),
            Self::BigUint(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok().map(U256::from),
            Self::BigInt(v) => (!v.is_negative()).then(|| v.into_raw()),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        let value = self.as_u256()?;
        (value.bit_len() <= 64).then(|| value.as_limbs()[0])
    }

    pub fn as_i256(&self) -> Option<I256> {
        match self {
            Self::Int(v) => Some(I256::from_raw(sign_extend(&v.to_be_bytes()))),
            Self::BigInt(v) => Some(*v),
            Self::Uint(_) | Self::BigUint(_) => {
                let value = self.as_u256()?;
                let signed = I256::from_raw(value);
                (!signed.is_negative()).then_some(signed)
            }
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        let value = self.as_i256()?;
        let raw = value.into_raw().to_be_bytes::<32>();
        let sign = if value.is_negative() { 0xff } else { 0x00 };
        if raw[..24].iter().any(|b| *b != sign) || (raw[24] & 0x80 != 0) != value.is_negative() {
            return None;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&raw[24..]);
        Some(i64::from_be_bytes(buf))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<UniversalAddress> {
        match self {
            Self::Address(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_chain(&self) -> Option<Chain> {
        match self {
            Self::Chain(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Looks up a member of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Looks up a member of an object value, failing if it is absent.
    pub fn field(&self, key: &str) -> Result<&Value, LayoutError> {
        self.get(key).ok_or_else(|| LayoutError::MissingField {
            field: key.to_string(),
        })
    }

    pub fn u64_field(&self, key: &str) -> Result<u64, LayoutError> {
        self.typed_field(key, "unsigned integer", Value::as_u64)
    }

    pub fn u256_field(&self, key: &str) -> Result<U256, LayoutError> {
        self.typed_field(key, "unsigned integer", Value::as_u256)
    }

    pub fn bytes_field(&self, key: &str) -> Result<&[u8], LayoutError> {
        let value = self.field(key)?;
        value.as_bytes().ok_or_else(|| mismatch(key, "bytes"))
    }

    pub fn address_field(&self, key: &str) -> Result<UniversalAddress, LayoutError> {
        self.typed_field(key, "address", Value::as_address)
    }

    pub fn chain_field(&self, key: &str) -> Result<Chain, LayoutError> {
        self.typed_field(key, "chain", Value::as_chain)
    }

    fn typed_field<T>(
        &self,
        key: &str,
        expected: &'static str,
        extract: impl Fn(&Value) -> Option<T>,
    ) -> Result<T, LayoutError> {
        extract(self.field(key)?).ok_or_else(|| mismatch(key, expected))
    }
}

fn mismatch(field: &str, expected: &'static str) -> LayoutError {
    LayoutError::TypeMismatch {
        field: field.to_string(),
        expected,
    }
}

/// Sign-extends a big-endian two's complement number to 256 bits.
pub(crate) fn sign_extend(bytes: &[u8]) -> U256 {
    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
    let mut buf = if negative { [0xffu8; 32] } else { [0u8; 32] };
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    U256::from_be_bytes(buf)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::BigUint(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::Bytes(v) => f.write_str(&hex::encode_prefixed(v)),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Address(v) => write!(f, "{v}"),
            Self::Chain(v) => write!(f, "{v}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! impl_from_uint {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Uint(value as u64)
                }
            }
        )*
    };
}

impl_from_uint!(u8, u16, u32, u64);

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Self::BigUint(value)
    }
}

impl From<I256> for Value {
    fn from(value: I256) -> Self {
        Self::BigInt(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(value: [u8; N]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<UniversalAddress> for Value {
    fn from(value: UniversalAddress) -> Self {
        Self::Address(value)
    }
}

impl From<Chain> for Value {
    fn from(value: Chain) -> Self {
        Self::Chain(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::Uint(7).as_u256(), Some(U256::from(7)));
        assert_eq!(Value::BigUint(U256::from(u64::MAX)).as_u64(), Some(u64::MAX));
        assert_eq!(Value::BigUint(U256::MAX).as_u64(), None);
        assert_eq!(Value::Int(-1).as_u256(), None);
        assert_eq!(Value::Int(-5).as_i64(), Some(-5));
        assert_eq!(Value::BigInt(I256::MINUS_ONE).as_i64(), Some(-1));
        assert_eq!(Value::BigInt(I256::MAX).as_i64(), None);
        assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
    }

    #[test]
    fn test_typed_fields() {
        let value = Value::object([
            ("chain", Value::Chain(Chain::Solana)),
            ("amount", Value::BigUint(U256::from(10))),
        ]);
        assert_eq!(value.chain_field("chain").unwrap(), Chain::Solana);
        assert_eq!(value.u64_field("amount").unwrap(), 10);
        assert_eq!(
            value.address_field("chain"),
            Err(LayoutError::TypeMismatch {
                field: "chain".to_string(),
                expected: "address"
            })
        );
        assert_eq!(
            value.field("missing"),
            Err(LayoutError::MissingField {
                field: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_display() {
        let value = Value::object([
            ("id", Value::Uint(1)),
            ("data", Value::Bytes(vec![0xde, 0xad])),
            ("tags", Value::List(vec![Value::Bool(true), Value::Null])),
        ]);
        insta::assert_snapshot!(value.to_string(), @"{data: 0xdead, id: 1, tags: [true, null]}");
    }
}
