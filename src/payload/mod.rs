//! Payload registry and discriminator
//!
//! Protocols describe the payloads they put inside VAAs as [`Layout`]s and
//! register them under a namespaced [`PayloadLiteral`] such as
//! `"TokenBridge:Transfer"`. The VAA decoder resolves a literal to its layout
//! through a [`PayloadRegistry`], and a [`PayloadDiscriminator`] recovers the
//! literal from bytes alone by trying every candidate layout.

mod discriminator;
mod registry;

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VaaError};
use crate::layout::{deserialize_layout_exact, serialize_layout, Layout, Value};

pub use discriminator::PayloadDiscriminator;
pub use registry::{get_payload_layout, payload_registry, register_payload_type, PayloadRegistry};

/// Name of a registered payload: `Protocol:Name`, or a bare `Name`
///
/// # Example
///
/// ```rust
/// use vaa_rs::PayloadLiteral;
///
/// let literal: PayloadLiteral = "TokenBridge:Transfer".parse().unwrap();
/// assert_eq!(literal.protocol(), Some("TokenBridge"));
/// assert_eq!(literal.name(), "Transfer");
/// assert_eq!(literal.to_string(), "TokenBridge:Transfer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadLiteral {
    protocol: Option<String>,
    name: String,
}

impl PayloadLiteral {
    pub fn new(protocol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            protocol: Some(protocol.into()),
            name: name.into(),
        }
    }

    /// A literal that belongs to no protocol.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            protocol: None,
            name: name.into(),
        }
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PayloadLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.protocol {
            Some(protocol) => write!(f, "{protocol}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for PayloadLiteral {
    type Err = VaaError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VaaError::InvalidPayloadLiteral(s.to_string());
        match s.split_once(':') {
            Some((protocol, name)) => {
                if protocol.is_empty() || name.is_empty() || name.contains(':') {
                    return Err(invalid());
                }
                Ok(Self::new(protocol, name))
            }
            None if !s.is_empty() => Ok(Self::bare(s)),
            None => Err(invalid()),
        }
    }
}

/// What a literal decodes with
#[derive(Debug, Clone)]
pub enum PayloadSchema {
    Layout(Layout),
    /// Opaque bytes, decoded as [`Value::Bytes`]
    Raw,
}

impl PayloadSchema {
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            Self::Layout(layout) => Ok(deserialize_layout_exact(layout, bytes)?),
            Self::Raw => Ok(Value::Bytes(bytes.to_vec())),
        }
    }

    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        match self {
            Self::Layout(layout) => Ok(serialize_layout(layout, value)?),
            Self::Raw => value.as_bytes().map(<[u8]>::to_vec).ok_or_else(|| {
                crate::layout::LayoutError::TypeMismatch {
                    field: "payload".to_string(),
                    expected: "bytes",
                }
                .into()
            }),
        }
    }
}

/// Serializes a payload value with the globally registered layout for `literal`.
pub fn serialize_payload(literal: &PayloadLiteral, value: &Value) -> Result<Vec<u8>> {
    payload_registry().get(literal)?.serialize(value)
}

/// Deserializes payload bytes with the globally registered layout for `literal`.
pub fn deserialize_payload(literal: &PayloadLiteral, bytes: &[u8]) -> Result<Value> {
    payload_registry().get(literal)?.deserialize(bytes)
}
