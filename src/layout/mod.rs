//! Declarative binary layouts
//!
//! A [`Layout`] is an ordered list of named [`Field`]s, each describing how a
//! piece of a byte string maps onto a dynamic [`Value`]. The same schema drives
//! both directions: [`serialize_layout`] walks the layout writing a value, and
//! [`deserialize_layout`] walks it reading one back.
//!
//! Schemas are plain data, so they can be assembled at runtime, nested, and
//! parameterized (governance payloads, for instance, are a cross product of a
//! module table and an action table).
//!
//! ```rust
//! use vaa_rs::layout::{deserialize_layout_exact, field, serialize_layout, Item, Layout, Value};
//!
//! let layout = Layout::new(vec![
//!     field("magic", Item::bytes(2).fixed(Value::Bytes(b"HI".to_vec()))),
//!     field("count", Item::uint(2)),
//!     field("data", Item::prefixed_bytes(1)),
//! ]);
//!
//! let value = Value::object([
//!     ("count", Value::Uint(7)),
//!     ("data", Value::Bytes(vec![0xaa, 0xbb])),
//! ]);
//! let bytes = serialize_layout(&layout, &value).unwrap();
//! assert_eq!(bytes, [b'H', b'I', 0, 7, 2, 0xaa, 0xbb]);
//! assert_eq!(deserialize_layout_exact(&layout, &bytes).unwrap(), value);
//! ```

mod codec;
mod items;
mod value;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use codec::{
    deserialize_layout, deserialize_layout_exact, serialize_layout, serialize_layout_into,
};
pub use items::{
    amount_item, chain_item, chain_or_any_item, fixed_string_bytes, fixed_string_item,
    sequence_item, signature_item, universal_address_item, Alignment, ChainConversion,
    FixedStringConversion, UniversalAddressConversion,
};
pub use value::Value;

/// Structural failure while encoding or decoding a layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{field}: need {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        field: String,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{remaining} trailing bytes after offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },

    #[error("{field}: length {length} does not fit in a {size}-byte prefix")]
    LengthOverflow {
        field: String,
        length: usize,
        size: usize,
    },

    #[error("{field}: expected {expected} items, got {actual}")]
    SizeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("{field}: expected fixed value {expected}, found {found}")]
    FixedValueMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("{field}: no switch case for id {id}")]
    UnknownSwitchId { field: String, id: String },

    #[error("{field}: conversion failed: {reason}")]
    Conversion { field: String, reason: String },

    #[error("{field}: expected {expected} value")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("missing field {field}")]
    MissingField { field: String },

    #[error("{field}: value does not fit in {size} bytes")]
    ValueOutOfRange { field: String, size: usize },

    #[error("{field}: bit {bit} is set but not named")]
    UnnamedBitSet { field: String, bit: usize },

    #[error("{field}: unsupported item size {size}")]
    InvalidSize { field: String, size: usize },
}

/// Byte order of a multi-byte integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Which bit a bitset's first declared flag occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// First flag is the most significant bit
    #[default]
    MsbFirst,
    /// First flag is the least significant bit
    LsbFirst,
}

/// How many bytes (or array elements) a variable-size item spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthSpec {
    /// Exactly this many bytes or elements
    Fixed(usize),
    /// Preceded by an unsigned length of `size` bytes
    Prefixed { size: usize, endianness: Endianness },
    /// Everything left in the input
    Remainder,
}

impl LengthSpec {
    pub const fn prefixed(size: usize) -> Self {
        Self::Prefixed {
            size,
            endianness: Endianness::Big,
        }
    }
}

/// Error returned by a [`Conversion`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConversionError(pub String);

impl ConversionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Bidirectional mapping between the raw wire value of an item and its logical value.
///
/// `decode` runs after the raw value was read; `encode` runs before it is written.
pub trait Conversion: Send + Sync {
    /// Short name used in debug output.
    fn name(&self) -> &'static str;

    fn decode(&self, raw: Value) -> Result<Value, ConversionError>;

    fn encode(&self, value: &Value) -> Result<Value, ConversionError>;
}

/// Custom behaviour attached to a scalar item
#[derive(Clone)]
pub enum Custom {
    /// Constant raw value: written on encode, checked on decode, absent from the logical value
    Fixed(Value),
    /// Value conversion
    Convert(Arc<dyn Conversion>),
}

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Convert(conversion) => f.debug_tuple("Convert").field(&conversion.name()).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumericItem {
    pub size: usize,
    pub endianness: Endianness,
    pub custom: Option<Custom>,
}

#[derive(Debug, Clone)]
pub struct BytesItem {
    pub length: LengthSpec,
    /// When set, the bytes are themselves decoded with this layout.
    pub layout: Option<Layout>,
    pub custom: Option<Custom>,
}

#[derive(Debug, Clone)]
pub struct ArrayItem {
    pub length: LengthSpec,
    pub element: Box<Item>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub id: u64,
    pub name: Option<String>,
    pub layout: Layout,
}

impl SwitchCase {
    pub fn new(id: u64, layout: Layout) -> Self {
        Self {
            id,
            name: None,
            layout,
        }
    }

    pub fn named(id: u64, name: impl Into<String>, layout: Layout) -> Self {
        Self {
            id,
            name: Some(name.into()),
            layout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchItem {
    pub id_size: usize,
    pub id_endianness: Endianness,
    /// Key under which the selected case (its name, or its id) appears in the value.
    pub id_tag: String,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone)]
pub struct BitsetItem {
    pub size: usize,
    pub endianness: Endianness,
    pub bit_order: BitOrder,
    /// Flag names in declaration order; `None` reserves a bit that must stay clear.
    pub bits: Vec<Option<String>>,
}

/// What a field is on the wire
#[derive(Debug, Clone)]
pub enum Item {
    Uint(NumericItem),
    Int(NumericItem),
    Bytes(BytesItem),
    Array(ArrayItem),
    Object(Layout),
    Switch(SwitchItem),
    Bitset(BitsetItem),
}

impl Item {
    /// Big-endian unsigned integer of `size` bytes (1..=32).
    pub fn uint(size: usize) -> Self {
        Self::Uint(NumericItem {
            size,
            endianness: Endianness::Big,
            custom: None,
        })
    }

    /// Big-endian two's complement integer of `size` bytes (1..=32).
    pub fn int(size: usize) -> Self {
        Self::Int(NumericItem {
            size,
            endianness: Endianness::Big,
            custom: None,
        })
    }

    /// Exactly `size` raw bytes.
    pub fn bytes(size: usize) -> Self {
        Self::raw_bytes(LengthSpec::Fixed(size))
    }

    /// Bytes preceded by a big-endian length of `length_size` bytes.
    pub fn prefixed_bytes(length_size: usize) -> Self {
        Self::raw_bytes(LengthSpec::prefixed(length_size))
    }

    /// All remaining bytes.
    pub fn remainder_bytes() -> Self {
        Self::raw_bytes(LengthSpec::Remainder)
    }

    fn raw_bytes(length: LengthSpec) -> Self {
        Self::Bytes(BytesItem {
            length,
            layout: None,
            custom: None,
        })
    }

    pub fn array(length: LengthSpec, element: Item) -> Self {
        Self::Array(ArrayItem {
            length,
            element: Box::new(element),
        })
    }

    pub fn object(layout: Layout) -> Self {
        Self::Object(layout)
    }

    /// Tagged union selected by a leading big-endian id of `id_size` bytes.
    pub fn switch(id_size: usize, id_tag: impl Into<String>, cases: Vec<SwitchCase>) -> Self {
        Self::Switch(SwitchItem {
            id_size,
            id_endianness: Endianness::Big,
            id_tag: id_tag.into(),
            cases,
        })
    }

    /// Named flags packed most-significant-bit first into `size` bytes.
    pub fn bitset<S: Into<String>>(size: usize, bits: impl IntoIterator<Item = Option<S>>) -> Self {
        Self::Bitset(BitsetItem {
            size,
            endianness: Endianness::Big,
            bit_order: BitOrder::MsbFirst,
            bits: bits.into_iter().map(|bit| bit.map(Into::into)).collect(),
        })
    }

    /// Pins a scalar item to a constant raw value.
    pub fn fixed(self, value: impl Into<Value>) -> Self {
        self.with_custom(Custom::Fixed(value.into()))
    }

    /// Attaches a value conversion to a scalar item.
    pub fn convert(self, conversion: impl Conversion + 'static) -> Self {
        self.with_custom(Custom::Convert(Arc::new(conversion)))
    }

    fn with_custom(mut self, custom: Custom) -> Self {
        match &mut self {
            Self::Uint(item) | Self::Int(item) => item.custom = Some(custom),
            Self::Bytes(item) => item.custom = Some(custom),
            _ => debug_assert!(false, "custom conversions apply to scalar items only"),
        }
        self
    }

    /// Decodes the bytes of a bytes item with a nested layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        if let Self::Bytes(item) = &mut self {
            item.layout = Some(layout);
        } else {
            debug_assert!(false, "nested layouts apply to bytes items only");
        }
        self
    }

    pub fn little_endian(mut self) -> Self {
        match &mut self {
            Self::Uint(item) | Self::Int(item) => item.endianness = Endianness::Little,
            Self::Bitset(item) => item.endianness = Endianness::Little,
            Self::Switch(item) => item.id_endianness = Endianness::Little,
            Self::Bytes(BytesItem {
                length: LengthSpec::Prefixed { endianness, .. },
                ..
            })
            | Self::Array(ArrayItem {
                length: LengthSpec::Prefixed { endianness, .. },
                ..
            }) => *endianness = Endianness::Little,
            _ => {}
        }
        self
    }

    pub fn lsb_first(mut self) -> Self {
        if let Self::Bitset(item) = &mut self {
            item.bit_order = BitOrder::LsbFirst;
        }
        self
    }

    /// Whether the item is a constant that never appears in the logical value.
    pub fn is_fixed(&self) -> bool {
        matches!(
            self,
            Self::Uint(NumericItem {
                custom: Some(Custom::Fixed(_)),
                ..
            }) | Self::Int(NumericItem {
                custom: Some(Custom::Fixed(_)),
                ..
            }) | Self::Bytes(BytesItem {
                custom: Some(Custom::Fixed(_)),
                ..
            })
        )
    }

    /// Encoded size if it does not depend on the value.
    pub fn static_size(&self) -> Option<usize> {
        match self {
            Self::Uint(item) | Self::Int(item) => Some(item.size),
            Self::Bitset(item) => Some(item.size),
            Self::Bytes(item) => match item.length {
                LengthSpec::Fixed(size) => Some(size),
                _ => None,
            },
            Self::Array(item) => match item.length {
                LengthSpec::Fixed(count) => item.element.static_size().map(|size| size * count),
                _ => None,
            },
            Self::Object(layout) => layout.static_size(),
            Self::Switch(item) => {
                let mut sizes = item.cases.iter().map(|case| case.layout.static_size());
                let first = sizes.next()??;
                sizes
                    .all(|size| size == Some(first))
                    .then_some(item.id_size + first)
            }
        }
    }
}

/// A named item
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub item: Item,
}

impl Field {
    pub fn new(name: impl Into<String>, item: Item) -> Self {
        Self {
            name: name.into(),
            item,
        }
    }
}

/// Shorthand for [`Field::new`].
pub fn field(name: impl Into<String>, item: Item) -> Field {
    Field::new(name, item)
}

/// Ordered list of fields
#[derive(Debug, Clone, Default)]
pub struct Layout {
    fields: Vec<Field>,
}

impl Layout {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns a copy with `other`'s fields appended.
    pub fn extend(mut self, other: Layout) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Encoded size if every field has a static size.
    pub fn static_size(&self) -> Option<usize> {
        self.fields
            .iter()
            .map(|field| field.item.static_size())
            .sum()
    }
}

impl FromIterator<Field> for Layout {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
