//! Generic encoder and decoder over [`Layout`] schemas.

use std::borrow::Cow;
use std::collections::BTreeMap;

use alloy_primitives::{I256, U256};

use super::value::sign_extend;
use super::{
    ArrayItem, BitOrder, BitsetItem, BytesItem, Custom, Endianness, Item, Layout, LayoutError,
    LengthSpec, NumericItem, SwitchItem, Value,
};

/// Serializes `value` (an object) according to `layout`.
pub fn serialize_layout(layout: &Layout, value: &Value) -> Result<Vec<u8>, LayoutError> {
    let mut out = Vec::new();
    serialize_layout_into(layout, value, &mut out)?;
    Ok(out)
}

/// Serializes `value` according to `layout`, appending to `out`.
pub fn serialize_layout_into(
    layout: &Layout,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    let entries = value.as_object().ok_or_else(|| LayoutError::TypeMismatch {
        field: "<root>".to_string(),
        expected: "object",
    })?;
    encode_fields(layout, entries, out)
}

/// Deserializes a value starting at `offset`, returning it with the offset
/// just past the consumed bytes.
pub fn deserialize_layout(
    layout: &Layout,
    bytes: &[u8],
    offset: usize,
) -> Result<(Value, usize), LayoutError> {
    if offset > bytes.len() {
        return Err(LayoutError::Truncated {
            field: "<root>".to_string(),
            offset,
            needed: 0,
            available: 0,
        });
    }
    let mut reader = Reader { bytes, offset };
    let value = decode_fields(layout, &mut reader)?;
    Ok((value, reader.offset))
}

/// Deserializes `bytes`, requiring the layout to consume all of them.
pub fn deserialize_layout_exact(layout: &Layout, bytes: &[u8]) -> Result<Value, LayoutError> {
    let (value, offset) = deserialize_layout(layout, bytes, 0)?;
    if offset != bytes.len() {
        return Err(LayoutError::TrailingBytes {
            offset,
            remaining: bytes.len() - offset,
        });
    }
    Ok(value)
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], LayoutError> {
        let available = self.remaining();
        if len > available {
            return Err(LayoutError::Truncated {
                field: field.to_string(),
                offset: self.offset,
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn read_uint(
        &mut self,
        size: usize,
        endianness: Endianness,
        field: &str,
    ) -> Result<U256, LayoutError> {
        check_size(size, field)?;
        let raw = self.take(size, field)?;
        Ok(U256::from_be_slice(&big_endian(raw, endianness)))
    }

    fn read_length(&mut self, spec: LengthSpec, field: &str) -> Result<Option<usize>, LayoutError> {
        match spec {
            LengthSpec::Fixed(len) => Ok(Some(len)),
            LengthSpec::Prefixed { size, endianness } => {
                let len = self.read_uint(size, endianness, field)?;
                let len = (len.bit_len() <= 64)
                    .then(|| len.as_limbs()[0])
                    .and_then(|len| usize::try_from(len).ok())
                    .ok_or_else(|| LayoutError::Truncated {
                        field: field.to_string(),
                        offset: self.offset,
                        needed: usize::MAX,
                        available: self.remaining(),
                    })?;
                Ok(Some(len))
            }
            LengthSpec::Remainder => Ok(None),
        }
    }
}

fn check_size(size: usize, field: &str) -> Result<(), LayoutError> {
    if size == 0 || size > 32 {
        return Err(LayoutError::InvalidSize {
            field: field.to_string(),
            size,
        });
    }
    Ok(())
}

fn big_endian(raw: &[u8], endianness: Endianness) -> Cow<'_, [u8]> {
    match endianness {
        Endianness::Big => Cow::Borrowed(raw),
        Endianness::Little => Cow::Owned(raw.iter().rev().copied().collect()),
    }
}

fn write_ordered(out: &mut Vec<u8>, be: &[u8], endianness: Endianness) {
    match endianness {
        Endianness::Big => out.extend_from_slice(be),
        Endianness::Little => out.extend(be.iter().rev()),
    }
}

fn write_uint(
    out: &mut Vec<u8>,
    value: U256,
    size: usize,
    endianness: Endianness,
    field: &str,
) -> Result<(), LayoutError> {
    check_size(size, field)?;
    if value.bit_len() > size * 8 {
        return Err(LayoutError::ValueOutOfRange {
            field: field.to_string(),
            size,
        });
    }
    let be = value.to_be_bytes::<32>();
    write_ordered(out, &be[32 - size..], endianness);
    Ok(())
}

fn write_int(
    out: &mut Vec<u8>,
    value: I256,
    size: usize,
    endianness: Endianness,
    field: &str,
) -> Result<(), LayoutError> {
    check_size(size, field)?;
    let be = value.into_raw().to_be_bytes::<32>();
    let negative = value.is_negative();
    let sign = if negative { 0xff } else { 0x00 };
    let fits = be[..32 - size].iter().all(|b| *b == sign)
        && ((be[32 - size] & 0x80 != 0) == negative);
    if !fits {
        return Err(LayoutError::ValueOutOfRange {
            field: field.to_string(),
            size,
        });
    }
    write_ordered(out, &be[32 - size..], endianness);
    Ok(())
}

fn write_length(
    out: &mut Vec<u8>,
    spec: LengthSpec,
    len: usize,
    field: &str,
) -> Result<(), LayoutError> {
    match spec {
        LengthSpec::Fixed(expected) if expected != len => Err(LayoutError::SizeMismatch {
            field: field.to_string(),
            expected,
            actual: len,
        }),
        LengthSpec::Fixed(_) | LengthSpec::Remainder => Ok(()),
        LengthSpec::Prefixed { size, endianness } => {
            write_uint(out, U256::from(len), size, endianness, field).map_err(|err| match err {
                LayoutError::ValueOutOfRange { .. } => LayoutError::LengthOverflow {
                    field: field.to_string(),
                    length: len,
                    size,
                },
                other => other,
            })
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

fn decode_fields(layout: &Layout, reader: &mut Reader<'_>) -> Result<Value, LayoutError> {
    decode_entries(layout, reader).map(Value::Object)
}

fn decode_entries(
    layout: &Layout,
    reader: &mut Reader<'_>,
) -> Result<BTreeMap<String, Value>, LayoutError> {
    let mut entries = BTreeMap::new();
    for field in layout.fields() {
        if let Some(value) = decode_item(&field.name, &field.item, reader)? {
            entries.insert(field.name.clone(), value);
        }
    }
    Ok(entries)
}

/// Returns `None` for fixed items, which have no logical value.
fn decode_item(
    name: &str,
    item: &Item,
    reader: &mut Reader<'_>,
) -> Result<Option<Value>, LayoutError> {
    match item {
        Item::Uint(numeric) => {
            let raw = reader.read_uint(numeric.size, numeric.endianness, name)?;
            let raw = if numeric.size <= 8 {
                Value::Uint(raw.as_limbs()[0])
            } else {
                Value::BigUint(raw)
            };
            apply_decode(name, numeric.custom.as_ref(), raw)
        }
        Item::Int(numeric) => {
            check_size(numeric.size, name)?;
            let raw = reader.take(numeric.size, name)?;
            let extended = I256::from_raw(sign_extend(&big_endian(raw, numeric.endianness)));
            let raw = match Value::BigInt(extended).as_i64() {
                Some(small) if numeric.size <= 8 => Value::Int(small),
                _ => Value::BigInt(extended),
            };
            apply_decode(name, numeric.custom.as_ref(), raw)
        }
        Item::Bytes(bytes) => decode_bytes(name, bytes, reader),
        Item::Array(array) => decode_array(name, array, reader).map(Some),
        Item::Object(layout) => decode_fields(layout, reader).map(Some),
        Item::Switch(switch) => decode_switch(name, switch, reader).map(Some),
        Item::Bitset(bitset) => decode_bitset(name, bitset, reader).map(Some),
    }
}

fn decode_bytes(
    name: &str,
    item: &BytesItem,
    reader: &mut Reader<'_>,
) -> Result<Option<Value>, LayoutError> {
    let len = reader
        .read_length(item.length, name)?
        .unwrap_or_else(|| reader.remaining());
    let chunk = reader.take(len, name)?;
    let raw = match &item.layout {
        Some(layout) => deserialize_layout_exact(layout, chunk)?,
        None => Value::Bytes(chunk.to_vec()),
    };
    apply_decode(name, item.custom.as_ref(), raw)
}

fn decode_array(
    name: &str,
    item: &ArrayItem,
    reader: &mut Reader<'_>,
) -> Result<Value, LayoutError> {
    let mut elements = Vec::new();
    match reader.read_length(item.length, name)? {
        Some(count) => {
            for _ in 0..count {
                elements.push(decode_item(name, &item.element, reader)?.unwrap_or(Value::Null));
            }
        }
        None => {
            while reader.remaining() > 0 {
                elements.push(decode_item(name, &item.element, reader)?.unwrap_or(Value::Null));
            }
        }
    }
    Ok(Value::List(elements))
}

fn decode_switch(
    name: &str,
    item: &SwitchItem,
    reader: &mut Reader<'_>,
) -> Result<Value, LayoutError> {
    let id = reader.read_uint(item.id_size, item.id_endianness, name)?;
    let case = item
        .cases
        .iter()
        .find(|case| U256::from(case.id) == id)
        .ok_or_else(|| LayoutError::UnknownSwitchId {
            field: name.to_string(),
            id: id.to_string(),
        })?;
    let mut entries = decode_entries(&case.layout, reader)?;
    let tag = match &case.name {
        Some(case_name) => Value::String(case_name.clone()),
        None => Value::Uint(case.id),
    };
    entries.insert(item.id_tag.clone(), tag);
    Ok(Value::Object(entries))
}

fn decode_bitset(
    name: &str,
    item: &BitsetItem,
    reader: &mut Reader<'_>,
) -> Result<Value, LayoutError> {
    let raw = reader.read_uint(item.size, item.endianness, name)?;
    let width = item.size * 8;
    let mut entries = BTreeMap::new();
    let mut named = U256::ZERO;
    for (index, bit_name) in item.bits.iter().enumerate().take(width) {
        let position = bit_position(item.bit_order, width, index);
        if let Some(bit_name) = bit_name {
            named.set_bit(position, true);
            entries.insert(bit_name.clone(), Value::Bool(raw.bit(position)));
        }
    }
    let stray = raw & !named;
    if stray != U256::ZERO {
        let position = stray.trailing_zeros();
        let index = match item.bit_order {
            BitOrder::MsbFirst => width - 1 - position,
            BitOrder::LsbFirst => position,
        };
        return Err(LayoutError::UnnamedBitSet {
            field: name.to_string(),
            bit: index,
        });
    }
    Ok(Value::Object(entries))
}

fn bit_position(order: BitOrder, width: usize, index: usize) -> usize {
    match order {
        BitOrder::MsbFirst => width - 1 - index,
        BitOrder::LsbFirst => index,
    }
}

fn apply_decode(
    name: &str,
    custom: Option<&Custom>,
    raw: Value,
) -> Result<Option<Value>, LayoutError> {
    match custom {
        None => Ok(Some(raw)),
        Some(Custom::Fixed(expected)) => {
            if same_raw_value(expected, &raw) {
                Ok(None)
            } else {
                Err(LayoutError::FixedValueMismatch {
                    field: name.to_string(),
                    expected: expected.to_string(),
                    found: raw.to_string(),
                })
            }
        }
        Some(Custom::Convert(conversion)) => conversion
            .decode(raw)
            .map(Some)
            .map_err(|err| LayoutError::Conversion {
                field: name.to_string(),
                reason: err.0,
            }),
    }
}

fn same_raw_value(expected: &Value, found: &Value) -> bool {
    match (expected.as_u256(), found.as_u256()) {
        (Some(a), Some(b)) => a == b,
        _ => match (expected.as_i256(), found.as_i256()) {
            (Some(a), Some(b)) => a == b,
            _ => expected == found,
        },
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn encode_fields(
    layout: &Layout,
    entries: &BTreeMap<String, Value>,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    for field in layout.fields() {
        let value = if field.item.is_fixed() {
            None
        } else {
            Some(
                entries
                    .get(&field.name)
                    .ok_or_else(|| LayoutError::MissingField {
                        field: field.name.clone(),
                    })?,
            )
        };
        encode_item(&field.name, &field.item, value, out)?;
    }
    Ok(())
}

fn encode_item(
    name: &str,
    item: &Item,
    value: Option<&Value>,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    match item {
        Item::Uint(numeric) => {
            let raw = resolve_raw(name, numeric.custom.as_ref(), value)?;
            let number = raw
                .as_u256()
                .ok_or_else(|| type_mismatch(name, "unsigned integer"))?;
            write_uint(out, number, numeric.size, numeric.endianness, name)
        }
        Item::Int(numeric) => encode_int(name, numeric, value, out),
        Item::Bytes(bytes) => encode_bytes(name, bytes, value, out),
        Item::Array(array) => {
            let elements = required(name, value)?
                .as_list()
                .ok_or_else(|| type_mismatch(name, "list"))?;
            write_length(out, array.length, elements.len(), name)?;
            for element in elements {
                encode_item(name, &array.element, Some(element), out)?;
            }
            Ok(())
        }
        Item::Object(layout) => {
            let entries = required(name, value)?
                .as_object()
                .ok_or_else(|| type_mismatch(name, "object"))?;
            encode_fields(layout, entries, out)
        }
        Item::Switch(switch) => encode_switch(name, switch, required(name, value)?, out),
        Item::Bitset(bitset) => encode_bitset(name, bitset, required(name, value)?, out),
    }
}

fn encode_int(
    name: &str,
    item: &NumericItem,
    value: Option<&Value>,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    let raw = resolve_raw(name, item.custom.as_ref(), value)?;
    let number = raw
        .as_i256()
        .ok_or_else(|| type_mismatch(name, "signed integer"))?;
    write_int(out, number, item.size, item.endianness, name)
}

fn encode_bytes(
    name: &str,
    item: &BytesItem,
    value: Option<&Value>,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    let raw = resolve_raw(name, item.custom.as_ref(), value)?;
    let content = match &item.layout {
        Some(layout) => Cow::Owned(serialize_layout(layout, &raw)?),
        None => Cow::Borrowed(raw.as_bytes().ok_or_else(|| type_mismatch(name, "bytes"))?),
    };
    write_length(out, item.length, content.len(), name)?;
    out.extend_from_slice(&content);
    Ok(())
}

fn encode_switch(
    name: &str,
    item: &SwitchItem,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    let entries = value
        .as_object()
        .ok_or_else(|| type_mismatch(name, "object"))?;
    let tag = entries
        .get(&item.id_tag)
        .ok_or_else(|| LayoutError::MissingField {
            field: format!("{name}.{}", item.id_tag),
        })?;
    let case = match tag {
        Value::String(case_name) => item
            .cases
            .iter()
            .find(|case| case.name.as_deref() == Some(case_name.as_str())),
        other => {
            let id = other
                .as_u64()
                .ok_or_else(|| type_mismatch(name, "switch id"))?;
            item.cases.iter().find(|case| case.id == id)
        }
    }
    .ok_or_else(|| LayoutError::UnknownSwitchId {
        field: name.to_string(),
        id: tag.to_string(),
    })?;
    write_uint(
        out,
        U256::from(case.id),
        item.id_size,
        item.id_endianness,
        name,
    )?;
    encode_fields(&case.layout, entries, out)
}

fn encode_bitset(
    name: &str,
    item: &BitsetItem,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), LayoutError> {
    let width = item.size * 8;
    let mut raw = U256::ZERO;
    for (index, bit_name) in item.bits.iter().enumerate().take(width) {
        let Some(bit_name) = bit_name else { continue };
        let flag = value
            .field(bit_name)?
            .as_bool()
            .ok_or_else(|| type_mismatch(bit_name, "bool"))?;
        if flag {
            raw.set_bit(bit_position(item.bit_order, width, index), true);
        }
    }
    write_uint(out, raw, item.size, item.endianness, name)
}

fn resolve_raw<'v>(
    name: &str,
    custom: Option<&Custom>,
    value: Option<&'v Value>,
) -> Result<Cow<'v, Value>, LayoutError> {
    match custom {
        Some(Custom::Fixed(constant)) => Ok(Cow::Owned(constant.clone())),
        Some(Custom::Convert(conversion)) => conversion
            .encode(required(name, value)?)
            .map(Cow::Owned)
            .map_err(|err| LayoutError::Conversion {
                field: name.to_string(),
                reason: err.0,
            }),
        None => required(name, value).map(Cow::Borrowed),
    }
}

fn required<'v>(name: &str, value: Option<&'v Value>) -> Result<&'v Value, LayoutError> {
    value.ok_or_else(|| LayoutError::MissingField {
        field: name.to_string(),
    })
}

fn type_mismatch(name: &str, expected: &'static str) -> LayoutError {
    LayoutError::TypeMismatch {
        field: name.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{field, SwitchCase};
    use alloy_primitives::hex;
    use rstest::rstest;

    fn roundtrip(layout: &Layout, bytes: &[u8]) -> Value {
        let value = deserialize_layout_exact(layout, bytes).unwrap();
        assert_eq!(serialize_layout(layout, &value).unwrap(), bytes);
        value
    }

    #[rstest]
    #[case(1, Endianness::Big, "ff", 0xff)]
    #[case(2, Endianness::Big, "0102", 0x0102)]
    #[case(2, Endianness::Little, "0201", 0x0102)]
    #[case(3, Endianness::Big, "010203", 0x010203)]
    #[case(8, Endianness::Little, "0807060504030201", 0x0102030405060708)]
    fn test_uint_widths(
        #[case] size: usize,
        #[case] endianness: Endianness,
        #[case] wire: &str,
        #[case] expected: u64,
    ) {
        let mut item = Item::uint(size);
        if endianness == Endianness::Little {
            item = item.little_endian();
        }
        let layout = Layout::new(vec![field("n", item)]);
        let value = roundtrip(&layout, &hex::decode(wire).unwrap());
        assert_eq!(value.get("n"), Some(&Value::Uint(expected)));
    }

    #[test]
    fn test_wide_uint_is_big() {
        let layout = Layout::new(vec![field("n", Item::uint(32))]);
        let mut wire = [0u8; 32];
        wire[31] = 5;
        let value = roundtrip(&layout, &wire);
        assert_eq!(value.get("n"), Some(&Value::BigUint(U256::from(5))));
    }

    #[rstest]
    #[case(1, "ff", -1)]
    #[case(1, "80", -128)]
    #[case(2, "7fff", 32767)]
    #[case(4, "fffffffe", -2)]
    #[case(8, "8000000000000000", i64::MIN)]
    fn test_signed_ints(#[case] size: usize, #[case] wire: &str, #[case] expected: i64) {
        let layout = Layout::new(vec![field("n", Item::int(size))]);
        let value = roundtrip(&layout, &hex::decode(wire).unwrap());
        assert_eq!(value.get("n"), Some(&Value::Int(expected)));
    }

    #[test]
    fn test_wide_signed_int() {
        let layout = Layout::new(vec![field("n", Item::int(16))]);
        let wire = [0xffu8; 16];
        let value = roundtrip(&layout, &wire);
        assert_eq!(value.get("n"), Some(&Value::BigInt(I256::MINUS_ONE)));
    }

    #[rstest]
    #[case(Item::uint(1), Value::Uint(256))]
    #[case(Item::int(1), Value::Int(128))]
    #[case(Item::int(1), Value::Int(-129))]
    #[case(Item::uint(2), Value::Int(-1))]
    fn test_out_of_range(#[case] item: Item, #[case] value: Value) {
        let layout = Layout::new(vec![field("n", item)]);
        let result = serialize_layout(&layout, &Value::object([("n", value)]));
        assert!(matches!(
            result,
            Err(LayoutError::ValueOutOfRange { .. }) | Err(LayoutError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_fixed_values_are_omitted_and_checked() {
        let layout = Layout::new(vec![
            field("magic", Item::bytes(4).fixed(*b"P2WH")),
            field("version", Item::uint(1).fixed(3u8)),
            field("data", Item::uint(2)),
        ]);
        let value = roundtrip(&layout, b"P2WH\x03\x00\x2a");
        assert_eq!(value, Value::object([("data", Value::Uint(42))]));

        let err = deserialize_layout_exact(&layout, b"P2WH\x04\x00\x2a").unwrap_err();
        assert_eq!(
            err,
            LayoutError::FixedValueMismatch {
                field: "version".to_string(),
                expected: "3".to_string(),
                found: "4".to_string(),
            }
        );
        assert!(matches!(
            deserialize_layout_exact(&layout, b"XXXX\x03\x00\x2a"),
            Err(LayoutError::FixedValueMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_input() {
        let layout = Layout::new(vec![field("a", Item::uint(4))]);
        assert_eq!(
            deserialize_layout(&layout, &[0, 0, 1], 0).unwrap_err(),
            LayoutError::Truncated {
                field: "a".to_string(),
                offset: 0,
                needed: 4,
                available: 3,
            }
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let layout = Layout::new(vec![field("a", Item::uint(1))]);
        assert_eq!(
            deserialize_layout_exact(&layout, &[1, 2]).unwrap_err(),
            LayoutError::TrailingBytes {
                offset: 1,
                remaining: 1
            }
        );
        let (value, offset) = deserialize_layout(&layout, &[1, 2], 1).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Uint(2)));
        assert_eq!(offset, 2);
    }

    #[test]
    fn test_length_prefix_overflow() {
        let layout = Layout::new(vec![field("data", Item::prefixed_bytes(1))]);
        let value = Value::object([("data", Value::Bytes(vec![0u8; 256]))]);
        assert_eq!(
            serialize_layout(&layout, &value).unwrap_err(),
            LayoutError::LengthOverflow {
                field: "data".to_string(),
                length: 256,
                size: 1,
            }
        );
    }

    #[test]
    fn test_length_prefix_truncated_content() {
        let layout = Layout::new(vec![field("data", Item::prefixed_bytes(2))]);
        assert!(matches!(
            deserialize_layout_exact(&layout, &[0, 5, 1, 2]),
            Err(LayoutError::Truncated { needed: 5, .. })
        ));
    }

    #[test]
    fn test_fixed_size_bytes_mismatch() {
        let layout = Layout::new(vec![field("data", Item::bytes(3))]);
        let value = Value::object([("data", Value::Bytes(vec![1, 2]))]);
        assert!(matches!(
            serialize_layout(&layout, &value),
            Err(LayoutError::SizeMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_arrays() {
        let element = Item::object(Layout::new(vec![
            field("index", Item::uint(1)),
            field("tag", Item::bytes(2)),
        ]));
        let layout = Layout::new(vec![
            field("items", Item::array(LengthSpec::prefixed(1), element.clone())),
            field("tail", Item::array(LengthSpec::Remainder, Item::uint(2))),
        ]);
        let value = roundtrip(&layout, &[2, 1, 0xaa, 0xbb, 7, 0xcc, 0xdd, 0, 1, 0, 2]);
        let items = value.get("items").and_then(Value::as_list).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].u64_field("index").unwrap(), 7);
        assert_eq!(
            value.get("tail"),
            Some(&Value::List(vec![Value::Uint(1), Value::Uint(2)]))
        );
    }

    #[test]
    fn test_nested_bytes_layout() {
        let inner = Layout::new(vec![
            field("prefix", Item::bytes(2).fixed([0x99u8, 0x45])),
            field("amount", Item::uint(8)),
        ]);
        let layout = Layout::new(vec![
            field("payload", Item::prefixed_bytes(2).with_layout(inner)),
            field("after", Item::uint(1)),
        ]);
        let wire = [0, 10, 0x99, 0x45, 0, 0, 0, 0, 0, 0, 0, 9, 0xee];
        let value = roundtrip(&layout, &wire);
        assert_eq!(
            value.get("payload"),
            Some(&Value::object([("amount", Value::Uint(9))]))
        );

        // the nested layout must consume the whole length-delimited chunk
        let short = [0, 11, 0x99, 0x45, 0, 0, 0, 0, 0, 0, 0, 9, 0xee, 0x01];
        assert!(matches!(
            deserialize_layout_exact(&layout, &short),
            Err(LayoutError::TrailingBytes { .. })
        ));
    }

    fn key_switch() -> Layout {
        Layout::new(vec![field(
            "key",
            Item::switch(
                1,
                "keyType",
                vec![
                    SwitchCase::named(
                        1,
                        "Vaa",
                        Layout::new(vec![field("sequence", Item::uint(8))]),
                    ),
                    SwitchCase::named(2, "Cctp", Layout::new(vec![field("nonce", Item::uint(4))])),
                ],
            ),
        )])
    }

    #[test]
    fn test_switch_roundtrip() {
        let layout = key_switch();
        let value = roundtrip(&layout, &[2, 0, 0, 0, 9]);
        assert_eq!(
            value.get("key"),
            Some(&Value::object([
                ("keyType", Value::String("Cctp".to_string())),
                ("nonce", Value::Uint(9)),
            ]))
        );

        // encoding by numeric id selects the same case
        let by_id = Value::object([(
            "key",
            Value::object([("keyType", Value::Uint(2)), ("nonce", Value::Uint(9))]),
        )]);
        assert_eq!(serialize_layout(&layout, &by_id).unwrap(), [2, 0, 0, 0, 9]);
    }

    #[test]
    fn test_unknown_switch_id() {
        assert_eq!(
            deserialize_layout_exact(&key_switch(), &[3, 0]).unwrap_err(),
            LayoutError::UnknownSwitchId {
                field: "key".to_string(),
                id: "3".to_string(),
            }
        );
    }

    #[test]
    fn test_bitset_msb_first() {
        let layout = Layout::new(vec![field(
            "flags",
            Item::bitset(1, [Some("paused"), None, Some("fast")]),
        )]);
        let value = roundtrip(&layout, &[0b1010_0000]);
        assert_eq!(
            value.get("flags"),
            Some(&Value::object([
                ("paused", Value::Bool(true)),
                ("fast", Value::Bool(true)),
            ]))
        );
        assert_eq!(
            deserialize_layout_exact(&layout, &[0b0100_0000]).unwrap_err(),
            LayoutError::UnnamedBitSet {
                field: "flags".to_string(),
                bit: 1,
            }
        );
    }

    #[test]
    fn test_bitset_lsb_first_little_endian() {
        let layout = Layout::new(vec![field(
            "flags",
            Item::bitset(2, [Some("a"), Some("b")])
                .lsb_first()
                .little_endian(),
        )]);
        let value = roundtrip(&layout, &[0b0000_0010, 0]);
        assert_eq!(
            value.get("flags").and_then(|f| f.get("b")),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            value.get("flags").and_then(|f| f.get("a")),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn test_missing_field() {
        let layout = Layout::new(vec![field("a", Item::uint(1)), field("b", Item::uint(1))]);
        assert_eq!(
            serialize_layout(&layout, &Value::object([("a", Value::Uint(1))])).unwrap_err(),
            LayoutError::MissingField {
                field: "b".to_string()
            }
        );
    }
}
