//! # Sample Interpreter
//!
//! Turns the raw bits or words of one read group into named, typed and
//! scaled tag values.
//!
//! ## Supported Data Types
//!
//! | Type | Registers | Decoded as |
//! |------|-----------|------------|
//! | uint16 | 1 | [`TagValue::U16`] |
//! | sint16 | 1 | [`TagValue::I16`], two's complement |
//! | ruint16 / rsint16 | 1 | bytes swapped, then as above |
//! | float32 | 2 | [`TagValue::F32`], ABCD |
//! | rfloat32_byte_swap | 2 | BADC |
//! | rfloat32_word_swap | 2 | CDAB |
//! | rfloat32_byte_word_swap | 2 | DCBA |
//! | float64 | 4 | [`TagValue::F64`], big-endian |
//! | packedbool | 1 | raw word plus sixteen bit tags |
//!
//! A configured scaling turns the decoded value into [`TagValue::F64`].

use tracing::{debug, warn};

use crate::bytes::{reg_to_i16, reg_to_u16, regs_to_f32, regs_to_f64, ByteOrder};
use crate::error::{ModbusError, ModbusResult};
use crate::planner::{AddressMetadata, AddressTable, DataType, Scaling};
use crate::protocol::{ModbusFunction, RawValues};
use crate::value::{TagMap, TagValue};

/// Word layout used for each register data type.
pub fn byte_order_for(data_type: DataType) -> ByteOrder {
    match data_type {
        DataType::Ruint16 | DataType::Rsint16 => ByteOrder::LittleEndian16,
        DataType::RFloat32ByteSwap => ByteOrder::LittleEndianSwap,
        DataType::RFloat32WordSwap => ByteOrder::BigEndianSwap,
        DataType::RFloat32ByteWordSwap => ByteOrder::LittleEndian,
        DataType::Uint16 | DataType::Sint16 | DataType::PackedBool => ByteOrder::BigEndian16,
        _ => ByteOrder::BigEndian,
    }
}

/// Decode one value from the words it occupies.
///
/// `words` must hold at least `data_type.register_count()` entries. Bit
/// types (`di`, `coil`) have no register representation and are rejected.
///
/// ```rust
/// use modbus_dl::codec::decode_register_value;
/// use modbus_dl::planner::DataType;
/// use modbus_dl::TagValue;
///
/// let value = decode_register_value(&[0x41C8, 0x0000], DataType::Float32).unwrap();
/// assert_eq!(value, TagValue::F32(25.0));
/// ```
pub fn decode_register_value(words: &[u16], data_type: DataType) -> ModbusResult<TagValue> {
    let needed = data_type.register_count() as usize;
    if words.len() < needed {
        return Err(ModbusError::invalid_data(format!(
            "{} needs {} registers, got {}",
            data_type,
            needed,
            words.len()
        )));
    }

    let order = byte_order_for(data_type);
    let value = match data_type {
        DataType::Uint16 | DataType::Ruint16 | DataType::PackedBool => {
            TagValue::U16(reg_to_u16(words[0], order))
        }
        DataType::Sint16 | DataType::Rsint16 => TagValue::I16(reg_to_i16(words[0], order)),
        DataType::Float32
        | DataType::RFloat32ByteSwap
        | DataType::RFloat32WordSwap
        | DataType::RFloat32ByteWordSwap => TagValue::F32(regs_to_f32(&[words[0], words[1]], order)),
        DataType::Float64 => {
            TagValue::F64(regs_to_f64(&[words[0], words[1], words[2], words[3]], order))
        }
        DataType::Di | DataType::Coil => {
            return Err(ModbusError::invalid_data(format!(
                "{} cannot be read from a register",
                data_type
            )))
        }
    };
    Ok(value)
}

/// Apply the scaling decision table; unscaled values keep their type.
pub fn apply_scaling(value: TagValue, scaling: &Scaling) -> TagValue {
    match value.as_f64().and_then(|v| scaling.apply(v)) {
        Some(scaled) => TagValue::F64(scaled),
        None => value,
    }
}

/// Insert `<tag>_uint16_value` then `<tag>_bit15` down to `<tag>_bit0`.
fn insert_packed_bool(tags: &mut TagMap, tag_name: &str, word: u16) {
    tags.insert(format!("{}_uint16_value", tag_name), TagValue::U16(word));
    for bit in (0..16).rev() {
        tags.insert(
            format!("{}_bit{}", tag_name, bit),
            TagValue::Bool(word & (1 << bit) != 0),
        );
    }
}

/// Interpret the response to one read group that started at `start`.
///
/// Never fails: values that cannot be decoded are left out and logged.
pub fn interpret(
    raw: &RawValues,
    function: ModbusFunction,
    start: u16,
    table: &AddressTable,
) -> TagMap {
    match raw {
        RawValues::Bits(bits) => interpret_bits(bits, function, start, table),
        RawValues::Words(words) => interpret_words(words, function, start, table),
    }
}

fn metadata_at<'a>(table: &'a AddressTable, start: u16, offset: usize) -> Option<&'a AddressMetadata> {
    let address = u16::try_from(usize::from(start) + offset).ok()?;
    table.get(&address)
}

fn interpret_bits(
    bits: &[bool],
    function: ModbusFunction,
    start: u16,
    table: &AddressTable,
) -> TagMap {
    let mut tags = TagMap::new();
    for (offset, &bit) in bits.iter().enumerate() {
        match metadata_at(table, start, offset) {
            Some(meta) => {
                tags.insert(meta.tag_name.as_str(), TagValue::Bool(bit));
            }
            None => debug!(
                "{} address {} not in template, skipped",
                function.label(),
                usize::from(start) + offset
            ),
        }
    }
    tags
}

fn interpret_words(
    words: &[u16],
    function: ModbusFunction,
    start: u16,
    table: &AddressTable,
) -> TagMap {
    let mut tags = TagMap::new();
    let mut cursor = 0usize;

    while cursor < words.len() {
        let address = usize::from(start) + cursor;
        let Some(meta) = metadata_at(table, start, cursor) else {
            warn!(
                "{} address {}: no template entry for this word, skipped",
                function.label(),
                address
            );
            cursor += 1;
            continue;
        };

        let width = usize::from(meta.register_count).max(1);
        if cursor + width > words.len() {
            warn!(
                "{} address {}: {} {:?} truncated ({} of {} registers in response), skipped",
                function.label(),
                address,
                meta.data_type,
                meta.tag_name,
                words.len() - cursor,
                width
            );
            break;
        }

        let value_words = &words[cursor..cursor + width];
        if meta.data_type == DataType::PackedBool {
            insert_packed_bool(&mut tags, &meta.tag_name, value_words[0]);
        } else {
            match decode_register_value(value_words, meta.data_type) {
                Ok(value) => {
                    tags.insert(meta.tag_name.as_str(), apply_scaling(value, &meta.scaling));
                }
                Err(e) => warn!(
                    "{} address {} ({:?}): {}, skipped",
                    function.label(),
                    address,
                    meta.tag_name,
                    e
                ),
            }
        }
        cursor += width;
    }

    tags
}
