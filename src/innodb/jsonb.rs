//! MySQL binary JSON decoding.
//!
//! JSON columns store a compact binary document: a one-byte type tag
//! followed by type-specific data. Objects and arrays come in small (2-byte
//! counts/offsets) and large (4-byte) variants with sorted key directories
//! and value entries that either point into the document or inline small
//! scalars. Integers are little-endian; string lengths use a 7-bit varint.
//!
//! [`decode`] turns a document into a [`serde_json::Value`] so the row
//! writers can render it as standard JSON text.

use byteorder::{ByteOrder, LittleEndian};
use serde_json::{Map, Number, Value};

use crate::IbdError;

const TYPE_SMALL_OBJECT: u8 = 0x00;
const TYPE_LARGE_OBJECT: u8 = 0x01;
const TYPE_SMALL_ARRAY: u8 = 0x02;
const TYPE_LARGE_ARRAY: u8 = 0x03;
const TYPE_LITERAL: u8 = 0x04;
const TYPE_INT16: u8 = 0x05;
const TYPE_UINT16: u8 = 0x06;
const TYPE_INT32: u8 = 0x07;
const TYPE_UINT32: u8 = 0x08;
const TYPE_INT64: u8 = 0x09;
const TYPE_UINT64: u8 = 0x0A;
const TYPE_DOUBLE: u8 = 0x0B;
const TYPE_STRING: u8 = 0x0C;
const TYPE_OPAQUE: u8 = 0x0F;

const LITERAL_NULL: u8 = 0x00;
const LITERAL_TRUE: u8 = 0x01;
const LITERAL_FALSE: u8 = 0x02;

fn err(msg: impl Into<String>) -> IbdError {
    IbdError::RecordCorrupted(format!("JSON binary: {}", msg.into()))
}

/// Decode a whole binary JSON document (type byte + data).
pub fn decode(data: &[u8]) -> Result<Value, IbdError> {
    if data.is_empty() {
        // An empty document is how MySQL stores JSON null.
        return Ok(Value::Null);
    }
    decode_value(data[0], &data[1..])
}

/// Decode a value of the given type from `data`.
fn decode_value(type_byte: u8, data: &[u8]) -> Result<Value, IbdError> {
    match type_byte {
        TYPE_SMALL_OBJECT => decode_object(data, false),
        TYPE_LARGE_OBJECT => decode_object(data, true),
        TYPE_SMALL_ARRAY => decode_array(data, false),
        TYPE_LARGE_ARRAY => decode_array(data, true),
        TYPE_LITERAL => decode_literal(read_u8(data)?),
        TYPE_INT16 => Ok(Value::from(read_i16(data)?)),
        TYPE_UINT16 => Ok(Value::from(read_u16(data)?)),
        TYPE_INT32 => Ok(Value::from(read_i32(data)?)),
        TYPE_UINT32 => Ok(Value::from(read_u32(data)?)),
        TYPE_INT64 => Ok(Value::from(read_i64(data)?)),
        TYPE_UINT64 => Ok(Value::from(read_u64(data)?)),
        TYPE_DOUBLE => {
            let bits = read_u64(data)?;
            let d = f64::from_bits(bits);
            Number::from_f64(d)
                .map(Value::Number)
                .ok_or_else(|| err("non-finite double"))
        }
        TYPE_STRING => {
            let (len, var_len) = read_varint(data)?;
            let end = var_len + len;
            if data.len() < end {
                return Err(err("string runs past the document"));
            }
            Ok(Value::String(
                String::from_utf8_lossy(&data[var_len..end]).to_string(),
            ))
        }
        TYPE_OPAQUE => {
            let field_type = read_u8(data)?;
            let (len, var_len) = read_varint(&data[1..])?;
            let start = 1 + var_len;
            let end = start + len;
            if data.len() < end {
                return Err(err("opaque value runs past the document"));
            }
            Ok(Value::String(format!(
                "opaque:type{}:{}",
                field_type,
                crate::util::hex::encode(&data[start..end])
            )))
        }
        other => Err(err(format!("unknown type tag 0x{:02x}", other))),
    }
}

fn decode_literal(lit: u8) -> Result<Value, IbdError> {
    match lit {
        LITERAL_NULL => Ok(Value::Null),
        LITERAL_TRUE => Ok(Value::Bool(true)),
        LITERAL_FALSE => Ok(Value::Bool(false)),
        other => Err(err(format!("unknown literal 0x{:02x}", other))),
    }
}

/// Whether a value of this type is stored inline in the value entry.
fn is_inlined(type_byte: u8, large: bool) -> bool {
    match type_byte {
        TYPE_LITERAL | TYPE_INT16 | TYPE_UINT16 => true,
        TYPE_INT32 | TYPE_UINT32 => large,
        _ => false,
    }
}

fn decode_object(data: &[u8], large: bool) -> Result<Value, IbdError> {
    let w = if large { 4 } else { 2 };
    let count = read_offset(data, 0, large)?;
    let size = read_offset(data, w, large)?;
    if size > data.len() {
        return Err(err("object size exceeds the document"));
    }

    let key_entry_size = w + 2;
    let value_entry_size = 1 + w;
    let mut object = Map::with_capacity(count);

    for i in 0..count {
        let key_entry = 2 * w + i * key_entry_size;
        let key_offset = read_offset(data, key_entry, large)?;
        if data.len() < key_entry + w + 2 {
            return Err(err("key entry truncated"));
        }
        let key_len = LittleEndian::read_u16(&data[key_entry + w..]) as usize;
        if key_offset + key_len > data.len() {
            return Err(err("key runs past the document"));
        }
        let key = String::from_utf8_lossy(&data[key_offset..key_offset + key_len]).to_string();

        let value_entry = 2 * w + count * key_entry_size + i * value_entry_size;
        let value = decode_entry(data, value_entry, large)?;
        object.insert(key, value);
    }

    Ok(Value::Object(object))
}

fn decode_array(data: &[u8], large: bool) -> Result<Value, IbdError> {
    let w = if large { 4 } else { 2 };
    let count = read_offset(data, 0, large)?;
    let size = read_offset(data, w, large)?;
    if size > data.len() {
        return Err(err("array size exceeds the document"));
    }

    let value_entry_size = 1 + w;
    let mut array = Vec::with_capacity(count);
    for i in 0..count {
        let value_entry = 2 * w + i * value_entry_size;
        array.push(decode_entry(data, value_entry, large)?);
    }
    Ok(Value::Array(array))
}

/// Decode one value entry of an object or array: a type byte followed by
/// either an inline value or an offset into the container.
fn decode_entry(data: &[u8], entry: usize, large: bool) -> Result<Value, IbdError> {
    let w = if large { 4 } else { 2 };
    if data.len() < entry + 1 + w {
        return Err(err("value entry truncated"));
    }
    let type_byte = data[entry];
    let payload = &data[entry + 1..entry + 1 + w];

    if is_inlined(type_byte, large) {
        return decode_value(type_byte, payload);
    }

    let offset = read_offset(data, entry + 1, large)?;
    if offset >= data.len() {
        return Err(err("value offset past the document"));
    }
    decode_value(type_byte, &data[offset..])
}

fn read_offset(data: &[u8], at: usize, large: bool) -> Result<usize, IbdError> {
    if large {
        if data.len() < at + 4 {
            return Err(err("truncated u32"));
        }
        Ok(LittleEndian::read_u32(&data[at..]) as usize)
    } else {
        if data.len() < at + 2 {
            return Err(err("truncated u16"));
        }
        Ok(LittleEndian::read_u16(&data[at..]) as usize)
    }
}

fn read_u8(data: &[u8]) -> Result<u8, IbdError> {
    data.first().copied().ok_or_else(|| err("truncated u8"))
}

fn read_i16(data: &[u8]) -> Result<i16, IbdError> {
    if data.len() < 2 {
        return Err(err("truncated i16"));
    }
    Ok(LittleEndian::read_i16(data))
}

fn read_u16(data: &[u8]) -> Result<u16, IbdError> {
    if data.len() < 2 {
        return Err(err("truncated u16"));
    }
    Ok(LittleEndian::read_u16(data))
}

fn read_i32(data: &[u8]) -> Result<i32, IbdError> {
    if data.len() < 4 {
        return Err(err("truncated i32"));
    }
    Ok(LittleEndian::read_i32(data))
}

fn read_u32(data: &[u8]) -> Result<u32, IbdError> {
    if data.len() < 4 {
        return Err(err("truncated u32"));
    }
    Ok(LittleEndian::read_u32(data))
}

fn read_i64(data: &[u8]) -> Result<i64, IbdError> {
    if data.len() < 8 {
        return Err(err("truncated i64"));
    }
    Ok(LittleEndian::read_i64(data))
}

fn read_u64(data: &[u8]) -> Result<u64, IbdError> {
    if data.len() < 8 {
        return Err(err("truncated u64"));
    }
    Ok(LittleEndian::read_u64(data))
}

/// Read a 7-bit little-endian varint; returns `(value, bytes_consumed)`.
fn read_varint(data: &[u8]) -> Result<(usize, usize), IbdError> {
    let mut value = 0usize;
    for (i, &b) in data.iter().take(5).enumerate() {
        value |= ((b & 0x7F) as usize) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(err("unterminated varint"))
}
