//! Typed column value rendering.
//!
//! Turns the raw bytes of one record field into a [`FieldValue`] using the
//! column metadata from the SDI. Handles InnoDB's storage encodings:
//! big-endian integers with the sign bit flipped for memcmp ordering,
//! IEEE 754 floats with sign manipulation, the packed temporal formats
//! (NEWDATE, TIME2, DATETIME2, TIMESTAMP2 with fractional seconds), packed
//! BCD DECIMAL, ENUM/SET element lookup, BIT, charset-aware strings, and
//! binary JSON documents.

use serde::Serialize;

use crate::innodb::dtype::*;
use crate::innodb::jsonb;
use crate::innodb::schema::ColumnMeta;

/// Decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Textual value (strings, temporals, DECIMAL, ENUM/SET, JSON).
    Str(String),
    /// Hex rendering (`0x...`) for binary data.
    Hex(String),
}

impl FieldValue {
    /// Plain text rendering (pipe/CSV cell content).
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Null => "NULL".to_string(),
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Uint(v) => v.to_string(),
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Double(v) => format!("{}", v),
            FieldValue::Str(s) => s.clone(),
            FieldValue::Hex(h) => h.clone(),
        }
    }
}

/// Decode-time options shared by all columns of a parse run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Render ENUM/SET/YEAR as the raw stored integers.
    pub raw_integers: bool,
    /// Display offset from UTC for TIMESTAMP values, in seconds.
    pub tz_offset_secs: i32,
}

/// Decode one non-NULL field against its column metadata.
pub fn decode_column(data: &[u8], col: &ColumnMeta, opts: &DecodeOptions) -> FieldValue {
    match col.dd_type {
        DD_TYPE_TINY => decode_int(data, 1, col.is_unsigned),
        DD_TYPE_SHORT => decode_int(data, 2, col.is_unsigned),
        DD_TYPE_INT24 => decode_int(data, 3, col.is_unsigned),
        DD_TYPE_LONG => decode_int(data, 4, col.is_unsigned),
        DD_TYPE_LONGLONG => decode_int(data, 8, col.is_unsigned),
        DD_TYPE_FLOAT => decode_float(data),
        DD_TYPE_DOUBLE => decode_double(data),
        DD_TYPE_NEWDECIMAL => decode_decimal(
            data,
            col.numeric_precision as usize,
            col.numeric_scale as usize,
        ),
        DD_TYPE_DATE | DD_TYPE_NEWDATE => decode_date(data),
        DD_TYPE_TIME2 => decode_time(data, col.datetime_precision),
        DD_TYPE_DATETIME2 => decode_datetime(data, col.datetime_precision),
        DD_TYPE_TIMESTAMP2 => decode_timestamp(data, col.datetime_precision, opts.tz_offset_secs),
        DD_TYPE_YEAR => decode_year(data, opts.raw_integers),
        DD_TYPE_ENUM => decode_enum(data, col, opts.raw_integers),
        DD_TYPE_SET => decode_set(data, col, opts.raw_integers),
        DD_TYPE_BIT => decode_int_unsigned(data),
        DD_TYPE_JSON => decode_json(data),
        DD_TYPE_VARCHAR | DD_TYPE_VAR_STRING | DD_TYPE_STRING | DD_TYPE_TINY_BLOB
        | DD_TYPE_MEDIUM_BLOB | DD_TYPE_LONG_BLOB | DD_TYPE_BLOB => decode_string(data, col),
        _ => decode_hex(data),
    }
}

/// Decode a system column (DB_TRX_ID / DB_ROLL_PTR): plain big-endian.
pub fn decode_system(data: &[u8]) -> FieldValue {
    decode_int_unsigned(data)
}

fn decode_int_unsigned(data: &[u8]) -> FieldValue {
    let mut val: u64 = 0;
    for &b in data.iter().take(8) {
        val = (val << 8) | b as u64;
    }
    FieldValue::Uint(val)
}

/// Big-endian integer with the high bit XOR'd on disk.
fn decode_int(data: &[u8], size: usize, unsigned: bool) -> FieldValue {
    if data.len() < size {
        return decode_hex(data);
    }

    let mut val: u64 = 0;
    for &b in &data[..size] {
        val = (val << 8) | b as u64;
    }
    let sign_bit: u64 = 1 << (size * 8 - 1);
    val ^= sign_bit;

    if unsigned {
        FieldValue::Uint(val)
    } else {
        let max: u64 = if size == 8 {
            u64::MAX
        } else {
            (1u64 << (size * 8)) - 1
        };
        if val > max >> 1 {
            FieldValue::Int(val as i64 - (max as i64 + 1))
        } else {
            FieldValue::Int(val as i64)
        }
    }
}

/// Memcmp-ordered IEEE 754: non-negative values are stored with the sign
/// bit flipped, negative values with all bits inverted.
fn decode_float(data: &[u8]) -> FieldValue {
    if data.len() < 4 {
        return decode_hex(data);
    }
    let mut bytes = [data[0], data[1], data[2], data[3]];
    if bytes[0] & 0x80 != 0 {
        bytes[0] ^= 0x80;
    } else {
        for b in &mut bytes {
            *b ^= 0xFF;
        }
    }
    FieldValue::Float(f32::from_be_bytes(bytes))
}

fn decode_double(data: &[u8]) -> FieldValue {
    if data.len() < 8 {
        return decode_hex(data);
    }
    let mut bytes: [u8; 8] = data[..8].try_into().unwrap();
    if bytes[0] & 0x80 != 0 {
        bytes[0] ^= 0x80;
    } else {
        for b in &mut bytes {
            *b ^= 0xFF;
        }
    }
    FieldValue::Double(f64::from_be_bytes(bytes))
}

/// 3-byte NEWDATE: `year << 9 | month << 5 | day`, sign bit flipped.
fn decode_date(data: &[u8]) -> FieldValue {
    if data.len() < 3 {
        return decode_hex(data);
    }
    let val = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | data[2] as u32;
    let val = val ^ (1 << 23);

    let day = val & 0x1F;
    let month = (val >> 5) & 0x0F;
    let year = val >> 9;
    FieldValue::Str(format!("{:04}-{:02}-{:02}", year, month, day))
}

/// Append `.ffffff` truncated to `dec` digits.
fn push_frac(out: &mut String, micros: u64, dec: u64) {
    if dec > 0 {
        let frac = format!("{:06}", micros);
        out.push('.');
        out.push_str(&frac[..dec as usize]);
    }
}

fn frac_to_micros(frac: u64, fsp_bytes: usize) -> u64 {
    match fsp_bytes {
        1 => frac * 10000,
        2 => frac * 100,
        _ => frac,
    }
}

/// TIME2: 3-byte packed hour/minute/second plus fractional bytes, stored
/// with the sign bit flipped. Negative times keep the integer and
/// fractional parts in one two's-complement quantity.
fn decode_time(data: &[u8], dec: u64) -> FieldValue {
    let fsp_bytes = fsp_storage_bytes(dec);
    if data.len() < 3 + fsp_bytes {
        return decode_hex(data);
    }

    let int24 =
        (((data[0] as i64) << 16) | ((data[1] as i64) << 8) | data[2] as i64) - 0x80_0000;

    let packed: i64 = match fsp_bytes {
        0 => int24 << 24,
        1 => {
            let mut intpart = int24;
            let mut frac = data[3] as i64;
            if intpart < 0 && frac != 0 {
                intpart += 1;
                frac -= 0x100;
            }
            (intpart << 24) + frac * 10000
        }
        2 => {
            let mut intpart = int24;
            let mut frac = ((data[3] as i64) << 8) | data[4] as i64;
            if intpart < 0 && frac != 0 {
                intpart += 1;
                frac -= 0x1_0000;
            }
            (intpart << 24) + frac * 100
        }
        _ => {
            let mut raw: i64 = 0;
            for &b in &data[..6] {
                raw = (raw << 8) | b as i64;
            }
            raw - 0x8000_0000_0000
        }
    };

    let neg = packed < 0;
    let abs = packed.unsigned_abs();
    let hms = abs >> 24;
    let hour = (hms >> 12) & 0x3FF;
    let minute = (hms >> 6) & 0x3F;
    let second = hms & 0x3F;
    let micros = abs & 0xFF_FFFF;

    let mut out = String::new();
    if neg {
        out.push('-');
    }
    out.push_str(&format!("{:02}:{:02}:{:02}", hour, minute, second));
    push_frac(&mut out, micros, dec);
    FieldValue::Str(out)
}

/// DATETIME2: 5-byte packed bit field plus fractional bytes.
///
/// Layout (40 bits, sign bit flipped): year*13+month (17), day (5),
/// hour (5), minute (6), second (6).
fn decode_datetime(data: &[u8], dec: u64) -> FieldValue {
    let fsp_bytes = fsp_storage_bytes(dec);
    if data.len() < 5 + fsp_bytes {
        return decode_hex(data);
    }

    let mut val: u64 = 0;
    for &b in &data[..5] {
        val = (val << 8) | b as u64;
    }
    val ^= 1 << 39;

    let second = val & 0x3F;
    let minute = (val >> 6) & 0x3F;
    let hour = (val >> 12) & 0x1F;
    let day = (val >> 17) & 0x1F;
    let year_month = val >> 22;
    let year = year_month / 13;
    let month = year_month % 13;

    let mut frac: u64 = 0;
    for &b in &data[5..5 + fsp_bytes] {
        frac = (frac << 8) | b as u64;
    }

    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    );
    push_frac(&mut out, frac_to_micros(frac, fsp_bytes), dec);
    FieldValue::Str(out)
}

/// TIMESTAMP2: big-endian UTC epoch seconds plus fractional bytes.
fn decode_timestamp(data: &[u8], dec: u64, tz_offset_secs: i32) -> FieldValue {
    let fsp_bytes = fsp_storage_bytes(dec);
    if data.len() < 4 + fsp_bytes {
        return decode_hex(data);
    }

    let secs = ((data[0] as u32) << 24)
        | ((data[1] as u32) << 16)
        | ((data[2] as u32) << 8)
        | data[3] as u32;

    if secs == 0 {
        let mut out = "0000-00-00 00:00:00".to_string();
        push_frac(&mut out, 0, dec);
        return FieldValue::Str(out);
    }

    let shifted = secs as i64 + tz_offset_secs as i64;
    let days = shifted.div_euclid(86400);
    let time_of_day = shifted.rem_euclid(86400);
    let hour = time_of_day / 3600;
    let minute = (time_of_day % 3600) / 60;
    let second = time_of_day % 60;
    let (year, month, day) = days_to_ymd(days as u32);

    let mut frac: u64 = 0;
    for &b in &data[4..4 + fsp_bytes] {
        frac = (frac << 8) | b as u64;
    }

    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    );
    push_frac(&mut out, frac_to_micros(frac, fsp_bytes), dec);
    FieldValue::Str(out)
}

/// Days since 1970-01-01 to a civil (year, month, day).
fn days_to_ymd(days: u32) -> (u32, u32, u32) {
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn decode_year(data: &[u8], raw: bool) -> FieldValue {
    let Some(&val) = data.first() else {
        return FieldValue::Null;
    };
    if raw {
        return FieldValue::Uint(val as u64);
    }
    if val == 0 {
        FieldValue::Str("0000".to_string())
    } else {
        FieldValue::Uint(1900 + val as u64)
    }
}

/// Packed-BCD DECIMAL (bin2decimal).
///
/// Digits are grouped in 9-digit words of four bytes plus a shorter head
/// and tail; the first byte's high bit encodes the sign, and negative
/// numbers store all bytes inverted.
fn decode_decimal(data: &[u8], precision: usize, scale: usize) -> FieldValue {
    let size = decimal_bin_size(precision, scale);
    if data.len() < size || precision == 0 || scale > precision {
        return decode_hex(data);
    }

    let mut buf = data[..size].to_vec();
    let negative = buf[0] & 0x80 == 0;
    buf[0] ^= 0x80;
    if negative {
        for b in &mut buf {
            *b = !*b;
        }
    }

    fn group_bytes(digits: usize) -> usize {
        match digits {
            0 => 0,
            1..=2 => 1,
            3..=4 => 2,
            5..=6 => 3,
            _ => 4,
        }
    }
    fn read_group(buf: &[u8]) -> u64 {
        buf.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }

    let intg = precision - scale;
    let intg_head = intg % 9;
    let frac_tail = scale % 9;

    let mut pos = 0usize;
    let mut int_digits = String::new();

    let head_bytes = group_bytes(intg_head);
    if head_bytes > 0 {
        let v = read_group(&buf[pos..pos + head_bytes]);
        pos += head_bytes;
        int_digits.push_str(&format!("{:0width$}", v, width = intg_head));
    }
    for _ in 0..intg / 9 {
        let v = read_group(&buf[pos..pos + 4]);
        pos += 4;
        int_digits.push_str(&format!("{:09}", v));
    }

    let mut frac_digits = String::new();
    for _ in 0..scale / 9 {
        let v = read_group(&buf[pos..pos + 4]);
        pos += 4;
        frac_digits.push_str(&format!("{:09}", v));
    }
    let tail_bytes = group_bytes(frac_tail);
    if tail_bytes > 0 {
        let v = read_group(&buf[pos..pos + tail_bytes]);
        frac_digits.push_str(&format!("{:0width$}", v, width = frac_tail));
    }

    let int_trimmed = int_digits.trim_start_matches('0');
    let int_part = if int_trimmed.is_empty() {
        "0"
    } else {
        int_trimmed
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(int_part);
    if scale > 0 {
        out.push('.');
        out.push_str(&frac_digits);
    }
    FieldValue::Str(out)
}

fn decode_enum(data: &[u8], col: &ColumnMeta, raw: bool) -> FieldValue {
    let index = match data.len() {
        1 => data[0] as usize,
        2 => (((data[0] as usize) << 8) | data[1] as usize),
        _ => return decode_hex(data),
    };
    if raw {
        return FieldValue::Uint(index as u64);
    }
    if index == 0 || index > col.elements.len() {
        // Index 0 is the empty error value.
        return FieldValue::Str(String::new());
    }
    FieldValue::Str(col.elements[index - 1].clone())
}

fn decode_set(data: &[u8], col: &ColumnMeta, raw: bool) -> FieldValue {
    if data.is_empty() || data.len() > 8 {
        return decode_hex(data);
    }
    let mut mask: u64 = 0;
    for &b in data {
        mask = (mask << 8) | b as u64;
    }
    if raw {
        return FieldValue::Uint(mask);
    }
    let names: Vec<&str> = col
        .elements
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| name.as_str())
        .collect();
    FieldValue::Str(names.join(","))
}

fn decode_json(data: &[u8]) -> FieldValue {
    match jsonb::decode(data) {
        Ok(value) => FieldValue::Str(value.to_string()),
        Err(_) => decode_hex(data),
    }
}

/// Charset-aware string rendering: binary collations emit hex, latin1 maps
/// bytes directly, everything else is treated as UTF-8.
fn decode_string(data: &[u8], col: &ColumnMeta) -> FieldValue {
    if col.collation_id == COLLATION_BINARY {
        return decode_hex(data);
    }
    let trimmed = if col.dd_type == DD_TYPE_STRING {
        trim_trailing_spaces(data)
    } else {
        data
    };
    let (_, max_bytes) = charset_min_max_bytes(col.collation_id);
    if max_bytes == 1 {
        // latin1 / ascii: every byte maps to one scalar value.
        FieldValue::Str(trimmed.iter().map(|&b| b as char).collect())
    } else {
        FieldValue::Str(String::from_utf8_lossy(trimmed).to_string())
    }
}

fn trim_trailing_spaces(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && data[end - 1] == 0x20 {
        end -= 1;
    }
    &data[..end]
}

/// Hex fallback (`0x...`).
pub fn decode_hex(data: &[u8]) -> FieldValue {
    FieldValue::Hex(format!("0x{}", crate::util::hex::encode(data)))
}
