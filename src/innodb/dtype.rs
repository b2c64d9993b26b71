//! Data-dictionary type codes and the InnoDB type table.
//!
//! The SDI JSON describes columns with the server's `dd::enum_column_types`
//! codes. This module translates those into the InnoDB storage description
//! `(mtype, prtype, len, mbminmaxlen)` used by the `.cfg` writer, and into
//! the physical storage rules (fixed length, variable-length header width)
//! the record decoder needs.

use crate::innodb::schema::ColumnMeta;

// ── dd::enum_column_types ───────────────────────────────────────────

pub const DD_TYPE_DECIMAL: u64 = 1;
pub const DD_TYPE_TINY: u64 = 2;
pub const DD_TYPE_SHORT: u64 = 3;
pub const DD_TYPE_LONG: u64 = 4;
pub const DD_TYPE_FLOAT: u64 = 5;
pub const DD_TYPE_DOUBLE: u64 = 6;
pub const DD_TYPE_TYPE_NULL: u64 = 7;
pub const DD_TYPE_TIMESTAMP: u64 = 8;
pub const DD_TYPE_LONGLONG: u64 = 9;
pub const DD_TYPE_INT24: u64 = 10;
pub const DD_TYPE_DATE: u64 = 11;
pub const DD_TYPE_TIME: u64 = 12;
pub const DD_TYPE_DATETIME: u64 = 13;
pub const DD_TYPE_YEAR: u64 = 14;
pub const DD_TYPE_NEWDATE: u64 = 15;
pub const DD_TYPE_VARCHAR: u64 = 16;
pub const DD_TYPE_BIT: u64 = 17;
pub const DD_TYPE_TIMESTAMP2: u64 = 18;
pub const DD_TYPE_DATETIME2: u64 = 19;
pub const DD_TYPE_TIME2: u64 = 20;
pub const DD_TYPE_NEWDECIMAL: u64 = 21;
pub const DD_TYPE_ENUM: u64 = 22;
pub const DD_TYPE_SET: u64 = 23;
pub const DD_TYPE_TINY_BLOB: u64 = 24;
pub const DD_TYPE_MEDIUM_BLOB: u64 = 25;
pub const DD_TYPE_LONG_BLOB: u64 = 26;
pub const DD_TYPE_BLOB: u64 = 27;
pub const DD_TYPE_VAR_STRING: u64 = 28;
pub const DD_TYPE_STRING: u64 = 29;
pub const DD_TYPE_GEOMETRY: u64 = 30;
pub const DD_TYPE_JSON: u64 = 31;

// ── InnoDB main types (data0type.h) ─────────────────────────────────

pub const DATA_VARCHAR: u32 = 1;
pub const DATA_CHAR: u32 = 2;
pub const DATA_FIXBINARY: u32 = 3;
pub const DATA_BINARY: u32 = 4;
pub const DATA_BLOB: u32 = 5;
pub const DATA_INT: u32 = 6;
pub const DATA_SYS_CHILD: u32 = 7;
pub const DATA_SYS: u32 = 8;
pub const DATA_FLOAT: u32 = 9;
pub const DATA_DOUBLE: u32 = 10;
pub const DATA_DECIMAL: u32 = 11;
pub const DATA_VARMYSQL: u32 = 12;
pub const DATA_MYSQL: u32 = 13;
pub const DATA_GEOMETRY: u32 = 14;

// ── prtype flags ────────────────────────────────────────────────────

pub const DATA_NOT_NULL: u32 = 256;
pub const DATA_UNSIGNED: u32 = 512;
pub const DATA_BINARY_TYPE: u32 = 1024;
pub const DATA_LONG_TRUE_VARCHAR: u32 = 4096;

/// prtype low byte for the system columns.
pub const DATA_ROW_ID: u32 = 0;
pub const DATA_TRX_ID: u32 = 1;
pub const DATA_ROLL_PTR: u32 = 2;

pub const DATA_ROW_ID_LEN: u32 = 6;
pub const DATA_TRX_ID_LEN: u32 = 6;
pub const DATA_ROLL_PTR_LEN: u32 = 7;

/// Multi-byte length packing base for `mbminmaxlen`.
pub const DATA_MBMAX: u32 = 5;

/// Binary collation id (the `binary` charset).
pub const COLLATION_BINARY: u64 = 63;

/// InnoDB storage description of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnodbType {
    pub mtype: u32,
    pub prtype: u32,
    pub len: u32,
    pub mbminmaxlen: u32,
}

/// Bytes of fractional-second storage for a given precision.
pub fn fsp_storage_bytes(dec: u64) -> usize {
    (dec as usize + 1) / 2
}

/// `(min, max)` bytes per character for a collation id.
///
/// Covers the collations MySQL 8 ships by default; unknown ids assume the
/// utf8mb4 worst case.
pub fn charset_min_max_bytes(collation_id: u64) -> (usize, usize) {
    match collation_id {
        // latin1 family
        5 | 8 | 15 | 31 | 47 | 48 | 49 | 94 => (1, 1),
        // binary
        63 => (1, 1),
        // ascii
        11 | 65 => (1, 1),
        // utf8mb3
        33 | 83 | 192..=215 | 223 => (1, 3),
        // utf8mb4
        45 | 46 | 224..=247 | 255..=323 => (1, 4),
        _ => (1, 4),
    }
}

/// Packed `mbminmaxlen` as InnoDB stores it.
pub fn mbminmaxlen(collation_id: u64) -> u32 {
    let (min, max) = charset_min_max_bytes(collation_id);
    min as u32 * DATA_MBMAX + max as u32
}

/// Storage bytes of the integer part of a DECIMAL with `digits` leftover
/// digits outside the 9-digit groups.
fn decimal_leftover_bytes(digits: usize) -> usize {
    match digits {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        _ => 4,
    }
}

/// Total storage bytes of a DECIMAL(precision, scale).
pub fn decimal_bin_size(precision: usize, scale: usize) -> usize {
    let intg = precision - scale;
    (intg / 9) * 4
        + decimal_leftover_bytes(intg % 9)
        + (scale / 9) * 4
        + decimal_leftover_bytes(scale % 9)
}

/// Fixed storage size of a column, or `None` for variable-length storage.
///
/// CHAR columns in multi-byte charsets are stored with a variable length in
/// compact format (trailing-space stripping), so they report `None`.
pub fn fixed_storage_size(col: &ColumnMeta) -> Option<usize> {
    match col.dd_type {
        DD_TYPE_TINY => Some(1),
        DD_TYPE_SHORT => Some(2),
        DD_TYPE_INT24 => Some(3),
        DD_TYPE_LONG => Some(4),
        DD_TYPE_LONGLONG => Some(8),
        DD_TYPE_FLOAT => Some(4),
        DD_TYPE_DOUBLE => Some(8),
        DD_TYPE_YEAR => Some(1),
        DD_TYPE_DATE | DD_TYPE_NEWDATE => Some(3),
        DD_TYPE_TIME2 => Some(3 + fsp_storage_bytes(col.datetime_precision)),
        DD_TYPE_DATETIME2 => Some(5 + fsp_storage_bytes(col.datetime_precision)),
        DD_TYPE_TIMESTAMP2 => Some(4 + fsp_storage_bytes(col.datetime_precision)),
        DD_TYPE_NEWDECIMAL => Some(decimal_bin_size(
            col.numeric_precision as usize,
            col.numeric_scale as usize,
        )),
        DD_TYPE_ENUM => Some(if col.elements.len() > 255 { 2 } else { 1 }),
        DD_TYPE_SET => Some(col.elements.len().div_ceil(8).clamp(1, 8)),
        DD_TYPE_BIT => Some((col.char_length as usize).div_ceil(8).max(1)),
        DD_TYPE_STRING => {
            let (min, max) = charset_min_max_bytes(col.collation_id);
            if min == max {
                Some(col.char_length as usize)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Declared maximum byte length of a column (0 = effectively unbounded).
///
/// The dictionary's `char_length` is already a byte count (`varchar(50)`
/// in utf8mb4 records 200).
pub fn max_byte_length(col: &ColumnMeta) -> usize {
    if let Some(n) = fixed_storage_size(col) {
        return n;
    }
    match col.dd_type {
        DD_TYPE_VARCHAR | DD_TYPE_VAR_STRING | DD_TYPE_STRING => col.char_length as usize,
        // BLOB/TEXT/JSON/GEOMETRY lengths are only bounded by the LOB format.
        _ => 0,
    }
}

/// Whether the variable-length header for this column may use two bytes.
pub fn two_byte_len_header(col: &ColumnMeta) -> bool {
    if fixed_storage_size(col).is_some() {
        return false;
    }
    matches!(
        col.dd_type,
        DD_TYPE_TINY_BLOB
            | DD_TYPE_MEDIUM_BLOB
            | DD_TYPE_LONG_BLOB
            | DD_TYPE_BLOB
            | DD_TYPE_JSON
            | DD_TYPE_GEOMETRY
    ) || max_byte_length(col) > 255
}

/// True for the BLOB-like types that can overflow into external LOB pages.
pub fn is_blob_like(dd_type: u64) -> bool {
    matches!(
        dd_type,
        DD_TYPE_TINY_BLOB
            | DD_TYPE_MEDIUM_BLOB
            | DD_TYPE_LONG_BLOB
            | DD_TYPE_BLOB
            | DD_TYPE_JSON
            | DD_TYPE_GEOMETRY
    )
}

/// Translate a dictionary column into the InnoDB type description
/// (get_innobase_type_from_mysql_type).
pub fn innodb_type(col: &ColumnMeta) -> InnodbType {
    let binary = col.collation_id == COLLATION_BINARY;
    let charset_coll = (col.collation_id as u32 & 0xFF) << 16;
    let mut prtype = (col.dd_type as u32) & 0xFF;
    if !col.is_nullable {
        prtype |= DATA_NOT_NULL;
    }
    if col.is_unsigned {
        prtype |= DATA_UNSIGNED;
    }

    let mb = mbminmaxlen(col.collation_id);
    let (mtype, len, mbmm) = match col.dd_type {
        DD_TYPE_TINY | DD_TYPE_SHORT | DD_TYPE_INT24 | DD_TYPE_LONG | DD_TYPE_LONGLONG
        | DD_TYPE_YEAR | DD_TYPE_DATE | DD_TYPE_NEWDATE | DD_TYPE_ENUM | DD_TYPE_SET => {
            prtype |= DATA_BINARY_TYPE;
            if matches!(col.dd_type, DD_TYPE_ENUM | DD_TYPE_SET) {
                prtype |= DATA_UNSIGNED;
            }
            (DATA_INT, fixed_storage_size(col).unwrap_or(0) as u32, 0)
        }
        DD_TYPE_FLOAT => {
            prtype |= DATA_BINARY_TYPE;
            (DATA_FLOAT, 4, 0)
        }
        DD_TYPE_DOUBLE => {
            prtype |= DATA_BINARY_TYPE;
            (DATA_DOUBLE, 8, 0)
        }
        DD_TYPE_NEWDECIMAL | DD_TYPE_TIME2 | DD_TYPE_DATETIME2 | DD_TYPE_TIMESTAMP2
        | DD_TYPE_BIT => {
            prtype |= DATA_BINARY_TYPE;
            (
                DATA_FIXBINARY,
                fixed_storage_size(col).unwrap_or(0) as u32,
                0,
            )
        }
        DD_TYPE_STRING => {
            if binary {
                prtype |= DATA_BINARY_TYPE;
                (DATA_FIXBINARY, col.char_length as u32, 0)
            } else {
                prtype |= charset_coll;
                (DATA_MYSQL, col.char_length as u32, mb)
            }
        }
        DD_TYPE_VARCHAR | DD_TYPE_VAR_STRING => {
            if max_byte_length(col) > 255 {
                prtype |= DATA_LONG_TRUE_VARCHAR;
            }
            if binary {
                prtype |= DATA_BINARY_TYPE;
                (DATA_BINARY, col.char_length as u32, 0)
            } else {
                prtype |= charset_coll;
                (DATA_VARMYSQL, col.char_length as u32, mb)
            }
        }
        DD_TYPE_GEOMETRY => {
            prtype |= DATA_BINARY_TYPE;
            (DATA_GEOMETRY, 0, 0)
        }
        _ => {
            // BLOB/TEXT/JSON and anything unrecognized.
            if binary {
                prtype |= DATA_BINARY_TYPE;
                (DATA_BLOB, 0, 0)
            } else {
                prtype |= charset_coll;
                (DATA_BLOB, 0, mb)
            }
        }
    };

    InnodbType {
        mtype,
        prtype,
        len,
        mbminmaxlen: mbmm,
    }
}
