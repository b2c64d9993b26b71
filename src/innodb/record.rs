//! Compact record parsing.
//!
//! MySQL 8 stores rows in the compact record format: each record origin is
//! preceded by 5 extra bytes (info bits + n_owned, heap number + status, and
//! the relative next-record offset), and before those grow, toward lower
//! addresses, the null bitmap and the variable-length column headers.
//! Instant ALTER adds an optional row-version byte (`REC_INFO_VERSION_FLAG`)
//! or an explicit field count (`REC_INFO_INSTANT_FLAG`).
//!
//! [`RecordOffsets`] reconstructs the field boundaries of one record from
//! the physical column layout, producing the offsets table used by the value
//! decoders: entry 0 is the field count, entry `i + 1` the end offset of
//! field `i` OR'd with the SQL-NULL / external-storage flags.

use byteorder::{BigEndian, ByteOrder};

use crate::innodb::constants::*;
use crate::IbdError;

/// Record status from the 3 low bits of the heap-no word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Ordinary user record (leaf page).
    Ordinary,
    /// Node pointer record (non-leaf page).
    NodePtr,
    /// Infimum system record.
    Infimum,
    /// Supremum system record.
    Supremum,
}

impl RecordStatus {
    pub fn from_u8(val: u8) -> Self {
        match val & 0x07 {
            REC_STATUS_NODE_PTR => RecordStatus::NodePtr,
            REC_STATUS_INFIMUM => RecordStatus::Infimum,
            REC_STATUS_SUPREMUM => RecordStatus::Supremum,
            _ => RecordStatus::Ordinary,
        }
    }
}

/// Parsed compact record header (the 5 extra bytes before the origin).
#[derive(Debug, Clone)]
pub struct CompactRecordHeader {
    /// Records owned by this record in the page directory.
    pub n_owned: u8,
    /// Delete mark.
    pub delete_mark: bool,
    /// Min-rec flag (leftmost record on a non-leaf level).
    pub min_rec: bool,
    /// Record carries a row-version byte.
    pub version_flag: bool,
    /// Record carries an explicit field count.
    pub instant_flag: bool,
    /// Position in the heap.
    pub heap_no: u16,
    /// Record status.
    pub status: RecordStatus,
    /// Relative offset to the next record (signed).
    pub next_offset: i16,
}

impl CompactRecordHeader {
    /// Parse from the 5 bytes preceding the record origin.
    pub fn parse(extra: &[u8]) -> Option<Self> {
        if extra.len() < REC_N_NEW_EXTRA_BYTES {
            return None;
        }

        // Byte 0: [info_bits(4) | n_owned(4)].
        let byte0 = extra[0];
        let two_bytes = BigEndian::read_u16(&extra[1..3]);

        Some(CompactRecordHeader {
            n_owned: byte0 & 0x0F,
            delete_mark: byte0 & REC_INFO_DELETED_FLAG != 0,
            min_rec: byte0 & REC_INFO_MIN_REC_FLAG != 0,
            version_flag: byte0 & REC_INFO_VERSION_FLAG != 0,
            instant_flag: byte0 & REC_INFO_INSTANT_FLAG != 0,
            heap_no: (two_bytes >> 3) & 0x1FFF,
            status: RecordStatus::from_u8((two_bytes & 0x07) as u8),
            next_offset: BigEndian::read_i16(&extra[3..5]),
        })
    }

    /// Parse the header of the record whose origin is at `origin`.
    pub fn parse_at(page: &[u8], origin: usize) -> Option<Self> {
        if origin < REC_N_NEW_EXTRA_BYTES || origin > page.len() {
            return None;
        }
        Self::parse(&page[origin - REC_N_NEW_EXTRA_BYTES..])
    }
}

/// A record position on a page with its parsed header.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    /// Absolute offset of the record origin within the page.
    pub offset: usize,
    /// Parsed record header.
    pub header: CompactRecordHeader,
}

/// Walk all user records on a compact INDEX page, infimum to supremum.
///
/// Follows the singly-linked next-record offsets; returns user records only.
pub fn walk_compact_records(page: &[u8]) -> Vec<RecordInfo> {
    let mut records = Vec::new();

    let Some(infimum) = CompactRecordHeader::parse_at(page, PAGE_NEW_INFIMUM) else {
        return records;
    };

    let mut current = PAGE_NEW_INFIMUM;
    let mut next_rel = infimum.next_offset;
    // One record per heap slot at most; anything more is a cycle.
    let max_iter = page.len() / REC_N_NEW_EXTRA_BYTES + 2;

    for _ in 0..max_iter {
        let next_abs = (current as i32 + next_rel as i32) as usize;
        if next_abs < REC_N_NEW_EXTRA_BYTES || next_abs >= page.len() {
            break;
        }

        let Some(hdr) = CompactRecordHeader::parse_at(page, next_abs) else {
            break;
        };
        if hdr.status == RecordStatus::Supremum {
            break;
        }

        next_rel = hdr.next_offset;
        records.push(RecordInfo {
            offset: next_abs,
            header: hdr,
        });
        current = next_abs;

        if next_rel == 0 {
            break;
        }
    }

    records
}

/// Physical description of one field as it appears inside a record.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Column name (diagnostics and output).
    pub name: String,
    /// `Some(n)` for fixed-length storage, `None` for variable-length.
    pub fixed_len: Option<usize>,
    /// Whether the column can be NULL (occupies a null-bitmap bit).
    pub nullable: bool,
    /// Variable-length header may use two bytes (max length > 255 or BLOB).
    pub two_byte_len: bool,
    /// Declared maximum byte length (0 = unbounded/unknown).
    pub max_len: usize,
    /// Row version that added this column (0 = original).
    pub version_added: u32,
    /// Row version that dropped this column (0 = never).
    pub version_dropped: u32,
}

impl FieldDef {
    /// A simple always-present fixed field.
    pub fn fixed(name: &str, len: usize, nullable: bool) -> Self {
        FieldDef {
            name: name.to_string(),
            fixed_len: Some(len),
            nullable,
            two_byte_len: false,
            max_len: len,
            version_added: 0,
            version_dropped: 0,
        }
    }

    /// A simple always-present variable field.
    pub fn variable(name: &str, max_len: usize, nullable: bool, two_byte_len: bool) -> Self {
        FieldDef {
            name: name.to_string(),
            fixed_len: None,
            nullable,
            two_byte_len,
            max_len,
            version_added: 0,
            version_dropped: 0,
        }
    }

    /// Is this column physically present in a record of the given version?
    ///
    /// `version` is `None` for records written before any instant ALTER.
    fn present_in(&self, version: Option<u32>) -> bool {
        match version {
            None => self.version_added == 0,
            Some(v) => {
                self.version_added <= v && (self.version_dropped == 0 || self.version_dropped > v)
            }
        }
    }
}

/// Decoded record shape: the offsets table plus the instant metadata needed
/// to map table columns onto record fields.
#[derive(Debug, Clone)]
pub struct RecordOffsets {
    /// `raw[0]` = field count; `raw[i + 1]` = end offset of field `i`,
    /// OR'd with [`OFFSETS_SQL_NULL`] / [`OFFSETS_EXTERNAL`].
    raw: Vec<u32>,
    /// Indices (into the caller's field list) of the fields present in this
    /// record, in storage order.
    present: Vec<usize>,
    /// Row version of the record, if it carried one.
    pub row_version: Option<u32>,
    /// Total extra-byte size (headers, bitmap, version/count bytes).
    pub extra_size: usize,
}

impl RecordOffsets {
    /// Number of fields physically present in the record.
    pub fn n_fields(&self) -> usize {
        self.raw[0] as usize
    }

    /// The raw offsets table (`[n_fields, end_0 | flags, ...]`).
    pub fn raw(&self) -> &[u32] {
        &self.raw
    }

    /// Index into the caller's field list for record field `i`.
    pub fn field_index(&self, i: usize) -> usize {
        self.present[i]
    }

    /// Start offset of field `i` relative to the record origin.
    pub fn start(&self, i: usize) -> usize {
        if i == 0 {
            0
        } else {
            (self.raw[i] & OFFSETS_MASK) as usize
        }
    }

    /// End offset of field `i` relative to the record origin.
    pub fn end(&self, i: usize) -> usize {
        (self.raw[i + 1] & OFFSETS_MASK) as usize
    }

    /// Is field `i` SQL NULL?
    pub fn is_null(&self, i: usize) -> bool {
        self.raw[i + 1] & OFFSETS_SQL_NULL != 0
    }

    /// Is field `i` stored externally?
    pub fn is_extern(&self, i: usize) -> bool {
        self.raw[i + 1] & OFFSETS_EXTERNAL != 0
    }

    /// Total record data size (end of the last field).
    pub fn data_size(&self) -> usize {
        let n = self.n_fields();
        if n == 0 {
            0
        } else {
            self.end(n - 1)
        }
    }

    /// Reconstruct the offsets of the record at `origin` against the given
    /// physical field layout.
    ///
    /// Walks the extra bytes backward (version/count byte, null bitmap,
    /// variable-length headers), then computes each present field's end
    /// offset going forward from the origin. Offsets are validated against
    /// the page bounds and each field's declared maximum length.
    pub fn compute(
        page: &[u8],
        origin: usize,
        fields: &[FieldDef],
    ) -> Result<RecordOffsets, IbdError> {
        let header = CompactRecordHeader::parse_at(page, origin).ok_or_else(|| {
            IbdError::RecordCorrupted(format!("record origin {} outside page", origin))
        })?;

        let mut pos = origin - REC_N_NEW_EXTRA_BYTES;

        // Instant metadata precedes the null bitmap.
        let mut row_version = None;
        let mut instant_field_count = None;
        if header.version_flag {
            if pos == 0 {
                return Err(IbdError::RecordCorrupted(format!(
                    "record at {} truncated before version byte",
                    origin
                )));
            }
            pos -= 1;
            row_version = Some(page[pos] as u32);
        } else if header.instant_flag {
            if pos == 0 {
                return Err(IbdError::RecordCorrupted(format!(
                    "record at {} truncated before field count",
                    origin
                )));
            }
            pos -= 1;
            let b0 = page[pos];
            let count = if b0 & REC_N_FIELDS_TWO_BYTES_FLAG != 0 {
                if pos == 0 {
                    return Err(IbdError::RecordCorrupted(format!(
                        "record at {} truncated inside field count",
                        origin
                    )));
                }
                pos -= 1;
                (((b0 & 0x7F) as usize) << 8) | page[pos] as usize
            } else {
                b0 as usize
            };
            instant_field_count = Some(count);
        }

        // Which fields does this record physically contain?
        let mut present: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.present_in(row_version))
            .map(|(i, _)| i)
            .collect();
        if let Some(count) = instant_field_count {
            if count > present.len() {
                return Err(IbdError::RecordCorrupted(format!(
                    "record at {} declares {} fields, layout has {}",
                    origin,
                    count,
                    present.len()
                )));
            }
            present.truncate(count);
        }

        // Null bitmap: one bit per present nullable column, LSB first,
        // growing toward lower addresses.
        let n_nullable = present.iter().filter(|&&i| fields[i].nullable).count();
        let bitmap_bytes = n_nullable.div_ceil(8);
        if pos < bitmap_bytes {
            return Err(IbdError::RecordCorrupted(format!(
                "record at {} truncated inside null bitmap",
                origin
            )));
        }
        pos -= bitmap_bytes;
        let bitmap = &page[pos..pos + bitmap_bytes];

        let mut raw = Vec::with_capacity(present.len() + 1);
        raw.push(present.len() as u32);

        let mut null_bit = 0usize;
        let mut end = 0usize;

        for &fi in &present {
            let field = &fields[fi];
            let mut flags = 0u32;

            let is_null = if field.nullable {
                // Bitmap bytes fill from the highest address downward; bits
                // within a byte from the LSB up.
                let byte = bitmap[bitmap_bytes - 1 - null_bit / 8];
                let bit = (byte >> (null_bit % 8)) & 1 != 0;
                null_bit += 1;
                bit
            } else {
                false
            };

            if is_null {
                flags |= OFFSETS_SQL_NULL;
            } else if let Some(len) = field.fixed_len {
                end += len;
            } else {
                if pos == 0 {
                    return Err(IbdError::RecordCorrupted(format!(
                        "record at {} truncated inside length headers",
                        origin
                    )));
                }
                pos -= 1;
                let b0 = page[pos] as usize;
                let len = if field.two_byte_len && b0 & 0x80 != 0 {
                    if pos == 0 {
                        return Err(IbdError::RecordCorrupted(format!(
                            "record at {} truncated inside 2-byte length",
                            origin
                        )));
                    }
                    pos -= 1;
                    let b1 = page[pos] as usize;
                    if b0 & 0x40 != 0 {
                        flags |= OFFSETS_EXTERNAL;
                    }
                    ((b0 & 0x3F) << 8) | b1
                } else {
                    b0
                };
                end += len;
            }

            if origin + end > page.len() {
                return Err(IbdError::RecordCorrupted(format!(
                    "record at {}: field {} ends at {} past page end",
                    origin, field.name, end
                )));
            }
            if field.max_len > 0 && flags & OFFSETS_EXTERNAL == 0 {
                let this_len = end - if raw.len() == 1 { 0 } else { Self::last_end(&raw) };
                if flags & OFFSETS_SQL_NULL == 0 && this_len > field.max_len {
                    return Err(IbdError::RecordCorrupted(format!(
                        "record at {}: field {} length {} exceeds declared max {}",
                        origin, field.name, this_len, field.max_len
                    )));
                }
            }

            raw.push(end as u32 | flags);
        }

        Ok(RecordOffsets {
            raw,
            present,
            row_version,
            extra_size: origin - pos,
        })
    }

    fn last_end(raw: &[u32]) -> usize {
        (raw[raw.len() - 1] & OFFSETS_MASK) as usize
    }
}

/// Read the child page number from a node-pointer record: the last 4 bytes
/// after the key fields.
pub fn node_ptr_child(page: &[u8], origin: usize, key_data_len: usize) -> Option<u32> {
    let start = origin + key_data_len;
    if start + 4 > page.len() {
        return None;
    }
    Some(BigEndian::read_u32(&page[start..]))
}
