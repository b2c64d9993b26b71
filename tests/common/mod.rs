//! Shared fixture builders: synthetic tablespaces, leaf pages with typed
//! records, and SDI JSON documents.
#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

use ibdp::innodb::checksum::stamp_page;
use ibdp::innodb::constants::*;
use ibdp::innodb::page_types::PageType;

pub const PS: usize = UNIV_PAGE_SIZE;

pub fn blank_page(page_no: u32, page_type: PageType, page_size: usize) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_no);
    BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
    BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
    BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], page_type.as_u16());
    page
}

pub fn fsp_page0(space_id: u32, flags: u32, total_pages: u32, page_size: usize) -> Vec<u8> {
    let mut page = blank_page(0, PageType::FspHdr, page_size);
    let fsp = FIL_PAGE_DATA;
    BigEndian::write_u32(&mut page[fsp + FSP_SPACE_ID..], space_id);
    BigEndian::write_u32(&mut page[fsp + FSP_SIZE..], total_pages);
    BigEndian::write_u32(&mut page[fsp + FSP_FREE_LIMIT..], total_pages);
    BigEndian::write_u32(&mut page[fsp + FSP_SPACE_FLAGS..], flags);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], space_id);
    stamp_page(&mut page, page_size, 1);
    page
}

pub fn write_space(pages: &[Vec<u8>]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    for page in pages {
        tmp.write_all(page).unwrap();
    }
    tmp.flush().unwrap();
    tmp
}

// ── Leaf page building ──────────────────────────────────────────────

/// Physical shape of one record field for the fixture builder.
#[derive(Clone)]
pub struct FieldSpec {
    pub fixed_len: Option<usize>,
    pub nullable: bool,
    pub two_byte_len: bool,
}

impl FieldSpec {
    pub fn fixed(len: usize) -> Self {
        FieldSpec {
            fixed_len: Some(len),
            nullable: false,
            two_byte_len: false,
        }
    }

    pub fn fixed_nullable(len: usize) -> Self {
        FieldSpec {
            fixed_len: Some(len),
            nullable: true,
            two_byte_len: false,
        }
    }

    pub fn variable(two_byte_len: bool, nullable: bool) -> Self {
        FieldSpec {
            fixed_len: None,
            nullable,
            two_byte_len,
        }
    }
}

/// One field value in a fixture record.
#[derive(Clone)]
pub enum Cell {
    Null,
    Bytes(Vec<u8>),
    /// A 20-byte external reference stored with the EXTERNAL length flag.
    Extern(Vec<u8>),
}

/// Build a 16 KiB compact leaf page carrying the given rows.
///
/// Rows are chained infimum -> rows -> supremum; supremum owns every row
/// (keep rows per page at eight or fewer in fixtures).
pub fn build_leaf_page(
    page_no: u32,
    space_id: u32,
    index_id: u64,
    fields: &[FieldSpec],
    rows: &[Vec<Cell>],
    prev_page: u32,
    next_page: u32,
    delete_marks: &[bool],
) -> Vec<u8> {
    assert!(rows.len() <= 8, "fixture pages hold at most 8 rows");
    let mut page = blank_page(page_no, PageType::Index, PS);
    BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], prev_page);
    BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], next_page);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], space_id);

    // System records.
    let inf_extra = PAGE_NEW_INFIMUM - 5;
    page[inf_extra] = 0x01;
    BigEndian::write_u16(&mut page[inf_extra + 1..], REC_STATUS_INFIMUM as u16);
    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 8].copy_from_slice(b"infimum\0");
    let sup_extra = PAGE_NEW_SUPREMUM - 5;
    page[sup_extra] = (rows.len() + 1) as u8;
    BigEndian::write_u16(
        &mut page[sup_extra + 1..],
        (1 << 3) | REC_STATUS_SUPREMUM as u16,
    );
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");

    let n_nullable = fields.iter().filter(|f| f.nullable).count();
    let bitmap_bytes = n_nullable.div_ceil(8);

    let mut origins = Vec::new();
    let mut heap_top = PAGE_NEW_SUPREMUM_END;

    for (row_idx, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), fields.len());

        // Extra size: header + bitmap + length bytes.
        let mut extra = 5 + bitmap_bytes;
        for (field, cell) in fields.iter().zip(row) {
            if field.fixed_len.is_none() && !matches!(cell, Cell::Null) {
                let len = match cell {
                    Cell::Bytes(b) => b.len(),
                    Cell::Extern(_) => BTR_EXTERN_FIELD_REF_SIZE,
                    Cell::Null => 0,
                };
                let two = matches!(cell, Cell::Extern(_))
                    || (field.two_byte_len && len > 127);
                extra += if two { 2 } else { 1 };
            }
        }

        let origin = heap_top + extra;
        let deleted = delete_marks.get(row_idx).copied().unwrap_or(false);
        page[origin - 5] = if deleted { REC_INFO_DELETED_FLAG } else { 0 };
        BigEndian::write_u16(&mut page[origin - 4..], ((row_idx as u16 + 2) << 3));

        // Null bitmap, highest byte first.
        let mut pos = origin - 5 - bitmap_bytes;
        let bitmap_at = pos;
        let mut bit = 0usize;
        for (field, cell) in fields.iter().zip(row) {
            if field.nullable {
                if matches!(cell, Cell::Null) {
                    page[bitmap_at + bitmap_bytes - 1 - bit / 8] |= 1 << (bit % 8);
                }
                bit += 1;
            }
        }

        // Length headers (walking down) and data (walking up).
        let mut data_at = origin;
        for (field, cell) in fields.iter().zip(row) {
            match cell {
                Cell::Null => continue,
                Cell::Bytes(bytes) => {
                    if field.fixed_len.is_none() {
                        if field.two_byte_len && bytes.len() > 127 {
                            // Flag/high byte first (read first), low byte below.
                            pos -= 1;
                            page[pos] = 0x80 | ((bytes.len() >> 8) & 0x3F) as u8;
                            pos -= 1;
                            page[pos] = (bytes.len() & 0xFF) as u8;
                        } else {
                            pos -= 1;
                            page[pos] = bytes.len() as u8;
                        }
                    }
                    page[data_at..data_at + bytes.len()].copy_from_slice(bytes);
                    data_at += bytes.len();
                }
                Cell::Extern(ref_bytes) => {
                    assert_eq!(ref_bytes.len(), BTR_EXTERN_FIELD_REF_SIZE);
                    pos -= 1;
                    page[pos] = 0x80 | 0x40;
                    pos -= 1;
                    page[pos] = BTR_EXTERN_FIELD_REF_SIZE as u8;
                    page[data_at..data_at + ref_bytes.len()].copy_from_slice(ref_bytes);
                    data_at += ref_bytes.len();
                }
            }
        }

        origins.push(origin);
        heap_top = data_at;
    }

    // Chain.
    let mut prev_next_at = inf_extra + 3;
    let mut prev_origin = PAGE_NEW_INFIMUM;
    for &origin in &origins {
        BigEndian::write_i16(
            &mut page[prev_next_at..],
            (origin as i32 - prev_origin as i32) as i16,
        );
        prev_origin = origin;
        prev_next_at = origin - 2;
    }
    BigEndian::write_i16(
        &mut page[prev_next_at..],
        (PAGE_NEW_SUPREMUM as i32 - prev_origin as i32) as i16,
    );

    // Directory: infimum, supremum.
    let dir0 = PS - PAGE_DIR - PAGE_DIR_SLOT_SIZE;
    BigEndian::write_u16(&mut page[dir0..], PAGE_NEW_INFIMUM as u16);
    let dir1 = PS - PAGE_DIR - 2 * PAGE_DIR_SLOT_SIZE;
    BigEndian::write_u16(&mut page[dir1..], PAGE_NEW_SUPREMUM as u16);

    // Page header.
    let base = FIL_PAGE_DATA;
    BigEndian::write_u16(&mut page[base + PAGE_N_DIR_SLOTS..], 2);
    BigEndian::write_u16(&mut page[base + PAGE_HEAP_TOP..], heap_top as u16);
    BigEndian::write_u16(
        &mut page[base + PAGE_N_HEAP..],
        0x8000 | (origins.len() as u16 + 2),
    );
    BigEndian::write_u16(&mut page[base + PAGE_N_RECS..], origins.len() as u16);
    BigEndian::write_u16(&mut page[base + PAGE_LEVEL..], 0);
    BigEndian::write_u64(&mut page[base + PAGE_INDEX_ID..], index_id);

    stamp_page(&mut page, PS, 10);
    page
}

// ── Value encoders (the inverse of the field decoders) ──────────────

pub fn enc_int(value: i64, size: usize) -> Vec<u8> {
    let mut raw = (value as u64)
        & if size == 8 {
            u64::MAX
        } else {
            (1 << (size * 8)) - 1
        };
    raw ^= 1 << (size * 8 - 1);
    (0..size).rev().map(|i| (raw >> (8 * i)) as u8).collect()
}

fn decimal_group_bytes(digits: usize) -> usize {
    match digits {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        _ => 4,
    }
}

pub fn enc_decimal(
    negative: bool,
    int_digits: &str,
    frac_digits: &str,
    precision: usize,
    scale: usize,
) -> Vec<u8> {
    let intg = precision - scale;
    let int_padded = format!("{:0>width$}", int_digits, width = intg);
    let frac_padded = format!("{:0<width$}", frac_digits, width = scale);

    let mut out = Vec::new();
    let head = intg % 9;
    let mut at = 0usize;
    if head > 0 {
        let v: u64 = int_padded[..head].parse().unwrap();
        let n = decimal_group_bytes(head);
        out.extend((0..n).rev().map(|i| (v >> (8 * i)) as u8));
        at = head;
    }
    while at < intg {
        let v: u64 = int_padded[at..at + 9].parse().unwrap();
        out.extend((0..4).rev().map(|i| (v >> (8 * i)) as u8));
        at += 9;
    }
    let mut at = 0usize;
    while at + 9 <= scale {
        let v: u64 = frac_padded[at..at + 9].parse().unwrap();
        out.extend((0..4).rev().map(|i| (v >> (8 * i)) as u8));
        at += 9;
    }
    let tail = scale - at;
    if tail > 0 {
        let v: u64 = frac_padded[at..].parse().unwrap();
        let n = decimal_group_bytes(tail);
        out.extend((0..n).rev().map(|i| (v >> (8 * i)) as u8));
    }

    out[0] ^= 0x80;
    if negative {
        for b in &mut out {
            *b = !*b;
        }
    }
    out
}

pub fn enc_datetime(
    year: u64,
    month: u64,
    day: u64,
    hour: u64,
    minute: u64,
    second: u64,
    micros: u64,
    dec: u64,
) -> Vec<u8> {
    let ym = year * 13 + month;
    let mut val: u64 = (ym << 22) | (day << 17) | (hour << 12) | (minute << 6) | second;
    val ^= 1 << 39;
    let mut out: Vec<u8> = (0..5).rev().map(|i| (val >> (8 * i)) as u8).collect();
    let fsp_bytes = (dec as usize + 1) / 2;
    let frac = match fsp_bytes {
        1 => micros / 10000,
        2 => micros / 100,
        3 => micros,
        _ => 0,
    };
    out.extend((0..fsp_bytes).rev().map(|i| (frac >> (8 * i)) as u8));
    out
}

// ── SDI JSON documents ──────────────────────────────────────────────

pub fn col_json(
    name: &str,
    dd_type: u64,
    ordinal: u64,
    extra: Value,
) -> Value {
    let mut col = json!({
        "name": name,
        "type": dd_type,
        "is_nullable": false,
        "is_unsigned": false,
        "hidden": 1,
        "ordinal_position": ordinal,
        "char_length": 11,
        "collation_id": 255,
        "se_private_data": "table_id=100;"
    });
    if let (Value::Object(base), Value::Object(patch)) = (&mut col, extra) {
        for (k, v) in patch {
            base.insert(k, v);
        }
    }
    col
}

pub fn sys_col_json(name: &str, ordinal: u64) -> Value {
    json!({
        "name": name,
        "type": 9,
        "is_nullable": false,
        "hidden": 2,
        "ordinal_position": ordinal
    })
}

pub fn primary_index_json(id: u64, root: u32, space_id: u32, elements: Vec<Value>) -> Value {
    json!({
        "name": "PRIMARY",
        "type": 1,
        "se_private_data": format!("id={};root={};space_id={};table_id=100;", id, root, space_id),
        "elements": elements
    })
}

pub fn index_element_json(ordinal: u64, column_opx: u64, hidden: bool) -> Value {
    json!({
        "ordinal_position": ordinal,
        "length": 4294967295u64,
        "order": 2,
        "hidden": hidden,
        "column_opx": column_opx
    })
}

pub fn sdi_doc(table_name: &str, space_id: u32, columns: Vec<Value>, indexes: Vec<Value>) -> Value {
    json!([
        "ibd2sdi",
        {
            "type": 1,
            "id": 100,
            "object": {
                "mysqld_version_id": 80030,
                "dd_object_type": "Table",
                "dd_object": {
                    "name": table_name,
                    "schema_ref": "test",
                    "engine": "InnoDB",
                    "collation_id": 255,
                    "row_format": 2,
                    "se_private_data": "autoinc=0;table_id=100;",
                    "columns": columns,
                    "indexes": indexes
                }
            }
        },
        {
            "type": 2,
            "id": space_id as u64,
            "object": {
                "dd_object_type": "Tablespace",
                "dd_object": {
                    "name": format!("test/{}", table_name),
                    "se_private_data": format!("flags=16417;id={};server_version=80030;", space_id)
                }
            }
        }
    ])
}

/// Write an SDI JSON document to a temp file.
pub fn write_sdi_file(doc: &Value) -> NamedTempFile {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    tmp
}
