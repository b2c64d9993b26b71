//! SDI extraction from the tablespace itself.
//!
//! Tablespaces with the SDI flag carry their dictionary in a dedicated
//! B-tree: page 0 stores `(version, root page)` after the encryption info
//! slot, and the SDI leaf records hold `(type, id, trx_id, roll_ptr,
//! uncompressed_len, compressed_len, zlib data)`. Large payloads overflow
//! into SDI BLOB pages (type 18) chained with a `(part_len, next_page_no)`
//! header, referenced from the record through a 20-byte external pointer.

use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

use crate::innodb::compression::{decompress_page, inflate};
use crate::innodb::constants::*;
use crate::innodb::encryption::encryption_info_offset;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::record::{
    node_ptr_child, walk_compact_records, FieldDef, RecordOffsets, RecordStatus,
};
use crate::innodb::tablespace::Tablespace;
use crate::IbdError;

/// Room the server reserves for the encryption info ahead of the SDI field.
pub const ENCRYPTION_INFO_MAX_SIZE: usize = 115;

/// Byte offset of the 8-byte SDI field (version, root page) on page 0.
pub fn sdi_offset(physical_size: usize) -> usize {
    encryption_info_offset(physical_size) + ENCRYPTION_INFO_MAX_SIZE
}

/// Read the SDI root page number from a page-0 buffer.
pub fn read_sdi_root(page0: &[u8], physical_size: usize) -> Option<u32> {
    let offset = sdi_offset(physical_size);
    if page0.len() < offset + 8 {
        return None;
    }
    let version = BigEndian::read_u32(&page0[offset..]);
    if version != SDI_VERSION {
        return None;
    }
    let root = BigEndian::read_u32(&page0[offset + 4..]);
    if root == 0 || root == FIL_NULL {
        return None;
    }
    Some(root)
}

/// Write the SDI field (version, root page) into a page-0 buffer.
pub fn write_sdi_root(page0: &mut [u8], physical_size: usize, root: u32) {
    let offset = sdi_offset(physical_size);
    BigEndian::write_u32(&mut page0[offset..], SDI_VERSION);
    BigEndian::write_u32(&mut page0[offset + 4..], root);
}

/// The field layout of an SDI leaf record.
pub fn sdi_record_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::fixed("type", 4, false),
        FieldDef::fixed("id", 8, false),
        FieldDef::fixed("trx_id", 6, false),
        FieldDef::fixed("roll_ptr", 7, false),
        FieldDef::fixed("uncompressed_len", 4, false),
        FieldDef::fixed("compressed_len", 4, false),
        FieldDef::variable("data", 0, false, true),
    ]
}

/// One SDI record pulled out of the tablespace.
#[derive(Debug, Clone)]
pub struct SdiRecord {
    pub sdi_type: u64,
    pub sdi_id: u64,
    pub uncompressed_len: u32,
    pub compressed_len: u32,
    /// Inflated JSON text.
    pub data: String,
}

/// Extract all SDI records from a tablespace.
///
/// Handles compressed tablespaces by inflating SDI pages first, descends
/// from the recorded root to the leaf level, and follows external payloads
/// into SDI BLOB chains.
pub fn extract_sdi(ts: &mut Tablespace) -> Result<Vec<SdiRecord>, IbdError> {
    if !ts.fsp_header().has_sdi() {
        return Err(IbdError::SdiParse(
            "tablespace has no SDI flag".to_string(),
        ));
    }
    let geometry = ts.geometry();
    let page0 = ts.read_page(0)?;
    let root = read_sdi_root(&page0, geometry.physical).ok_or_else(|| {
        IbdError::SdiParse("page 0 carries no valid SDI root pointer".to_string())
    })?;

    let read_logical = |ts: &mut Tablespace, page_no: u64| -> Result<Vec<u8>, IbdError> {
        let raw = ts.read_page(page_no)?;
        decompress_page(&raw, geometry)
    };

    // Descend to the leftmost leaf.
    let fields = sdi_record_fields();
    let key_fields = &fields[..2];
    let mut page = read_logical(ts, root as u64)?;
    let mut hops = 0;
    loop {
        let level = BigEndian::read_u16(&page[FIL_PAGE_DATA + PAGE_LEVEL..]);
        if level == 0 {
            break;
        }
        let records = walk_compact_records(&page);
        let first = records.first().ok_or_else(|| {
            IbdError::SdiParse("empty non-leaf SDI page".to_string())
        })?;
        let offsets = RecordOffsets::compute(&page, first.offset, key_fields)?;
        let child = node_ptr_child(&page, first.offset, offsets.data_size()).ok_or_else(
            || IbdError::SdiParse("node pointer without a child page".to_string()),
        )?;
        page = read_logical(ts, child as u64)?;
        hops += 1;
        if hops > 64 {
            return Err(IbdError::SdiParse("SDI tree deeper than 64 levels".to_string()));
        }
    }

    // Sweep the leaf level.
    let mut out = Vec::new();
    let mut pages = 0u64;
    loop {
        let header = FilHeader::parse(&page)
            .ok_or_else(|| IbdError::SdiParse("unreadable SDI leaf header".to_string()))?;
        if header.page_type != PageType::Sdi {
            return Err(IbdError::SdiParse(format!(
                "page {} in the SDI leaf chain has type {}",
                header.page_number, header.page_type
            )));
        }

        for rec in walk_compact_records(&page) {
            if rec.header.status != RecordStatus::Ordinary || rec.header.delete_mark {
                continue;
            }
            match parse_sdi_record(ts, &page, rec.offset, &fields) {
                Ok(record) => out.push(record),
                Err(e) => warn!(
                    page = header.page_number,
                    offset = rec.offset,
                    "skipping SDI record: {}",
                    e
                ),
            }
        }

        if !header.has_next() {
            break;
        }
        page = read_logical(ts, header.next_page as u64)?;
        pages += 1;
        if pages > ts.page_count() {
            return Err(IbdError::SdiParse("SDI leaf chain does not terminate".to_string()));
        }
    }

    Ok(out)
}

/// Extract SDI and hand it back as `(type, id, json)` triples.
pub fn extract_sdi_json(ts: &mut Tablespace) -> Result<Vec<(u64, u64, String)>, IbdError> {
    Ok(extract_sdi(ts)?
        .into_iter()
        .map(|r| (r.sdi_type, r.sdi_id, r.data))
        .collect())
}

fn parse_sdi_record(
    ts: &mut Tablespace,
    page: &[u8],
    origin: usize,
    fields: &[FieldDef],
) -> Result<SdiRecord, IbdError> {
    let offsets = RecordOffsets::compute(page, origin, fields)?;
    if offsets.n_fields() != fields.len() {
        return Err(IbdError::RecordCorrupted(format!(
            "SDI record at {} has {} fields",
            origin,
            offsets.n_fields()
        )));
    }

    let field = |i: usize| &page[origin + offsets.start(i)..origin + offsets.end(i)];
    let sdi_type = BigEndian::read_u32(field(0)) as u64;
    let sdi_id = BigEndian::read_u64(field(1));
    let uncompressed_len = BigEndian::read_u32(field(4));
    let compressed_len = BigEndian::read_u32(field(5));

    let compressed = if offsets.is_extern(6) {
        let ref_bytes = field(6);
        if ref_bytes.len() != BTR_EXTERN_FIELD_REF_SIZE {
            return Err(IbdError::RecordCorrupted(format!(
                "SDI external reference is {} bytes",
                ref_bytes.len()
            )));
        }
        let first_page = BigEndian::read_u32(&ref_bytes[BTR_EXTERN_PAGE_NO..]);
        read_sdi_blob_chain(ts, first_page, compressed_len as usize)?
    } else {
        field(6).to_vec()
    };

    if compressed.len() != compressed_len as usize {
        return Err(IbdError::RecordCorrupted(format!(
            "SDI record {}:{} payload is {} bytes, header says {}",
            sdi_type,
            sdi_id,
            compressed.len(),
            compressed_len
        )));
    }

    let json = inflate(&compressed)?;
    if json.len() != uncompressed_len as usize {
        return Err(IbdError::RecordCorrupted(format!(
            "SDI record {}:{} inflated to {} bytes, header says {}",
            sdi_type,
            sdi_id,
            json.len(),
            uncompressed_len
        )));
    }

    Ok(SdiRecord {
        sdi_type,
        sdi_id,
        uncompressed_len,
        compressed_len,
        data: String::from_utf8_lossy(&json).to_string(),
    })
}

/// Assemble an external SDI payload from its BLOB page chain.
pub fn read_sdi_blob_chain(
    ts: &mut Tablespace,
    first_page: u32,
    expected_len: usize,
) -> Result<Vec<u8>, IbdError> {
    let geometry = ts.geometry();
    let mut out = Vec::with_capacity(expected_len);
    let mut next = first_page;
    let mut hops = 0u64;

    while next != FIL_NULL && next != 0 {
        let raw = ts.read_page(next as u64)?;
        let page = decompress_page(&raw, geometry)?;
        let header = FilHeader::parse(&page)
            .ok_or_else(|| IbdError::SdiParse("unreadable SDI BLOB page".to_string()))?;
        if header.page_type != PageType::SdiBlob {
            return Err(IbdError::SdiParse(format!(
                "page {} in an SDI BLOB chain has type {}",
                next, header.page_type
            )));
        }

        let part_len = BigEndian::read_u32(&page[FIL_PAGE_DATA..]) as usize;
        let next_page = BigEndian::read_u32(&page[FIL_PAGE_DATA + 4..]);
        let data_start = FIL_PAGE_DATA + SDI_BLOB_HDR_SIZE;
        if data_start + part_len > page.len() - FIL_PAGE_DATA_END {
            return Err(IbdError::SdiParse(format!(
                "SDI BLOB page {} part length {} overflows the page",
                next, part_len
            )));
        }
        out.extend_from_slice(&page[data_start..data_start + part_len]);

        next = next_page;
        hops += 1;
        if hops > ts.page_count() {
            return Err(IbdError::SdiParse("SDI BLOB chain does not terminate".to_string()));
        }
        if out.len() > expected_len {
            break;
        }
    }

    if out.len() > expected_len {
        out.truncate(expected_len);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdi_offset_16k() {
        // encryption info offset (10390) + reserved info size (115)
        assert_eq!(sdi_offset(16384), 10505);
    }

    #[test]
    fn test_read_write_sdi_root() {
        let mut page0 = vec![0u8; 16384];
        assert_eq!(read_sdi_root(&page0, 16384), None);

        write_sdi_root(&mut page0, 16384, 3);
        assert_eq!(read_sdi_root(&page0, 16384), Some(3));

        // Wrong version is rejected.
        let offset = sdi_offset(16384);
        BigEndian::write_u32(&mut page0[offset..], 9);
        assert_eq!(read_sdi_root(&page0, 16384), None);
    }

    #[test]
    fn test_sdi_record_fields_shape() {
        let fields = sdi_record_fields();
        assert_eq!(fields.len(), 7);
        let fixed: usize = fields[..6].iter().map(|f| f.fixed_len.unwrap()).sum();
        // type + id + trx + roll + two length words
        assert_eq!(fixed, 33);
        assert!(fields[6].fixed_len.is_none());
        assert!(fields[6].two_byte_len);
    }
}
