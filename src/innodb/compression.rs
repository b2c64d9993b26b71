//! Compressed page reconstruction.
//!
//! In a ROW_FORMAT=COMPRESSED tablespace only INDEX, RTREE and SDI pages
//! carry zlib-compressed payload; every other page is written at the
//! physical size and treated as opaque metadata.
//!
//! A compressed B-tree page keeps its FIL header and the 56-byte index
//! header area in the clear. From byte 94 onward it stores a single zlib
//! deflate stream holding the record area of the logical page: the
//! infimum/supremum pair through the record heap top. The record directory
//! is not part of the stream: a dense slot array (one 2-byte entry per heap
//! record, in heap order, delete-marked records flagged in bit 15) grows
//! down from the page tail, and the sparse page directory of the logical
//! image is rebuilt from the reconstructed record chain and validated
//! against it.

use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::warn;

use crate::innodb::checksum::stamp_page;
use crate::innodb::constants::*;
use crate::innodb::geometry::PageGeometry;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::record::{walk_compact_records, CompactRecordHeader, RecordStatus};
use crate::IbdError;

/// Delete-mark flag in a dense directory entry.
const DENSE_DIR_DELETED: u16 = 0x8000;
/// Offset mask of a dense directory entry.
const DENSE_DIR_OFFSET_MASK: u16 = 0x3FFF;

/// Inflate raw zlib data.
pub fn inflate(compressed: &[u8]) -> Result<Vec<u8>, IbdError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| IbdError::DecompressionFailed(format!("zlib inflate: {}", e)))?;
    Ok(out)
}

/// Deflate data with the default zlib level.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory deflate");
    encoder.finish().expect("in-memory deflate")
}

/// Reconstruct the logical image of one physical page.
///
/// Returns a buffer of `geometry.logical` bytes for compressible pages of a
/// compressed tablespace, or a copy of the physical page otherwise. An
/// unreadable RTREE page degrades to a copy with a warning; INDEX and SDI
/// pages must decompress.
pub fn decompress_page(phys: &[u8], geometry: PageGeometry) -> Result<Vec<u8>, IbdError> {
    let header = FilHeader::parse(phys).ok_or_else(|| {
        IbdError::DecompressionFailed("page too short for a FIL header".to_string())
    })?;

    if !geometry.is_compressed() || !header.page_type.is_compressible() {
        return Ok(phys.to_vec());
    }

    match reconstruct(phys, geometry, &header) {
        Ok(out) => Ok(out),
        Err(e) if header.page_type == PageType::Rtree => {
            warn!(
                page = header.page_number,
                "RTREE page kept compressed: {}", e
            );
            Ok(phys.to_vec())
        }
        Err(e) => Err(IbdError::DecompressionFailed(format!(
            "page {}: {}",
            header.page_number, e
        ))),
    }
}

fn reconstruct(
    phys: &[u8],
    geometry: PageGeometry,
    header: &FilHeader,
) -> Result<Vec<u8>, IbdError> {
    let logical = geometry.logical;
    let physical = geometry.physical;
    if phys.len() < physical {
        return Err(IbdError::DecompressionFailed(
            "short physical page".to_string(),
        ));
    }

    let n_heap = (BigEndian::read_u16(&phys[FIL_PAGE_DATA + PAGE_N_HEAP..]) & 0x7FFF) as usize;
    let heap_top = BigEndian::read_u16(&phys[FIL_PAGE_DATA + PAGE_HEAP_TOP..]) as usize;
    if n_heap < 2 {
        return Err(IbdError::DecompressionFailed(format!(
            "heap count {} below the system records",
            n_heap
        )));
    }
    if heap_top < PAGE_NEW_SUPREMUM_END || heap_top > logical - FIL_PAGE_DATA_END {
        return Err(IbdError::DecompressionFailed(format!(
            "heap top {} outside the logical page",
            heap_top
        )));
    }

    // Dense directory: one slot per user heap record, above the trailer.
    let n_dense = n_heap - 2;
    let dense_size = n_dense * PAGE_DIR_SLOT_SIZE;
    let dense_start = physical
        .checked_sub(FIL_PAGE_DATA_END + dense_size)
        .filter(|&s| s > PAGE_DATA)
        .ok_or_else(|| {
            IbdError::DecompressionFailed(format!(
                "dense directory of {} slots does not fit",
                n_dense
            ))
        })?;

    // The record area inflates to exactly [94, heap_top).
    let inflated = inflate(&phys[PAGE_DATA..dense_start])?;
    if inflated.len() != heap_top - PAGE_DATA {
        return Err(IbdError::DecompressionFailed(format!(
            "record area inflated to {} bytes, expected {}",
            inflated.len(),
            heap_top - PAGE_DATA
        )));
    }

    let mut out = vec![0u8; logical];
    out[..PAGE_DATA].copy_from_slice(&phys[..PAGE_DATA]);
    out[PAGE_DATA..heap_top].copy_from_slice(&inflated);

    // Validate the dense directory against the reconstructed heap: every
    // entry must name a record origin reachable from infimum.
    let records = walk_compact_records(&out);
    for slot in 0..n_dense {
        let raw = BigEndian::read_u16(&phys[dense_start + slot * PAGE_DIR_SLOT_SIZE..]);
        let offset = (raw & DENSE_DIR_OFFSET_MASK) as usize;
        let deleted = raw & DENSE_DIR_DELETED != 0;
        if deleted {
            continue; // delete-marked records live outside the chain
        }
        if !records.iter().any(|r| r.offset == offset) {
            return Err(IbdError::DecompressionFailed(format!(
                "dense slot {} points at {}, not a live record",
                slot, offset
            )));
        }
    }

    rebuild_sparse_directory(&mut out, logical)?;

    stamp_page(&mut out, logical, header.lsn);
    Ok(out)
}

/// Rebuild the sparse page directory of a logical page from its record
/// chain. Slot 0 points at infimum, the last slot at supremum, and the
/// slots in between at each chain record that owns a directory group.
fn rebuild_sparse_directory(page: &mut [u8], page_size: usize) -> Result<(), IbdError> {
    let mut owners = vec![PAGE_NEW_INFIMUM as u16];
    for rec in walk_compact_records(page) {
        if rec.header.n_owned > 0 {
            owners.push(rec.offset as u16);
        }
    }
    let supremum = CompactRecordHeader::parse_at(page, PAGE_NEW_SUPREMUM).ok_or_else(|| {
        IbdError::DecompressionFailed("supremum header unreadable".to_string())
    })?;
    if supremum.status != RecordStatus::Supremum {
        return Err(IbdError::DecompressionFailed(
            "supremum record missing from the inflated area".to_string(),
        ));
    }
    owners.push(PAGE_NEW_SUPREMUM as u16);

    let n_slots = owners.len();
    let dir_space = n_slots * PAGE_DIR_SLOT_SIZE;
    let heap_top = BigEndian::read_u16(&page[FIL_PAGE_DATA + PAGE_HEAP_TOP..]) as usize;
    if page_size - FIL_PAGE_DATA_END - dir_space < heap_top {
        return Err(IbdError::DecompressionFailed(
            "page directory overlaps the record heap".to_string(),
        ));
    }

    for (n, owner) in owners.iter().enumerate() {
        let at = page_size - PAGE_DIR - (n + 1) * PAGE_DIR_SLOT_SIZE;
        BigEndian::write_u16(&mut page[at..], *owner);
    }
    BigEndian::write_u16(
        &mut page[FIL_PAGE_DATA + PAGE_N_DIR_SLOTS..],
        n_slots as u16,
    );
    Ok(())
}

/// Compress a logical page into a physical image, the inverse of
/// [`decompress_page`] for compressible page types.
///
/// Returns `None` when the deflated record area plus the dense directory
/// does not fit the physical size, or when the page holds records outside
/// the chain (free-list garbage) that the dense directory cannot describe.
pub fn compress_page(logical_page: &[u8], physical: usize) -> Option<Vec<u8>> {
    let header = FilHeader::parse(logical_page)?;
    if !header.page_type.is_compressible() {
        return None;
    }

    let n_heap =
        (BigEndian::read_u16(&logical_page[FIL_PAGE_DATA + PAGE_N_HEAP..]) & 0x7FFF) as usize;
    let heap_top = BigEndian::read_u16(&logical_page[FIL_PAGE_DATA + PAGE_HEAP_TOP..]) as usize;
    if n_heap < 2 || heap_top < PAGE_NEW_SUPREMUM_END || heap_top > logical_page.len() {
        return None;
    }

    let mut records = walk_compact_records(logical_page);
    let n_dense = n_heap - 2;
    if records.len() != n_dense {
        return None;
    }
    records.sort_by_key(|r| r.header.heap_no);

    let stream = deflate(&logical_page[PAGE_DATA..heap_top]);
    let dense_size = n_dense * PAGE_DIR_SLOT_SIZE;
    if PAGE_DATA + stream.len() + dense_size + FIL_PAGE_DATA_END > physical {
        return None;
    }

    let mut phys = vec![0u8; physical];
    phys[..PAGE_DATA].copy_from_slice(&logical_page[..PAGE_DATA]);
    phys[PAGE_DATA..PAGE_DATA + stream.len()].copy_from_slice(&stream);

    let dense_start = physical - FIL_PAGE_DATA_END - dense_size;
    for (i, rec) in records.iter().enumerate() {
        let mut entry = rec.offset as u16 & DENSE_DIR_OFFSET_MASK;
        if rec.header.delete_mark {
            entry |= DENSE_DIR_DELETED;
        }
        BigEndian::write_u16(&mut phys[dense_start + i * PAGE_DIR_SLOT_SIZE..], entry);
    }

    stamp_page(&mut phys, physical, header.lsn);
    Some(phys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innodb::checksum::validate_checksum;

    const LOGICAL: usize = 16384;
    const PHYSICAL: usize = 8192;

    fn geometry() -> PageGeometry {
        PageGeometry {
            logical: LOGICAL,
            physical: PHYSICAL,
        }
    }

    /// Build a minimal logical INDEX page with `n` fixed 8-byte records.
    fn build_logical_index_page(page_no: u32, n: usize) -> Vec<u8> {
        let mut page = vec![0u8; LOGICAL];
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], page_no);
        BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
        BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], PageType::Index.as_u16());
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], 7);

        // System records.
        let inf_extra = PAGE_NEW_INFIMUM - 5;
        page[inf_extra] = 0x01;
        BigEndian::write_u16(&mut page[inf_extra + 1..], REC_STATUS_INFIMUM as u16);
        page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 8].copy_from_slice(b"infimum\0");
        let sup_extra = PAGE_NEW_SUPREMUM - 5;
        page[sup_extra] = (1 + n).min(8) as u8;
        BigEndian::write_u16(
            &mut page[sup_extra + 1..],
            (1 << 3) | REC_STATUS_SUPREMUM as u16,
        );
        page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");

        // User records: 5 extra bytes + 8 data bytes each.
        let mut origins = Vec::new();
        let mut at = PAGE_NEW_SUPREMUM_END + 5;
        for i in 0..n {
            page[at - 5] = 0;
            BigEndian::write_u16(&mut page[at - 4..], ((i as u16 + 2) << 3));
            for j in 0..8 {
                page[at + j] = (i * 8 + j) as u8;
            }
            origins.push(at);
            at += 13;
        }
        let heap_top = at - 5;

        // Chain: infimum -> recs -> supremum; supremum owns the user records.
        let mut prev = PAGE_NEW_INFIMUM;
        let mut prev_next_at = inf_extra + 3;
        for &origin in &origins {
            BigEndian::write_i16(&mut page[prev_next_at..], (origin as i32 - prev as i32) as i16);
            prev = origin;
            prev_next_at = origin - 2;
        }
        BigEndian::write_i16(
            &mut page[prev_next_at..],
            (PAGE_NEW_SUPREMUM as i32 - prev as i32) as i16,
        );

        // Index header.
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_HEAP_TOP..], heap_top as u16);
        BigEndian::write_u16(
            &mut page[FIL_PAGE_DATA + PAGE_N_HEAP..],
            0x8000 | (n as u16 + 2),
        );
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_N_RECS..], n as u16);
        BigEndian::write_u64(&mut page[FIL_PAGE_DATA + PAGE_INDEX_ID..], 0x99);

        // Sparse directory.
        let dir0 = LOGICAL - PAGE_DIR - PAGE_DIR_SLOT_SIZE;
        BigEndian::write_u16(&mut page[dir0..], PAGE_NEW_INFIMUM as u16);
        let dir1 = LOGICAL - PAGE_DIR - 2 * PAGE_DIR_SLOT_SIZE;
        BigEndian::write_u16(&mut page[dir1..], PAGE_NEW_SUPREMUM as u16);
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_N_DIR_SLOTS..], 2);

        stamp_page(&mut page, LOGICAL, 7777);
        page
    }

    #[test]
    fn test_compress_decompress_roundtrip() {
        let logical_page = build_logical_index_page(3, 5);
        let phys = compress_page(&logical_page, PHYSICAL).unwrap();
        assert_eq!(phys.len(), PHYSICAL);
        assert!(validate_checksum(&phys, PHYSICAL));

        let restored = decompress_page(&phys, geometry()).unwrap();
        assert_eq!(restored.len(), LOGICAL);
        assert!(validate_checksum(&restored, LOGICAL));
        assert_eq!(restored, logical_page);
    }

    #[test]
    fn test_uncompressed_geometry_is_passthrough() {
        let logical_page = build_logical_index_page(1, 2);
        let out = decompress_page(&logical_page, PageGeometry::uncompressed()).unwrap();
        assert_eq!(out, logical_page);
    }

    #[test]
    fn test_metadata_page_is_passthrough() {
        let mut page = vec![0u8; PHYSICAL];
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], PageType::Inode.as_u16());
        stamp_page(&mut page, PHYSICAL, 1);
        let out = decompress_page(&page, geometry()).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn test_garbage_index_page_fails() {
        let mut page = vec![0u8; PHYSICAL];
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], PageType::Index.as_u16());
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_N_HEAP..], 0x8004);
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_HEAP_TOP..], 500);
        // No valid zlib stream at 94.
        page[PAGE_DATA] = 0xAB;
        assert!(matches!(
            decompress_page(&page, geometry()),
            Err(IbdError::DecompressionFailed(_))
        ));
    }

    #[test]
    fn test_garbage_rtree_page_degrades_to_copy() {
        let mut page = vec![0u8; PHYSICAL];
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], PageType::Rtree.as_u16());
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_N_HEAP..], 0x8004);
        BigEndian::write_u16(&mut page[FIL_PAGE_DATA + PAGE_HEAP_TOP..], 500);
        page[PAGE_DATA] = 0xAB;
        let out = decompress_page(&page, geometry()).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn test_oversized_record_area_rejected_by_compress() {
        let mut logical_page = build_logical_index_page(3, 5);
        // Fill the record area with incompressible noise up to heap top.
        let mut x: u32 = 0x12345678;
        for i in PAGE_DATA..LOGICAL - 3000 {
            x = x.wrapping_mul(1664525).wrapping_add(1013904223);
            logical_page[i] = (x >> 24) as u8;
        }
        BigEndian::write_u16(
            &mut logical_page[FIL_PAGE_DATA + PAGE_HEAP_TOP..],
            (LOGICAL - 3000) as u16,
        );
        assert!(compress_page(&logical_page, 1024).is_none());
    }

    #[test]
    fn test_inflate_deflate_roundtrip() {
        let data = b"InnoDB record area bytes".repeat(20);
        let packed = deflate(&data);
        assert_eq!(inflate(&packed).unwrap(), data);
    }
}
