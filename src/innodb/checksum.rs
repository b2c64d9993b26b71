//! CRC-32C page checksums.
//!
//! Every page is stamped with the XOR of two independent CRC-32C values:
//! one over bytes `[4..38)` (the FIL header past the stored checksum) and
//! one over `[38..page_size-8)` (the data area). Only the stored checksum
//! itself and the trailer are excluded. The same value lives at byte 0 and
//! in the first four trailer bytes; the last four trailer bytes repeat the
//! low 32 bits of the header LSN.

use byteorder::{BigEndian, ByteOrder};

use crate::innodb::constants::*;

/// Calculate the CRC-32C checksum of a page:
/// `CRC(page[4..38]) XOR CRC(page[38..page_size-8])`.
pub fn page_checksum(page: &[u8], page_size: usize) -> u32 {
    let end = page_size - FIL_PAGE_DATA_END;
    let crc1 = crc32c::crc32c(&page[FIL_PAGE_OFFSET..FIL_PAGE_DATA]);
    let crc2 = crc32c::crc32c(&page[FIL_PAGE_DATA..end]);
    crc1 ^ crc2
}

/// Validate a page's stored checksum against the calculated one.
///
/// All-zero pages (freshly allocated, never written) are considered valid.
pub fn validate_checksum(page: &[u8], page_size: usize) -> bool {
    if page.len() < page_size {
        return false;
    }
    let stored = BigEndian::read_u32(&page[FIL_PAGE_SPACE_OR_CHKSUM..]);
    if stored == 0 && page[..page_size].iter().all(|&b| b == 0) {
        return true;
    }
    stored == page_checksum(page, page_size)
}

/// Stamp an LSN into the header and trailer, then recompute and stamp the
/// checksum at both byte 0 and the trailer.
pub fn stamp_page(page: &mut [u8], page_size: usize, lsn: u64) {
    BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], lsn);
    let trailer = page_size - FIL_PAGE_DATA_END;
    BigEndian::write_u32(&mut page[trailer + 4..], (lsn & 0xFFFF_FFFF) as u32);

    let crc = page_checksum(page, page_size);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], crc);
    BigEndian::write_u32(&mut page[trailer..], crc);
}

/// Recompute and stamp only the checksum, leaving the LSN fields alone.
pub fn restamp_checksum(page: &mut [u8], page_size: usize) {
    let crc = page_checksum(page, page_size);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], crc);
    let trailer = page_size - FIL_PAGE_DATA_END;
    BigEndian::write_u32(&mut page[trailer..], crc);
}
