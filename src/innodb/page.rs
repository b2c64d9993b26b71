//! InnoDB page header and trailer parsing.
//!
//! Every InnoDB page begins with a 38-byte FIL header ([`FilHeader`]) holding
//! the checksum, page number, prev/next pointers, LSN, page type and space ID.
//! The last 8 bytes form the FIL trailer ([`FilTrailer`]). Page 0 additionally
//! carries the FSP header ([`FspHeader`]) at byte 38 with the space ID,
//! tablespace size and feature flags.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::constants::*;
use crate::innodb::page_types::PageType;

/// Parsed FIL header (38 bytes, present at the start of every InnoDB page).
#[derive(Debug, Clone, Serialize)]
pub struct FilHeader {
    /// Checksum. Bytes 0-3.
    pub checksum: u32,
    /// Page number within the tablespace. Bytes 4-7.
    pub page_number: u32,
    /// Previous page in the doubly-linked list, FIL_NULL if unused. Bytes 8-11.
    pub prev_page: u32,
    /// Next page in the doubly-linked list, FIL_NULL if unused. Bytes 12-15.
    pub next_page: u32,
    /// LSN of the newest modification. Bytes 16-23.
    pub lsn: u64,
    /// Page type. Bytes 24-25.
    pub page_type: PageType,
    /// Space ID. Bytes 34-37.
    pub space_id: u32,
}

impl FilHeader {
    /// Parse a FIL header from a byte slice of at least 38 bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < FIL_PAGE_DATA {
            return None;
        }

        Some(FilHeader {
            checksum: BigEndian::read_u32(&data[FIL_PAGE_SPACE_OR_CHKSUM..]),
            page_number: BigEndian::read_u32(&data[FIL_PAGE_OFFSET..]),
            prev_page: BigEndian::read_u32(&data[FIL_PAGE_PREV..]),
            next_page: BigEndian::read_u32(&data[FIL_PAGE_NEXT..]),
            lsn: BigEndian::read_u64(&data[FIL_PAGE_LSN..]),
            page_type: PageType::from_u16(BigEndian::read_u16(&data[FIL_PAGE_TYPE..])),
            space_id: BigEndian::read_u32(&data[FIL_PAGE_SPACE_ID..]),
        })
    }

    /// Returns true if next_page points at a real page.
    pub fn has_next(&self) -> bool {
        self.next_page != FIL_NULL && self.next_page != 0
    }
}

/// Parsed FIL trailer (last 8 bytes of every page).
#[derive(Debug, Clone, Serialize)]
pub struct FilTrailer {
    /// Old-style checksum. First 4 trailer bytes.
    pub checksum: u32,
    /// Low 32 bits of the LSN. Last 4 trailer bytes.
    pub lsn_low32: u32,
}

impl FilTrailer {
    /// Parse a FIL trailer from its 8 bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < FIL_PAGE_DATA_END {
            return None;
        }

        Some(FilTrailer {
            checksum: BigEndian::read_u32(&data[0..]),
            lsn_low32: BigEndian::read_u32(&data[4..]),
        })
    }
}

/// Parsed FSP header (page 0 of a tablespace, at FIL_PAGE_DATA).
#[derive(Debug, Clone, Serialize)]
pub struct FspHeader {
    /// Space ID.
    pub space_id: u32,
    /// Tablespace size in pages.
    pub size: u32,
    /// Minimum page number not yet initialized.
    pub free_limit: u32,
    /// Space flags (page sizes, compression, encryption, SDI).
    pub flags: u32,
}

impl FspHeader {
    /// Parse the FSP header from a page-0 buffer.
    pub fn parse(page_data: &[u8]) -> Option<Self> {
        if page_data.len() < FIL_PAGE_DATA + FSP_HEADER_SIZE {
            return None;
        }
        let data = &page_data[FIL_PAGE_DATA..];

        Some(FspHeader {
            space_id: BigEndian::read_u32(&data[FSP_SPACE_ID..]),
            size: BigEndian::read_u32(&data[FSP_SIZE..]),
            free_limit: BigEndian::read_u32(&data[FSP_FREE_LIMIT..]),
            flags: BigEndian::read_u32(&data[FSP_SPACE_FLAGS..]),
        })
    }

    /// ZIP_SSIZE field from the flags.
    pub fn zip_ssize(&self) -> u32 {
        (self.flags & FSP_FLAGS_MASK_ZIP_SSIZE) >> FSP_FLAGS_POS_ZIP_SSIZE
    }

    /// PAGE_SSIZE field from the flags.
    pub fn page_ssize(&self) -> u32 {
        (self.flags & FSP_FLAGS_MASK_PAGE_SSIZE) >> FSP_FLAGS_POS_PAGE_SSIZE
    }

    /// True if the tablespace-level encryption flag is set.
    pub fn is_encrypted(&self) -> bool {
        self.flags & FSP_FLAGS_MASK_ENCRYPTION != 0
    }

    /// True if the tablespace carries an SDI index.
    pub fn has_sdi(&self) -> bool {
        self.flags & FSP_FLAGS_MASK_SDI != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fil_header_bytes(
        checksum: u32,
        page_num: u32,
        prev: u32,
        next: u32,
        lsn: u64,
        page_type: u16,
        space_id: u32,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; FIL_PAGE_DATA];
        BigEndian::write_u32(&mut buf[FIL_PAGE_SPACE_OR_CHKSUM..], checksum);
        BigEndian::write_u32(&mut buf[FIL_PAGE_OFFSET..], page_num);
        BigEndian::write_u32(&mut buf[FIL_PAGE_PREV..], prev);
        BigEndian::write_u32(&mut buf[FIL_PAGE_NEXT..], next);
        BigEndian::write_u64(&mut buf[FIL_PAGE_LSN..], lsn);
        BigEndian::write_u16(&mut buf[FIL_PAGE_TYPE..], page_type);
        BigEndian::write_u32(&mut buf[FIL_PAGE_SPACE_ID..], space_id);
        buf
    }

    #[test]
    fn test_fil_header_parse() {
        let data = make_fil_header_bytes(0x12345678, 42, 41, 43, 1000, 17855, 5);
        let hdr = FilHeader::parse(&data).unwrap();
        assert_eq!(hdr.checksum, 0x12345678);
        assert_eq!(hdr.page_number, 42);
        assert_eq!(hdr.prev_page, 41);
        assert_eq!(hdr.next_page, 43);
        assert_eq!(hdr.lsn, 1000);
        assert_eq!(hdr.page_type, PageType::Index);
        assert_eq!(hdr.space_id, 5);
        assert!(hdr.has_next());
    }

    #[test]
    fn test_fil_header_null_next() {
        let data = make_fil_header_bytes(0, 0, FIL_NULL, FIL_NULL, 0, 0, 0);
        let hdr = FilHeader::parse(&data).unwrap();
        assert!(!hdr.has_next());
    }

    #[test]
    fn test_fil_header_too_short() {
        assert!(FilHeader::parse(&[0u8; 10]).is_none());
    }

    #[test]
    fn test_fil_trailer_parse() {
        let mut data = vec![0u8; 8];
        BigEndian::write_u32(&mut data[0..], 0xAABBCCDD);
        BigEndian::write_u32(&mut data[4..], 0x11223344);
        let trl = FilTrailer::parse(&data).unwrap();
        assert_eq!(trl.checksum, 0xAABBCCDD);
        assert_eq!(trl.lsn_low32, 0x11223344);
    }

    #[test]
    fn test_fsp_header_flags() {
        let mut page = vec![0u8; FIL_PAGE_DATA + FSP_HEADER_SIZE];
        let fsp = FIL_PAGE_DATA;
        BigEndian::write_u32(&mut page[fsp + FSP_SPACE_ID..], 7);
        BigEndian::write_u32(&mut page[fsp + FSP_SIZE..], 100);
        let flags =
            (4 << FSP_FLAGS_POS_ZIP_SSIZE) | FSP_FLAGS_MASK_SDI | FSP_FLAGS_MASK_ENCRYPTION;
        BigEndian::write_u32(&mut page[fsp + FSP_SPACE_FLAGS..], flags);

        let hdr = FspHeader::parse(&page).unwrap();
        assert_eq!(hdr.space_id, 7);
        assert_eq!(hdr.size, 100);
        assert_eq!(hdr.zip_ssize(), 4);
        assert_eq!(hdr.page_ssize(), 0);
        assert!(hdr.is_encrypted());
        assert!(hdr.has_sdi());
    }
}
