//! External field (LOB) reading.
//!
//! Columns that overflow the row leave a 20-byte reference behind:
//! `(space_id, page_no, offset-or-version, 8-byte length)` with the top
//! length bit flagging an in-flight modification. The referenced page's
//! type selects the chain format:
//!
//! - **BLOB** (type 10): each page holds `(part_len, next_page_no)` at the
//!   data offset, payload after it.
//! - **LOB_FIRST → LOB_DATA** (types 24/23, MySQL 8 format): the first page
//!   carries a file-list of 60-byte index entries; each entry names a data
//!   page, a byte count and a LOB version. Older entry versions hang off a
//!   per-entry `versions` list.
//! - **ZLOB_FIRST → ZLOB_DATA/ZLOB_FRAG** (types 25/26/28): like the new
//!   format but the payload pages carry one zlib stream, fragments of small
//!   LOBs packed into shared pages by fragment id.
//! - **ZBLOB/ZBLOB2** (types 11/12): a zlib stream spread over the page
//!   chain via `FIL_PAGE_NEXT`.
//!
//! Every walk honors a byte cap and a visited-page budget; chains are
//! never assumed to terminate.

use byteorder::{BigEndian, ByteOrder};

use crate::innodb::compression::inflate;
use crate::innodb::constants::*;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::tablespace::Tablespace;
use crate::IbdError;

/// Most pages any single LOB walk may touch.
const LOB_PAGE_BUDGET: u64 = 100_000;

/// Parsed 20-byte external field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternRef {
    pub space_id: u32,
    pub page_no: u32,
    /// Byte offset (old BLOBs) or requested LOB version (new LOBs).
    pub offset_or_version: u32,
    /// Stored value length in bytes.
    pub length: u64,
    /// The top length bit: a transaction was mutating this LOB.
    pub being_modified: bool,
}

impl ExternRef {
    /// Parse the 20-byte reference from the tail of a record field.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < BTR_EXTERN_FIELD_REF_SIZE {
            return None;
        }
        let raw_len = BigEndian::read_u64(&data[BTR_EXTERN_LEN..]);
        Some(ExternRef {
            space_id: BigEndian::read_u32(&data[BTR_EXTERN_SPACE_ID..]),
            page_no: BigEndian::read_u32(&data[BTR_EXTERN_PAGE_NO..]),
            offset_or_version: BigEndian::read_u32(&data[BTR_EXTERN_OFFSET..]),
            length: raw_len & !BTR_EXTERN_BEING_MODIFIED_FLAG,
            being_modified: raw_len & BTR_EXTERN_BEING_MODIFIED_FLAG != 0,
        })
    }

    /// Serialize back into 20 bytes.
    pub fn to_bytes(self) -> [u8; BTR_EXTERN_FIELD_REF_SIZE] {
        let mut out = [0u8; BTR_EXTERN_FIELD_REF_SIZE];
        BigEndian::write_u32(&mut out[BTR_EXTERN_SPACE_ID..], self.space_id);
        BigEndian::write_u32(&mut out[BTR_EXTERN_PAGE_NO..], self.page_no);
        BigEndian::write_u32(&mut out[BTR_EXTERN_OFFSET..], self.offset_or_version);
        let mut raw = self.length;
        if self.being_modified {
            raw |= BTR_EXTERN_BEING_MODIFIED_FLAG;
        }
        BigEndian::write_u64(&mut out[BTR_EXTERN_LEN..], raw);
        out
    }
}

/// Assembled LOB bytes.
#[derive(Debug, Clone)]
pub struct LobData {
    pub bytes: Vec<u8>,
    /// The byte cap cut the value short.
    pub truncated: bool,
}

/// A file-list node address: `(page_no, byte offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FlstAddr {
    page_no: u32,
    offset: u16,
}

impl FlstAddr {
    fn read(data: &[u8]) -> Self {
        FlstAddr {
            page_no: BigEndian::read_u32(&data[0..]),
            offset: BigEndian::read_u16(&data[4..]),
        }
    }

    fn is_null(self) -> bool {
        self.page_no == FIL_NULL || self.page_no == 0
    }
}

/// Reads external values out of one tablespace.
pub struct LobReader<'a> {
    ts: &'a mut Tablespace,
    /// Byte cap for one value (`--lob-max-bytes`).
    max_bytes: usize,
}

impl<'a> LobReader<'a> {
    pub fn new(ts: &'a mut Tablespace, max_bytes: usize) -> Self {
        LobReader { ts, max_bytes }
    }

    /// Read the value behind an external reference.
    pub fn read(&mut self, extern_ref: &ExternRef) -> Result<LobData, IbdError> {
        if extern_ref.being_modified {
            return Err(IbdError::LobUnavailable(format!(
                "LOB at page {} is marked being-modified",
                extern_ref.page_no
            )));
        }
        if extern_ref.page_no == FIL_NULL || extern_ref.page_no == 0 {
            return Err(IbdError::LobUnavailable(
                "external reference has no first page".to_string(),
            ));
        }

        let first = self.ts.read_page(extern_ref.page_no as u64)?;
        let header = FilHeader::parse(&first).ok_or_else(|| {
            IbdError::LobUnavailable(format!(
                "LOB first page {} unreadable",
                extern_ref.page_no
            ))
        })?;

        match header.page_type {
            PageType::Blob => self.read_blob_chain(extern_ref),
            PageType::LobFirst => self.read_lob(extern_ref, &first),
            PageType::ZlobFirst => self.read_zlob(extern_ref, &first),
            PageType::ZBlob | PageType::ZBlob2 => self.read_zblob_chain(extern_ref),
            other => Err(IbdError::LobUnavailable(format!(
                "page {} has type {}, not a LOB first page",
                extern_ref.page_no, other
            ))),
        }
    }

    // ── Old-format BLOB ────────────────────────────────────────────

    fn read_blob_chain(&mut self, extern_ref: &ExternRef) -> Result<LobData, IbdError> {
        let mut out = Vec::new();
        let mut next = extern_ref.page_no;
        let mut hops = 0u64;
        let want = extern_ref.length as usize;

        while next != FIL_NULL && next != 0 {
            let page = self.ts.read_page(next as u64)?;
            let part_len = BigEndian::read_u32(&page[FIL_PAGE_DATA + LOB_HDR_PART_LEN..]) as usize;
            let next_page = BigEndian::read_u32(&page[FIL_PAGE_DATA + LOB_HDR_NEXT_PAGE_NO..]);
            let data_start = FIL_PAGE_DATA + LOB_HDR_SIZE;
            if data_start + part_len > page.len() - FIL_PAGE_DATA_END {
                return Err(IbdError::LobUnavailable(format!(
                    "BLOB page {} part length {} overflows the page",
                    next, part_len
                )));
            }

            out.extend_from_slice(&page[data_start..data_start + part_len]);
            if self.max_bytes < want && out.len() >= self.max_bytes {
                out.truncate(self.max_bytes);
                return Ok(LobData {
                    bytes: out,
                    truncated: true,
                });
            }
            if out.len() >= want {
                break;
            }

            next = next_page;
            hops += 1;
            if hops > LOB_PAGE_BUDGET {
                return Err(IbdError::LobUnavailable(
                    "BLOB chain exceeds the page budget".to_string(),
                ));
            }
        }

        if out.len() < want {
            return Err(IbdError::LobUnavailable(format!(
                "BLOB chain ended at {} of {} bytes",
                out.len(),
                want
            )));
        }
        out.truncate(want);
        Ok(LobData {
            bytes: out,
            truncated: false,
        })
    }

    // ── MySQL 8 uncompressed LOB ───────────────────────────────────

    fn read_lob(&mut self, extern_ref: &ExternRef, first: &[u8]) -> Result<LobData, IbdError> {
        let want_version = extern_ref.offset_or_version;
        let entries = self.walk_entry_list(
            first,
            extern_ref.page_no,
            FIL_PAGE_DATA + LOB_FIRST_INDEX_LIST,
        )?;

        // Inline data on the first page begins after its entry array.
        let first_data_start =
            FIL_PAGE_DATA + LOB_FIRST_INDEX_BEGIN + entries.len() * LOB_INDEX_ENTRY_SIZE;

        let mut out = Vec::new();
        let want = extern_ref.length as usize;
        for entry_addr in entries.iter().copied() {
            let entry = self.load_entry(entry_addr, want_version)?;
            let Some(entry) = entry else { continue };
            if entry.page_no == FIL_NULL {
                continue;
            }

            let data = if entry.page_no == extern_ref.page_no {
                // The first page stores the leading bytes itself.
                self.slice_page(first, first_data_start, entry.data_len as usize, entry.page_no)?
            } else {
                let page = self.ts.read_page(entry.page_no as u64)?;
                self.expect_type(&page, entry.page_no, PageType::LobData)?;
                let start = FIL_PAGE_DATA + LOB_DATA_PAGE_DATA;
                self.slice_page(&page, start, entry.data_len as usize, entry.page_no)?
            };
            out.extend_from_slice(&data);

            if self.max_bytes < want && out.len() >= self.max_bytes {
                out.truncate(self.max_bytes);
                return Ok(LobData {
                    bytes: out,
                    truncated: true,
                });
            }
            if out.len() >= want {
                break;
            }
        }

        if out.len() < want {
            return Err(IbdError::LobUnavailable(format!(
                "LOB index yielded {} of {} bytes",
                out.len(),
                want
            )));
        }
        out.truncate(want);
        Ok(LobData {
            bytes: out,
            truncated: false,
        })
    }

    // ── MySQL 8 compressed LOB ─────────────────────────────────────

    fn read_zlob(&mut self, extern_ref: &ExternRef, first: &[u8]) -> Result<LobData, IbdError> {
        let want_version = extern_ref.offset_or_version;
        let entries = self.walk_entry_list(
            first,
            extern_ref.page_no,
            FIL_PAGE_DATA + ZLOB_FIRST_INDEX_LIST,
        )?;

        // One zlib stream assembled across the data pages.
        let mut stream = Vec::new();
        for entry_addr in entries {
            let entry = self.load_zentry(entry_addr, want_version)?;
            let Some(entry) = entry else { continue };
            if entry.z_page_no == FIL_NULL {
                continue;
            }

            let page = self.ts.read_page(entry.z_page_no as u64)?;
            let chunk = if entry.z_frag_id != ZLOB_FRAG_ID_NULL {
                self.read_fragment(&page, entry.z_page_no, entry.z_frag_id)?
            } else {
                self.expect_type(&page, entry.z_page_no, PageType::ZlobData)?;
                let start = FIL_PAGE_DATA + ZLOB_DATA_PAGE_DATA;
                self.slice_page(&page, start, entry.zdata_len as usize, entry.z_page_no)?
            };
            stream.extend_from_slice(&chunk);
        }

        let want = extern_ref.length as usize;
        let mut bytes = inflate(&stream)
            .map_err(|e| IbdError::LobUnavailable(format!("compressed LOB: {}", e)))?;
        if bytes.len() < want {
            return Err(IbdError::LobUnavailable(format!(
                "compressed LOB inflated to {} of {} bytes",
                bytes.len(),
                want
            )));
        }
        bytes.truncate(want);
        if bytes.len() > self.max_bytes {
            bytes.truncate(self.max_bytes);
            return Ok(LobData {
                bytes,
                truncated: true,
            });
        }
        Ok(LobData {
            bytes,
            truncated: false,
        })
    }

    // ── Old-format compressed BLOB ─────────────────────────────────

    fn read_zblob_chain(&mut self, extern_ref: &ExternRef) -> Result<LobData, IbdError> {
        let mut stream = Vec::new();
        let mut next = extern_ref.page_no;
        let mut hops = 0u64;

        while next != FIL_NULL && next != 0 {
            let page = self.ts.read_page(next as u64)?;
            let header = FilHeader::parse(&page).ok_or_else(|| {
                IbdError::LobUnavailable(format!("ZBLOB page {} unreadable", next))
            })?;
            if !matches!(header.page_type, PageType::ZBlob | PageType::ZBlob2) {
                return Err(IbdError::LobUnavailable(format!(
                    "page {} in a ZBLOB chain has type {}",
                    next, header.page_type
                )));
            }
            stream.extend_from_slice(&page[FIL_PAGE_DATA..page.len() - FIL_PAGE_DATA_END]);

            next = header.next_page;
            hops += 1;
            if hops > LOB_PAGE_BUDGET {
                return Err(IbdError::LobUnavailable(
                    "ZBLOB chain exceeds the page budget".to_string(),
                ));
            }
        }

        let want = extern_ref.length as usize;
        let mut bytes = inflate(&stream)
            .map_err(|e| IbdError::LobUnavailable(format!("ZBLOB: {}", e)))?;
        if bytes.len() < want {
            return Err(IbdError::LobUnavailable(format!(
                "ZBLOB inflated to {} of {} bytes",
                bytes.len(),
                want
            )));
        }
        bytes.truncate(want);
        if bytes.len() > self.max_bytes {
            bytes.truncate(self.max_bytes);
            return Ok(LobData {
                bytes,
                truncated: true,
            });
        }
        Ok(LobData {
            bytes,
            truncated: false,
        })
    }

    // ── Shared plumbing ────────────────────────────────────────────

    fn expect_type(
        &self,
        page: &[u8],
        page_no: u32,
        expected: PageType,
    ) -> Result<(), IbdError> {
        let header = FilHeader::parse(page).ok_or_else(|| {
            IbdError::LobUnavailable(format!("LOB page {} unreadable", page_no))
        })?;
        if header.page_type != expected {
            return Err(IbdError::LobUnavailable(format!(
                "page {} has type {}, expected {}",
                page_no, header.page_type, expected
            )));
        }
        Ok(())
    }

    fn slice_page(
        &self,
        page: &[u8],
        start: usize,
        len: usize,
        page_no: u32,
    ) -> Result<Vec<u8>, IbdError> {
        if start + len > page.len() - FIL_PAGE_DATA_END {
            return Err(IbdError::LobUnavailable(format!(
                "LOB page {}: {} bytes at offset {} overflow the page",
                page_no, len, start
            )));
        }
        Ok(page[start..start + len].to_vec())
    }

    /// Follow a file-list of index entries, returning each entry address.
    fn walk_entry_list(
        &mut self,
        first: &[u8],
        first_page_no: u32,
        base_offset: usize,
    ) -> Result<Vec<FlstAddr>, IbdError> {
        let len = BigEndian::read_u32(&first[base_offset..]);
        let mut addr = FlstAddr::read(&first[base_offset + 4..]);
        let mut out = Vec::new();

        while !addr.is_null() {
            out.push(addr);
            if out.len() as u64 > LOB_PAGE_BUDGET {
                return Err(IbdError::LobUnavailable(
                    "LOB index list exceeds the entry budget".to_string(),
                ));
            }
            // The `next` pointer sits 6 bytes into every entry.
            let next_at = addr.offset as usize + LOB_ENTRY_NEXT;
            let page = if addr.page_no == first_page_no {
                first.to_vec()
            } else {
                self.ts.read_page(addr.page_no as u64)?
            };
            if next_at + 6 > page.len() {
                return Err(IbdError::LobUnavailable(format!(
                    "LOB index entry at {}:{} overflows the page",
                    addr.page_no, addr.offset
                )));
            }
            addr = FlstAddr::read(&page[next_at..]);
        }

        if out.len() < len as usize {
            return Err(IbdError::LobUnavailable(format!(
                "LOB index list has {} of {} entries",
                out.len(),
                len
            )));
        }
        Ok(out)
    }

    fn entry_bytes(&mut self, addr: FlstAddr, size: usize) -> Result<Vec<u8>, IbdError> {
        let page = self.ts.read_page(addr.page_no as u64)?;
        let start = addr.offset as usize;
        if start + size > page.len() {
            return Err(IbdError::LobUnavailable(format!(
                "LOB entry at {}:{} overflows the page",
                addr.page_no, addr.offset
            )));
        }
        Ok(page[start..start + size].to_vec())
    }

    /// Load an uncompressed-LOB index entry, resolving the version chain.
    ///
    /// Returns `None` when no stored version is visible at `want_version`.
    fn load_entry(
        &mut self,
        addr: FlstAddr,
        want_version: u32,
    ) -> Result<Option<LobIndexEntry>, IbdError> {
        let mut entry = LobIndexEntry::parse(&self.entry_bytes(addr, LOB_INDEX_ENTRY_SIZE)?);
        let mut hops = 0;
        while entry.lob_version > want_version {
            if entry.versions_first.is_null() {
                return Ok(None);
            }
            entry = LobIndexEntry::parse(
                &self.entry_bytes(entry.versions_first, LOB_INDEX_ENTRY_SIZE)?,
            );
            hops += 1;
            if hops > 1000 {
                return Err(IbdError::LobUnavailable(
                    "LOB version chain exceeds the budget".to_string(),
                ));
            }
        }
        Ok(Some(entry))
    }

    fn load_zentry(
        &mut self,
        addr: FlstAddr,
        want_version: u32,
    ) -> Result<Option<ZlobIndexEntry>, IbdError> {
        let mut entry = ZlobIndexEntry::parse(&self.entry_bytes(addr, ZLOB_INDEX_ENTRY_SIZE)?);
        let mut hops = 0;
        while entry.lob_version > want_version {
            if entry.versions_first.is_null() {
                return Ok(None);
            }
            entry = ZlobIndexEntry::parse(
                &self.entry_bytes(entry.versions_first, ZLOB_INDEX_ENTRY_SIZE)?,
            );
            hops += 1;
            if hops > 1000 {
                return Err(IbdError::LobUnavailable(
                    "LOB version chain exceeds the budget".to_string(),
                ));
            }
        }
        Ok(Some(entry))
    }

    /// Pull one fragment out of a ZLOB_FRAG page: the directory at the data
    /// offset maps fragment ids to `(offset, length)`.
    fn read_fragment(
        &self,
        page: &[u8],
        page_no: u32,
        frag_id: u16,
    ) -> Result<Vec<u8>, IbdError> {
        self.expect_type(page, page_no, PageType::ZlobFrag)?;
        let n = BigEndian::read_u16(&page[FIL_PAGE_DATA + ZLOB_FRAG_N_ENTRIES..]) as usize;
        for i in 0..n {
            let at = FIL_PAGE_DATA + ZLOB_FRAG_DIR + i * ZLOB_FRAG_DIR_ENTRY_SIZE;
            if at + ZLOB_FRAG_DIR_ENTRY_SIZE > page.len() {
                break;
            }
            let id = BigEndian::read_u16(&page[at..]);
            if id != frag_id {
                continue;
            }
            let offset = BigEndian::read_u16(&page[at + 2..]) as usize;
            let len = BigEndian::read_u16(&page[at + 4..]) as usize;
            return self.slice_page(page, offset, len, page_no);
        }
        Err(IbdError::LobUnavailable(format!(
            "fragment {} not present on page {}",
            frag_id, page_no
        )))
    }
}

/// Parsed 60-byte uncompressed-LOB index entry.
#[derive(Debug, Clone)]
struct LobIndexEntry {
    versions_first: FlstAddr,
    page_no: u32,
    data_len: u32,
    lob_version: u32,
}

impl LobIndexEntry {
    fn parse(data: &[u8]) -> Self {
        LobIndexEntry {
            versions_first: FlstAddr::read(&data[LOB_ENTRY_VERSIONS + 4..]),
            page_no: BigEndian::read_u32(&data[LOB_ENTRY_PAGE_NO..]),
            data_len: BigEndian::read_u32(&data[LOB_ENTRY_DATA_LEN..]),
            lob_version: BigEndian::read_u32(&data[LOB_ENTRY_LOB_VERSION..]),
        }
    }
}

/// Parsed 66-byte compressed-LOB index entry.
#[derive(Debug, Clone)]
struct ZlobIndexEntry {
    versions_first: FlstAddr,
    z_page_no: u32,
    z_frag_id: u16,
    #[allow(dead_code)]
    data_len: u32,
    zdata_len: u32,
    lob_version: u32,
}

impl ZlobIndexEntry {
    fn parse(data: &[u8]) -> Self {
        ZlobIndexEntry {
            versions_first: FlstAddr::read(&data[ZLOB_ENTRY_VERSIONS + 4..]),
            z_page_no: BigEndian::read_u32(&data[ZLOB_ENTRY_Z_PAGE_NO..]),
            z_frag_id: BigEndian::read_u16(&data[ZLOB_ENTRY_Z_FRAG_ID..]),
            data_len: BigEndian::read_u32(&data[ZLOB_ENTRY_DATA_LEN..]),
            zdata_len: BigEndian::read_u32(&data[ZLOB_ENTRY_ZDATA_LEN..]),
            lob_version: BigEndian::read_u32(&data[ZLOB_ENTRY_LOB_VERSION..]),
        }
    }
}
