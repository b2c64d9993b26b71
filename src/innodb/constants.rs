//! InnoDB page and file structure constants.
//!
//! Values match the MySQL 8 source headers:
//! - `fil0fil.h` (FIL header/trailer, page types)
//! - `page0page.h` / `page0types.h` (page header, directory, system records)
//! - `fsp0fsp.h` / `fsp0types.h` (FSP header, space flags, XDES)
//! - `rem0rec.h` (compact record extra bytes and info bits)
//! - `lob0lob.h` / `lob0first.h` / `zlob0first.h` (LOB page layouts)

// ── Page sizes ──────────────────────────────────────────────────────

/// Default (and, for rebuilds, the only) logical page size: 16 KiB.
pub const UNIV_PAGE_SIZE: usize = 16384;
/// Smallest physical page size a compressed tablespace can use.
pub const UNIV_ZIP_SIZE_MIN: usize = 1024;

// ── FIL Header (38 bytes total) ─────────────────────────────────────

/// Size of the FIL header in bytes.
pub const FIL_PAGE_DATA: usize = 38;
/// Offset of the checksum. 4 bytes.
pub const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0;
/// Offset of the page number. 4 bytes.
pub const FIL_PAGE_OFFSET: usize = 4;
/// Offset of the previous page pointer. 4 bytes.
pub const FIL_PAGE_PREV: usize = 8;
/// Offset of the next page pointer. 4 bytes.
pub const FIL_PAGE_NEXT: usize = 12;
/// Offset of the LSN of the newest modification. 8 bytes.
pub const FIL_PAGE_LSN: usize = 16;
/// Offset of the page type field. 2 bytes.
pub const FIL_PAGE_TYPE: usize = 24;
/// Offset of the flush LSN (page 0 of the system tablespace only). 8 bytes.
pub const FIL_PAGE_FILE_FLUSH_LSN: usize = 26;
/// Where MySQL saves the original page type before encrypting. 2 bytes.
pub const FIL_PAGE_ORIGINAL_TYPE_V1: usize = 26;
/// Offset of the space ID. 4 bytes.
pub const FIL_PAGE_SPACE_ID: usize = 34;

// ── FIL Trailer (8 bytes total) ─────────────────────────────────────

/// Size of the FIL trailer: old-style checksum (4) + low 32 LSN bits (4).
pub const FIL_PAGE_DATA_END: usize = 8;

/// Null page reference (0xFFFFFFFF).
pub const FIL_NULL: u32 = 0xFFFFFFFF;

// ── FSP Header (112 bytes, at FIL_PAGE_DATA on page 0) ──────────────

/// Size of the FSP header in bytes.
pub const FSP_HEADER_SIZE: usize = 112;
/// Offset of the space ID within the FSP header. 4 bytes.
pub const FSP_SPACE_ID: usize = 0;
/// Offset of the tablespace size in pages. 4 bytes.
pub const FSP_SIZE: usize = 8;
/// Offset of the minimum page not yet initialized. 4 bytes.
pub const FSP_FREE_LIMIT: usize = 12;
/// Offset of the FSP flags field. 4 bytes.
pub const FSP_SPACE_FLAGS: usize = 16;

// ── FSP space flag layout (fsp0types.h) ─────────────────────────────

pub const FSP_FLAGS_POS_POST_ANTELOPE: u32 = 0;
pub const FSP_FLAGS_POS_ZIP_SSIZE: u32 = 1;
pub const FSP_FLAGS_WIDTH_ZIP_SSIZE: u32 = 4;
pub const FSP_FLAGS_POS_ATOMIC_BLOBS: u32 = 5;
pub const FSP_FLAGS_POS_PAGE_SSIZE: u32 = 6;
pub const FSP_FLAGS_WIDTH_PAGE_SSIZE: u32 = 4;
pub const FSP_FLAGS_POS_DATA_DIR: u32 = 10;
pub const FSP_FLAGS_POS_SHARED: u32 = 11;
pub const FSP_FLAGS_POS_TEMPORARY: u32 = 12;
pub const FSP_FLAGS_POS_ENCRYPTION: u32 = 13;
pub const FSP_FLAGS_POS_SDI: u32 = 14;
pub const FSP_FLAGS_POS_UNUSED: u32 = 15;

pub const FSP_FLAGS_MASK_ZIP_SSIZE: u32 =
    ((1 << FSP_FLAGS_WIDTH_ZIP_SSIZE) - 1) << FSP_FLAGS_POS_ZIP_SSIZE;
pub const FSP_FLAGS_MASK_PAGE_SSIZE: u32 =
    ((1 << FSP_FLAGS_WIDTH_PAGE_SSIZE) - 1) << FSP_FLAGS_POS_PAGE_SSIZE;
pub const FSP_FLAGS_MASK_ENCRYPTION: u32 = 1 << FSP_FLAGS_POS_ENCRYPTION;
pub const FSP_FLAGS_MASK_SDI: u32 = 1 << FSP_FLAGS_POS_SDI;

// ── XDES (extent descriptor) ────────────────────────────────────────

/// Size of one XDES entry in bytes.
pub const XDES_SIZE: usize = 40;
/// Offset of the state field within an XDES entry. 4 bytes.
pub const XDES_STATE: usize = 20;
/// Offset of the page-state bitmap within an XDES entry.
pub const XDES_BITMAP: usize = 24;
/// Bits per page in the XDES bitmap (free bit + clean bit).
pub const XDES_BITS_PER_PAGE: usize = 2;
/// Index of the free bit for a page.
pub const XDES_FREE_BIT: usize = 0;

// ── INDEX page header (at FIL_PAGE_DATA) ────────────────────────────

pub const PAGE_N_DIR_SLOTS: usize = 0;
pub const PAGE_HEAP_TOP: usize = 2;
/// Heap record count; bit 15 is the compact-format flag.
pub const PAGE_N_HEAP: usize = 4;
pub const PAGE_FREE: usize = 6;
pub const PAGE_GARBAGE: usize = 8;
pub const PAGE_LAST_INSERT: usize = 10;
pub const PAGE_DIRECTION: usize = 12;
pub const PAGE_N_DIRECTION: usize = 14;
pub const PAGE_N_RECS: usize = 16;
pub const PAGE_MAX_TRX_ID: usize = 18;
/// B+Tree level (0 = leaf). 2 bytes.
pub const PAGE_LEVEL: usize = 26;
/// Index ID. 8 bytes.
pub const PAGE_INDEX_ID: usize = 28;
pub const PAGE_BTR_SEG_LEAF: usize = 36;
pub const PAGE_BTR_SEG_TOP: usize = 46;
/// INDEX page header size before the two FSEG headers.
pub const PAGE_HEADER_SIZE: usize = 36;

/// Size of an FSEG (file segment) header.
pub const FSEG_HEADER_SIZE: usize = 10;

/// Start of the system records: 38 + 36 + 2 * 10.
pub const PAGE_DATA: usize = FIL_PAGE_DATA + PAGE_HEADER_SIZE + 2 * FSEG_HEADER_SIZE;

/// Size of one page directory slot.
pub const PAGE_DIR_SLOT_SIZE: usize = 2;
/// Maximum records owned by one directory slot.
pub const PAGE_DIR_SLOT_MAX_N_OWNED: usize = 8;
/// Minimum records owned by an interior directory slot.
pub const PAGE_DIR_SLOT_MIN_N_OWNED: usize = 4;
/// Offset of the directory from the page end (after the FIL trailer).
pub const PAGE_DIR: usize = FIL_PAGE_DATA_END;

// ── Compact record layout (rem0rec.h) ───────────────────────────────

/// Extra bytes preceding each record origin in compact format.
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;
/// Offset of the infimum record origin (compact format): 94 + 5.
pub const PAGE_NEW_INFIMUM: usize = PAGE_DATA + REC_N_NEW_EXTRA_BYTES;
/// Offset of the supremum record origin (compact format): 94 + 2*5 + 8.
pub const PAGE_NEW_SUPREMUM: usize = PAGE_DATA + 2 * REC_N_NEW_EXTRA_BYTES + 8;
/// End of the supremum record ("supremum" body is 8 bytes).
pub const PAGE_NEW_SUPREMUM_END: usize = PAGE_NEW_SUPREMUM + 8;

/// Delete-mark bit in the info-bits nibble.
pub const REC_INFO_DELETED_FLAG: u8 = 0x20;
/// Min-rec bit in the info-bits nibble.
pub const REC_INFO_MIN_REC_FLAG: u8 = 0x10;
/// Record carries a row version byte (instant ADD/DROP, 8.0.29+).
pub const REC_INFO_VERSION_FLAG: u8 = 0x40;
/// Record carries an explicit field count (instant ADD, pre-8.0.29).
pub const REC_INFO_INSTANT_FLAG: u8 = 0x80;
/// High bit of the instant field-count byte: count occupies two bytes.
pub const REC_N_FIELDS_TWO_BYTES_FLAG: u8 = 0x80;

/// Record status values (3 low bits of the heap-no word).
pub const REC_STATUS_ORDINARY: u8 = 0;
pub const REC_STATUS_NODE_PTR: u8 = 1;
pub const REC_STATUS_INFIMUM: u8 = 2;
pub const REC_STATUS_SUPREMUM: u8 = 3;

/// Offsets-table flag: field is SQL NULL.
pub const OFFSETS_SQL_NULL: u32 = 0x8000_0000;
/// Offsets-table flag: field is stored externally.
pub const OFFSETS_EXTERNAL: u32 = 0x4000_0000;
/// Mask to recover the plain end offset from an offsets-table entry.
pub const OFFSETS_MASK: u32 = 0x3FFF_FFFF;

// ── External field reference (20 bytes, btr0types.h) ────────────────

pub const BTR_EXTERN_SPACE_ID: usize = 0;
pub const BTR_EXTERN_PAGE_NO: usize = 4;
/// Byte offset (old BLOBs) or LOB version (new LOBs).
pub const BTR_EXTERN_OFFSET: usize = 8;
pub const BTR_EXTERN_LEN: usize = 12;
pub const BTR_EXTERN_FIELD_REF_SIZE: usize = 20;
/// Top bit of the 8-byte length: the LOB is being modified.
pub const BTR_EXTERN_BEING_MODIFIED_FLAG: u64 = 1 << 63;

// ── Old-style BLOB pages ────────────────────────────────────────────

/// Data length stored on this page. 4 bytes at FIL_PAGE_DATA.
pub const LOB_HDR_PART_LEN: usize = 0;
/// Next BLOB page number. 4 bytes.
pub const LOB_HDR_NEXT_PAGE_NO: usize = 4;
/// Old-style BLOB header size.
pub const LOB_HDR_SIZE: usize = 8;

// ── LOB first page (type 24, lob0first.h), relative to FIL_PAGE_DATA ─

pub const LOB_FIRST_VERSION: usize = 0;
pub const LOB_FIRST_FLAGS: usize = 1;
pub const LOB_FIRST_LOB_VERSION: usize = 2;
pub const LOB_FIRST_LAST_TRX_ID: usize = 6;
pub const LOB_FIRST_LAST_UNDO_NO: usize = 12;
pub const LOB_FIRST_DATA_LEN: usize = 16;
pub const LOB_FIRST_TRX_ID: usize = 20;
pub const LOB_FIRST_INDEX_LIST: usize = 26;
pub const LOB_FIRST_INDEX_FREE_NODES: usize = 42;
/// Start of the index entry array on the first LOB page; the page's inline
/// data follows the array.
pub const LOB_FIRST_INDEX_BEGIN: usize = 58;

/// LOB index entry size (lob0index.h).
pub const LOB_INDEX_ENTRY_SIZE: usize = 60;
pub const LOB_ENTRY_PREV: usize = 0;
pub const LOB_ENTRY_NEXT: usize = 6;
pub const LOB_ENTRY_VERSIONS: usize = 12;
pub const LOB_ENTRY_TRX_ID: usize = 28;
pub const LOB_ENTRY_TRX_ID_MODIFIER: usize = 34;
pub const LOB_ENTRY_TRX_UNDO_NO: usize = 40;
pub const LOB_ENTRY_TRX_UNDO_NO_MODIFIER: usize = 44;
pub const LOB_ENTRY_PAGE_NO: usize = 48;
pub const LOB_ENTRY_DATA_LEN: usize = 52;
pub const LOB_ENTRY_LOB_VERSION: usize = 56;

// ── LOB data page (type 23, lob0pages.h), relative to FIL_PAGE_DATA ─

pub const LOB_DATA_VERSION: usize = 0;
pub const LOB_DATA_DATA_LEN: usize = 1;
pub const LOB_DATA_TRX_ID: usize = 5;
pub const LOB_DATA_PAGE_DATA: usize = 11;

// ── Compressed LOB pages (zlob0first.h family) ──────────────────────

pub const ZLOB_FIRST_VERSION: usize = 0;
pub const ZLOB_FIRST_FLAGS: usize = 1;
pub const ZLOB_FIRST_LOB_VERSION: usize = 2;
pub const ZLOB_FIRST_LAST_TRX_ID: usize = 6;
pub const ZLOB_FIRST_LAST_UNDO_NO: usize = 12;
pub const ZLOB_FIRST_DATA_LEN: usize = 16;
pub const ZLOB_FIRST_TRX_ID: usize = 20;
pub const ZLOB_FIRST_INDEX_LIST: usize = 26;
pub const ZLOB_FIRST_FREE_LIST: usize = 42;
pub const ZLOB_FIRST_FRAG_LIST: usize = 58;
/// Start of the z-index entry array on the first page.
pub const ZLOB_FIRST_INDEX_BEGIN: usize = 74;

/// z-index entry size (zlob0index.h).
pub const ZLOB_INDEX_ENTRY_SIZE: usize = 66;
pub const ZLOB_ENTRY_PREV: usize = 0;
pub const ZLOB_ENTRY_NEXT: usize = 6;
pub const ZLOB_ENTRY_VERSIONS: usize = 12;
pub const ZLOB_ENTRY_TRX_ID: usize = 28;
pub const ZLOB_ENTRY_TRX_ID_MODIFIER: usize = 34;
pub const ZLOB_ENTRY_TRX_UNDO_NO: usize = 40;
pub const ZLOB_ENTRY_TRX_UNDO_NO_MODIFIER: usize = 44;
pub const ZLOB_ENTRY_Z_PAGE_NO: usize = 48;
pub const ZLOB_ENTRY_Z_FRAG_ID: usize = 52;
pub const ZLOB_ENTRY_DATA_LEN: usize = 54;
pub const ZLOB_ENTRY_ZDATA_LEN: usize = 58;
pub const ZLOB_ENTRY_LOB_VERSION: usize = 62;

/// z-data page payload start, relative to FIL_PAGE_DATA.
pub const ZLOB_DATA_PAGE_DATA: usize = 11;

/// Frag page: number of fragment directory entries. 2 bytes at FIL_PAGE_DATA.
pub const ZLOB_FRAG_N_ENTRIES: usize = 0;
/// Frag page: start of the fragment directory.
pub const ZLOB_FRAG_DIR: usize = 2;
/// Fragment directory entry: id (2) + offset (2) + length (2).
pub const ZLOB_FRAG_DIR_ENTRY_SIZE: usize = 6;

/// Null fragment id.
pub const ZLOB_FRAG_ID_NULL: u16 = 0xFFFF;

// ── SDI ─────────────────────────────────────────────────────────────

/// SDI version expected in the page-0 SDI field.
pub const SDI_VERSION: u32 = 1;

/// SDI clustered record layout, relative to the record origin:
/// type (4) + id (8) + trx_id (6) + roll_ptr (7) + uncomp_len (4) + comp_len (4).
pub const SDI_REC_TYPE: usize = 0;
pub const SDI_REC_ID: usize = 4;
pub const SDI_REC_TRX_ID: usize = 12;
pub const SDI_REC_ROLL_PTR: usize = 18;
pub const SDI_REC_UNCOMP_LEN: usize = 25;
pub const SDI_REC_COMP_LEN: usize = 29;
pub const SDI_REC_DATA: usize = 33;

/// Largest compressed SDI payload stored inline (two-byte var-len bound).
pub const SDI_REC_MAX_INLINE: usize = 0x3FFF;

/// SDI BLOB page header: part_len (4) + next_page_no (4) at FIL_PAGE_DATA.
pub const SDI_BLOB_HDR_SIZE: usize = 8;

// ── Encryption info on page 0 ───────────────────────────────────────

pub const ENCRYPTION_MAGIC_SIZE: usize = 3;
pub const ENCRYPTION_MAGIC_V1: &[u8; 3] = b"lCA";
pub const ENCRYPTION_MAGIC_V2: &[u8; 3] = b"lCB";
pub const ENCRYPTION_MAGIC_V3: &[u8; 3] = b"lCC";
/// Server UUID length in the encryption info (ASCII, no NUL).
pub const ENCRYPTION_SERVER_UUID_LEN: usize = 36;
/// Total encryption info size: magic(3) + key id(4) + uuid(36) +
/// wrapped key+iv(64) + checksum(4).
pub const ENCRYPTION_INFO_SIZE: usize = 111;
/// Wrapped tablespace key (32) + IV (32).
pub const ENCRYPTION_KEY_LEN: usize = 32;

// ── Insert direction values ─────────────────────────────────────────

pub const PAGE_LEFT: u16 = 1;
pub const PAGE_RIGHT: u16 = 2;
pub const PAGE_SAME_REC: u16 = 3;
pub const PAGE_SAME_PAGE: u16 = 4;
pub const PAGE_NO_DIRECTION: u16 = 5;
