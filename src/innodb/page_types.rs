//! InnoDB page type definitions.
//!
//! Maps the 2-byte page type field (bytes 24-25 of the FIL header) to a
//! [`PageType`] enum. Covers the MySQL 8 page types this tool works with:
//! INDEX (17855), RTREE (17854), SDI (17853), the LOB/ZLOB families,
//! SDI BLOB pages, and the encrypted page markers.

use serde::Serialize;
use std::fmt;

/// InnoDB page types from MySQL 8 `fil0fil.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PageType {
    /// Freshly allocated, type field not initialized (0)
    Allocated,
    /// Undo log page (2)
    UndoLog,
    /// File segment inode (3)
    Inode,
    /// Insert buffer free list (4)
    IbufFreeList,
    /// Insert buffer bitmap (5)
    IbufBitmap,
    /// System internal page (6)
    Sys,
    /// Transaction system header (7)
    TrxSys,
    /// File space header, page 0 of each tablespace (8)
    FspHdr,
    /// Extent descriptor (9)
    Xdes,
    /// Uncompressed BLOB page (10)
    Blob,
    /// First compressed BLOB page (11)
    ZBlob,
    /// Subsequent compressed BLOB page (12)
    ZBlob2,
    /// Unknown/reserved (13)
    Unknown,
    /// Compressed page (14)
    Compressed,
    /// Encrypted page (15)
    Encrypted,
    /// Compressed and encrypted page (16)
    CompressedEncrypted,
    /// Encrypted R-tree page (17)
    EncryptedRtree,
    /// Uncompressed SDI BLOB page (18)
    SdiBlob,
    /// Compressed SDI BLOB page (19)
    SdiZblob,
    /// Legacy doublewrite buffer page (20)
    LegacyDblwr,
    /// Rollback segment array page (21)
    RsegArray,
    /// LOB index page (22)
    LobIndex,
    /// LOB data page (23)
    LobData,
    /// LOB first page (24)
    LobFirst,
    /// First page of a compressed LOB (25)
    ZlobFirst,
    /// Data page of a compressed LOB (26)
    ZlobData,
    /// Index page of a compressed LOB (27)
    ZlobIndex,
    /// Fragment page of a compressed LOB (28)
    ZlobFrag,
    /// Fragment entry index of a compressed LOB (29)
    ZlobFragEntry,
    /// SDI index page (17853)
    Sdi,
    /// R-tree index page for spatial indexes (17854)
    Rtree,
    /// B+Tree index page (17855)
    Index,
}

impl PageType {
    /// Parse a page type from the u16 value in the FIL header.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => PageType::Allocated,
            2 => PageType::UndoLog,
            3 => PageType::Inode,
            4 => PageType::IbufFreeList,
            5 => PageType::IbufBitmap,
            6 => PageType::Sys,
            7 => PageType::TrxSys,
            8 => PageType::FspHdr,
            9 => PageType::Xdes,
            10 => PageType::Blob,
            11 => PageType::ZBlob,
            12 => PageType::ZBlob2,
            14 => PageType::Compressed,
            15 => PageType::Encrypted,
            16 => PageType::CompressedEncrypted,
            17 => PageType::EncryptedRtree,
            18 => PageType::SdiBlob,
            19 => PageType::SdiZblob,
            20 => PageType::LegacyDblwr,
            21 => PageType::RsegArray,
            22 => PageType::LobIndex,
            23 => PageType::LobData,
            24 => PageType::LobFirst,
            25 => PageType::ZlobFirst,
            26 => PageType::ZlobData,
            27 => PageType::ZlobIndex,
            28 => PageType::ZlobFrag,
            29 => PageType::ZlobFragEntry,
            17853 => PageType::Sdi,
            17854 => PageType::Rtree,
            17855 => PageType::Index,
            _ => PageType::Unknown,
        }
    }

    /// Returns the raw u16 value of this page type.
    pub fn as_u16(self) -> u16 {
        match self {
            PageType::Allocated => 0,
            PageType::UndoLog => 2,
            PageType::Inode => 3,
            PageType::IbufFreeList => 4,
            PageType::IbufBitmap => 5,
            PageType::Sys => 6,
            PageType::TrxSys => 7,
            PageType::FspHdr => 8,
            PageType::Xdes => 9,
            PageType::Blob => 10,
            PageType::ZBlob => 11,
            PageType::ZBlob2 => 12,
            PageType::Unknown => 13,
            PageType::Compressed => 14,
            PageType::Encrypted => 15,
            PageType::CompressedEncrypted => 16,
            PageType::EncryptedRtree => 17,
            PageType::SdiBlob => 18,
            PageType::SdiZblob => 19,
            PageType::LegacyDblwr => 20,
            PageType::RsegArray => 21,
            PageType::LobIndex => 22,
            PageType::LobData => 23,
            PageType::LobFirst => 24,
            PageType::ZlobFirst => 25,
            PageType::ZlobData => 26,
            PageType::ZlobIndex => 27,
            PageType::ZlobFrag => 28,
            PageType::ZlobFragEntry => 29,
            PageType::Sdi => 17853,
            PageType::Rtree => 17854,
            PageType::Index => 17855,
        }
    }

    /// MySQL source-style name.
    pub fn name(self) -> &'static str {
        match self {
            PageType::Allocated => "ALLOCATED",
            PageType::UndoLog => "UNDO_LOG",
            PageType::Inode => "INODE",
            PageType::IbufFreeList => "IBUF_FREE_LIST",
            PageType::IbufBitmap => "IBUF_BITMAP",
            PageType::Sys => "SYS",
            PageType::TrxSys => "TRX_SYS",
            PageType::FspHdr => "FSP_HDR",
            PageType::Xdes => "XDES",
            PageType::Blob => "BLOB",
            PageType::ZBlob => "ZBLOB",
            PageType::ZBlob2 => "ZBLOB2",
            PageType::Unknown => "UNKNOWN",
            PageType::Compressed => "COMPRESSED",
            PageType::Encrypted => "ENCRYPTED",
            PageType::CompressedEncrypted => "COMPRESSED_ENCRYPTED",
            PageType::EncryptedRtree => "ENCRYPTED_RTREE",
            PageType::SdiBlob => "SDI_BLOB",
            PageType::SdiZblob => "SDI_ZBLOB",
            PageType::LegacyDblwr => "LEGACY_DBLWR",
            PageType::RsegArray => "RSEG_ARRAY",
            PageType::LobIndex => "LOB_INDEX",
            PageType::LobData => "LOB_DATA",
            PageType::LobFirst => "LOB_FIRST",
            PageType::ZlobFirst => "ZLOB_FIRST",
            PageType::ZlobData => "ZLOB_DATA",
            PageType::ZlobIndex => "ZLOB_INDEX",
            PageType::ZlobFrag => "ZLOB_FRAG",
            PageType::ZlobFragEntry => "ZLOB_FRAG_ENTRY",
            PageType::Sdi => "SDI",
            PageType::Rtree => "RTREE",
            PageType::Index => "INDEX",
        }
    }

    /// True for the page types that carry zlib-compressed payload in a
    /// compressed tablespace (everything else is stored as-is).
    pub fn is_compressible(self) -> bool {
        matches!(self, PageType::Index | PageType::Rtree | PageType::Sdi)
    }

    /// True for the encrypted page type markers.
    pub fn is_encrypted_marker(self) -> bool {
        matches!(
            self,
            PageType::Encrypted | PageType::CompressedEncrypted | PageType::EncryptedRtree
        )
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
