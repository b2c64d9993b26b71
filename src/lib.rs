//! Offline InnoDB tablespace processor.
//!
//! The `ibd-processor` crate (library name `ibdp`) reads single-table `.ibd`
//! files produced by MySQL 8 / Percona Server and transforms them without ever
//! touching a running server: AES decryption against a Percona keyring,
//! zlib decompression of ROW_FORMAT=COMPRESSED pages, row extraction driven by
//! SDI metadata, and a full rebuild to a physically uncompressed tablespace
//! with a matching `.cfg` for `ALTER TABLE ... IMPORT TABLESPACE`.
//!
//! # CLI
//!
//! The `ibdp` binary exposes five modes (numeric aliases kept for
//! compatibility with the original tool):
//!
//! | Mode | Command | Purpose |
//! |------|---------|---------|
//! | 1 | `ibdp decrypt` | Decrypt a tablespace using a keyring file |
//! | 2 | `ibdp decompress` | Inflate compressed INDEX/RTREE/SDI pages |
//! | 3 | `ibdp parse` | Decode rows from a chosen index to pipe/CSV/JSONL |
//! | 4 | `ibdp decrypt-decompress` | Both transformations in one pass |
//! | 5 | `ibdp rebuild` | Produce an importable 16 KB-page tablespace + `.cfg` |
//!
//! # Library API
//!
//! ```no_run
//! use ibdp::innodb::tablespace::Tablespace;
//! use ibdp::innodb::page::FilHeader;
//!
//! let mut ts = Tablespace::open("table.ibd").unwrap();
//! let page = ts.read_page(0).unwrap();
//! let header = FilHeader::parse(&page).unwrap();
//! println!("space {} page type {}", header.space_id, header.page_type);
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`innodb::tablespace`] | File I/O, geometry detection, page iteration |
//! | [`innodb::geometry`] | FSP flag validation, logical/physical page sizes |
//! | [`innodb::page`] | FIL header/trailer, FSP header parsing |
//! | [`innodb::checksum`] | CRC-32C page checksums and stamping |
//! | [`innodb::keyring`] | Percona `keyring_file` binary format reader |
//! | [`innodb::encryption`] | Tablespace encryption info from page 0 |
//! | [`innodb::decryption`] | AES-256-CBC page decryption |
//! | [`innodb::compression`] | Compressed page reconstruction |
//! | [`innodb::schema`] | SDI JSON data-dictionary model |
//! | [`innodb::sdi`] | SDI extraction from the tablespace itself |
//! | [`innodb::record`] | Compact record offsets and chain walking |
//! | [`innodb::field_decode`] | Typed column value rendering |
//! | [`innodb::lob`] | External BLOB/LOB/ZLOB chain reading |
//! | [`innodb::pipeline`] | Per-run page streaming driver |
//! | [`innodb::rebuild`] | Uncompressed tablespace reconstruction |
//! | [`innodb::cfg`] | `IMPORT TABLESPACE` metadata (`.cfg`) writer |

pub mod cli;
pub mod innodb;
pub mod util;

use thiserror::Error;

/// Errors returned by `ibdp` operations.
///
/// Fatal kinds (keyring, encryption header, decryption, decompression of a
/// mandatory page, FSP validation, rebuild preconditions) abort the whole
/// operation. Recoverable kinds (single-record corruption, one unreadable
/// LOB chain) are reported and skipped by the callers that can continue.
#[derive(Error, Debug)]
pub enum IbdError {
    /// File open/read/write/seek failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Page 0 FSP flags failed validation.
    #[error("invalid FSP flags: {0}")]
    InvalidFspFlags(String),

    /// The keyring file could not be parsed.
    #[error("keyring file malformed: {0}")]
    KeyringMalformed(String),

    /// The requested master key is not present in the keyring.
    #[error("master key not found: {0}")]
    KeyNotFound(String),

    /// Magic or checksum mismatch on the tablespace key blob.
    #[error("invalid encryption header: {0}")]
    InvalidEncryptionHeader(String),

    /// The cipher primitive rejected its input.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// zlib error on a page that must decompress (INDEX/SDI).
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// SDI JSON is not an array, misses required fields, or carries
    /// non-numeric id/type values.
    #[error("SDI parse error: {0}")]
    SdiParse(String),

    /// Record offsets run past the page end or a declared field length
    /// bound was violated.
    #[error("record corrupted: {0}")]
    RecordCorrupted(String),

    /// An external LOB chain is unreadable or marked being-modified.
    #[error("LOB unavailable: {0}")]
    LobUnavailable(String),

    /// Rebuild preconditions not met (source not compressed, logical size
    /// not 16384, SDI absent, file size not a page multiple).
    #[error("rebuild impossible: {0}")]
    RebuildImpossible(String),

    /// An invalid argument was supplied.
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl From<std::io::Error> for IbdError {
    fn from(e: std::io::Error) -> Self {
        IbdError::Io(e.to_string())
    }
}
