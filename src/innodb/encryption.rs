//! Tablespace encryption info parsing.
//!
//! An encrypted tablespace embeds its wrapped key material on page 0, after
//! the XDES array: a 3-byte magic (`lCA`/`lCB`/`lCC` for versions 1-3), the
//! master key ID, the 36-character server UUID, the AES-256-ECB-wrapped
//! tablespace key+IV (64 bytes), and a CRC-32C over the plaintext key+IV.
//!
//! The byte offset of this block depends on the page size, and the server's
//! own reader locates it by checking for the magic rather than deriving the
//! offset. We do the same: probe the offsets implied by the known page sizes
//! first, then fall back to a bounded scan of page 0.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::innodb::constants::*;
use crate::IbdError;

/// Parsed encryption info from page 0 of an encrypted tablespace.
#[derive(Debug, Clone, Serialize)]
pub struct EncryptionInfo {
    /// Encryption info version (1 = `lCA`, 2 = `lCB`, 3 = `lCC`).
    pub magic_version: u8,
    /// Master key ID for the keyring lookup.
    pub master_key_id: u32,
    /// Server UUID (36 ASCII characters).
    pub server_uuid: String,
    /// AES-256-ECB-wrapped tablespace key (32) + IV (32).
    #[serde(skip)]
    pub encrypted_key_iv: [u8; 64],
    /// CRC-32C of the plaintext key+IV.
    pub checksum: u32,
    /// Byte offset of the info block within page 0.
    pub offset: usize,
}

/// Number of pages per extent for a given physical page size.
fn pages_per_extent(page_size: usize) -> usize {
    if page_size <= 16384 {
        1048576 / page_size
    } else {
        64
    }
}

/// Number of XDES entries on page 0 for a given physical page size.
fn xdes_arr_size(page_size: usize) -> usize {
    page_size / pages_per_extent(page_size)
}

/// The offset page-size `s` would place the encryption info at:
/// FIL header + FSP header + XDES array.
pub fn encryption_info_offset(page_size: usize) -> usize {
    FIL_PAGE_DATA + FSP_HEADER_SIZE + xdes_arr_size(page_size) * XDES_SIZE
}

fn magic_version_at(page0: &[u8], offset: usize) -> Option<u8> {
    if page0.len() < offset + ENCRYPTION_INFO_SIZE {
        return None;
    }
    let magic: &[u8] = &page0[offset..offset + ENCRYPTION_MAGIC_SIZE];
    if magic == ENCRYPTION_MAGIC_V1 {
        Some(1)
    } else if magic == ENCRYPTION_MAGIC_V2 {
        Some(2)
    } else if magic == ENCRYPTION_MAGIC_V3 {
        Some(3)
    } else {
        None
    }
}

/// Locate the encryption info block on page 0 by its magic.
///
/// Probes the offsets implied by the supported page sizes, then scans the
/// whole page. Returns `(offset, magic_version)`.
fn locate_info(page0: &[u8]) -> Option<(usize, u8)> {
    for ps in [16384usize, 8192, 4096, 2048, 1024, 32768, 65536] {
        let offset = encryption_info_offset(ps);
        if let Some(v) = magic_version_at(page0, offset) {
            return Some((offset, v));
        }
    }

    let end = page0.len().saturating_sub(ENCRYPTION_INFO_SIZE);
    (FIL_PAGE_DATA + FSP_HEADER_SIZE..=end).find_map(|offset| {
        magic_version_at(page0, offset).map(|v| (offset, v))
    })
}

/// Parse the encryption info from a page-0 buffer.
///
/// Returns `Ok(None)` when page 0 carries no encryption magic at all, and
/// `InvalidEncryptionHeader` when a magic is present but the block is
/// malformed.
pub fn parse_encryption_info(page0: &[u8]) -> Result<Option<EncryptionInfo>, IbdError> {
    let Some((offset, magic_version)) = locate_info(page0) else {
        return Ok(None);
    };

    let master_key_id = BigEndian::read_u32(&page0[offset + 3..]);
    let uuid_bytes = &page0[offset + 7..offset + 7 + ENCRYPTION_SERVER_UUID_LEN];
    if !uuid_bytes.iter().all(|b| b.is_ascii_graphic()) {
        return Err(IbdError::InvalidEncryptionHeader(format!(
            "server UUID at offset {} is not printable ASCII",
            offset + 7
        )));
    }
    let server_uuid = String::from_utf8_lossy(uuid_bytes).to_string();

    let mut encrypted_key_iv = [0u8; 64];
    encrypted_key_iv.copy_from_slice(&page0[offset + 43..offset + 43 + 64]);
    let checksum = BigEndian::read_u32(&page0[offset + 107..]);

    Ok(Some(EncryptionInfo {
        magic_version,
        master_key_id,
        server_uuid,
        encrypted_key_iv,
        checksum,
        offset,
    }))
}
