//! Per-page AES-256-CBC decryption.
//!
//! [`DecryptionContext`] holds the plaintext tablespace key and IV recovered
//! from the page-0 encryption info and the keyring master key. Pages whose
//! type is one of the encrypted markers (15, 16, 17) are decrypted in place
//! over the data region `[38, page_size - 8)`; the FIL header and trailer are
//! never ciphered. MySQL saves the original page type at byte 26 before
//! encrypting, so decryption restores it from there.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyInit, KeyIvInit};
use aes::Aes256;
use byteorder::{BigEndian, ByteOrder};

use crate::innodb::constants::*;
use crate::innodb::encryption::EncryptionInfo;
use crate::innodb::keyring::Keyring;
use crate::innodb::page_types::PageType;
use crate::IbdError;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

const AES_BLOCK_SIZE: usize = 16;

/// Plaintext tablespace key and IV for page decryption.
pub struct DecryptionContext {
    tablespace_key: [u8; 32],
    tablespace_iv: [u8; 32],
}

impl DecryptionContext {
    /// Build a context from parsed encryption info and a loaded keyring,
    /// using the uuid and key id the info block names.
    pub fn from_encryption_info(
        info: &EncryptionInfo,
        keyring: &Keyring,
    ) -> Result<Self, IbdError> {
        let master_key = keyring.master_key(&info.server_uuid, info.master_key_id)?;
        Self::from_master_key(master_key, info)
    }

    /// Build a context from an already-fetched master key.
    ///
    /// Unwraps the key+IV with AES-256-ECB under the master key, then
    /// verifies the embedded CRC-32C over the plaintext.
    pub fn from_master_key(master_key: &[u8], info: &EncryptionInfo) -> Result<Self, IbdError> {
        let mut decrypted = info.encrypted_key_iv;
        let decryptor = Aes256EcbDec::new_from_slice(master_key)
            .map_err(|e| IbdError::DecryptionFailed(format!("AES-256-ECB init: {}", e)))?;
        decryptor
            .decrypt_padded_mut::<NoPadding>(&mut decrypted)
            .map_err(|e| IbdError::DecryptionFailed(format!("AES-256-ECB decrypt: {}", e)))?;

        let computed_crc = crc32c::crc32c(&decrypted);
        if computed_crc != info.checksum {
            return Err(IbdError::InvalidEncryptionHeader(format!(
                "tablespace key checksum mismatch (computed=0x{:08X}, stored=0x{:08X}); \
                 wrong keyring?",
                computed_crc, info.checksum
            )));
        }

        let mut tablespace_key = [0u8; 32];
        let mut tablespace_iv = [0u8; 32];
        tablespace_key.copy_from_slice(&decrypted[..32]);
        tablespace_iv.copy_from_slice(&decrypted[32..64]);

        Ok(DecryptionContext {
            tablespace_key,
            tablespace_iv,
        })
    }

    /// Build a context directly from key material (tests, tooling).
    pub fn from_key_iv(key: [u8; 32], iv: [u8; 32]) -> Self {
        DecryptionContext {
            tablespace_key: key,
            tablespace_iv: iv,
        }
    }

    /// Decrypt one page in place.
    ///
    /// Returns `Ok(true)` if the page carried an encrypted page type and was
    /// decrypted, `Ok(false)` if it needed no decryption. The original page
    /// type is restored into the FIL header.
    pub fn decrypt_page(&self, page: &mut [u8], page_size: usize) -> Result<bool, IbdError> {
        if page.len() < page_size {
            return Err(IbdError::DecryptionFailed(
                "page buffer shorter than page size".to_string(),
            ));
        }

        let page_type = PageType::from_u16(BigEndian::read_u16(&page[FIL_PAGE_TYPE..]));
        if !page_type.is_encrypted_marker() {
            return Ok(false);
        }

        let original_type = BigEndian::read_u16(&page[FIL_PAGE_ORIGINAL_TYPE_V1..]);

        let start = FIL_PAGE_DATA;
        let end = page_size - FIL_PAGE_DATA_END;
        let body_len = end - start;
        if body_len < AES_BLOCK_SIZE {
            return Err(IbdError::DecryptionFailed(
                "page body too small for AES".to_string(),
            ));
        }

        // The cipher covers whole blocks only; the unaligned tail (2 bytes on
        // a 16 KiB page) is stored in the clear.
        let main_len = (body_len / AES_BLOCK_SIZE) * AES_BLOCK_SIZE;
        let iv: [u8; 16] = self.tablespace_iv[..16].try_into().unwrap();

        let decryptor = Aes256CbcDec::new_from_slices(&self.tablespace_key, &iv)
            .map_err(|e| IbdError::DecryptionFailed(format!("AES-256-CBC init: {}", e)))?;
        decryptor
            .decrypt_padded_mut::<NoPadding>(&mut page[start..start + main_len])
            .map_err(|e| IbdError::DecryptionFailed(format!("AES-256-CBC decrypt: {}", e)))?;

        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], original_type);
        // Byte 26 held the saved type; clear it back to the flush-LSN default.
        BigEndian::write_u16(&mut page[FIL_PAGE_ORIGINAL_TYPE_V1..], 0);

        Ok(true)
    }

    /// True if the buffer's page type is an encrypted marker.
    pub fn is_encrypted_page(page: &[u8]) -> bool {
        if page.len() < FIL_PAGE_DATA {
            return false;
        }
        PageType::from_u16(BigEndian::read_u16(&page[FIL_PAGE_TYPE..])).is_encrypted_marker()
    }
}
