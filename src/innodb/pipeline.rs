//! The page-streaming driver.
//!
//! A [`Pipeline`] is built per run and owns everything a pass over a
//! tablespace needs: the open file and its geometry, an optional decryption
//! context, and the transform switches. Pages stream sequentially;
//! decryption always runs before decompression; output pages are appended
//! in input order, so the memory footprint stays at a couple of pages.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, info, warn};

use crate::innodb::checksum::{stamp_page, validate_checksum};
use crate::innodb::compression::decompress_page;
use crate::innodb::constants::*;
use crate::innodb::decryption::DecryptionContext;
use crate::innodb::encryption::parse_encryption_info;
use crate::innodb::keyring::Keyring;
use crate::innodb::page::FilHeader;
use crate::innodb::tablespace::Tablespace;
use crate::IbdError;

/// Which transformations a [`Pipeline::run_to_file`] pass applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    pub decrypt: bool,
    pub decompress: bool,
}

/// Counters reported after a pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformStats {
    pub pages: u64,
    pub decrypted: u64,
    pub decompressed: u64,
    pub checksum_warnings: u64,
}

/// Per-run processing state.
pub struct Pipeline {
    ts: Tablespace,
    decrypt_ctx: Option<DecryptionContext>,
}

impl Pipeline {
    /// Open a tablespace for processing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IbdError> {
        Ok(Pipeline {
            ts: Tablespace::open(path)?,
            decrypt_ctx: None,
        })
    }

    /// Attach a decryption context built from the keyring and the
    /// encryption info on page 0, looked up by the caller-supplied
    /// `(server_uuid, master_key_id)` pair.
    pub fn with_keyring(
        mut self,
        keyring: &Keyring,
        server_uuid: &str,
        master_key_id: u32,
    ) -> Result<Self, IbdError> {
        let page0 = self.ts.read_page(0)?;
        let info = parse_encryption_info(&page0)?.ok_or_else(|| {
            IbdError::InvalidEncryptionHeader(
                "page 0 carries no encryption info".to_string(),
            )
        })?;
        if info.server_uuid != server_uuid {
            warn!(
                embedded = %info.server_uuid,
                given = %server_uuid,
                "server UUID mismatch between page 0 and arguments"
            );
        }
        let master_key = keyring.master_key(server_uuid, master_key_id)?;
        self.decrypt_ctx = Some(DecryptionContext::from_master_key(master_key, &info)?);
        Ok(self)
    }

    /// The underlying tablespace.
    pub fn tablespace(&mut self) -> &mut Tablespace {
        &mut self.ts
    }

    /// Stream every page through the configured transforms into `out_path`.
    pub fn run_to_file<P: AsRef<Path>>(
        &mut self,
        out_path: P,
        opts: TransformOptions,
    ) -> Result<TransformStats, IbdError> {
        let out_path = out_path.as_ref();
        let file = File::create(out_path)
            .map_err(|e| IbdError::Io(format!("cannot create {}: {}", out_path.display(), e)))?;
        let mut out = BufWriter::new(file);

        let geometry = self.ts.geometry();
        let physical = geometry.physical;
        let page_count = self.ts.page_count();
        let mut stats = TransformStats::default();

        for page_no in 0..page_count {
            let mut page = self.ts.read_page(page_no)?;

            if let Some(header) = FilHeader::parse(&page) {
                if header.page_number as u64 != page_no && header.lsn != 0 {
                    warn!(
                        expected = page_no,
                        stored = header.page_number,
                        "page number differs from its file position"
                    );
                }
            }

            if !validate_checksum(&page, physical) {
                stats.checksum_warnings += 1;
                warn!(page = page_no, "stored checksum does not match the page");
            }

            if opts.decrypt {
                let ctx = self.decrypt_ctx.as_ref().ok_or_else(|| {
                    IbdError::DecryptionFailed("no decryption context".to_string())
                })?;
                if ctx.decrypt_page(&mut page, physical)? {
                    stats.decrypted += 1;
                    let lsn = BigEndian::read_u64(&page[FIL_PAGE_LSN..]);
                    stamp_page(&mut page, physical, lsn);
                }
                if page_no == 0 {
                    scrub_encryption_info(&mut page, physical);
                }
            }

            if opts.decompress {
                let logical_page = decompress_page(&page, geometry)?;
                if logical_page.len() != page.len() {
                    stats.decompressed += 1;
                }
                page = logical_page;
            }

            out.write_all(&page)
                .map_err(|e| IbdError::Io(format!("cannot write page {}: {}", page_no, e)))?;
            stats.pages += 1;
            debug!(page = page_no, "page written");
        }

        out.flush()
            .map_err(|e| IbdError::Io(format!("cannot flush {}: {}", out_path.display(), e)))?;
        info!(
            pages = stats.pages,
            decrypted = stats.decrypted,
            decompressed = stats.decompressed,
            "pass complete"
        );
        Ok(stats)
    }
}

/// Remove the encryption traces from a decrypted page 0: clear the FSP
/// encryption flag, zero the key info block, restamp.
fn scrub_encryption_info(page0: &mut [u8], physical: usize) {
    let flags_at = FIL_PAGE_DATA + FSP_SPACE_FLAGS;
    let flags = BigEndian::read_u32(&page0[flags_at..]);
    BigEndian::write_u32(&mut page0[flags_at..], flags & !FSP_FLAGS_MASK_ENCRYPTION);

    if let Ok(Some(info)) = parse_encryption_info(page0) {
        let end = (info.offset + ENCRYPTION_INFO_SIZE).min(page0.len());
        page0[info.offset..end].fill(0);
    }

    let lsn = BigEndian::read_u64(&page0[FIL_PAGE_LSN..]);
    stamp_page(page0, physical, lsn);
}
