//! InnoDB tablespace file I/O.
//!
//! [`Tablespace`] opens a `.ibd` file, derives its [`PageGeometry`] from the
//! FSP flags on page 0, and reads pages at the physical (on-disk) size.
//! A compressed tablespace therefore yields `physical`-sized buffers here;
//! inflation to the logical size is the decompressor's job.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::innodb::constants::*;
use crate::innodb::geometry::PageGeometry;
use crate::innodb::page::{FilHeader, FspHeader};
use crate::IbdError;

/// An open InnoDB tablespace file (.ibd).
pub struct Tablespace {
    file: File,
    file_size: u64,
    geometry: PageGeometry,
    page_count: u64,
    fsp_header: FspHeader,
}

impl Tablespace {
    /// Open a tablespace and derive its page geometry from page 0.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IbdError> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| IbdError::Io(format!("cannot open {}: {}", path.display(), e)))?;

        let file_size = file
            .metadata()
            .map_err(|e| IbdError::Io(format!("cannot stat {}: {}", path.display(), e)))?
            .len();

        if file_size < (FIL_PAGE_DATA + FSP_HEADER_SIZE) as u64 {
            return Err(IbdError::Io(format!(
                "{} too small to be a tablespace: {} bytes",
                path.display(),
                file_size
            )));
        }

        // The first kilobyte is enough for the FIL + FSP headers.
        let head_len = std::cmp::min(file_size, 1024) as usize;
        let mut head = vec![0u8; head_len];
        file.read_exact(&mut head)
            .map_err(|e| IbdError::Io(format!("cannot read page 0: {}", e)))?;

        let fsp_header = FspHeader::parse(&head).ok_or_else(|| {
            IbdError::Io(format!("{}: page 0 has no FSP header", path.display()))
        })?;
        let geometry = PageGeometry::from_fsp(&fsp_header)?;

        if file_size % geometry.physical as u64 != 0 {
            return Err(IbdError::Io(format!(
                "{}: file size {} is not a multiple of the {}-byte page size",
                path.display(),
                file_size,
                geometry.physical
            )));
        }

        let page_count = file_size / geometry.physical as u64;

        Ok(Tablespace {
            file,
            file_size,
            geometry,
            page_count,
            fsp_header,
        })
    }

    /// The tablespace's page geometry.
    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// The physical page size in bytes.
    pub fn physical_size(&self) -> usize {
        self.geometry.physical
    }

    /// The logical (uncompressed) page size in bytes.
    pub fn logical_size(&self) -> usize {
        self.geometry.logical
    }

    /// Total number of physical pages in the file.
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// File size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The FSP header from page 0.
    pub fn fsp_header(&self) -> &FspHeader {
        &self.fsp_header
    }

    /// Space ID from the FSP header.
    pub fn space_id(&self) -> u32 {
        self.fsp_header.space_id
    }

    /// Read one physical page into a fresh buffer.
    pub fn read_page(&mut self, page_no: u64) -> Result<Vec<u8>, IbdError> {
        if page_no >= self.page_count {
            return Err(IbdError::Io(format!(
                "page {} out of range ({} pages)",
                page_no, self.page_count
            )));
        }

        let offset = page_no * self.geometry.physical as u64;
        let mut buf = vec![0u8; self.geometry.physical];

        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IbdError::Io(format!("cannot seek to page {}: {}", page_no, e)))?;
        self.file
            .read_exact(&mut buf)
            .map_err(|e| IbdError::Io(format!("cannot read page {}: {}", page_no, e)))?;

        Ok(buf)
    }

    /// Stream every page in order, calling the callback with
    /// `(page_no, page_bytes)`.
    pub fn for_each_page<F>(&mut self, mut callback: F) -> Result<(), IbdError>
    where
        F: FnMut(u64, &[u8]) -> Result<(), IbdError>,
    {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| IbdError::Io(format!("cannot seek to start: {}", e)))?;

        let mut buf = vec![0u8; self.geometry.physical];
        for page_no in 0..self.page_count {
            self.file
                .read_exact(&mut buf)
                .map_err(|e| IbdError::Io(format!("cannot read page {}: {}", page_no, e)))?;
            callback(page_no, &buf)?;
        }
        Ok(())
    }

    /// Parse the FIL header from a page buffer.
    pub fn parse_fil_header(page: &[u8]) -> Option<FilHeader> {
        FilHeader::parse(page)
    }
}
