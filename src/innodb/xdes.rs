//! Extent descriptor (XDES) lookups.
//!
//! Every extent of a tablespace is described by a 40-byte XDES entry on the
//! nearest descriptor page (page 0, then every `page_size`-th page). Two
//! bits per page in the entry's bitmap track the free and clean states.
//! The parser uses the free bit to skip pages an extent has not handed out.

use byteorder::{BigEndian, ByteOrder};

use crate::innodb::constants::*;
use crate::innodb::tablespace::Tablespace;
use crate::IbdError;

/// Pages per extent for a given physical page size.
pub fn pages_per_extent(physical_size: usize) -> usize {
    if physical_size <= 16384 {
        1048576 / physical_size
    } else {
        64
    }
}

/// Cache of the most recently read descriptor page.
pub struct XdesCache {
    descriptor_page_no: Option<u64>,
    page: Vec<u8>,
}

impl XdesCache {
    pub fn new() -> Self {
        XdesCache {
            descriptor_page_no: None,
            page: Vec::new(),
        }
    }

    /// Is `page_no` marked free in its extent descriptor?
    ///
    /// Pages whose extent has no initialized descriptor are reported as
    /// in use, so a missing descriptor never hides data.
    pub fn is_page_free(
        &mut self,
        ts: &mut Tablespace,
        page_no: u64,
    ) -> Result<bool, IbdError> {
        let physical = ts.physical_size();
        let extent_pages = pages_per_extent(physical) as u64;
        // One descriptor page covers `physical` pages.
        let descriptor_page = (page_no / physical as u64) * physical as u64;

        if self.descriptor_page_no != Some(descriptor_page) {
            if descriptor_page >= ts.page_count() {
                return Ok(false);
            }
            self.page = ts.read_page(descriptor_page)?;
            self.descriptor_page_no = Some(descriptor_page);
        }

        let entry_index = ((page_no - descriptor_page) / extent_pages) as usize;
        let entry = FIL_PAGE_DATA + FSP_HEADER_SIZE + entry_index * XDES_SIZE;
        if entry + XDES_SIZE > self.page.len() {
            return Ok(false);
        }

        // An unallocated descriptor (state 0) says nothing about its pages.
        let state = BigEndian::read_u32(&self.page[entry + XDES_STATE..]);
        if state == 0 {
            return Ok(false);
        }

        let page_in_extent = ((page_no - descriptor_page) % extent_pages) as usize;
        let bit_index = page_in_extent * XDES_BITS_PER_PAGE + XDES_FREE_BIT;
        let byte = self.page[entry + XDES_BITMAP + bit_index / 8];
        Ok(byte & (1 << (bit_index % 8)) != 0)
    }
}

impl Default for XdesCache {
    fn default() -> Self {
        Self::new()
    }
}
