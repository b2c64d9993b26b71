//! Page geometry derived from FSP space flags.
//!
//! The first kilobyte of a tablespace is enough to learn both page sizes:
//! PAGE_SSIZE in the FSP flags encodes the logical (uncompressed) size and
//! ZIP_SSIZE the physical (on-disk) size. A zero PAGE_SSIZE means the
//! classic 16 KiB default; a zero ZIP_SSIZE means the tablespace is not
//! compressed and physical == logical.

use crate::innodb::constants::*;
use crate::innodb::page::FspHeader;
use crate::IbdError;

/// Logical and physical page sizes of a tablespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    /// Uncompressed page size (4096..=65536).
    pub logical: usize,
    /// On-disk page size; equals `logical` unless the space is compressed.
    pub physical: usize,
}

impl PageGeometry {
    /// Derive and validate the geometry from raw FSP flags.
    ///
    /// Validation rules:
    /// - bits above FSP_FLAGS_POS_UNUSED must be zero
    /// - PAGE_SSIZE must be 0 or in 3..=7 (4 KiB..64 KiB)
    /// - ZIP_SSIZE must be 0 or in 1..=5 (1 KiB..16 KiB), and the physical
    ///   size it encodes must not exceed the logical size
    pub fn from_flags(flags: u32) -> Result<Self, IbdError> {
        if flags >> FSP_FLAGS_POS_UNUSED != 0 {
            return Err(IbdError::InvalidFspFlags(format!(
                "reserved bits set in flags 0x{:08x}",
                flags
            )));
        }

        let page_ssize = (flags & FSP_FLAGS_MASK_PAGE_SSIZE) >> FSP_FLAGS_POS_PAGE_SSIZE;
        let zip_ssize = (flags & FSP_FLAGS_MASK_ZIP_SSIZE) >> FSP_FLAGS_POS_ZIP_SSIZE;

        let logical = match page_ssize {
            0 => UNIV_PAGE_SIZE,
            3..=7 => (UNIV_ZIP_SIZE_MIN >> 1) << page_ssize,
            _ => {
                return Err(IbdError::InvalidFspFlags(format!(
                    "PAGE_SSIZE {} out of domain",
                    page_ssize
                )))
            }
        };

        let physical = match zip_ssize {
            0 => logical,
            1..=5 => (UNIV_ZIP_SIZE_MIN >> 1) << zip_ssize,
            _ => {
                return Err(IbdError::InvalidFspFlags(format!(
                    "ZIP_SSIZE {} out of domain",
                    zip_ssize
                )))
            }
        };

        if physical > logical {
            return Err(IbdError::InvalidFspFlags(format!(
                "physical size {} exceeds logical size {}",
                physical, logical
            )));
        }

        Ok(PageGeometry { logical, physical })
    }

    /// Derive the geometry from a parsed page-0 FSP header.
    pub fn from_fsp(fsp: &FspHeader) -> Result<Self, IbdError> {
        Self::from_flags(fsp.flags)
    }

    /// True if the tablespace stores pages smaller than the logical size.
    pub fn is_compressed(&self) -> bool {
        self.physical < self.logical
    }

    /// Geometry of a plain uncompressed 16 KiB tablespace.
    pub fn uncompressed() -> Self {
        PageGeometry {
            logical: UNIV_PAGE_SIZE,
            physical: UNIV_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let g = PageGeometry::from_flags(0).unwrap();
        assert_eq!(g.logical, 16384);
        assert_eq!(g.physical, 16384);
        assert!(!g.is_compressed());
    }

    #[test]
    fn test_compressed_8k() {
        // zip_ssize=4 (8 KiB physical), page_ssize=0 (16 KiB logical)
        let flags = 4 << FSP_FLAGS_POS_ZIP_SSIZE;
        let g = PageGeometry::from_flags(flags).unwrap();
        assert_eq!(g.logical, 16384);
        assert_eq!(g.physical, 8192);
        assert!(g.is_compressed());
    }

    #[test]
    fn test_explicit_page_ssize() {
        // page_ssize=5 encodes 16 KiB
        let flags = 5 << FSP_FLAGS_POS_PAGE_SSIZE;
        let g = PageGeometry::from_flags(flags).unwrap();
        assert_eq!(g.logical, 16384);

        // page_ssize=3 encodes 4 KiB
        let flags = 3 << FSP_FLAGS_POS_PAGE_SSIZE;
        let g = PageGeometry::from_flags(flags).unwrap();
        assert_eq!(g.logical, 4096);
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let flags = 1 << 20;
        assert!(matches!(
            PageGeometry::from_flags(flags),
            Err(IbdError::InvalidFspFlags(_))
        ));
    }

    #[test]
    fn test_bad_ssize_rejected() {
        // page_ssize=2 encodes 2 KiB, below the 4 KiB floor
        let flags = 2 << FSP_FLAGS_POS_PAGE_SSIZE;
        assert!(PageGeometry::from_flags(flags).is_err());

        // zip_ssize=7 is out of domain
        let flags = 7 << FSP_FLAGS_POS_ZIP_SSIZE;
        assert!(PageGeometry::from_flags(flags).is_err());
    }

    #[test]
    fn test_physical_larger_than_logical_rejected() {
        // logical 4 KiB with zip_ssize=5 (16 KiB physical)
        let flags = (3 << FSP_FLAGS_POS_PAGE_SSIZE) | (5 << FSP_FLAGS_POS_ZIP_SSIZE);
        assert!(PageGeometry::from_flags(flags).is_err());
    }
}
