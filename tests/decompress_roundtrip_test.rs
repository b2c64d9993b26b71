//! Decompress mode: byte-for-byte identity on uncompressed input, mixed
//! page sizes on compressed input.

mod common;

use byteorder::{BigEndian, ByteOrder};
use tempfile::NamedTempFile;

use common::*;
use ibdp::cli::decompress::{execute, DecompressOptions};
use ibdp::innodb::checksum::stamp_page;
use ibdp::innodb::compression::compress_page;
use ibdp::innodb::constants::*;
use ibdp::innodb::page_types::PageType;

fn run_decompress(input: &std::path::Path) -> NamedTempFile {
    let out = NamedTempFile::new().unwrap();
    execute(&DecompressOptions {
        input: input.to_str().unwrap().to_string(),
        output: out.path().to_str().unwrap().to_string(),
    })
    .unwrap();
    out
}

#[test]
fn uncompressed_input_copies_byte_for_byte() {
    let fields = [FieldSpec::fixed(4)];
    let leaf = build_leaf_page(
        1,
        9,
        77,
        &fields,
        &[vec![Cell::Bytes(enc_int(5, 4))]],
        FIL_NULL,
        FIL_NULL,
        &[],
    );
    let pages = vec![fsp_page0(9, 0, 2, PS), leaf];
    let tmp = write_space(&pages);

    let out = run_decompress(tmp.path());
    let original = std::fs::read(tmp.path()).unwrap();
    let written = std::fs::read(out.path()).unwrap();
    assert_eq!(original, written);
}

#[test]
fn decompress_is_idempotent_on_its_own_output() {
    let pages = vec![fsp_page0(9, 0, 1, PS)];
    let tmp = write_space(&pages);

    let once = run_decompress(tmp.path());
    let twice = run_decompress(once.path());
    assert_eq!(
        std::fs::read(once.path()).unwrap(),
        std::fs::read(twice.path()).unwrap()
    );
}

#[test]
fn compressed_input_yields_mixed_page_sizes() {
    let physical = 8192usize;
    let flags = 4 << FSP_FLAGS_POS_ZIP_SSIZE;

    // Logical INDEX page, then its compressed image.
    let logical = build_leaf_page(
        1,
        9,
        77,
        &[FieldSpec::fixed(4)],
        &[vec![Cell::Bytes(enc_int(1, 4))]],
        FIL_NULL,
        FIL_NULL,
        &[],
    );
    let compressed = compress_page(&logical, physical).unwrap();

    // A metadata page stored at the physical size.
    let mut inode = blank_page(2, PageType::Inode, physical);
    stamp_page(&mut inode, physical, 1);

    let pages = vec![fsp_page0(9, flags, 3, physical), compressed, inode.clone()];
    let tmp = write_space(&pages);

    let out = run_decompress(tmp.path());
    let written = std::fs::read(out.path()).unwrap();

    // physical (page 0) + logical (INDEX) + physical (INODE)
    assert_eq!(written.len(), physical + PS + physical);
    assert_eq!(&written[physical..physical + PS], &logical[..]);
    assert_eq!(&written[physical + PS..], &inode[..]);

    // The INDEX page sits at a deterministic offset with its logical size
    // and page number intact.
    let idx = &written[physical..physical + PS];
    assert_eq!(BigEndian::read_u32(&idx[FIL_PAGE_OFFSET..]), 1);
    assert_eq!(
        BigEndian::read_u16(&idx[FIL_PAGE_TYPE..]),
        PageType::Index.as_u16()
    );
}
