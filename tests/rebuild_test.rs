//! Rebuild mode: 16 KiB output, SDI reconstruction, index-id remapping,
//! and the generated import metadata.

mod common;

use byteorder::{BigEndian, ByteOrder};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use common::*;
use ibdp::innodb::checksum::{stamp_page, validate_checksum};
use ibdp::innodb::compression::compress_page;
use ibdp::innodb::constants::*;
use ibdp::innodb::page_types::PageType;
use ibdp::innodb::rebuild::{rebuild, RebuildOptions};
use ibdp::innodb::schema::SdiDictionary;
use ibdp::innodb::sdi::{extract_sdi_json, read_sdi_root, sdi_offset};
use ibdp::innodb::tablespace::Tablespace;

const PHYSICAL: usize = 8192;
const SPACE_ID: u32 = 31;
const SRC_PK_ID: u64 = 0x12A;
const DST_PK_ID: u64 = 0x200;

/// A logical page holding only the system records.
fn empty_btree_page(page_no: u32, page_type: PageType, index_id: u64) -> Vec<u8> {
    let mut page = blank_page(page_no, page_type, PS);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], SPACE_ID);

    let inf = PAGE_NEW_INFIMUM - 5;
    page[inf] = 0x01;
    BigEndian::write_u16(&mut page[inf + 1..], REC_STATUS_INFIMUM as u16);
    BigEndian::write_i16(
        &mut page[inf + 3..],
        (PAGE_NEW_SUPREMUM - PAGE_NEW_INFIMUM) as i16,
    );
    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 8].copy_from_slice(b"infimum\0");
    let sup = PAGE_NEW_SUPREMUM - 5;
    page[sup] = 0x01;
    BigEndian::write_u16(&mut page[sup + 1..], (1 << 3) | REC_STATUS_SUPREMUM as u16);
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");

    let base = FIL_PAGE_DATA;
    BigEndian::write_u16(&mut page[base + PAGE_N_DIR_SLOTS..], 2);
    BigEndian::write_u16(&mut page[base + PAGE_HEAP_TOP..], PAGE_NEW_SUPREMUM_END as u16);
    BigEndian::write_u16(&mut page[base + PAGE_N_HEAP..], 0x8002);
    BigEndian::write_u64(&mut page[base + PAGE_INDEX_ID..], index_id);

    let dir0 = PS - PAGE_DIR - PAGE_DIR_SLOT_SIZE;
    BigEndian::write_u16(&mut page[dir0..], PAGE_NEW_INFIMUM as u16);
    let dir1 = PS - PAGE_DIR - 2 * PAGE_DIR_SLOT_SIZE;
    BigEndian::write_u16(&mut page[dir1..], PAGE_NEW_SUPREMUM as u16);

    stamp_page(&mut page, PS, 9);
    page
}

/// The compressed source space: FSP page 0 with SDI root = 3, an empty
/// compressed SDI page at 3, the PRIMARY root at 4.
fn build_source_space() -> NamedTempFile {
    let flags = (4 << FSP_FLAGS_POS_ZIP_SSIZE) | FSP_FLAGS_MASK_SDI;
    let mut p0 = fsp_page0(SPACE_ID, flags, 5, PHYSICAL);
    let at = sdi_offset(PHYSICAL);
    BigEndian::write_u32(&mut p0[at..], SDI_VERSION);
    BigEndian::write_u32(&mut p0[at + 4..], 3);
    stamp_page(&mut p0, PHYSICAL, 1);

    let mut filler1 = blank_page(1, PageType::Inode, PHYSICAL);
    stamp_page(&mut filler1, PHYSICAL, 1);
    let mut filler2 = blank_page(2, PageType::Allocated, PHYSICAL);
    stamp_page(&mut filler2, PHYSICAL, 1);

    let sdi_root = compress_page(&empty_btree_page(3, PageType::Sdi, 0xF0), PHYSICAL).unwrap();
    let pk_root =
        compress_page(&empty_btree_page(4, PageType::Index, SRC_PK_ID), PHYSICAL).unwrap();

    write_space(&[p0, filler1, filler2, sdi_root, pk_root])
}

fn table_sdi(pk_id: u64, filler: Option<&str>) -> Value {
    let mut doc = sdi_doc(
        "r",
        SPACE_ID,
        vec![
            col_json("id", 4, 1, json!({"column_type_utf8": "int"})),
            sys_col_json("DB_TRX_ID", 2),
            sys_col_json("DB_ROLL_PTR", 3),
        ],
        vec![primary_index_json(
            pk_id,
            4,
            SPACE_ID,
            vec![index_element_json(1, 0, false)],
        )],
    );
    if let Some(filler) = filler {
        doc[1]["object"]["dd_object"]["filler"] = Value::String(filler.to_string());
    }
    doc
}

fn run_rebuild(source: &NamedTempFile, opts: RebuildOptions) -> NamedTempFile {
    let out = NamedTempFile::new().unwrap();
    rebuild(source.path(), out.path(), &opts).unwrap();
    out
}

#[test]
fn output_pages_are_16k_with_valid_checksums() {
    let source = build_source_space();
    let sdi = write_sdi_file(&table_sdi(SRC_PK_ID, None));

    let out = run_rebuild(
        &source,
        RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            ..Default::default()
        },
    );

    let bytes = std::fs::read(out.path()).unwrap();
    assert_eq!(bytes.len() % PS, 0);
    let n_pages = bytes.len() / PS;
    assert_eq!(n_pages, 5);

    for no in 0..n_pages {
        let page = &bytes[no * PS..(no + 1) * PS];
        assert!(validate_checksum(page, PS), "page {} checksum", no);

        // The stored value must equal the literal formula
        // CRC(p[4..38]) ^ CRC(p[38..16376]), computed independently here.
        let expected = crc32c::crc32c(&page[4..38]) ^ crc32c::crc32c(&page[38..PS - 8]);
        assert_eq!(
            BigEndian::read_u32(&page[0..4]),
            expected,
            "page {} header checksum",
            no
        );
        assert_eq!(
            BigEndian::read_u32(&page[PS - 8..PS - 4]),
            expected,
            "page {} trailer checksum",
            no
        );

        assert_eq!(BigEndian::read_u32(&page[FIL_PAGE_OFFSET..]), no as u32);
        assert_eq!(BigEndian::read_u64(&page[FIL_PAGE_LSN..]), 0);
    }

    // Page 0: ZIP_SSIZE cleared, SDI flag kept, root pointer migrated.
    let p0 = &bytes[..PS];
    let flags = BigEndian::read_u32(&p0[FIL_PAGE_DATA + FSP_SPACE_FLAGS..]);
    assert_eq!(flags & FSP_FLAGS_MASK_ZIP_SSIZE, 0);
    assert!(flags & FSP_FLAGS_MASK_SDI != 0);
    assert_eq!(read_sdi_root(p0, PS), Some(3));
    // The old 8 KiB-offset slot was cleared.
    let old_at = sdi_offset(PHYSICAL);
    assert!(p0[old_at..old_at + 8].iter().all(|&b| b == 0));
}

#[test]
fn rebuilt_sdi_reextracts_to_the_same_dictionary() {
    let source = build_source_space();
    let doc = table_sdi(SRC_PK_ID, None);
    let sdi = write_sdi_file(&doc);

    let out = run_rebuild(
        &source,
        RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            ..Default::default()
        },
    );

    let mut ts = Tablespace::open(out.path()).unwrap();
    assert_eq!(ts.physical_size(), PS);
    let extracted = SdiDictionary::from_records(extract_sdi_json(&mut ts).unwrap()).unwrap();
    let expected = SdiDictionary::from_value(doc).unwrap();

    assert_eq!(extracted.entries.len(), expected.entries.len());
    for (got, want) in extracted
        .sorted_entries()
        .iter()
        .zip(expected.sorted_entries())
    {
        assert_eq!(got.entry_type, want.entry_type);
        assert_eq!(got.id, want.id);
        assert_eq!(got.object, want.object);
    }
}

#[test]
fn oversized_sdi_entry_goes_external_and_reassembles() {
    let source = build_source_space();

    // Incompressible filler so the deflated payload exceeds the inline
    // bound and must spill into SDI BLOB pages.
    let mut x: u32 = 0x2545F491;
    let filler: String = (0..80_000)
        .map(|_| {
            x = x.wrapping_mul(1664525).wrapping_add(1013904223);
            char::from_digit((x >> 28) as u32 % 16, 16).unwrap()
        })
        .collect();
    let doc = table_sdi(SRC_PK_ID, Some(&filler));
    let sdi = write_sdi_file(&doc);

    let out = NamedTempFile::new().unwrap();
    let stats = rebuild(
        source.path(),
        out.path(),
        &RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(stats.sdi_blob_pages > 0, "entry should have gone external");

    let mut ts = Tablespace::open(out.path()).unwrap();
    let extracted = SdiDictionary::from_records(extract_sdi_json(&mut ts).unwrap()).unwrap();
    let expected = SdiDictionary::from_value(doc).unwrap();
    let got = &extracted.sorted_entries()[0].object;
    let want = &expected.sorted_entries()[0].object;
    assert_eq!(got, want);
}

#[test]
fn index_ids_remapped_from_target_sdi() {
    let source = build_source_space();
    let sdi = write_sdi_file(&table_sdi(SRC_PK_ID, None));
    let target = write_sdi_file(&table_sdi(DST_PK_ID, None));

    let out = NamedTempFile::new().unwrap();
    let stats = rebuild(
        source.path(),
        out.path(),
        &RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            target_sdi_json: Some(target.path().to_path_buf()),
            validate_remap: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(stats.remapped_pages, 1);

    let bytes = std::fs::read(out.path()).unwrap();
    let page4 = &bytes[4 * PS..5 * PS];
    assert_eq!(
        BigEndian::read_u16(&page4[FIL_PAGE_TYPE..]),
        PageType::Index.as_u16()
    );
    let id_bytes = &page4[FIL_PAGE_DATA + PAGE_INDEX_ID..FIL_PAGE_DATA + PAGE_INDEX_ID + 8];
    assert_eq!(id_bytes, &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
}

#[test]
fn index_ids_remapped_from_map_file() {
    let source = build_source_space();
    let sdi = write_sdi_file(&table_sdi(SRC_PK_ID, None));

    let map = NamedTempFile::new().unwrap();
    std::fs::write(map.path(), format!("# remap\n{}={}\n", SRC_PK_ID, DST_PK_ID)).unwrap();

    let out = NamedTempFile::new().unwrap();
    let stats = rebuild(
        source.path(),
        out.path(),
        &RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            index_id_map: Some(map.path().to_path_buf()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(stats.remapped_pages, 1);

    let bytes = std::fs::read(out.path()).unwrap();
    let page4 = &bytes[4 * PS..5 * PS];
    assert_eq!(
        BigEndian::read_u64(&page4[FIL_PAGE_DATA + PAGE_INDEX_ID..]),
        DST_PK_ID
    );
}

#[test]
fn cfg_describes_the_rebuilt_table() {
    let source = build_source_space();
    let sdi = write_sdi_file(&table_sdi(SRC_PK_ID, None));
    let target = write_sdi_file(&table_sdi(DST_PK_ID, None));
    let cfg_path = NamedTempFile::new().unwrap();

    let out = NamedTempFile::new().unwrap();
    rebuild(
        source.path(),
        out.path(),
        &RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            target_sdi_json: Some(target.path().to_path_buf()),
            cfg_out: Some(cfg_path.path().to_path_buf()),
            ..Default::default()
        },
    )
    .unwrap();

    let mut file = std::fs::File::open(cfg_path.path()).unwrap();
    let cfg = ibdp::innodb::cfg::read_cfg(&mut file).unwrap();

    // Space flags: uncompressed, SDI kept.
    assert_eq!(cfg.space_flags & FSP_FLAGS_MASK_ZIP_SSIZE, 0);
    assert!(cfg.space_flags & FSP_FLAGS_MASK_SDI != 0);
    assert_eq!(cfg.page_size, PS as u32);

    // Columns include the synthesized DB_ROW_ID before DB_TRX_ID.
    let names: Vec<&str> = cfg.columns.iter().map(|c| c.name.as_str()).collect();
    let row_id = names.iter().position(|n| *n == "DB_ROW_ID").unwrap();
    let trx_id = names.iter().position(|n| *n == "DB_TRX_ID").unwrap();
    assert!(row_id < trx_id);

    // No instant history: row version stays zero.
    assert_eq!(cfg.current_row_version, 0);
    assert_eq!(cfg.n_instant_drop_cols, 0);

    // SDI index first, PRIMARY carrying the remapped id.
    assert_eq!(cfg.indexes[0].name, "CLUST_IND_SDI");
    let primary = cfg.indexes.iter().find(|i| i.name == "PRIMARY").unwrap();
    assert_eq!(primary.id, DST_PK_ID);
}

#[test]
fn uncompressed_source_is_rejected() {
    let pages = vec![fsp_page0(SPACE_ID, FSP_FLAGS_MASK_SDI, 1, PS)];
    let source = write_space(&pages);
    let sdi = write_sdi_file(&table_sdi(SRC_PK_ID, None));

    let out = NamedTempFile::new().unwrap();
    let err = rebuild(
        source.path(),
        out.path(),
        &RebuildOptions {
            sdi_json: Some(sdi.path().to_path_buf()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, ibdp::IbdError::RebuildImpossible(_)));
}
