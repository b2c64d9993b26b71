//! Parse mode: external LOB reassembly and the byte cap.

mod common;

use byteorder::{BigEndian, ByteOrder};
use serde_json::json;
use tempfile::NamedTempFile;

use common::*;
use ibdp::cli::parse::{execute, ParseOptions};
use ibdp::innodb::checksum::stamp_page;
use ibdp::innodb::constants::*;
use ibdp::innodb::lob::ExternRef;
use ibdp::innodb::page_types::PageType;

/// `u (id INT PK, body LONGTEXT)` with the PRIMARY root at page 4.
fn lob_table_sdi() -> serde_json::Value {
    sdi_doc(
        "u",
        23,
        vec![
            col_json("id", 4, 1, json!({"column_type_utf8": "int"})),
            col_json(
                "body",
                26,
                2,
                json!({
                    "char_length": 4294967295u64,
                    "column_type_utf8": "longtext",
                    "is_nullable": true
                }),
            ),
            sys_col_json("DB_TRX_ID", 3),
            sys_col_json("DB_ROLL_PTR", 4),
        ],
        vec![primary_index_json(
            310,
            4,
            23,
            vec![index_element_json(1, 0, false)],
        )],
    )
}

fn old_blob_chain(first_page: u32, data: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = data.chunks(chunk).collect();
    let mut pages = Vec::new();
    for (i, part) in chunks.iter().enumerate() {
        let page_no = first_page + i as u32;
        let mut page = blank_page(page_no, PageType::Blob, PS);
        BigEndian::write_u32(&mut page[FIL_PAGE_DATA + LOB_HDR_PART_LEN..], part.len() as u32);
        let next = if i + 1 < chunks.len() {
            page_no + 1
        } else {
            FIL_NULL
        };
        BigEndian::write_u32(&mut page[FIL_PAGE_DATA + LOB_HDR_NEXT_PAGE_NO..], next);
        let start = FIL_PAGE_DATA + LOB_HDR_SIZE;
        page[start..start + part.len()].copy_from_slice(part);
        stamp_page(&mut page, PS, 1);
        pages.push(page);
    }
    pages
}

fn build_lob_space(body: &[u8]) -> NamedTempFile {
    let extern_ref = ExternRef {
        space_id: 23,
        page_no: 5,
        offset_or_version: 0,
        length: body.len() as u64,
        being_modified: false,
    };

    let fields = vec![
        FieldSpec::fixed(4),
        FieldSpec::fixed(6),
        FieldSpec::fixed(7),
        FieldSpec::variable(true, true),
    ];
    let rows = vec![vec![
        Cell::Bytes(enc_int(1, 4)),
        Cell::Bytes(vec![0u8; 6]),
        Cell::Bytes(vec![0u8; 7]),
        Cell::Extern(extern_ref.to_bytes().to_vec()),
    ]];
    let leaf = build_leaf_page(4, 23, 310, &fields, &rows, FIL_NULL, FIL_NULL, &[]);

    let blob_pages = old_blob_chain(5, body, 8000);
    let total = 5 + blob_pages.len() as u32;

    let mut pages = vec![fsp_page0(23, 0, total, PS)];
    for no in 1..4 {
        let mut filler = blank_page(no, PageType::Allocated, PS);
        stamp_page(&mut filler, PS, 1);
        pages.push(filler);
    }
    pages.push(leaf);
    pages.extend(blob_pages);
    write_space(&pages)
}

fn run_parse(space: &NamedTempFile, sdi: &NamedTempFile, lob_max_bytes: usize) -> String {
    let out = NamedTempFile::new().unwrap();
    execute(&ParseOptions {
        input: space.path().to_str().unwrap().to_string(),
        sdi_json: sdi.path().to_str().unwrap().to_string(),
        index: None,
        list_indexes: false,
        format: "pipe".to_string(),
        output: Some(out.path().to_str().unwrap().to_string()),
        with_meta: false,
        lob_max_bytes,
        raw_integers: false,
        skip_xdes: false,
    })
    .unwrap();
    std::fs::read_to_string(out.path()).unwrap()
}

#[test]
fn long_text_reassembled_from_chain() {
    let body = vec![b'a'; 104_000];
    let space = build_lob_space(&body);
    let sdi = write_sdi_file(&lob_table_sdi());

    let output = run_parse(&space, &sdi, 5_000_000);
    let line = output.lines().next().unwrap();
    let value = line.strip_prefix("1|").unwrap();
    assert_eq!(value.len(), 104_000);
    assert!(value[..50].bytes().all(|b| b == b'a'));
}

#[test]
fn lob_cap_truncates_with_marker() {
    let body = vec![b'a'; 104_000];
    let space = build_lob_space(&body);
    let sdi = write_sdi_file(&lob_table_sdi());

    let output = run_parse(&space, &sdi, 100);
    let line = output.lines().next().unwrap();
    let value = line.strip_prefix("1|").unwrap();
    assert_eq!(value, format!("{}…(truncated)", "a".repeat(100)));
}

#[test]
fn broken_chain_renders_placeholder_and_continues() {
    let body = vec![b'a'; 20_000];
    let space = build_lob_space(&body);
    let sdi = write_sdi_file(&lob_table_sdi());

    // Point the chain's second hop at a missing page.
    let mut bytes = std::fs::read(space.path()).unwrap();
    let page5 = 5 * PS;
    BigEndian::write_u32(
        &mut bytes[page5 + FIL_PAGE_DATA + LOB_HDR_NEXT_PAGE_NO..],
        400,
    );
    stamp_page(&mut bytes[page5..page5 + PS], PS, 1);
    std::fs::write(space.path(), &bytes).unwrap();

    let output = run_parse(&space, &sdi, 5_000_000);
    let line = output.lines().next().unwrap();
    assert!(line.starts_with("1|<extern:20000:"));
}
