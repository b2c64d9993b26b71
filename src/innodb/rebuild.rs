//! Tablespace rebuild: compressed in, importable 16 KiB pages out.
//!
//! The rebuild pass inflates every page to the 16 KiB logical size, repairs
//! the FSP flags on page 0 (ZIP_SSIZE cleared, SDI flag kept, the 8-byte
//! SDI field migrated to the offset the new page size implies), rebuilds
//! the SDI root as a fresh compact INDEX page whose records carry the
//! dictionary entries inline or through SDI BLOB chains reclaimed from the
//! source file, remaps index ids on INDEX/RTREE pages, and restamps every
//! page with LSN 0 and a fresh CRC-32C.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use tracing::{info, warn};

use crate::innodb::checksum::stamp_page;
use crate::innodb::compression::{decompress_page, deflate};
use crate::innodb::constants::*;
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::schema::SdiDictionary;
use crate::innodb::sdi::{extract_sdi_json, read_sdi_root, write_sdi_root, sdi_offset};
use crate::innodb::tablespace::Tablespace;
use crate::IbdError;

/// Rebuild configuration (mode 5 flags).
#[derive(Debug, Default)]
pub struct RebuildOptions {
    /// Source SDI JSON; extracted from the source file when absent.
    pub sdi_json: Option<PathBuf>,
    /// Target table's SDI JSON for name-based index-id remapping.
    pub target_sdi_json: Option<PathBuf>,
    /// Explicit `src=dst` index-id map file.
    pub index_id_map: Option<PathBuf>,
    /// Write an import `.cfg` here.
    pub cfg_out: Option<PathBuf>,
    /// Root-page conflict policy.
    pub use_target_sdi_root: bool,
    pub use_source_sdi_root: bool,
    /// Explicit SDI root page for the output.
    pub target_sdi_root: Option<u32>,
    /// Target tablespace, used to read its SDI root page number.
    pub target_ibd: Option<PathBuf>,
    /// Verify every remapped index id exists in the target SDI.
    pub validate_remap: bool,
}

/// Counters reported after a rebuild.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildStats {
    pub pages: u64,
    pub sdi_entries: u64,
    pub sdi_blob_pages: u64,
    pub remapped_pages: u64,
}

/// Rebuild `source` into `out_path`.
pub fn rebuild<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    out_path: Q,
    opts: &RebuildOptions,
) -> Result<RebuildStats, IbdError> {
    let mut ts = Tablespace::open(source)?;
    let geometry = ts.geometry();

    if geometry.logical != UNIV_PAGE_SIZE {
        return Err(IbdError::RebuildImpossible(format!(
            "logical page size is {}, only 16384 is supported",
            geometry.logical
        )));
    }
    if !geometry.is_compressed() {
        return Err(IbdError::RebuildImpossible(
            "source tablespace is not compressed".to_string(),
        ));
    }
    if !ts.fsp_header().has_sdi() {
        return Err(IbdError::RebuildImpossible(
            "source tablespace has no SDI".to_string(),
        ));
    }

    // The dictionary that will be written into the rebuilt SDI.
    let dict = match &opts.sdi_json {
        Some(path) => SdiDictionary::from_file(path)?,
        None => SdiDictionary::from_records(extract_sdi_json(&mut ts)?)?,
    };

    let target_dict = match &opts.target_sdi_json {
        Some(path) => Some(SdiDictionary::from_file(path)?),
        None => None,
    };

    let id_map = build_index_id_map(&dict, target_dict.as_ref(), opts)?;
    if opts.validate_remap {
        validate_remap(&id_map, target_dict.as_ref())?;
    }

    // Inflate the whole space. Rebuild is not streaming: the SDI rewrite
    // needs the full page inventory to reclaim BLOB pages.
    let space_id = ts.space_id();
    let page_count = ts.page_count();
    let mut pages: Vec<Vec<u8>> = Vec::with_capacity(page_count as usize);
    for page_no in 0..page_count {
        let raw = ts.read_page(page_no)?;
        let mut logical = decompress_page(&raw, geometry)?;
        if logical.len() < UNIV_PAGE_SIZE {
            // Metadata pages keep their physical image, padded to 16 KiB;
            // the stale trailer is cleared so only the final one remains.
            let old_trailer = logical.len() - FIL_PAGE_DATA_END;
            logical[old_trailer..].fill(0);
            logical.resize(UNIV_PAGE_SIZE, 0);
        }
        pages.push(logical);
    }

    let source_root = read_sdi_root(&pages[0], geometry.physical).ok_or_else(|| {
        IbdError::RebuildImpossible("source page 0 has no SDI root pointer".to_string())
    })?;
    let root = choose_root(source_root, opts)?;

    // Pages the old SDI occupied are free for reuse.
    let mut reusable: Vec<u32> = Vec::new();
    for (no, page) in pages.iter().enumerate() {
        if let Some(header) = FilHeader::parse(page) {
            if matches!(header.page_type, PageType::Sdi | PageType::SdiBlob)
                && no as u32 != root
            {
                reusable.push(no as u32);
            }
        }
    }

    let mut stats = RebuildStats {
        pages: page_count,
        ..Default::default()
    };

    // Rebuild the SDI root and its overflow chains.
    let sdi_index_id = sdi_index_id_of(&pages, source_root);
    let built = build_sdi_pages(&dict, root, space_id, sdi_index_id, &mut reusable, &mut pages)?;
    stats.sdi_entries = built.entries;
    stats.sdi_blob_pages = built.blob_pages;

    // Whatever old SDI pages were not reclaimed become empty pages.
    for no in reusable {
        let mut blank = vec![0u8; UNIV_PAGE_SIZE];
        BigEndian::write_u32(&mut blank[FIL_PAGE_OFFSET..], no);
        BigEndian::write_u32(&mut blank[FIL_PAGE_PREV..], FIL_NULL);
        BigEndian::write_u32(&mut blank[FIL_PAGE_NEXT..], FIL_NULL);
        pages[no as usize] = blank;
    }

    // FSP header repair on page 0.
    let page_count = pages.len() as u32;
    repair_fsp_page(&mut pages[0], geometry.physical, root, page_count);

    // Index-id remap.
    if !id_map.is_empty() {
        for page in pages.iter_mut() {
            let Some(header) = FilHeader::parse(page) else {
                continue;
            };
            if !matches!(header.page_type, PageType::Index | PageType::Rtree) {
                continue;
            }
            let at = FIL_PAGE_DATA + PAGE_INDEX_ID;
            let old = BigEndian::read_u64(&page[at..]);
            if let Some(&new) = id_map.get(&old) {
                BigEndian::write_u64(&mut page[at..], new);
                stats.remapped_pages += 1;
            }
        }
    }

    // Stamp and write.
    let out_path = out_path.as_ref();
    let mut out = File::create(out_path)
        .map_err(|e| IbdError::Io(format!("cannot create {}: {}", out_path.display(), e)))?;
    for (no, page) in pages.iter_mut().enumerate() {
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], no as u32);
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], space_id);
        stamp_page(page, UNIV_PAGE_SIZE, 0);
        out.seek(SeekFrom::Start(no as u64 * UNIV_PAGE_SIZE as u64))
            .map_err(|e| IbdError::Io(format!("cannot seek to page {}: {}", no, e)))?;
        out.write_all(page)
            .map_err(|e| IbdError::Io(format!("cannot write page {}: {}", no, e)))?;
    }
    out.flush()
        .map_err(|e| IbdError::Io(format!("cannot flush {}: {}", out_path.display(), e)))?;
    stats.pages = pages.len() as u64;

    // Import metadata.
    if let Some(cfg_path) = &opts.cfg_out {
        let table = dict.table()?;
        let flags = rebuilt_space_flags(ts.fsp_header().flags);
        crate::innodb::cfg::write_cfg_file(cfg_path, &table, flags, &id_map)?;
    }

    info!(
        pages = stats.pages,
        sdi_entries = stats.sdi_entries,
        sdi_blob_pages = stats.sdi_blob_pages,
        remapped = stats.remapped_pages,
        "rebuild complete"
    );
    Ok(stats)
}

/// The FSP flags of the rebuilt space: ZIP_SSIZE and PAGE_SSIZE cleared
/// back to the 16 KiB defaults, everything else preserved.
pub fn rebuilt_space_flags(flags: u32) -> u32 {
    flags & !(FSP_FLAGS_MASK_ZIP_SSIZE | FSP_FLAGS_MASK_PAGE_SSIZE)
}

fn choose_root(source_root: u32, opts: &RebuildOptions) -> Result<u32, IbdError> {
    let target_root = match (&opts.target_sdi_root, &opts.target_ibd) {
        (Some(n), _) => Some(*n),
        (None, Some(path)) => {
            let mut target = Tablespace::open(path)?;
            let page0 = target.read_page(0)?;
            read_sdi_root(&page0, target.physical_size())
        }
        (None, None) => None,
    };

    match target_root {
        Some(t) if t != source_root => {
            warn!(
                source = source_root,
                target = t,
                "SDI root differs between source and target"
            );
            if opts.use_target_sdi_root {
                Ok(t)
            } else if opts.use_source_sdi_root {
                Ok(source_root)
            } else {
                Ok(source_root)
            }
        }
        _ => Ok(source_root),
    }
}

/// The index id stored on the source SDI root page, preserved verbatim.
fn sdi_index_id_of(pages: &[Vec<u8>], source_root: u32) -> u64 {
    pages
        .get(source_root as usize)
        .map(|p| BigEndian::read_u64(&p[FIL_PAGE_DATA + PAGE_INDEX_ID..]))
        .unwrap_or(0)
}

fn build_index_id_map(
    dict: &SdiDictionary,
    target: Option<&SdiDictionary>,
    opts: &RebuildOptions,
) -> Result<HashMap<u64, u64>, IbdError> {
    if let Some(path) = &opts.index_id_map {
        return crate::util::idmap::load(path);
    }
    let Some(target) = target else {
        return Ok(HashMap::new());
    };

    // Match indexes between source and target SDI by name.
    let source_table = dict.table()?;
    let target_table = target.table()?;
    let mut map = HashMap::new();
    for src in &source_table.indexes {
        match target_table.indexes.iter().find(|t| t.name == src.name) {
            Some(dst) if dst.id != src.id => {
                map.insert(src.id, dst.id);
            }
            Some(_) => {}
            None => warn!(index = %src.name, "no matching index in the target SDI"),
        }
    }
    Ok(map)
}

fn validate_remap(
    map: &HashMap<u64, u64>,
    target: Option<&SdiDictionary>,
) -> Result<(), IbdError> {
    let Some(target) = target else {
        return Err(IbdError::Argument(
            "--validate-remap needs a target SDI".to_string(),
        ));
    };
    let table = target.table()?;
    for (&src, &dst) in map {
        if !table.indexes.iter().any(|i| i.id == dst) {
            return Err(IbdError::Argument(format!(
                "remap {} -> {}: target SDI has no index with id {}",
                src, dst, dst
            )));
        }
    }
    Ok(())
}

/// Migrate page 0 to the uncompressed layout.
fn repair_fsp_page(page0: &mut Vec<u8>, old_physical: usize, root: u32, page_count: u32) {
    let flags_at = FIL_PAGE_DATA + FSP_SPACE_FLAGS;
    let flags = BigEndian::read_u32(&page0[flags_at..]);
    BigEndian::write_u32(&mut page0[flags_at..], rebuilt_space_flags(flags));

    BigEndian::write_u32(&mut page0[FIL_PAGE_DATA + FSP_SIZE..], page_count);
    BigEndian::write_u32(&mut page0[FIL_PAGE_DATA + FSP_FREE_LIMIT..], page_count);

    // The SDI field moves with the page size: clear the old slot, write the
    // new one.
    let old_at = sdi_offset(old_physical);
    if old_at + 8 <= page0.len() {
        page0[old_at..old_at + 8].fill(0);
    }
    write_sdi_root(page0, UNIV_PAGE_SIZE, root);
}

struct BuiltSdi {
    entries: u64,
    blob_pages: u64,
}

/// One encoded SDI record, before placement.
struct PendingRecord {
    entry_type: u32,
    id: u64,
    uncomp_len: u32,
    payload: Vec<u8>,
}

/// Rebuild the SDI root page (and BLOB chains for oversized entries).
fn build_sdi_pages(
    dict: &SdiDictionary,
    root: u32,
    space_id: u32,
    index_id: u64,
    reusable: &mut Vec<u32>,
    pages: &mut Vec<Vec<u8>>,
) -> Result<BuiltSdi, IbdError> {
    let entries = dict.sorted_entries();

    let mut pending = Vec::with_capacity(entries.len());
    for entry in &entries {
        let json = serde_json::to_string(&entry.object)
            .map_err(|e| IbdError::SdiParse(format!("entry {}: {}", entry.id, e)))?;
        pending.push(PendingRecord {
            entry_type: entry.entry_type as u32,
            id: entry.id,
            uncomp_len: json.len() as u32,
            payload: deflate(json.as_bytes()),
        });
    }

    // First pass: decide inline vs external. The page must hold, per
    // record, 5 extra bytes + 2 length bytes + the 33-byte prologue plus
    // the payload (or a 20-byte reference), the system records, and one
    // directory slot per owner group.
    let mut blob_pages = 0u64;
    let budget = UNIV_PAGE_SIZE
        - PAGE_NEW_SUPREMUM_END
        - FIL_PAGE_DATA_END
        - (2 + pending.len() / PAGE_DIR_SLOT_MAX_N_OWNED + 1) * PAGE_DIR_SLOT_SIZE;
    let mut used = 0usize;
    let mut placements = Vec::with_capacity(pending.len());
    for record in &pending {
        let inline_size = REC_N_NEW_EXTRA_BYTES + 2 + SDI_REC_DATA + record.payload.len();
        let inline_ok =
            record.payload.len() <= SDI_REC_MAX_INLINE && used + inline_size <= budget;
        if inline_ok {
            used += inline_size;
            placements.push(None);
        } else {
            let extern_size =
                REC_N_NEW_EXTRA_BYTES + 2 + SDI_REC_DATA + BTR_EXTERN_FIELD_REF_SIZE;
            if used + extern_size > budget {
                return Err(IbdError::RebuildImpossible(
                    "SDI root page cannot hold the entry directory".to_string(),
                ));
            }
            used += extern_size;
            let (first_page, n_pages) =
                write_sdi_blob_chain(&record.payload, space_id, reusable, pages)?;
            blob_pages += n_pages;
            placements.push(Some(first_page));
        }
    }

    // Second pass: lay the records onto a fresh root page.
    let mut page = vec![0u8; UNIV_PAGE_SIZE];
    BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], root);
    BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
    BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
    BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], PageType::Sdi.as_u16());
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], space_id);

    // System records.
    let inf_extra = PAGE_NEW_INFIMUM - REC_N_NEW_EXTRA_BYTES;
    page[inf_extra] = 0x01;
    BigEndian::write_u16(&mut page[inf_extra + 1..], REC_STATUS_INFIMUM as u16);
    page[PAGE_NEW_INFIMUM..PAGE_NEW_INFIMUM + 8].copy_from_slice(b"infimum\0");
    let sup_extra = PAGE_NEW_SUPREMUM - REC_N_NEW_EXTRA_BYTES;
    BigEndian::write_u16(
        &mut page[sup_extra + 1..],
        (1 << 3) | REC_STATUS_SUPREMUM as u16,
    );
    page[PAGE_NEW_SUPREMUM..PAGE_NEW_SUPREMUM + 8].copy_from_slice(b"supremum");

    let mut origins = Vec::with_capacity(pending.len());
    let mut heap_top = PAGE_NEW_SUPREMUM_END;
    for (record, placement) in pending.iter().zip(&placements) {
        let (data, data_len): (&[u8], usize) = match placement {
            None => (&record.payload, record.payload.len()),
            Some(_) => (&[], BTR_EXTERN_FIELD_REF_SIZE),
        };

        // Extra bytes: 2-byte length header below the 5-byte record header.
        let origin = heap_top + 2 + REC_N_NEW_EXTRA_BYTES;
        let heap_no = (origins.len() + 2) as u16;
        page[origin - 7] = (data_len & 0xFF) as u8;
        let mut len_hi = 0x80 | ((data_len >> 8) & 0x3F) as u8;
        if placement.is_some() {
            len_hi |= 0x40;
        }
        page[origin - 6] = len_hi;
        page[origin - 5] = 0;
        BigEndian::write_u16(&mut page[origin - 4..], heap_no << 3);
        // next pointer patched after the loop

        BigEndian::write_u32(&mut page[origin + SDI_REC_TYPE..], record.entry_type);
        BigEndian::write_u64(&mut page[origin + SDI_REC_ID..], record.id);
        // trx_id and roll_ptr stay zero
        BigEndian::write_u32(&mut page[origin + SDI_REC_UNCOMP_LEN..], record.uncomp_len);
        BigEndian::write_u32(
            &mut page[origin + SDI_REC_COMP_LEN..],
            record.payload.len() as u32,
        );

        let data_at = origin + SDI_REC_DATA;
        match placement {
            None => page[data_at..data_at + data.len()].copy_from_slice(data),
            Some(first_page) => {
                let extern_ref = crate::innodb::lob::ExternRef {
                    space_id,
                    page_no: *first_page,
                    offset_or_version: 0,
                    length: record.payload.len() as u64,
                    being_modified: false,
                };
                page[data_at..data_at + BTR_EXTERN_FIELD_REF_SIZE]
                    .copy_from_slice(&extern_ref.to_bytes());
            }
        }

        origins.push(origin);
        heap_top = data_at + data_len;
    }

    // Chain the records.
    let mut prev_next_at = inf_extra + 3;
    let mut prev_origin = PAGE_NEW_INFIMUM;
    for &origin in &origins {
        BigEndian::write_i16(
            &mut page[prev_next_at..],
            (origin as i32 - prev_origin as i32) as i16,
        );
        prev_origin = origin;
        prev_next_at = origin - 2;
    }
    BigEndian::write_i16(
        &mut page[prev_next_at..],
        (PAGE_NEW_SUPREMUM as i32 - prev_origin as i32) as i16,
    );

    // Directory: infimum owns itself; full groups of eight records own a
    // slot through their last member; supremum owns the tail.
    let mut owners: Vec<(usize, u8)> = vec![(PAGE_NEW_INFIMUM, 1)];
    let mut group = 0u8;
    for &origin in &origins {
        group += 1;
        if group == PAGE_DIR_SLOT_MAX_N_OWNED as u8 {
            owners.push((origin, group));
            group = 0;
        }
    }
    owners.push((PAGE_NEW_SUPREMUM, group + 1));

    for (origin, n_owned) in &owners {
        let extra = origin - REC_N_NEW_EXTRA_BYTES;
        page[extra] = (page[extra] & 0xF0) | (n_owned & 0x0F);
    }
    for (n, (origin, _)) in owners.iter().enumerate() {
        let at = UNIV_PAGE_SIZE - PAGE_DIR - (n + 1) * PAGE_DIR_SLOT_SIZE;
        BigEndian::write_u16(&mut page[at..], *origin as u16);
    }

    // Page header.
    let base = FIL_PAGE_DATA;
    BigEndian::write_u16(&mut page[base + PAGE_N_DIR_SLOTS..], owners.len() as u16);
    BigEndian::write_u16(&mut page[base + PAGE_HEAP_TOP..], heap_top as u16);
    BigEndian::write_u16(
        &mut page[base + PAGE_N_HEAP..],
        0x8000 | (origins.len() as u16 + 2),
    );
    BigEndian::write_u16(&mut page[base + PAGE_N_RECS..], origins.len() as u16);
    BigEndian::write_u16(&mut page[base + PAGE_LEVEL..], 0);
    BigEndian::write_u64(&mut page[base + PAGE_INDEX_ID..], index_id);

    if root as usize >= pages.len() {
        return Err(IbdError::RebuildImpossible(format!(
            "SDI root page {} lies outside the {}-page space",
            root,
            pages.len()
        )));
    }
    pages[root as usize] = page;

    Ok(BuiltSdi {
        entries: origins.len() as u64,
        blob_pages,
    })
}

/// Write one compressed SDI payload across BLOB pages, reclaiming source
/// SDI pages first and appending fresh pages when those run out.
fn write_sdi_blob_chain(
    payload: &[u8],
    space_id: u32,
    reusable: &mut Vec<u32>,
    pages: &mut Vec<Vec<u8>>,
) -> Result<(u32, u64), IbdError> {
    let capacity = UNIV_PAGE_SIZE - FIL_PAGE_DATA - SDI_BLOB_HDR_SIZE - FIL_PAGE_DATA_END;
    let chunks: Vec<&[u8]> = payload.chunks(capacity).collect();

    // Allocate the page numbers first so each page can name its successor.
    let mut allocated = Vec::with_capacity(chunks.len());
    for _ in 0..chunks.len() {
        let no = if reusable.is_empty() {
            let no = pages.len() as u32;
            pages.push(vec![0u8; UNIV_PAGE_SIZE]);
            no
        } else {
            reusable.remove(0)
        };
        allocated.push(no);
    }

    for (i, chunk) in chunks.iter().enumerate() {
        let no = allocated[i];
        let mut page = vec![0u8; UNIV_PAGE_SIZE];
        BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], no);
        BigEndian::write_u32(&mut page[FIL_PAGE_PREV..], FIL_NULL);
        BigEndian::write_u32(&mut page[FIL_PAGE_NEXT..], FIL_NULL);
        BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], PageType::SdiBlob.as_u16());
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_ID..], space_id);

        BigEndian::write_u32(&mut page[FIL_PAGE_DATA..], chunk.len() as u32);
        let next = allocated.get(i + 1).copied().unwrap_or(FIL_NULL);
        BigEndian::write_u32(&mut page[FIL_PAGE_DATA + 4..], next);
        let start = FIL_PAGE_DATA + SDI_BLOB_HDR_SIZE;
        page[start..start + chunk.len()].copy_from_slice(chunk);

        pages[no as usize] = page;
    }

    Ok((allocated[0], chunks.len() as u64))
}
