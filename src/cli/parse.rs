//! Mode 3: decode rows from a chosen index.
//!
//! Walks the selected B-tree from its root to the leftmost leaf, then
//! follows the leaf chain, decoding each compact record against the column
//! layout derived from the SDI. Single-record corruption and unreadable
//! LOB chains are reported on stderr and skipped; the sweep continues.

use std::fs::File;
use std::io::{BufWriter, Write};

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use crate::cli::resolve_input_path;
use crate::innodb::constants::*;
use crate::innodb::field_decode::{decode_column, DecodeOptions, FieldValue};
use crate::innodb::lob::{ExternRef, LobReader};
use crate::innodb::page::FilHeader;
use crate::innodb::page_types::PageType;
use crate::innodb::record::{
    node_ptr_child, walk_compact_records, FieldDef, RecordOffsets,
};
use crate::innodb::row_writer::{RowFormat, RowMeta, RowWriter};
use crate::innodb::schema::{FieldSource, IndexMeta, SdiDictionary, TableMeta};
use crate::innodb::tablespace::Tablespace;
use crate::innodb::xdes::XdesCache;
use crate::IbdError;

pub struct ParseOptions {
    pub input: String,
    pub sdi_json: String,
    pub index: Option<String>,
    pub list_indexes: bool,
    pub format: String,
    pub output: Option<String>,
    pub with_meta: bool,
    pub lob_max_bytes: usize,
    pub raw_integers: bool,
    pub skip_xdes: bool,
}

/// Counters reported after a parse run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseStats {
    pub rows: u64,
    pub pages: u64,
    pub skipped_records: u64,
    pub lob_errors: u64,
}

pub fn execute(opts: &ParseOptions) -> Result<ParseStats, IbdError> {
    let dict = SdiDictionary::from_file(&opts.sdi_json)?;
    let table = dict.table()?;

    let mut out: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|e| {
            IbdError::Io(format!("cannot create {}: {}", path, e))
        })?)),
        None => Box::new(std::io::stdout().lock()),
    };

    if opts.list_indexes {
        for index in &table.indexes {
            writeln!(
                out,
                "{}\tid={}\tkind={}\troot={}\telements={}",
                index.name,
                index.id,
                index.kind.name(),
                index.root_page,
                index.elements.len()
            )
            .map_err(|e| IbdError::Io(format!("index listing: {}", e)))?;
        }
        return Ok(ParseStats::default());
    }

    let format = RowFormat::from_name(&opts.format)
        .ok_or_else(|| IbdError::Argument(format!("unknown format {:?}", opts.format)))?;

    let index = match &opts.index {
        Some(selector) => table.find_index(selector).ok_or_else(|| {
            IbdError::Argument(format!("no index named or numbered {:?}", selector))
        })?,
        None => table.primary_index().ok_or_else(|| {
            IbdError::SdiParse("table has no PRIMARY index".to_string())
        })?,
    };

    let decode_opts = DecodeOptions {
        raw_integers: opts.raw_integers,
        tz_offset_secs: display_tz_offset()?,
    };

    let input = resolve_input_path(&opts.input);
    let mut ts = Tablespace::open(input)?;
    if ts.geometry().is_compressed() {
        return Err(IbdError::Argument(
            "parse expects an uncompressed tablespace; run decompress or rebuild first"
                .to_string(),
        ));
    }

    let mut writer = RowWriter::new(&mut out, format, opts.with_meta);
    let mut parser = IndexParser::new(&table, index, opts, decode_opts)?;
    parser.run(&mut ts, &mut writer)
}

/// `IB_PARSER_TZ`: `UTC` (default) or a fixed `±HH:MM` offset.
fn display_tz_offset() -> Result<i32, IbdError> {
    match std::env::var("IB_PARSER_TZ") {
        Err(_) => Ok(0),
        Ok(tz) if tz.is_empty() || tz.eq_ignore_ascii_case("utc") => Ok(0),
        Ok(tz) => parse_tz_offset(&tz)
            .ok_or_else(|| IbdError::Argument(format!("bad IB_PARSER_TZ value {:?}", tz))),
    }
}

fn parse_tz_offset(tz: &str) -> Option<i32> {
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

/// One parse run over one index.
struct IndexParser<'t> {
    table: &'t TableMeta,
    index: &'t IndexMeta,
    field_defs: Vec<FieldDef>,
    /// Record-field position of each layout entry's column opx.
    sources: Vec<FieldSource>,
    /// Output columns: `(opx, layout position)`.
    output_columns: Vec<(usize, Option<usize>)>,
    with_meta: bool,
    skip_xdes: bool,
    lob_max_bytes: usize,
    decode_opts: DecodeOptions,
}

impl<'t> IndexParser<'t> {
    fn new(
        table: &'t TableMeta,
        index: &'t IndexMeta,
        opts: &ParseOptions,
        decode_opts: DecodeOptions,
    ) -> Result<Self, IbdError> {
        let layout = table.leaf_layout(index)?;
        let field_defs: Vec<FieldDef> = layout.iter().map(|f| f.def.clone()).collect();
        let sources: Vec<FieldSource> = layout.iter().map(|f| f.source).collect();

        // The columns a row shows, each mapped to its layout slot. The
        // clustered index shows the table's visible columns; a secondary
        // index shows exactly the columns its leaves carry.
        let output_columns: Vec<(usize, Option<usize>)> =
            if matches!(index.kind, crate::innodb::schema::IndexKind::Primary) {
                table
                    .visible_columns()
                    .into_iter()
                    .map(|opx| {
                        let pos = sources
                            .iter()
                            .position(|s| matches!(s, FieldSource::Column(o) if *o == opx));
                        (opx, pos)
                    })
                    .collect()
            } else {
                sources
                    .iter()
                    .enumerate()
                    .filter_map(|(pos, s)| match s {
                        FieldSource::Column(opx) => Some((*opx, Some(pos))),
                        _ => None,
                    })
                    .collect()
            };

        Ok(IndexParser {
            table,
            index,
            field_defs,
            sources,
            output_columns,
            with_meta: opts.with_meta,
            skip_xdes: opts.skip_xdes,
            lob_max_bytes: opts.lob_max_bytes,
            decode_opts,
        })
    }

    fn run(
        &mut self,
        ts: &mut Tablespace,
        writer: &mut RowWriter<'_>,
    ) -> Result<ParseStats, IbdError> {
        let mut stats = ParseStats::default();
        let mut xdes = XdesCache::new();

        let leaves = self.leaf_chain_start(ts)?;
        let mut next = match leaves {
            Some(first) => first,
            None => return Ok(stats),
        };

        let mut visited = 0u64;
        loop {
            if !self.skip_xdes && xdes.is_page_free(ts, next)? {
                debug!(page = next, "leaf marked free in its extent, skipped");
            } else {
                let page = ts.read_page(next)?;
                self.parse_leaf(ts, &page, next, writer, &mut stats)?;
                stats.pages += 1;
            }

            let page = ts.read_page(next)?;
            let header = FilHeader::parse(&page).ok_or_else(|| {
                IbdError::RecordCorrupted(format!("leaf {} header unreadable", next))
            })?;
            if !header.has_next() {
                break;
            }
            next = header.next_page as u64;
            visited += 1;
            if visited > ts.page_count() {
                return Err(IbdError::RecordCorrupted(
                    "leaf chain does not terminate".to_string(),
                ));
            }
        }

        Ok(stats)
    }

    /// Find the leftmost leaf of the index: descend node pointers from the
    /// root; fall back to a full scan when the root looks wrong.
    fn leaf_chain_start(&self, ts: &mut Tablespace) -> Result<Option<u64>, IbdError> {
        let root = self.index.root_page as u64;
        if root >= ts.page_count() {
            warn!(root = root, "root page out of range, scanning instead");
            return self.scan_for_first_leaf(ts);
        }

        let key_defs: Vec<FieldDef> = self
            .table
            .key_layout(self.index)
            .iter()
            .map(|f| f.def.clone())
            .collect();

        let mut page_no = root;
        let mut hops = 0;
        loop {
            let page = ts.read_page(page_no)?;
            let header = FilHeader::parse(&page);
            let is_index = header
                .map(|h| matches!(h.page_type, PageType::Index | PageType::Rtree))
                .unwrap_or(false);
            let index_id = BigEndian::read_u64(&page[FIL_PAGE_DATA + PAGE_INDEX_ID..]);
            if !is_index || index_id != self.index.id {
                warn!(
                    page = page_no,
                    index_id,
                    expected = self.index.id,
                    "root descent hit a foreign page, scanning instead"
                );
                return self.scan_for_first_leaf(ts);
            }

            let level = BigEndian::read_u16(&page[FIL_PAGE_DATA + PAGE_LEVEL..]);
            if level == 0 {
                return Ok(Some(page_no));
            }

            let records = walk_compact_records(&page);
            let Some(first) = records.first() else {
                return Ok(None);
            };
            let offsets = RecordOffsets::compute(&page, first.offset, &key_defs)?;
            let child = node_ptr_child(&page, first.offset, offsets.data_size())
                .ok_or_else(|| {
                    IbdError::RecordCorrupted(format!(
                        "node pointer on page {} has no child",
                        page_no
                    ))
                })?;
            page_no = child as u64;
            hops += 1;
            if hops > 64 {
                return Err(IbdError::RecordCorrupted(
                    "index deeper than 64 levels".to_string(),
                ));
            }
        }
    }

    fn scan_for_first_leaf(&self, ts: &mut Tablespace) -> Result<Option<u64>, IbdError> {
        for page_no in 0..ts.page_count() {
            let page = ts.read_page(page_no)?;
            let Some(header) = FilHeader::parse(&page) else {
                continue;
            };
            if !matches!(header.page_type, PageType::Index | PageType::Rtree) {
                continue;
            }
            let index_id = BigEndian::read_u64(&page[FIL_PAGE_DATA + PAGE_INDEX_ID..]);
            let level = BigEndian::read_u16(&page[FIL_PAGE_DATA + PAGE_LEVEL..]);
            if index_id == self.index.id
                && level == 0
                && header.prev_page == FIL_NULL
            {
                return Ok(Some(page_no));
            }
        }
        Ok(None)
    }

    fn parse_leaf(
        &self,
        ts: &mut Tablespace,
        page: &[u8],
        page_no: u64,
        writer: &mut RowWriter<'_>,
        stats: &mut ParseStats,
    ) -> Result<(), IbdError> {
        for rec in walk_compact_records(page) {
            if rec.header.delete_mark && !self.with_meta {
                continue;
            }

            let offsets = match RecordOffsets::compute(page, rec.offset, &self.field_defs) {
                Ok(o) => o,
                Err(e) => {
                    stats.skipped_records += 1;
                    warn!(page = page_no, offset = rec.offset, "record skipped: {}", e);
                    continue;
                }
            };

            let row = self.decode_row(ts, page, rec.offset, &offsets, stats);
            let meta = RowMeta {
                page_no,
                rec_offset: rec.offset,
                deleted: rec.header.delete_mark,
            };
            let cells: Vec<(&str, FieldValue)> = row
                .iter()
                .map(|(opx, value)| (self.table.columns[*opx].name.as_str(), value.clone()))
                .collect();
            writer.write_row(Some(meta), &cells)?;
            stats.rows += 1;
        }
        Ok(())
    }

    fn decode_row(
        &self,
        ts: &mut Tablespace,
        page: &[u8],
        origin: usize,
        offsets: &RecordOffsets,
        stats: &mut ParseStats,
    ) -> Vec<(usize, FieldValue)> {
        // Which record field holds each layout slot in THIS record.
        let mut slot_to_record_field = vec![None; self.sources.len()];
        for i in 0..offsets.n_fields() {
            slot_to_record_field[offsets.field_index(i)] = Some(i);
        }

        let mut row = Vec::with_capacity(self.output_columns.len());
        for &(opx, layout_pos) in &self.output_columns {
            let col = &self.table.columns[opx];
            let record_field = layout_pos.and_then(|p| slot_to_record_field[p]);

            let value = match record_field {
                None => {
                    // Not stored in this record: an instant default.
                    if col.default_null {
                        FieldValue::Null
                    } else if let Some(default) = &col.default_bytes {
                        decode_column(default, col, &self.decode_opts)
                    } else {
                        FieldValue::Null
                    }
                }
                Some(i) if offsets.is_null(i) => FieldValue::Null,
                Some(i) => {
                    let bytes = &page[origin + offsets.start(i)..origin + offsets.end(i)];
                    if offsets.is_extern(i) {
                        self.decode_extern(ts, bytes, opx, stats)
                    } else {
                        decode_column(bytes, col, &self.decode_opts)
                    }
                }
            };
            row.push((opx, value));
        }
        row
    }

    fn decode_extern(
        &self,
        ts: &mut Tablespace,
        bytes: &[u8],
        opx: usize,
        stats: &mut ParseStats,
    ) -> FieldValue {
        let col = &self.table.columns[opx];
        if bytes.len() < BTR_EXTERN_FIELD_REF_SIZE {
            stats.lob_errors += 1;
            return FieldValue::Str(format!(
                "<extern:0:{}>",
                crate::util::hex::encode(bytes)
            ));
        }
        let ref_bytes = &bytes[bytes.len() - BTR_EXTERN_FIELD_REF_SIZE..];
        let prefix = &bytes[..bytes.len() - BTR_EXTERN_FIELD_REF_SIZE];
        let Some(extern_ref) = ExternRef::parse(ref_bytes) else {
            stats.lob_errors += 1;
            return FieldValue::Str(format!(
                "<extern:0:{}>",
                crate::util::hex::encode(ref_bytes)
            ));
        };

        let mut reader = LobReader::new(ts, self.lob_max_bytes);
        match reader.read(&extern_ref) {
            Ok(lob) => {
                let mut full = Vec::with_capacity(prefix.len() + lob.bytes.len());
                full.extend_from_slice(prefix);
                full.extend_from_slice(&lob.bytes);
                let value = decode_column(&full, col, &self.decode_opts);
                if lob.truncated {
                    match value {
                        FieldValue::Str(s) => FieldValue::Str(format!("{}…(truncated)", s)),
                        other => other,
                    }
                } else {
                    value
                }
            }
            Err(e) => {
                stats.lob_errors += 1;
                warn!(column = %col.name, "external value unavailable: {}", e);
                FieldValue::Str(format!(
                    "<extern:{}:{}>",
                    extern_ref.length,
                    crate::util::hex::encode(ref_bytes)
                ))
            }
        }
    }
}
