//! `IMPORT TABLESPACE` metadata (`.cfg`) writing.
//!
//! `ALTER TABLE ... IMPORT TABLESPACE` reads a big-endian `.cfg` file next
//! to the `.ibd`. Version 7 carries the instant-ALTER column history, so
//! the layout is: header (version, hostname, table name, autoinc, page
//! size, table flags, column counts, row version, space flags, compression
//! type), one block per column (InnoDB type description, name, instant
//! metadata, optional instant default), and one block per index (id,
//! root, field list).
//!
//! A structural reader for the same layout backs the tests and the remap
//! validation path.

use std::io::{Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::innodb::constants::FSP_FLAGS_MASK_SDI;
use crate::innodb::dtype::{self, InnodbType};
use crate::innodb::schema::{ColumnMeta, IndexKind, TableMeta};
use crate::IbdError;

/// The version this writer emits (IB_EXPORT_CFG_VERSION_V7).
pub const CFG_VERSION: u32 = 7;

/// dict_table_t::flags of an uncompressed DYNAMIC table:
/// COMPACT (bit 0) + ATOMIC_BLOBS (bit 5).
const DICT_TF_DYNAMIC: u32 = 1 | (1 << 5);

/// Index type bits (dict0mem.h).
const DICT_CLUSTERED: u32 = 1;
const DICT_UNIQUE: u32 = 2;
const DICT_FTS: u32 = 32;
const DICT_SPATIAL: u32 = 64;
const DICT_SDI: u32 = 2048;

/// Name of the synthesized SDI index entry.
const SDI_INDEX_NAME: &str = "CLUST_IND_SDI";

fn io_err(e: std::io::Error) -> IbdError {
    IbdError::Io(format!("cfg: {}", e))
}

fn write_str<W: Write>(out: &mut W, s: &str) -> Result<(), IbdError> {
    // Length includes the terminating NUL, as the server writes it.
    out.write_u32::<BigEndian>(s.len() as u32 + 1).map_err(io_err)?;
    out.write_all(s.as_bytes()).map_err(io_err)?;
    out.write_u8(0).map_err(io_err)?;
    Ok(())
}

fn read_str<R: Read>(input: &mut R) -> Result<String, IbdError> {
    let len = input.read_u32::<BigEndian>().map_err(io_err)? as usize;
    if len == 0 {
        return Ok(String::new());
    }
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf).map_err(io_err)?;
    buf.pop(); // NUL
    Ok(String::from_utf8_lossy(&buf).to_string())
}

/// One column as the `.cfg` describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgColumn {
    pub name: String,
    pub prtype: u32,
    pub mtype: u32,
    pub len: u32,
    pub mbminmaxlen: u32,
    pub ind: u32,
    pub ord_part: u32,
    pub max_prefix: u32,
    pub version_added: u8,
    pub version_dropped: u8,
    pub phy_pos: u32,
    /// ENUM/SET element list, written for instant-dropped columns.
    pub dropped_elements: Vec<String>,
    pub instant_default: Option<Option<Vec<u8>>>,
}

/// One index field as the `.cfg` describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgIndexField {
    pub prefix_len: u32,
    pub fixed_len: u32,
    pub is_ascending: u32,
    pub name: String,
}

/// One index as the `.cfg` describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgIndex {
    pub id: u64,
    pub space: u32,
    pub page: u32,
    pub index_type: u32,
    pub trx_id_offset: u32,
    pub n_user_defined_cols: u32,
    pub n_uniq: u32,
    pub n_nullable: u32,
    pub n_fields: u32,
    pub name: String,
    pub fields: Vec<CfgIndexField>,
}

/// The whole `.cfg` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgTable {
    pub version: u32,
    pub hostname: String,
    pub table_name: String,
    pub autoinc: u64,
    pub page_size: u32,
    pub dict_table_flags: u32,
    pub n_cols: u32,
    pub n_instant_nullable: u32,
    pub initial_col_count: u32,
    pub current_col_count: u32,
    pub total_col_count: u32,
    pub n_instant_drop_cols: u32,
    pub current_row_version: u32,
    pub space_flags: u32,
    pub compression_type: u8,
    pub columns: Vec<CfgColumn>,
    pub indexes: Vec<CfgIndex>,
}

/// System column type descriptions (data0type.h).
fn system_column(name: &str, pos: u32) -> CfgColumn {
    let (prtype_low, len) = match name {
        "DB_ROW_ID" => (dtype::DATA_ROW_ID, dtype::DATA_ROW_ID_LEN),
        "DB_TRX_ID" => (dtype::DATA_TRX_ID, dtype::DATA_TRX_ID_LEN),
        _ => (dtype::DATA_ROLL_PTR, dtype::DATA_ROLL_PTR_LEN),
    };
    CfgColumn {
        name: name.to_string(),
        prtype: prtype_low | dtype::DATA_NOT_NULL,
        mtype: dtype::DATA_SYS,
        len,
        mbminmaxlen: 0,
        ind: pos,
        ord_part: 0,
        max_prefix: 0,
        version_added: 0,
        version_dropped: 0,
        phy_pos: pos,
        dropped_elements: Vec::new(),
        instant_default: None,
    }
}

fn user_column(col: &ColumnMeta, pos: u32, ord_part: bool) -> CfgColumn {
    let InnodbType {
        mtype,
        prtype,
        len,
        mbminmaxlen,
    } = dtype::innodb_type(col);

    let instant_default = if col.version_added > 0 {
        Some(if col.default_null {
            None
        } else {
            Some(col.default_bytes.clone().unwrap_or_default())
        })
    } else {
        None
    };

    CfgColumn {
        name: col.name.clone(),
        prtype,
        mtype,
        len,
        mbminmaxlen,
        ind: pos,
        ord_part: ord_part as u32,
        max_prefix: 0,
        version_added: col.version_added as u8,
        version_dropped: col.version_dropped as u8,
        phy_pos: col.phy_pos.unwrap_or(pos),
        dropped_elements: if col.version_dropped > 0 {
            col.elements.clone()
        } else {
            Vec::new()
        },
        instant_default,
    }
}

/// Assemble the `.cfg` model for a table.
///
/// `space_flags` are the flags of the (rebuilt) tablespace; `id_map`
/// translates source index ids into the target table's ids.
pub fn build_cfg(
    table: &TableMeta,
    space_flags: u32,
    id_map: &std::collections::HashMap<u64, u64>,
) -> Result<CfgTable, IbdError> {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let table_name = if table.schema.is_empty() {
        table.name.clone()
    } else {
        format!("{}/{}", table.schema, table.name)
    };

    // User stored columns in physical order, then the system columns with
    // DB_ROW_ID ahead of DB_TRX_ID.
    let mut ordered: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_virtual && !c.is_se_hidden)
        .map(|(i, _)| i)
        .collect();
    if ordered.iter().any(|&i| table.columns[i].phy_pos.is_some()) {
        ordered.sort_by_key(|&i| {
            table.columns[i].phy_pos.map(u64::from).unwrap_or(u64::MAX)
        });
    } else {
        ordered.sort_by_key(|&i| table.columns[i].ordinal_position);
    }

    let mut columns = Vec::new();
    for (pos, &opx) in ordered.iter().enumerate() {
        let col = &table.columns[opx];
        let ord_part = table.indexes.iter().any(|i| {
            i.elements
                .iter()
                .any(|e| !e.hidden && e.column_opx == opx)
        });
        columns.push(user_column(col, pos as u32, ord_part));
    }
    let base = columns.len() as u32;
    columns.push(system_column("DB_ROW_ID", base));
    columns.push(system_column("DB_TRX_ID", base + 1));
    columns.push(system_column("DB_ROLL_PTR", base + 2));

    let remap = |id: u64| id_map.get(&id).copied().unwrap_or(id);

    let mut indexes = Vec::new();
    if space_flags & FSP_FLAGS_MASK_SDI != 0 {
        indexes.push(CfgIndex {
            id: u64::MAX,
            space: 0,
            page: 0,
            index_type: DICT_CLUSTERED | DICT_UNIQUE | DICT_SDI,
            trx_id_offset: 0,
            n_user_defined_cols: 0,
            n_uniq: 1,
            n_nullable: 0,
            n_fields: 0,
            name: SDI_INDEX_NAME.to_string(),
            fields: Vec::new(),
        });
    }

    for index in &table.indexes {
        let index_type = match index.kind {
            IndexKind::Primary => DICT_CLUSTERED | DICT_UNIQUE,
            IndexKind::Unique => DICT_UNIQUE,
            IndexKind::Fulltext => DICT_FTS,
            IndexKind::Spatial => DICT_SPATIAL,
            IndexKind::Multiple => 0,
        };
        let n_user = index.elements.iter().filter(|e| !e.hidden).count() as u32;
        let n_uniq = match index.kind {
            IndexKind::Primary | IndexKind::Unique => n_user,
            _ => index.elements.len() as u32,
        };

        let mut fields = Vec::new();
        let mut n_nullable = 0u32;
        for element in &index.elements {
            let col = &table.columns[element.column_opx];
            if col.is_nullable {
                n_nullable += 1;
            }
            fields.push(CfgIndexField {
                prefix_len: element.prefix_len.unwrap_or(0),
                fixed_len: dtype::fixed_storage_size(col).unwrap_or(0) as u32,
                is_ascending: element.ascending as u32,
                name: col.name.clone(),
            });
        }

        indexes.push(CfgIndex {
            id: remap(index.id),
            space: index.space_id,
            page: index.root_page,
            index_type,
            trx_id_offset: 0,
            n_user_defined_cols: n_user,
            n_uniq,
            n_nullable,
            n_fields: index.elements.len() as u32,
            name: index.name.clone(),
            fields,
        });
    }

    let n_instant_nullable = table
        .columns
        .iter()
        .filter(|c| {
            !c.is_virtual && !c.is_se_hidden && c.version_added == 0 && c.is_nullable
        })
        .count() as u32;

    Ok(CfgTable {
        version: CFG_VERSION,
        hostname,
        table_name,
        autoinc: table.autoinc,
        page_size: 16384,
        dict_table_flags: DICT_TF_DYNAMIC,
        n_cols: columns.len() as u32,
        n_instant_nullable,
        initial_col_count: ordered
            .iter()
            .filter(|&&i| table.columns[i].version_added == 0)
            .count() as u32,
        current_col_count: ordered
            .iter()
            .filter(|&&i| table.columns[i].version_dropped == 0)
            .count() as u32,
        total_col_count: ordered.len() as u32,
        n_instant_drop_cols: table.n_instant_dropped() as u32,
        current_row_version: table.current_row_version(),
        space_flags,
        compression_type: 0,
        columns,
        indexes,
    })
}

/// Serialize a [`CfgTable`] to a writer.
pub fn write_cfg<W: Write>(out: &mut W, cfg: &CfgTable) -> Result<(), IbdError> {
    out.write_u32::<BigEndian>(cfg.version).map_err(io_err)?;
    write_str(out, &cfg.hostname)?;
    write_str(out, &cfg.table_name)?;
    out.write_u64::<BigEndian>(cfg.autoinc).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.page_size).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.dict_table_flags).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.n_cols).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.n_instant_nullable).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.initial_col_count).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.current_col_count).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.total_col_count).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.n_instant_drop_cols).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.current_row_version).map_err(io_err)?;
    out.write_u32::<BigEndian>(cfg.space_flags).map_err(io_err)?;
    out.write_u8(cfg.compression_type).map_err(io_err)?;

    for col in &cfg.columns {
        out.write_u32::<BigEndian>(col.prtype).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.mtype).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.len).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.mbminmaxlen).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.ind).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.ord_part).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.max_prefix).map_err(io_err)?;
        write_str(out, &col.name)?;
        out.write_u8(col.version_added).map_err(io_err)?;
        out.write_u8(col.version_dropped).map_err(io_err)?;
        out.write_u32::<BigEndian>(col.phy_pos).map_err(io_err)?;

        if col.version_dropped > 0 {
            // Dropped-column block: physical position, the two version
            // bytes again, and reserved space.
            out.write_u32::<BigEndian>(col.phy_pos).map_err(io_err)?;
            out.write_u8(col.version_added).map_err(io_err)?;
            out.write_u8(col.version_dropped).map_err(io_err)?;
            out.write_all(&[0u8; 16]).map_err(io_err)?;
            out.write_u32::<BigEndian>(col.dropped_elements.len() as u32)
                .map_err(io_err)?;
            for element in &col.dropped_elements {
                write_str(out, element)?;
            }
        }

        match &col.instant_default {
            Some(default) => {
                out.write_u8(1).map_err(io_err)?;
                match default {
                    None => out.write_u8(1).map_err(io_err)?,
                    Some(bytes) => {
                        out.write_u8(0).map_err(io_err)?;
                        out.write_u32::<BigEndian>(bytes.len() as u32).map_err(io_err)?;
                        out.write_all(bytes).map_err(io_err)?;
                    }
                }
            }
            None => out.write_u8(0).map_err(io_err)?,
        }
    }

    out.write_u32::<BigEndian>(cfg.indexes.len() as u32).map_err(io_err)?;
    for index in &cfg.indexes {
        out.write_u64::<BigEndian>(index.id).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.space).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.page).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.index_type).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.trx_id_offset).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.n_user_defined_cols)
            .map_err(io_err)?;
        out.write_u32::<BigEndian>(index.n_uniq).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.n_nullable).map_err(io_err)?;
        out.write_u32::<BigEndian>(index.n_fields).map_err(io_err)?;
        write_str(out, &index.name)?;
        for field in &index.fields {
            out.write_u32::<BigEndian>(field.prefix_len).map_err(io_err)?;
            out.write_u32::<BigEndian>(field.fixed_len).map_err(io_err)?;
            out.write_u32::<BigEndian>(field.is_ascending).map_err(io_err)?;
            write_str(out, &field.name)?;
        }
    }

    Ok(())
}

/// Build and write the `.cfg` for a table in one step.
pub fn write_cfg_file<P: AsRef<Path>>(
    path: P,
    table: &TableMeta,
    space_flags: u32,
    id_map: &std::collections::HashMap<u64, u64>,
) -> Result<(), IbdError> {
    let cfg = build_cfg(table, space_flags, id_map)?;
    let path = path.as_ref();
    let mut file = std::fs::File::create(path)
        .map_err(|e| IbdError::Io(format!("cannot create {}: {}", path.display(), e)))?;
    write_cfg(&mut file, &cfg)
}

/// Structural reader for the layout [`write_cfg`] produces.
pub fn read_cfg<R: Read>(input: &mut R) -> Result<CfgTable, IbdError> {
    let version = input.read_u32::<BigEndian>().map_err(io_err)?;
    if version != CFG_VERSION {
        return Err(IbdError::Argument(format!(
            "cfg version {} unsupported (expected {})",
            version, CFG_VERSION
        )));
    }
    let hostname = read_str(input)?;
    let table_name = read_str(input)?;
    let autoinc = input.read_u64::<BigEndian>().map_err(io_err)?;
    let page_size = input.read_u32::<BigEndian>().map_err(io_err)?;
    let dict_table_flags = input.read_u32::<BigEndian>().map_err(io_err)?;
    let n_cols = input.read_u32::<BigEndian>().map_err(io_err)?;
    let n_instant_nullable = input.read_u32::<BigEndian>().map_err(io_err)?;
    let initial_col_count = input.read_u32::<BigEndian>().map_err(io_err)?;
    let current_col_count = input.read_u32::<BigEndian>().map_err(io_err)?;
    let total_col_count = input.read_u32::<BigEndian>().map_err(io_err)?;
    let n_instant_drop_cols = input.read_u32::<BigEndian>().map_err(io_err)?;
    let current_row_version = input.read_u32::<BigEndian>().map_err(io_err)?;
    let space_flags = input.read_u32::<BigEndian>().map_err(io_err)?;
    let compression_type = input.read_u8().map_err(io_err)?;

    let mut columns = Vec::with_capacity(n_cols as usize);
    for _ in 0..n_cols {
        let prtype = input.read_u32::<BigEndian>().map_err(io_err)?;
        let mtype = input.read_u32::<BigEndian>().map_err(io_err)?;
        let len = input.read_u32::<BigEndian>().map_err(io_err)?;
        let mbminmaxlen = input.read_u32::<BigEndian>().map_err(io_err)?;
        let ind = input.read_u32::<BigEndian>().map_err(io_err)?;
        let ord_part = input.read_u32::<BigEndian>().map_err(io_err)?;
        let max_prefix = input.read_u32::<BigEndian>().map_err(io_err)?;
        let name = read_str(input)?;
        let version_added = input.read_u8().map_err(io_err)?;
        let version_dropped = input.read_u8().map_err(io_err)?;
        let phy_pos = input.read_u32::<BigEndian>().map_err(io_err)?;

        let mut dropped_elements = Vec::new();
        if version_dropped > 0 {
            let mut block = [0u8; 22];
            input.read_exact(&mut block).map_err(io_err)?;
            let n = input.read_u32::<BigEndian>().map_err(io_err)?;
            for _ in 0..n {
                dropped_elements.push(read_str(input)?);
            }
        }

        let has_default = input.read_u8().map_err(io_err)?;
        let instant_default = if has_default == 1 {
            let null_flag = input.read_u8().map_err(io_err)?;
            if null_flag == 1 {
                Some(None)
            } else {
                let len = input.read_u32::<BigEndian>().map_err(io_err)? as usize;
                let mut bytes = vec![0u8; len];
                input.read_exact(&mut bytes).map_err(io_err)?;
                Some(Some(bytes))
            }
        } else {
            None
        };

        columns.push(CfgColumn {
            name,
            prtype,
            mtype,
            len,
            mbminmaxlen,
            ind,
            ord_part,
            max_prefix,
            version_added,
            version_dropped,
            phy_pos,
            dropped_elements,
            instant_default,
        });
    }

    let n_indexes = input.read_u32::<BigEndian>().map_err(io_err)?;
    let mut indexes = Vec::with_capacity(n_indexes as usize);
    for _ in 0..n_indexes {
        let id = input.read_u64::<BigEndian>().map_err(io_err)?;
        let space = input.read_u32::<BigEndian>().map_err(io_err)?;
        let page = input.read_u32::<BigEndian>().map_err(io_err)?;
        let index_type = input.read_u32::<BigEndian>().map_err(io_err)?;
        let trx_id_offset = input.read_u32::<BigEndian>().map_err(io_err)?;
        let n_user_defined_cols = input.read_u32::<BigEndian>().map_err(io_err)?;
        let n_uniq = input.read_u32::<BigEndian>().map_err(io_err)?;
        let n_nullable = input.read_u32::<BigEndian>().map_err(io_err)?;
        let n_fields = input.read_u32::<BigEndian>().map_err(io_err)?;
        let name = read_str(input)?;
        let mut fields = Vec::with_capacity(n_fields as usize);
        for _ in 0..n_fields {
            let prefix_len = input.read_u32::<BigEndian>().map_err(io_err)?;
            let fixed_len = input.read_u32::<BigEndian>().map_err(io_err)?;
            let is_ascending = input.read_u32::<BigEndian>().map_err(io_err)?;
            let name = read_str(input)?;
            fields.push(CfgIndexField {
                prefix_len,
                fixed_len,
                is_ascending,
                name,
            });
        }
        indexes.push(CfgIndex {
            id,
            space,
            page,
            index_type,
            trx_id_offset,
            n_user_defined_cols,
            n_uniq,
            n_nullable,
            n_fields,
            name,
            fields,
        });
    }

    Ok(CfgTable {
        version,
        hostname,
        table_name,
        autoinc,
        page_size,
        dict_table_flags,
        n_cols,
        n_instant_nullable,
        initial_col_count,
        current_col_count,
        total_col_count,
        n_instant_drop_cols,
        current_row_version,
        space_flags,
        compression_type,
        columns,
        indexes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innodb::schema::test_support::simple_table_sdi;
    use crate::innodb::schema::SdiDictionary;
    use std::collections::HashMap;

    fn table() -> TableMeta {
        SdiDictionary::from_value(simple_table_sdi())
            .unwrap()
            .table()
            .unwrap()
    }

    #[test]
    fn test_build_includes_system_columns() {
        let cfg = build_cfg(&table(), 0, &HashMap::new()).unwrap();
        let names: Vec<&str> = cfg.columns.iter().map(|c| c.name.as_str()).collect();
        // id, name, then DB_ROW_ID before DB_TRX_ID
        assert_eq!(
            names,
            vec!["id", "name", "DB_ROW_ID", "DB_TRX_ID", "DB_ROLL_PTR"]
        );
        assert_eq!(cfg.n_cols, 5);
        assert_eq!(cfg.columns[2].mtype, dtype::DATA_SYS);
        assert!(cfg.columns[2].prtype & dtype::DATA_NOT_NULL != 0);
        assert_eq!(cfg.columns[3].prtype & 0xFF, dtype::DATA_TRX_ID);
        assert_eq!(cfg.columns[4].prtype & 0xFF, dtype::DATA_ROLL_PTR);
    }

    #[test]
    fn test_sdi_index_synthesized_first() {
        let cfg = build_cfg(&table(), FSP_FLAGS_MASK_SDI, &HashMap::new()).unwrap();
        assert_eq!(cfg.indexes[0].name, SDI_INDEX_NAME);
        assert!(cfg.indexes[0].index_type & DICT_SDI != 0);
        assert_eq!(cfg.indexes[1].name, "PRIMARY");

        let without = build_cfg(&table(), 0, &HashMap::new()).unwrap();
        assert_eq!(without.indexes[0].name, "PRIMARY");
    }

    #[test]
    fn test_index_id_remap_applied() {
        let mut map = HashMap::new();
        map.insert(298u64, 0x200u64);
        let cfg = build_cfg(&table(), 0, &map).unwrap();
        let primary = cfg.indexes.iter().find(|i| i.name == "PRIMARY").unwrap();
        assert_eq!(primary.id, 0x200);
        let secondary = cfg.indexes.iter().find(|i| i.name == "name_idx").unwrap();
        assert_eq!(secondary.id, 299);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let cfg = build_cfg(&table(), FSP_FLAGS_MASK_SDI, &HashMap::new()).unwrap();
        let mut buf = Vec::new();
        write_cfg(&mut buf, &cfg).unwrap();
        let parsed = read_cfg(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_instant_default_roundtrip() {
        let mut table = table();
        // Simulate an instant-added column with a default.
        let mut note = table.columns[1].clone();
        note.name = "note".to_string();
        note.version_added = 1;
        note.default_bytes = Some(b"n/a".to_vec());
        note.ordinal_position = 5;
        table.columns.push(note);

        let cfg = build_cfg(&table, 0, &HashMap::new()).unwrap();
        assert!(cfg.current_row_version >= 1);
        let note = cfg.columns.iter().find(|c| c.name == "note").unwrap();
        assert_eq!(note.version_added, 1);
        assert_eq!(note.instant_default, Some(Some(b"n/a".to_vec())));

        let mut buf = Vec::new();
        write_cfg(&mut buf, &cfg).unwrap();
        let parsed = read_cfg(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_dropped_column_block_roundtrip() {
        let mut table = table();
        let mut gone = table.columns[1].clone();
        gone.name = "gone".to_string();
        gone.version_dropped = 1;
        gone.dd_type = dtype::DD_TYPE_ENUM;
        gone.elements = vec!["a".to_string(), "b".to_string()];
        gone.ordinal_position = 6;
        table.columns.push(gone);

        let cfg = build_cfg(&table, 0, &HashMap::new()).unwrap();
        assert_eq!(cfg.n_instant_drop_cols, 1);
        let gone = cfg.columns.iter().find(|c| c.name == "gone").unwrap();
        assert_eq!(gone.dropped_elements, vec!["a", "b"]);

        let mut buf = Vec::new();
        write_cfg(&mut buf, &cfg).unwrap();
        let parsed = read_cfg(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_version_check() {
        let cfg = build_cfg(&table(), 0, &HashMap::new()).unwrap();
        let mut buf = Vec::new();
        write_cfg(&mut buf, &cfg).unwrap();
        buf[3] = 6; // pretend V6
        assert!(matches!(
            read_cfg(&mut buf.as_slice()),
            Err(IbdError::Argument(_))
        ));
    }
}
