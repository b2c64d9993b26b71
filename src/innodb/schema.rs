//! SDI data-dictionary model.
//!
//! MySQL 8 serializes every table definition as SDI JSON: a top-level array
//! whose first element is the marker string `"ibd2sdi"`, followed by
//! `{type, id, object}` entries. Type 1 objects describe a table, type 2 a
//! tablespace. This module loads that JSON (from a file or from records
//! extracted out of the tablespace itself) and turns the parts this tool
//! needs (columns, indexes, instant-column history, se_private_data) into
//! typed metadata for the record decoder, the rebuild engine and the `.cfg`
//! writer.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::innodb::dtype;
use crate::innodb::record::FieldDef;
use crate::IbdError;

/// Marker string heading every `ibd2sdi` dump.
pub const SDI_MARKER: &str = "ibd2sdi";

/// One raw SDI entry: `(type, id, object)`.
#[derive(Debug, Clone)]
pub struct RawSdiEntry {
    pub entry_type: u64,
    pub id: u64,
    pub object: Value,
}

/// SDI entry type codes.
pub const SDI_TYPE_TABLE: u64 = 1;
pub const SDI_TYPE_TABLESPACE: u64 = 2;

// ---------------------------------------------------------------------------
// Raw JSON deserialization structs
// ---------------------------------------------------------------------------

/// `object` envelope around a dd_object.
#[derive(Debug, Deserialize)]
pub struct SdiObject {
    #[serde(default)]
    pub mysqld_version_id: u64,
    #[serde(default)]
    pub dd_object_type: String,
    #[serde(default)]
    pub dd_object: Value,
}

/// Data-dictionary table definition (the parts this tool consumes).
#[derive(Debug, Default, Deserialize)]
pub struct DdTable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schema_ref: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub collation_id: u64,
    #[serde(default)]
    pub row_format: u64,
    #[serde(default)]
    pub mysql_version_id: u64,
    #[serde(default)]
    pub se_private_data: String,
    #[serde(default)]
    pub columns: Vec<DdColumn>,
    #[serde(default)]
    pub indexes: Vec<DdIndex>,
}

/// Data-dictionary column definition.
#[derive(Debug, Default, Deserialize)]
pub struct DdColumn {
    #[serde(default)]
    pub name: String,
    /// dd::enum_column_types code.
    #[serde(rename = "type", default)]
    pub dd_type: u64,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unsigned: bool,
    #[serde(default)]
    pub is_auto_increment: bool,
    #[serde(default)]
    pub is_virtual: bool,
    /// 1=visible, 2=SE-hidden (system columns), 3/4=SQL/user hidden.
    #[serde(default)]
    pub hidden: u64,
    #[serde(default)]
    pub ordinal_position: u64,
    #[serde(default)]
    pub char_length: u64,
    #[serde(default)]
    pub numeric_precision: u64,
    #[serde(default)]
    pub numeric_scale: u64,
    #[serde(default)]
    pub datetime_precision: u64,
    #[serde(default)]
    pub collation_id: u64,
    #[serde(default)]
    pub column_type_utf8: String,
    #[serde(default)]
    pub se_private_data: String,
    #[serde(default)]
    pub elements: Vec<DdColumnElement>,
}

/// ENUM/SET element.
#[derive(Debug, Default, Deserialize)]
pub struct DdColumnElement {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub index: u64,
}

/// Data-dictionary index definition.
#[derive(Debug, Default, Deserialize)]
pub struct DdIndex {
    #[serde(default)]
    pub name: String,
    /// 1=PRIMARY, 2=UNIQUE, 3=MULTIPLE, 4=FULLTEXT, 5=SPATIAL.
    #[serde(rename = "type", default)]
    pub index_type: u64,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub se_private_data: String,
    #[serde(default)]
    pub elements: Vec<DdIndexElement>,
}

/// Index element (column reference).
#[derive(Debug, Default, Deserialize)]
pub struct DdIndexElement {
    #[serde(default)]
    pub ordinal_position: u64,
    /// Prefix length in bytes; 4294967295 = whole column.
    #[serde(default)]
    pub length: u64,
    /// 2 = ascending, 3 = descending.
    #[serde(default)]
    pub order: u64,
    #[serde(default)]
    pub hidden: bool,
    /// 0-based index into the table's columns array.
    #[serde(default)]
    pub column_opx: u64,
}

/// Data-dictionary tablespace definition.
#[derive(Debug, Default, Deserialize)]
pub struct DdTablespace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub se_private_data: String,
}

// ---------------------------------------------------------------------------
// se_private_data
// ---------------------------------------------------------------------------

/// Parse a `;`-separated `key=value` bag.
pub fn parse_se_private_data(data: &str) -> HashMap<String, String> {
    data.split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

fn se_u64(map: &HashMap<String, String>, key: &str) -> Option<u64> {
    map.get(key).and_then(|v| v.parse().ok())
}

// ---------------------------------------------------------------------------
// Processed metadata
// ---------------------------------------------------------------------------

/// Processed column metadata.
#[derive(Debug, Clone, Default)]
pub struct ColumnMeta {
    pub name: String,
    pub dd_type: u64,
    pub is_nullable: bool,
    pub is_unsigned: bool,
    pub is_auto_increment: bool,
    pub is_virtual: bool,
    /// True for DB_TRX_ID / DB_ROLL_PTR / DB_ROW_ID.
    pub is_se_hidden: bool,
    pub ordinal_position: u64,
    pub char_length: u64,
    pub numeric_precision: u64,
    pub numeric_scale: u64,
    pub datetime_precision: u64,
    pub collation_id: u64,
    pub column_type_utf8: String,
    /// ENUM/SET element names in declaration order.
    pub elements: Vec<String>,
    /// Instant row version that added this column (0 = original).
    pub version_added: u32,
    /// Instant row version that dropped this column (0 = never).
    pub version_dropped: u32,
    /// Dense physical position among stored columns, when recorded.
    pub phy_pos: Option<u32>,
    /// Instant default value bytes (decoded from the hex se_private key).
    pub default_bytes: Option<Vec<u8>>,
    /// Instant default is SQL NULL.
    pub default_null: bool,
}

impl ColumnMeta {
    fn from_dd(dd: &DdColumn) -> Result<Self, IbdError> {
        let se = parse_se_private_data(&dd.se_private_data);
        let default_bytes = match se.get("default") {
            Some(hex) => Some(crate::util::hex::decode(hex).map_err(|e| {
                IbdError::SdiParse(format!("column {}: bad default hex: {}", dd.name, e))
            })?),
            None => None,
        };

        Ok(ColumnMeta {
            name: dd.name.clone(),
            dd_type: dd.dd_type,
            is_nullable: dd.is_nullable,
            is_unsigned: dd.is_unsigned,
            is_auto_increment: dd.is_auto_increment,
            is_virtual: dd.is_virtual,
            is_se_hidden: dd.hidden == 2,
            ordinal_position: dd.ordinal_position,
            char_length: dd.char_length,
            numeric_precision: dd.numeric_precision,
            numeric_scale: dd.numeric_scale,
            datetime_precision: dd.datetime_precision,
            collation_id: dd.collation_id,
            column_type_utf8: dd.column_type_utf8.clone(),
            elements: {
                let mut elems: Vec<(u64, String)> = dd
                    .elements
                    .iter()
                    .map(|e| (e.index, e.name.clone()))
                    .collect();
                elems.sort_by_key(|(i, _)| *i);
                elems.into_iter().map(|(_, n)| n).collect()
            },
            version_added: se_u64(&se, "version_added").unwrap_or(0) as u32,
            version_dropped: se_u64(&se, "version_dropped").unwrap_or(0) as u32,
            phy_pos: se_u64(&se, "physical_pos").map(|v| v as u32),
            default_bytes,
            default_null: se.get("default_null").map(|v| v == "1").unwrap_or(false),
        })
    }

    /// A [`FieldDef`] describing this column's physical storage.
    pub fn field_def(&self) -> FieldDef {
        FieldDef {
            name: self.name.clone(),
            fixed_len: dtype::fixed_storage_size(self),
            nullable: self.is_nullable,
            two_byte_len: dtype::two_byte_len_header(self),
            max_len: dtype::max_byte_length(self),
            version_added: self.version_added,
            version_dropped: self.version_dropped,
        }
    }
}

/// Index kind from the DD type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Unique,
    Multiple,
    Fulltext,
    Spatial,
}

impl IndexKind {
    pub fn from_dd(code: u64) -> Self {
        match code {
            1 => IndexKind::Primary,
            2 => IndexKind::Unique,
            4 => IndexKind::Fulltext,
            5 => IndexKind::Spatial,
            _ => IndexKind::Multiple,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexKind::Primary => "PRIMARY",
            IndexKind::Unique => "UNIQUE",
            IndexKind::Multiple => "MULTIPLE",
            IndexKind::Fulltext => "FULLTEXT",
            IndexKind::Spatial => "SPATIAL",
        }
    }
}

/// One column reference inside an index.
#[derive(Debug, Clone)]
pub struct IndexElement {
    /// Index into [`TableMeta::columns`].
    pub column_opx: usize,
    /// Prefix length in bytes, when the element covers a prefix only.
    pub prefix_len: Option<u32>,
    pub ascending: bool,
    /// Hidden element (system column or implicit PK suffix).
    pub hidden: bool,
}

/// Processed index metadata.
#[derive(Debug, Clone)]
pub struct IndexMeta {
    pub name: String,
    pub kind: IndexKind,
    /// InnoDB index id from se_private_data.
    pub id: u64,
    /// Tablespace the index lives in.
    pub space_id: u32,
    /// Root page number from se_private_data.
    pub root_page: u32,
    pub elements: Vec<IndexElement>,
}

impl IndexMeta {
    fn from_dd(dd: &DdIndex, n_columns: usize) -> Result<Self, IbdError> {
        let se = parse_se_private_data(&dd.se_private_data);
        let mut elements = Vec::with_capacity(dd.elements.len());
        let mut sorted: Vec<&DdIndexElement> = dd.elements.iter().collect();
        sorted.sort_by_key(|e| e.ordinal_position);
        for e in sorted {
            let opx = e.column_opx as usize;
            if opx >= n_columns {
                return Err(IbdError::SdiParse(format!(
                    "index {}: column_opx {} out of range",
                    dd.name, opx
                )));
            }
            elements.push(IndexElement {
                column_opx: opx,
                prefix_len: if e.length == u32::MAX as u64 {
                    None
                } else {
                    Some(e.length as u32)
                },
                ascending: e.order != 3,
                hidden: e.hidden,
            });
        }

        Ok(IndexMeta {
            name: dd.name.clone(),
            kind: IndexKind::from_dd(dd.index_type),
            id: se_u64(&se, "id").unwrap_or(0),
            space_id: se_u64(&se, "space_id").unwrap_or(0) as u32,
            root_page: se_u64(&se, "root").unwrap_or(0) as u32,
            elements,
        })
    }
}

/// Where a record field's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Index into [`TableMeta::columns`].
    Column(usize),
    TrxId,
    RollPtr,
}

/// One field of a leaf record: physical definition plus its source.
#[derive(Debug, Clone)]
pub struct RecordField {
    pub def: FieldDef,
    pub source: FieldSource,
}

/// Processed table metadata.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub name: String,
    pub schema: String,
    pub collation_id: u64,
    pub row_format: u64,
    pub mysql_version_id: u64,
    /// AUTO_INCREMENT counter from se_private_data, if recorded.
    pub autoinc: u64,
    pub columns: Vec<ColumnMeta>,
    pub indexes: Vec<IndexMeta>,
}

impl TableMeta {
    /// Build the processed model from a deserialized DD table.
    pub fn from_dd(dd: &DdTable) -> Result<Self, IbdError> {
        if dd.name.is_empty() {
            return Err(IbdError::SdiParse("table object has no name".to_string()));
        }
        let columns = dd
            .columns
            .iter()
            .map(ColumnMeta::from_dd)
            .collect::<Result<Vec<_>, _>>()?;
        let indexes = dd
            .indexes
            .iter()
            .filter(|i| !i.hidden)
            .map(|i| IndexMeta::from_dd(i, columns.len()))
            .collect::<Result<Vec<_>, _>>()?;

        let table = TableMeta {
            name: dd.name.clone(),
            schema: dd.schema_ref.clone(),
            collation_id: dd.collation_id,
            row_format: dd.row_format,
            mysql_version_id: dd.mysql_version_id,
            autoinc: se_u64(&parse_se_private_data(&dd.se_private_data), "autoinc")
                .unwrap_or(0),
            columns,
            indexes,
        };
        if table.primary_index().is_none() {
            return Err(IbdError::SdiParse(format!(
                "table {} has no PRIMARY index",
                table.name
            )));
        }
        Ok(table)
    }

    /// The clustered (PRIMARY) index.
    pub fn primary_index(&self) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Look an index up by name or numeric id.
    pub fn find_index(&self, selector: &str) -> Option<&IndexMeta> {
        if let Some(idx) = self.indexes.iter().find(|i| i.name == selector) {
            return Some(idx);
        }
        let id: u64 = selector.parse().ok()?;
        self.indexes.iter().find(|i| i.id == id)
    }

    /// User-visible columns (what row output shows), in declaration order.
    pub fn visible_columns(&self) -> Vec<usize> {
        let mut cols: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                !c.is_virtual && !c.is_se_hidden && c.version_dropped == 0
            })
            .map(|(i, _)| i)
            .collect();
        cols.sort_by_key(|&i| self.columns[i].ordinal_position);
        cols
    }

    /// Number of instant-added columns.
    pub fn n_instant_added(&self) -> usize {
        self.columns.iter().filter(|c| c.version_added > 0).count()
    }

    /// Number of instant-dropped columns.
    pub fn n_instant_dropped(&self) -> usize {
        self.columns.iter().filter(|c| c.version_dropped > 0).count()
    }

    /// Highest row version any column change introduced.
    pub fn current_row_version(&self) -> u32 {
        self.columns
            .iter()
            .map(|c| c.version_added.max(c.version_dropped))
            .max()
            .unwrap_or(0)
    }

    /// Build the physical leaf-record layout for an index.
    ///
    /// For the clustered index: key columns, DB_TRX_ID, DB_ROLL_PTR, then
    /// the remaining stored columns (ordered by physical position when
    /// instant metadata recorded one). Secondary index leaves carry the
    /// declared key columns followed by the missing PRIMARY columns and no
    /// system columns.
    pub fn leaf_layout(&self, index: &IndexMeta) -> Result<Vec<RecordField>, IbdError> {
        match index.kind {
            IndexKind::Primary => self.clustered_layout(),
            _ => self.secondary_layout(index),
        }
    }

    fn key_column_opxs(&self, index: &IndexMeta) -> Vec<usize> {
        index
            .elements
            .iter()
            .filter(|e| !e.hidden)
            .map(|e| e.column_opx)
            .collect()
    }

    fn clustered_layout(&self) -> Result<Vec<RecordField>, IbdError> {
        let primary = self
            .primary_index()
            .ok_or_else(|| IbdError::SdiParse(format!("table {} has no PRIMARY", self.name)))?;
        let key_opxs = self.key_column_opxs(primary);

        let mut fields = Vec::new();
        for &opx in &key_opxs {
            let col = &self.columns[opx];
            let mut def = col.field_def();
            // Clustered key columns are never NULL on disk.
            def.nullable = false;
            fields.push(RecordField {
                def,
                source: FieldSource::Column(opx),
            });
        }

        fields.push(RecordField {
            def: FieldDef::fixed("DB_TRX_ID", 6, false),
            source: FieldSource::TrxId,
        });
        fields.push(RecordField {
            def: FieldDef::fixed("DB_ROLL_PTR", 7, false),
            source: FieldSource::RollPtr,
        });

        // Remaining stored columns. Instant ALTER records a dense physical
        // position; when present it governs the on-disk order.
        let mut rest: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                !c.is_virtual && !c.is_se_hidden && !key_opxs.contains(i)
            })
            .map(|(i, _)| i)
            .collect();
        if rest.iter().any(|&i| self.columns[i].phy_pos.is_some()) {
            rest.sort_by_key(|&i| {
                self.columns[i]
                    .phy_pos
                    .map(u64::from)
                    .unwrap_or(u64::MAX - self.columns[i].ordinal_position)
            });
        } else {
            rest.sort_by_key(|&i| self.columns[i].ordinal_position);
        }

        for opx in rest {
            fields.push(RecordField {
                def: self.columns[opx].field_def(),
                source: FieldSource::Column(opx),
            });
        }
        Ok(fields)
    }

    fn secondary_layout(&self, index: &IndexMeta) -> Result<Vec<RecordField>, IbdError> {
        let primary = self
            .primary_index()
            .ok_or_else(|| IbdError::SdiParse(format!("table {} has no PRIMARY", self.name)))?;
        let pk_opxs = self.key_column_opxs(primary);

        let mut fields = Vec::new();
        let mut seen = Vec::new();
        for element in &index.elements {
            let opx = element.column_opx;
            let col = &self.columns[opx];
            if col.is_se_hidden {
                continue;
            }
            let mut def = col.field_def();
            if let Some(prefix) = element.prefix_len {
                def.fixed_len = None;
                def.max_len = prefix as usize;
                def.two_byte_len = prefix > 255;
            }
            seen.push(opx);
            fields.push(RecordField {
                def,
                source: FieldSource::Column(opx),
            });
        }

        // The PK suffix is implicit when the DD did not spell it out.
        for opx in pk_opxs {
            if !seen.contains(&opx) {
                let mut def = self.columns[opx].field_def();
                def.nullable = false;
                fields.push(RecordField {
                    def,
                    source: FieldSource::Column(opx),
                });
            }
        }
        Ok(fields)
    }

    /// Key layout of an index (the fields a node-pointer record carries
    /// before the child page number).
    pub fn key_layout(&self, index: &IndexMeta) -> Vec<RecordField> {
        let mut fields = Vec::new();
        for element in &index.elements {
            if element.hidden && index.kind == IndexKind::Primary {
                continue;
            }
            let col = &self.columns[element.column_opx];
            if col.is_se_hidden {
                continue;
            }
            let mut def = col.field_def();
            if index.kind == IndexKind::Primary {
                def.nullable = false;
            }
            fields.push(RecordField {
                def,
                source: FieldSource::Column(element.column_opx),
            });
        }
        fields
    }
}

/// Processed tablespace metadata from a type-2 SDI entry.
#[derive(Debug, Clone, Default)]
pub struct TablespaceMeta {
    pub name: String,
    /// FSP flags recorded in se_private_data.
    pub flags: Option<u32>,
    /// Space id recorded in se_private_data.
    pub space_id: Option<u32>,
}

impl TablespaceMeta {
    fn from_dd(dd: &DdTablespace) -> Self {
        let se = parse_se_private_data(&dd.se_private_data);
        TablespaceMeta {
            name: dd.name.clone(),
            flags: se_u64(&se, "flags").map(|v| v as u32),
            space_id: se_u64(&se, "id").map(|v| v as u32),
        }
    }
}

// ---------------------------------------------------------------------------
// Dictionary loading
// ---------------------------------------------------------------------------

/// A loaded SDI dictionary: the raw entries plus typed accessors.
#[derive(Debug, Clone)]
pub struct SdiDictionary {
    pub entries: Vec<RawSdiEntry>,
}

impl SdiDictionary {
    /// Load an `ibd2sdi` JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, IbdError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| IbdError::Io(format!("cannot read {}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| IbdError::SdiParse(format!("{}: {}", path.display(), e)))?;
        Self::from_value(value)
    }

    /// Build a dictionary from a parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, IbdError> {
        let Value::Array(items) = value else {
            return Err(IbdError::SdiParse(
                "top-level SDI JSON is not an array".to_string(),
            ));
        };

        let mut entries = Vec::new();
        for item in items {
            // The ibd2sdi marker string is not an entry.
            if matches!(&item, Value::String(s) if s == SDI_MARKER) {
                continue;
            }
            let Value::Object(map) = &item else {
                return Err(IbdError::SdiParse(format!(
                    "SDI entry is not an object: {}",
                    item
                )));
            };
            let entry_type = map
                .get("type")
                .and_then(Value::as_u64)
                .ok_or_else(|| IbdError::SdiParse("entry type is not numeric".to_string()))?;
            let id = map
                .get("id")
                .and_then(Value::as_u64)
                .ok_or_else(|| IbdError::SdiParse("entry id is not numeric".to_string()))?;
            let object = map
                .get("object")
                .cloned()
                .ok_or_else(|| IbdError::SdiParse("entry has no object".to_string()))?;
            entries.push(RawSdiEntry {
                entry_type,
                id,
                object,
            });
        }

        Ok(SdiDictionary { entries })
    }

    /// Build a dictionary from `(type, id, json)` triples extracted from a
    /// tablespace's SDI index.
    pub fn from_records(records: Vec<(u64, u64, String)>) -> Result<Self, IbdError> {
        let mut entries = Vec::new();
        for (entry_type, id, json) in records {
            let object: Value = serde_json::from_str(&json).map_err(|e| {
                IbdError::SdiParse(format!("SDI record {}:{}: {}", entry_type, id, e))
            })?;
            entries.push(RawSdiEntry {
                entry_type,
                id,
                object,
            });
        }
        Ok(SdiDictionary { entries })
    }

    fn dd_object(entry: &RawSdiEntry) -> Result<SdiObject, IbdError> {
        serde_json::from_value(entry.object.clone())
            .map_err(|e| IbdError::SdiParse(format!("entry {}: {}", entry.id, e)))
    }

    /// The table metadata (first type-1 entry whose object is a Table).
    pub fn table(&self) -> Result<TableMeta, IbdError> {
        for entry in &self.entries {
            if entry.entry_type != SDI_TYPE_TABLE {
                continue;
            }
            let object = Self::dd_object(entry)?;
            if object.dd_object_type != "Table" {
                continue;
            }
            let dd: DdTable = serde_json::from_value(object.dd_object)
                .map_err(|e| IbdError::SdiParse(format!("table entry {}: {}", entry.id, e)))?;
            return TableMeta::from_dd(&dd);
        }
        Err(IbdError::SdiParse(
            "no Table object in the SDI".to_string(),
        ))
    }

    /// The tablespace metadata, if a type-2 entry is present.
    pub fn tablespace(&self) -> Option<TablespaceMeta> {
        for entry in &self.entries {
            if entry.entry_type != SDI_TYPE_TABLESPACE {
                continue;
            }
            let object = Self::dd_object(entry).ok()?;
            if object.dd_object_type != "Tablespace" {
                continue;
            }
            let dd: DdTablespace = serde_json::from_value(object.dd_object).ok()?;
            return Some(TablespaceMeta::from_dd(&dd));
        }
        None
    }

    /// Entries sorted ascending by `(type, id)`, the order SDI records are
    /// written to a rebuilt tablespace.
    pub fn sorted_entries(&self) -> Vec<&RawSdiEntry> {
        let mut entries: Vec<&RawSdiEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| (e.entry_type, e.id));
        entries
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::{json, Value};

    /// A two-column table `t (id INT PK, name VARCHAR(50))` as its SDI JSON
    /// document, the shape `ibd2sdi` emits.
    pub fn simple_table_sdi() -> Value {
        json!([
            "ibd2sdi",
            {
                "type": 1,
                "id": 330,
                "object": {
                    "mysqld_version_id": 80030,
                    "dd_object_type": "Table",
                    "dd_object": {
                        "name": "t",
                        "schema_ref": "test",
                        "engine": "InnoDB",
                        "collation_id": 255,
                        "row_format": 2,
                        "se_private_data": "autoinc=5;table_id=1058;",
                        "columns": [
                            {
                                "name": "id",
                                "type": 4,
                                "is_nullable": false,
                                "is_unsigned": false,
                                "hidden": 1,
                                "ordinal_position": 1,
                                "char_length": 11,
                                "column_type_utf8": "int",
                                "se_private_data": "table_id=1058;"
                            },
                            {
                                "name": "name",
                                "type": 16,
                                "is_nullable": true,
                                "hidden": 1,
                                "ordinal_position": 2,
                                "char_length": 200,
                                "collation_id": 255,
                                "column_type_utf8": "varchar(50)",
                                "se_private_data": "table_id=1058;"
                            },
                            {
                                "name": "DB_TRX_ID",
                                "type": 10,
                                "is_nullable": false,
                                "hidden": 2,
                                "ordinal_position": 3
                            },
                            {
                                "name": "DB_ROLL_PTR",
                                "type": 9,
                                "is_nullable": false,
                                "hidden": 2,
                                "ordinal_position": 4
                            }
                        ],
                        "indexes": [
                            {
                                "name": "PRIMARY",
                                "type": 1,
                                "se_private_data": "id=298;root=4;space_id=23;table_id=1058;trx_id=2569;",
                                "elements": [
                                    {"ordinal_position": 1, "length": 4294967295u64, "order": 2, "hidden": false, "column_opx": 0},
                                    {"ordinal_position": 2, "length": 4294967295u64, "order": 2, "hidden": true, "column_opx": 2},
                                    {"ordinal_position": 3, "length": 4294967295u64, "order": 2, "hidden": true, "column_opx": 3},
                                    {"ordinal_position": 4, "length": 4294967295u64, "order": 2, "hidden": true, "column_opx": 1}
                                ]
                            },
                            {
                                "name": "name_idx",
                                "type": 3,
                                "se_private_data": "id=299;root=5;space_id=23;table_id=1058;",
                                "elements": [
                                    {"ordinal_position": 1, "length": 4294967295u64, "order": 2, "hidden": false, "column_opx": 1},
                                    {"ordinal_position": 2, "length": 4294967295u64, "order": 2, "hidden": true, "column_opx": 0}
                                ]
                            }
                        ]
                    }
                }
            },
            {
                "type": 2,
                "id": 23,
                "object": {
                    "dd_object_type": "Tablespace",
                    "dd_object": {
                        "name": "test/t",
                        "se_private_data": "flags=16417;id=23;server_version=80030;space_version=1;"
                    }
                }
            }
        ])
    }
}
