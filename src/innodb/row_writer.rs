//! Row output emitters.
//!
//! Decoded rows leave the tool as pipe-separated text (default), RFC 4180
//! CSV, or JSONL (one object per record). `--with-meta` prepends the page
//! number, record offset and delete mark of each record.

use std::io::Write;

use serde_json::{Map, Number, Value};

use crate::innodb::field_decode::FieldValue;
use crate::IbdError;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFormat {
    #[default]
    Pipe,
    Csv,
    Jsonl,
}

impl RowFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pipe" => Some(RowFormat::Pipe),
            "csv" => Some(RowFormat::Csv),
            "jsonl" => Some(RowFormat::Jsonl),
            _ => None,
        }
    }
}

/// Per-record metadata columns.
#[derive(Debug, Clone, Copy)]
pub struct RowMeta {
    pub page_no: u64,
    pub rec_offset: usize,
    pub deleted: bool,
}

/// Streams rows into a writer in one of the three formats.
pub struct RowWriter<'a> {
    out: &'a mut dyn Write,
    format: RowFormat,
    with_meta: bool,
}

impl<'a> RowWriter<'a> {
    pub fn new(out: &'a mut dyn Write, format: RowFormat, with_meta: bool) -> Self {
        RowWriter {
            out,
            format,
            with_meta,
        }
    }

    /// Emit one row. `meta` is ignored unless the writer was built with
    /// `with_meta`.
    pub fn write_row(
        &mut self,
        meta: Option<RowMeta>,
        columns: &[(&str, FieldValue)],
    ) -> Result<(), IbdError> {
        match self.format {
            RowFormat::Pipe => self.write_pipe(meta, columns),
            RowFormat::Csv => self.write_csv(meta, columns),
            RowFormat::Jsonl => self.write_jsonl(meta, columns),
        }
        .map_err(|e| IbdError::Io(format!("row output: {}", e)))
    }

    fn meta_cells(&self, meta: Option<RowMeta>) -> Vec<String> {
        match (self.with_meta, meta) {
            (true, Some(m)) => vec![
                m.page_no.to_string(),
                m.rec_offset.to_string(),
                if m.deleted { "1" } else { "0" }.to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn write_pipe(
        &mut self,
        meta: Option<RowMeta>,
        columns: &[(&str, FieldValue)],
    ) -> std::io::Result<()> {
        let mut cells = self.meta_cells(meta);
        cells.extend(columns.iter().map(|(_, v)| v.as_text()));
        writeln!(self.out, "{}", cells.join("|"))
    }

    fn write_csv(
        &mut self,
        meta: Option<RowMeta>,
        columns: &[(&str, FieldValue)],
    ) -> std::io::Result<()> {
        let mut cells = self.meta_cells(meta);
        cells.extend(columns.iter().map(|(_, v)| match v {
            FieldValue::Null => String::new(),
            other => other.as_text(),
        }));
        let escaped: Vec<String> = cells.iter().map(|c| csv_escape(c)).collect();
        writeln!(self.out, "{}", escaped.join(","))
    }

    fn write_jsonl(
        &mut self,
        meta: Option<RowMeta>,
        columns: &[(&str, FieldValue)],
    ) -> std::io::Result<()> {
        let mut object = Map::new();
        if self.with_meta {
            if let Some(m) = meta {
                object.insert("page_no".to_string(), Value::from(m.page_no));
                object.insert("rec_offset".to_string(), Value::from(m.rec_offset));
                object.insert("rec_deleted".to_string(), Value::from(m.deleted));
            }
        }
        for (name, value) in columns {
            object.insert((*name).to_string(), json_value(value));
        }
        writeln!(self.out, "{}", Value::Object(object))
    }
}

fn json_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Int(v) => Value::from(*v),
        FieldValue::Uint(v) => Value::from(*v),
        FieldValue::Float(v) => Number::from_f64(*v as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Double(v) => Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Str(s) => Value::String(s.clone()),
        FieldValue::Hex(h) => Value::String(h.clone()),
    }
}

/// RFC 4180: quote cells containing comma, quote, or line breaks; double
/// embedded quotes.
fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') || cell.contains('\r') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Vec<(&'static str, FieldValue)> {
        vec![
            ("id", FieldValue::Int(1)),
            ("amount", FieldValue::Str("1234.56".to_string())),
            ("note", FieldValue::Null),
        ]
    }

    #[test]
    fn test_pipe() {
        let mut buf = Vec::new();
        let mut w = RowWriter::new(&mut buf, RowFormat::Pipe, false);
        w.write_row(None, &row()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1|1234.56|NULL\n");
    }

    #[test]
    fn test_pipe_with_meta() {
        let mut buf = Vec::new();
        let mut w = RowWriter::new(&mut buf, RowFormat::Pipe, true);
        w.write_row(
            Some(RowMeta {
                page_no: 4,
                rec_offset: 128,
                deleted: false,
            }),
            &row(),
        )
        .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "4|128|0|1|1234.56|NULL\n");
    }

    #[test]
    fn test_csv_escaping() {
        let mut buf = Vec::new();
        let mut w = RowWriter::new(&mut buf, RowFormat::Csv, false);
        w.write_row(
            None,
            &[
                ("a", FieldValue::Str("plain".to_string())),
                ("b", FieldValue::Str("has,comma".to_string())),
                ("c", FieldValue::Str("has \"quote\"".to_string())),
                ("d", FieldValue::Str("line\nbreak".to_string())),
                ("e", FieldValue::Null),
            ],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "plain,\"has,comma\",\"has \"\"quote\"\"\",\"line\nbreak\",\n"
        );
    }

    #[test]
    fn test_jsonl() {
        let mut buf = Vec::new();
        let mut w = RowWriter::new(&mut buf, RowFormat::Jsonl, false);
        w.write_row(None, &row()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "{\"id\":1,\"amount\":\"1234.56\",\"note\":null}\n"
        );
    }

    #[test]
    fn test_jsonl_meta_first() {
        let mut buf = Vec::new();
        let mut w = RowWriter::new(&mut buf, RowFormat::Jsonl, true);
        w.write_row(
            Some(RowMeta {
                page_no: 7,
                rec_offset: 99,
                deleted: true,
            }),
            &[("id", FieldValue::Int(2))],
        )
        .unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert!(line.starts_with("{\"page_no\":7,\"rec_offset\":99,\"rec_deleted\":true"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(RowFormat::from_name("pipe"), Some(RowFormat::Pipe));
        assert_eq!(RowFormat::from_name("csv"), Some(RowFormat::Csv));
        assert_eq!(RowFormat::from_name("jsonl"), Some(RowFormat::Jsonl));
        assert_eq!(RowFormat::from_name("xml"), None);
    }
}
