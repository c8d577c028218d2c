//! CSV I/O boundary: delimiter/encoding resolution and table load/store.
//!
//! All file I/O flows through this module. The loading boundary converts
//! missing, empty, and unparseable files into typed [`ReconcileError`] kinds
//! so the core stages only ever see present, well-formed tables. Empty CSV
//! fields load as absent cells; absent cells serialize back as empty fields.
//!
//! The `-` path convention routes through standard streams, output is always
//! UTF-8, and CSV output uses `QuoteStyle::Always` for round-trip safety.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::{
    error::ReconcileError,
    table::{Cell, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(base))
}

fn decode_bytes(bytes: &[u8], encoding: &'static Encoding, path: &Path) -> Result<String, ReconcileError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(ReconcileError::UnparseableInput {
            path: path.to_path_buf(),
            message: format!("undecodable {} byte sequence", encoding.name()),
        })
    } else {
        Ok(text.into_owned())
    }
}

/// Loads a CSV file into a [`Table`], mapping I/O and parse failures to the
/// typed error kinds. Empty fields become absent cells.
pub fn read_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Table, ReconcileError> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        let file = File::open(path).map_err(|_| ReconcileError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        let len = file
            .metadata()
            .map(|meta| meta.len())
            .unwrap_or(u64::MAX);
        if len == 0 {
            return Err(ReconcileError::EmptyInput {
                path: path.to_path_buf(),
            });
        }
        Box::new(BufReader::new(file))
    };

    let mut csv_reader = open_csv_reader(reader, delimiter);
    let header_record = csv_reader
        .byte_headers()
        .map_err(|err| ReconcileError::UnparseableInput {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?
        .clone();
    if header_record.is_empty() {
        return Err(ReconcileError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    let mut columns = Vec::with_capacity(header_record.len());
    for field in header_record.iter() {
        columns.push(decode_bytes(field, encoding, path)?);
    }

    let mut table = Table::new(columns);
    for (row_idx, record) in csv_reader.byte_records().enumerate() {
        let record = record.map_err(|err| ReconcileError::UnparseableInput {
            path: path.to_path_buf(),
            message: format!("row {}: {err}", row_idx + 2),
        })?;
        let mut row: Vec<Cell> = Vec::with_capacity(record.len());
        for field in record.iter() {
            let text = decode_bytes(field, encoding, path)?;
            row.push(if text.is_empty() { None } else { Some(text) });
        }
        table.push_row(row);
    }
    Ok(table)
}

/// Writes a table as CSV with a header row; absent cells become empty fields.
pub fn write_table(table: &Table, path: Option<&Path>, delimiter: u8) -> Result<()> {
    let mut writer = open_csv_writer(path, delimiter)?;
    write_table_to(table, &mut writer)
}

pub fn write_table_to<W: Write>(table: &Table, writer: &mut csv::Writer<W>) -> Result<()> {
    writer
        .write_record(table.columns())
        .context("Writing output headers")?;
    for (row_idx, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .with_context(|| format!("Writing output row {}", row_idx + 1))?;
    }
    writer.flush().context("Flushing output")?;
    Ok(())
}
