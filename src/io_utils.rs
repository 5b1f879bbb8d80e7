//! Input helpers: path resolution, encoding, and CSV reader construction.
//!
//! Import files are read whole. The first record is the header row, so the
//! reader is built with `has_headers(false)` and every record is returned with
//! the physical line it started on. Rows may be ragged; short rows are handled
//! by the header map, not rejected here.

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_IMPORT_DELIMITER: u8 = b';';

/// Joins `path` onto the application root. Absolute paths are kept as given.
pub fn resolve_under_root(root: &Path, path: &Path) -> PathBuf {
    root.join(path)
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Opening input file {path:?}"))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads every record of `data`, pairing it with its 1-based line number.
///
/// Blank lines are skipped by the CSV reader without advancing its line
/// counter, so the line is recounted from the raw bytes: one plus the number of
/// `\n` before the first byte of the record.
pub fn read_records(
    data: &[u8],
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<(usize, Vec<String>)>> {
    let mut reader = open_csv_reader(data, delimiter);
    let mut records = Vec::new();
    let mut scanned = 0usize;
    let mut line = 1usize;
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading record {}", idx + 1))?;
        let offset = record
            .position()
            .map_or(scanned, |pos| pos.byte() as usize)
            .clamp(scanned, data.len());
        let start = record_start(data, offset);
        line += count_newlines(&data[scanned..start]);
        scanned = start;
        let decoded =
            decode_record(&record, encoding).with_context(|| format!("Decoding line {line}"))?;
        records.push((line, decoded));
    }
    Ok(records)
}

/// Skips the terminators of blank lines the reader passed over before a record.
fn record_start(data: &[u8], mut offset: usize) -> usize {
    while matches!(data.get(offset), Some(b'\n' | b'\r')) {
        offset += 1;
    }
    offset
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}
