//! Spreadsheet ingest backed by calamine.
//!
//! Uploads are read from their first worksheet; any sheet can be read by
//! name. The first row of a sheet is its header row.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDateTime;

use super::unique_headers;
use crate::error::{IngestError, IngestResult};
use crate::models::{CellValue, Table};

/// Parse spreadsheet bytes (xlsx, xls, xlsb or ods; sniffed from content).
pub fn parse_workbook_bytes(bytes: &[u8]) -> IngestResult<Table> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(IngestError::NoSheets)?;

    let range = workbook.worksheet_range(&first_sheet)?;
    range_to_table(&range)
}

/// Parse a specific worksheet by name.
pub fn parse_workbook_sheet(bytes: &[u8], sheet: &str) -> IngestResult<Table> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range(sheet)?;
    range_to_table(&range)
}

/// Parse a spreadsheet file from disk.
pub fn parse_workbook_file<P: AsRef<Path>>(path: P) -> IngestResult<Table> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_workbook_bytes(&bytes)
}

fn range_to_table(range: &Range<Data>) -> IngestResult<Table> {
    let mut rows = range.rows();

    let header = rows.next().ok_or(IngestError::EmptyFile)?;
    if header.iter().all(is_blank) {
        return Err(IngestError::NoHeaders);
    }

    let names: Vec<String> = header
        .iter()
        .map(|cell| cell_value(cell).text().unwrap_or_default())
        .collect();
    let mut table = Table::new(unique_headers(names));

    for row in rows {
        if row.iter().all(is_blank) {
            continue;
        }
        table.push_row(row.iter().map(cell_value).collect());
    }

    Ok(table)
}

fn is_blank(cell: &Data) -> bool {
    cell_value(cell).is_empty()
}

/// Convert a calamine cell into a [`CellValue`].
///
/// Error cells (`#N/A`, `#DIV/0!`) and empty strings read as empty.
fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}
