//! Spreadsheet export.
//!
//! Given N named tables, produce one xlsx document with N worksheets in the
//! order the caller passes them. The document is built entirely in memory.

use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet};

use crate::error::{ExportError, ExportResult};
use crate::models::{CellValue, NamedTable};

/// MIME type of the generated documents.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Number format applied to date cells.
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Write the tables into a single workbook and return its bytes.
///
/// Each sheet gets a bold header row followed by the data rows. Empty
/// cells are left unwritten.
pub fn write_workbook(sheets: &[NamedTable]) -> ExportResult<Vec<u8>> {
    if sheets.is_empty() {
        return Err(ExportError::NoSheets);
    }

    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format(DATETIME_FORMAT);

    let mut workbook = Workbook::new();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name.as_str())?;

        for (col, name) in sheet.table.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col_num(col), name.as_str(), &header_format)?;
        }

        for (i, row) in sheet.table.rows.iter().enumerate() {
            let row_num = row_num(i + 1);
            for (col, cell) in row.iter().enumerate() {
                write_cell(worksheet, row_num, col_num(col), cell, &date_format)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &CellValue,
    date_format: &Format,
) -> ExportResult<()> {
    match cell {
        CellValue::Empty => {}
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) if f.is_finite() => {
            worksheet.write_number(row, col, *f)?;
        }
        CellValue::Float(_) => {}
        CellValue::DateTime(dt) => {
            worksheet.write_datetime_with_format(row, col, dt, date_format)?;
        }
        CellValue::String(s) => {
            worksheet.write_string(row, col, s.as_str())?;
        }
    }
    Ok(())
}

// Indexes beyond the xlsx limits saturate so the writer reports them.
fn row_num(i: usize) -> RowNum {
    RowNum::try_from(i).unwrap_or(RowNum::MAX)
}

fn col_num(i: usize) -> ColNum {
    ColNum::try_from(i).unwrap_or(ColNum::MAX)
}
