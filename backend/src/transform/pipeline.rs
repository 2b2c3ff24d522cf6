//! High-level pipeline API: uploaded bytes in, workbook bytes out.
//!
//! Two independent flows share the same ingest and export layers:
//!
//! - [`process_bytes`] - spreadsheet → filter-and-classify → four-sheet workbook
//! - [`convert_text_bytes`] - delimited text → single-sheet workbook, no filtering
//!
//! # Example
//!
//! ```rust,ignore
//! use autodetracciones::transform::pipeline::{process_file, ProcessOptions};
//!
//! let output = process_file("cobranzas.xlsx", &ProcessOptions::default())?;
//! std::fs::write(output.file_name, &output.workbook)?;
//! ```

use serde::Serialize;
use std::path::Path;

use super::filter::{filter_and_classify, FilterReport, FilterRules};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::error::PipelineResult;
use crate::export::write_workbook;
use crate::models::NamedTable;
use crate::parser::{format_delimiter, parse_text_bytes, parse_workbook_bytes};

/// Download name of the filtered workbook.
pub const PROCESSED_FILE_NAME: &str = "SGS Autodetracciones_filtrado_final.xlsx";

/// Download name of the converted text upload.
pub const CONVERTED_FILE_NAME: &str = "resultado.xlsx";

/// Worksheet name of the converted text upload.
pub const CONVERTED_SHEET_NAME: &str = "Sheet1";

/// Options for the filtering pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessOptions {
    /// Business constants applied by the filter
    pub rules: FilterRules,
}

/// Result of the filtering pipeline
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Workbook bytes (Todos_los_datos, USD, PEN, AUTODETRACCIONES)
    pub workbook: Vec<u8>,
    /// Suggested download name
    pub file_name: &'static str,
    /// Per-stage row counts
    pub report: FilterReport,
}

/// Result of the text conversion
#[derive(Debug, Clone)]
pub struct ConvertOutput {
    /// Workbook bytes with a single sheet
    pub workbook: Vec<u8>,
    /// Suggested download name
    pub file_name: &'static str,
    /// Delimiter used to split the text
    pub delimiter: char,
    /// Number of data rows written
    pub row_count: usize,
}

/// Filter an uploaded spreadsheet into the four-sheet workbook.
///
/// 1. Reads the first worksheet
/// 2. Applies [`filter_and_classify`]
/// 3. Writes the partitions in sheet order
pub fn process_bytes(bytes: &[u8], options: &ProcessOptions) -> PipelineResult<ProcessOutput> {
    log_info("📖 Reading spreadsheet...");
    let table = parse_workbook_bytes(bytes)?;
    log_success(format!(
        "Read {} rows, {} columns",
        table.len(),
        table.columns.len()
    ));

    log_info("⚙️  Applying detraction rules...");
    let partitions = filter_and_classify(table, &options.rules)?;
    print_report(&partitions.report);

    log_info("💾 Writing workbook...");
    let report = partitions.report.clone();
    let workbook = write_workbook(&partitions.into_sheets())?;
    log_success(format!("Workbook ready ({} bytes)", workbook.len()));

    Ok(ProcessOutput {
        workbook,
        file_name: PROCESSED_FILE_NAME,
        report,
    })
}

/// Filter a spreadsheet file from disk.
pub fn process_file<P: AsRef<Path>>(path: P, options: &ProcessOptions) -> PipelineResult<ProcessOutput> {
    let bytes = std::fs::read(path.as_ref()).map_err(crate::error::IngestError::from)?;
    process_bytes(&bytes, options)
}

/// Convert delimited text into a single-sheet workbook, unfiltered.
pub fn convert_text_bytes(bytes: &[u8]) -> PipelineResult<ConvertOutput> {
    log_info("📖 Reading text file...");
    let parsed = parse_text_bytes(bytes)?;

    log_success(format!("Detected encoding: {}", parsed.encoding));
    if parsed.delimiter_detected {
        log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    } else {
        log_warning(format!(
            "Separator not detected, using '{}'",
            format_delimiter(parsed.delimiter)
        ));
    }
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.table.len(),
        parsed.table.columns.len()
    ));

    let row_count = parsed.table.len();
    let workbook = write_workbook(&[NamedTable::new(CONVERTED_SHEET_NAME, parsed.table)])?;

    Ok(ConvertOutput {
        workbook,
        file_name: CONVERTED_FILE_NAME,
        delimiter: parsed.delimiter,
        row_count,
    })
}

/// Convert a delimited text file from disk.
pub fn convert_text_file<P: AsRef<Path>>(path: P) -> PipelineResult<ConvertOutput> {
    let bytes = std::fs::read(path.as_ref()).map_err(crate::error::IngestError::from)?;
    convert_text_bytes(&bytes)
}

/// Print filter statistics
fn print_report(report: &FilterReport) {
    log_success(format!("{} input rows", report.input_rows));
    if report.excluded_invoices > 0 {
        log_info_indent(
            format!(
                "{} invoices paid by excluded method ({} rows removed)",
                report.excluded_invoices, report.rows_excluded_by_receipt_method
            ),
            1,
        );
    }
    if report.rows_excluded_by_transaction_type > 0 {
        log_info_indent(
            format!("{} rows removed by transaction type", report.rows_excluded_by_transaction_type),
            1,
        );
    }
    log_success(format!("{} rows after exclusions", report.filtered_rows));
    if report.rows_below_minimum > 0 {
        log_info_indent(format!("{} rows below minimum amount", report.rows_below_minimum), 1);
    }
    if report.mid_band_rows > 0 {
        log_info_indent(format!("{} rows in mid-band exclusion", report.mid_band_rows), 1);
    }
    log_success(format!(
        "USD: {} | PEN: {} | AUTODETRACCIONES: {}",
        report.usd_rows, report.pen_rows, report.auto_detraction_rows
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestError, PipelineError, TransformError};
    use crate::models::{columns, CellValue, Table};
    use crate::parser::{parse_workbook_bytes, parse_workbook_sheet};
    use calamine::{open_workbook_auto_from_rs, Reader};
    use std::io::Cursor;

    fn report_table() -> Table {
        let mut table = Table::new(
            [
                columns::CUSTOMER_NAME,
                columns::TAXPAYER_ID,
                columns::INVOICE_ID,
                columns::INVOICE_DATE,
                columns::CURRENCY,
                columns::AMOUNT,
                columns::AMOUNT_FUNCTIONAL,
                columns::TRANSACTION_TYPE,
                columns::RECEIPT_METHOD,
                columns::PERCENTAGE,
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        );
        let rows = [
            ("F001-000001", "PEN", 800.0, "100%"),
            ("F001-000002", "PEN", 650.0, "50%"),
            ("F001-000003", "USD", 900.0, "87.9%"),
            ("F001-000004", "USD", 1500.0, "12%"),
        ];
        for (invoice, currency, amount, pct) in rows {
            table.push_row(vec![
                "ACME SAC".into(),
                "20100047218".into(),
                invoice.into(),
                "2024-02-01".into(),
                currency.into(),
                CellValue::Float(amount),
                CellValue::Float(amount),
                "FAC".into(),
                "PE_TRANSFER".into(),
                pct.into(),
            ]);
        }
        table
    }

    fn upload(table: Table) -> Vec<u8> {
        write_workbook(&[NamedTable::new("Hoja1", table)]).unwrap()
    }

    fn read_sheet(bytes: &[u8], name: &str) -> Table {
        parse_workbook_sheet(bytes, name).unwrap()
    }

    #[test]
    fn test_process_bytes_end_to_end() {
        let output = process_bytes(&upload(report_table()), &ProcessOptions::default()).unwrap();

        assert_eq!(output.file_name, "SGS Autodetracciones_filtrado_final.xlsx");
        assert_eq!(output.report.input_rows, 4);
        assert_eq!(output.report.auto_detraction_rows, 1);
        assert_eq!(output.report.usd_rows, 1);
        assert_eq!(output.report.pen_rows, 0);

        let workbook = open_workbook_auto_from_rs(Cursor::new(output.workbook.as_slice())).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["Todos_los_datos", "USD", "PEN", "AUTODETRACCIONES"]
        );

        let usd = read_sheet(&output.workbook, "USD");
        assert_eq!(usd.columns.last().map(String::as_str), Some("XXX_last6"));
        assert_eq!(usd.rows[0][2], CellValue::from("F001-000004"));
        assert_eq!(usd.rows[0][6], CellValue::from("000004"));

        let pen = read_sheet(&output.workbook, "PEN");
        assert!(pen.is_empty());

        let auto = read_sheet(&output.workbook, "AUTODETRACCIONES");
        assert_eq!(auto.len(), 1);
        assert_eq!(auto.rows[0][2], CellValue::from("F001-000001"));
    }

    // The fixture has no percentage in (1.0, 1.01], which would not survive a rerun
    #[test]
    fn test_full_sheet_rerun_reproduces_partitions() {
        let options = ProcessOptions::default();
        let first = process_bytes(&upload(report_table()), &options).unwrap();

        // The full sheet is the first worksheet, so it can be uploaded as-is
        let second = process_bytes(&first.workbook, &options).unwrap();

        assert_eq!(first.report.usd_rows, second.report.usd_rows);
        assert_eq!(first.report.pen_rows, second.report.pen_rows);
        assert_eq!(first.report.auto_detraction_rows, second.report.auto_detraction_rows);
        for sheet in ["USD", "PEN", "AUTODETRACCIONES"] {
            assert_eq!(read_sheet(&first.workbook, sheet), read_sheet(&second.workbook, sheet));
        }
    }

    #[test]
    fn test_process_bytes_missing_columns() {
        let mut table = Table::new(vec!["a".into()]);
        table.push_row(vec![CellValue::Int(1)]);

        let err = process_bytes(&upload(table), &ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Transform(TransformError::MissingColumns(_))));
    }

    #[test]
    fn test_process_bytes_rejects_non_spreadsheet() {
        let err = process_bytes(b"a\tb\n1\t2", &ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Ingest(IngestError::Workbook(_))));
    }

    #[test]
    fn test_convert_text_bytes() {
        let output = convert_text_bytes(b"a\tb\n1\t2").unwrap();

        assert_eq!(output.file_name, "resultado.xlsx");
        assert_eq!(output.delimiter, '\t');
        assert_eq!(output.row_count, 1);

        let workbook = open_workbook_auto_from_rs(Cursor::new(output.workbook.as_slice())).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Sheet1"]);

        let table = parse_workbook_bytes(&output.workbook).unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0][0].as_f64(), Some(1.0));
        assert_eq!(table.rows[0][1].as_f64(), Some(2.0));
    }

    #[test]
    fn test_convert_semicolon_text() {
        let output = convert_text_bytes("cliente;monto\nÁlvarez;1500.5\nRuiz;20".as_bytes()).unwrap();

        assert_eq!(output.delimiter, ';');
        let table = parse_workbook_bytes(&output.workbook).unwrap();
        assert_eq!(table.rows[0][0], CellValue::from("Álvarez"));
        assert_eq!(table.rows[0][1], CellValue::Float(1500.5));
    }

    #[test]
    fn test_process_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cobranzas.xlsx");
        std::fs::write(&path, upload(report_table())).unwrap();

        let output = process_file(&path, &ProcessOptions::default()).unwrap();
        assert_eq!(output.report.input_rows, 4);

        let missing = process_file(dir.path().join("nope.xlsx"), &ProcessOptions::default());
        assert!(matches!(missing, Err(PipelineError::Ingest(IngestError::Io(_)))));
    }
}
