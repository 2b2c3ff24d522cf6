//! Domain models for the detraction filtering pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`CellValue`] - A single heterogeneous cell read from an upload
//! - [`Table`] - Header row plus data rows aligned to it
//! - [`NamedTable`] - A table destined for a named worksheet
//! - [`columns`] - Column names the rules read and write

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Column Names
// =============================================================================

/// Column names of the invoice report the filtering rules operate on.
pub mod columns {
    /// Customer legal name.
    pub const CUSTOMER_NAME: &str = "INVOICE_CUSTOMER_NAME";
    /// Customer tax identifier (RUC).
    pub const TAXPAYER_ID: &str = "INVOICE_CUSTOMER_TAXPAYER_ID";
    /// Invoice identifier.
    pub const INVOICE_ID: &str = "XXX";
    /// Invoice date.
    pub const INVOICE_DATE: &str = "INVOICE_DATE";
    /// ISO currency code (`PEN`, `USD`, ...).
    pub const CURRENCY: &str = "CURRENCY";
    /// Amount in invoice (local) currency.
    pub const AMOUNT: &str = "INVOICE_AMOUNT";
    /// Amount in functional currency.
    pub const AMOUNT_FUNCTIONAL: &str = "INVOICE_AMOUNT_FUNCTIONAL";
    /// Transaction type code.
    pub const TRANSACTION_TYPE: &str = "TRANSACTION_TYPE";
    /// Receipt (payment) method.
    pub const RECEIPT_METHOD: &str = "RECEIPT_METHOD";
    /// Detraction percentage.
    pub const PERCENTAGE: &str = "%";
    /// Derived column holding the last six characters of the invoice identifier.
    pub const INVOICE_SUFFIX: &str = "XXX_last6";

    /// Columns kept in every output partition, in output order.
    pub const PROJECTED: [&str; 6] = [
        CUSTOMER_NAME,
        TAXPAYER_ID,
        INVOICE_ID,
        INVOICE_DATE,
        CURRENCY,
        AMOUNT,
    ];
}

// =============================================================================
// Cell Value
// =============================================================================

/// A single cell of an uploaded table.
///
/// Spreadsheets and delimited text both land here; nothing about the
/// column schema is assumed beyond what the rules read.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Missing value (blank cell, empty field).
    #[default]
    Empty,
    /// Boolean cell.
    Bool(bool),
    /// Integer cell.
    Int(i64),
    /// Floating point cell.
    Float(f64),
    /// Date or date-time cell.
    DateTime(NaiveDateTime),
    /// Text cell.
    String(String),
}

impl CellValue {
    /// Build a cell from raw delimited text, inferring integer, then float,
    /// then falling back to text. Blank input becomes [`CellValue::Empty`].
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Float(f);
            }
        }
        CellValue::String(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Borrow the text of a [`CellValue::String`] cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text is accepted when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Textual form of the cell, or `None` for an empty cell.
    ///
    /// Integral floats render without a fractional part, so an invoice number
    /// stored as `123456789.0` reads back as `"123456789"`.
    pub fn text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{}", v)
                }
            }
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            CellValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}

// =============================================================================
// Table
// =============================================================================

/// Tabular data: a header row and data rows aligned to it.
///
/// Every row has exactly `columns.len()` cells; [`Table::push_row`] pads
/// short rows with [`CellValue::Empty`] and drops surplus cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, normalizing its width to the header.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    /// Position of a column by exact header name (first match wins).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column header.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| {
                        let value = serde_json::to_value(cell).unwrap_or(Value::Null);
                        (col.clone(), value)
                    })
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

/// A table paired with the worksheet name it is exported under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTable {
    pub name: String,
    pub table: Table,
}

impl NamedTable {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_types() {
        assert_eq!(CellValue::infer("42"), CellValue::Int(42));
        assert_eq!(CellValue::infer(" 3.5 "), CellValue::Float(3.5));
        assert_eq!(CellValue::infer(""), CellValue::Empty);
        assert_eq!(CellValue::infer("   "), CellValue::Empty);
        assert_eq!(CellValue::infer("95%"), CellValue::String("95%".into()));
        assert_eq!(CellValue::infer("NaN"), CellValue::String("NaN".into()));
    }

    #[test]
    fn test_integral_float_text() {
        assert_eq!(CellValue::Float(123456789.0).text().as_deref(), Some("123456789"));
        assert_eq!(CellValue::Float(0.95).text().as_deref(), Some("0.95"));
        assert_eq!(CellValue::Empty.text(), None);
    }

    #[test]
    fn test_as_f64_accepts_numeric_text() {
        assert_eq!(CellValue::from(" 700 ").as_f64(), Some(700.0));
        assert_eq!(CellValue::from("abc").as_f64(), None);
        assert_eq!(CellValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_push_row_pads_and_truncates() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![CellValue::Int(1)]);
        table.push_row(vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)]);

        assert_eq!(table.rows[0], vec![CellValue::Int(1), CellValue::Empty]);
        assert_eq!(table.rows[1].len(), 2);
    }

    #[test]
    fn test_to_records() {
        let mut table = Table::new(vec!["name".into(), "amount".into()]);
        table.push_row(vec!["Alice".into(), CellValue::Float(700.5)]);
        table.push_row(vec!["Bob".into(), CellValue::Empty]);

        let records = table.to_records();
        assert_eq!(records[0]["name"], "Alice");
        assert_eq!(records[0]["amount"], 700.5);
        assert!(records[1]["amount"].is_null());
    }
}
