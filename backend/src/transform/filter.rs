//! Filter-and-classify rules for the receivables report.
//!
//! # Stages
//!
//! ```text
//! rows ─▶ normalize % ─▶ drop sentinel-paid invoices ─▶ drop BOL types ─┬─▶ Todos_los_datos
//!                                                                        │
//!                              ┌──── PEN (INVOICE_AMOUNT ≥ 700) ◀───────┤
//!                              │                                         │
//!                              │     USD (INVOICE_AMOUNT_FUNCTIONAL ≥ 700)
//!                              ▼
//!            % in [0.99, 1.01] ─▶ AUTODETRACCIONES (dedup by invoice)
//!            % in [0.8769, 0.8832] ─▶ dropped
//!            rest ─▶ suffix key ─▶ dedup by key ─▶ sort by key ─▶ PEN / USD
//! ```
//!
//! Each partition is computed from the full row set of the previous stage;
//! there is no per-row early exit.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use super::normalize::{invoice_suffix, normalize_percentage};
use crate::error::{TransformError, TransformResult};
use crate::models::{columns, CellValue, NamedTable, Table};

/// Worksheet names of the output workbook, in output order.
pub mod sheets {
    pub const ALL: &str = "Todos_los_datos";
    pub const USD: &str = "USD";
    pub const PEN: &str = "PEN";
    pub const AUTO_DETRACTIONS: &str = "AUTODETRACCIONES";
}

/// Fixed business constants of the filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterRules {
    /// Receipt method that excludes every line of the invoices it appears on.
    pub excluded_receipt_method: String,
    /// Transaction types containing this marker are dropped (case-sensitive).
    pub excluded_transaction_marker: String,
    /// Minimum amount for both currencies (inclusive).
    pub minimum_amount: f64,
    /// Half-width of the auto-detraction band around 100%.
    pub auto_detraction_tolerance: f64,
    /// Lower bound of the mid-band exclusion (inclusive).
    pub mid_band_min: f64,
    /// Upper bound of the mid-band exclusion (inclusive).
    pub mid_band_max: f64,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            excluded_receipt_method: "PE_F391501_BANC_5414_PEN".to_string(),
            excluded_transaction_marker: "BOL".to_string(),
            minimum_amount: 700.0,
            auto_detraction_tolerance: 0.01,
            mid_band_min: 0.8769,
            mid_band_max: 0.8832,
        }
    }
}

impl FilterRules {
    /// Whether a normalized percentage is an auto-detraction (~100%).
    pub fn is_auto_detraction(&self, pct: f64) -> bool {
        let low = 1.0 - self.auto_detraction_tolerance;
        let high = 1.0 + self.auto_detraction_tolerance;
        (low..=high).contains(&pct)
    }

    /// Whether a normalized percentage falls in the mid-band exclusion.
    pub fn is_mid_band(&self, pct: f64) -> bool {
        (self.mid_band_min..=self.mid_band_max).contains(&pct)
    }

    fn meets_minimum(&self, amount: &CellValue) -> bool {
        amount.as_f64().is_some_and(|a| a >= self.minimum_amount)
    }
}

/// Row counts recorded while the rules run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterReport {
    pub input_rows: usize,
    /// Distinct invoices paid at least once with the excluded receipt method.
    pub excluded_invoices: usize,
    pub rows_excluded_by_receipt_method: usize,
    pub rows_excluded_by_transaction_type: usize,
    pub filtered_rows: usize,
    pub rows_below_minimum: usize,
    pub mid_band_rows: usize,
    pub usd_rows: usize,
    pub pen_rows: usize,
    pub auto_detraction_rows: usize,
}

/// The four output partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Partitions {
    /// Every input column, after invoice and transaction type exclusion.
    pub all: Table,
    pub usd: Table,
    pub pen: Table,
    pub auto_detractions: Table,
    pub report: FilterReport,
}

impl Partitions {
    /// Sheets in workbook order.
    pub fn into_sheets(self) -> Vec<NamedTable> {
        vec![
            NamedTable::new(sheets::ALL, self.all),
            NamedTable::new(sheets::USD, self.usd),
            NamedTable::new(sheets::PEN, self.pen),
            NamedTable::new(sheets::AUTO_DETRACTIONS, self.auto_detractions),
        ]
    }
}

/// Column positions the rules read, resolved once per table.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    percentage: usize,
    receipt_method: usize,
    invoice_id: usize,
    transaction_type: usize,
    currency: usize,
    amount: usize,
    amount_functional: usize,
    projected: [usize; 6],
}

impl ColumnMap {
    fn resolve(table: &Table) -> TransformResult<Self> {
        let mut missing: Vec<String> = Vec::new();
        let mut find = |name: &str| {
            table.column_index(name).unwrap_or_else(|| {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                0
            })
        };

        let map = ColumnMap {
            percentage: find(columns::PERCENTAGE),
            receipt_method: find(columns::RECEIPT_METHOD),
            invoice_id: find(columns::INVOICE_ID),
            transaction_type: find(columns::TRANSACTION_TYPE),
            currency: find(columns::CURRENCY),
            amount: find(columns::AMOUNT),
            amount_functional: find(columns::AMOUNT_FUNCTIONAL),
            projected: columns::PROJECTED.map(&mut find),
        };

        if missing.is_empty() {
            Ok(map)
        } else {
            Err(TransformError::MissingColumns(missing))
        }
    }
}

type Row = Vec<CellValue>;

/// Apply the filter-and-classify rules to an ingested table.
///
/// Fails only when a column the rules read is missing; individual bad
/// cells never abort the run. Rows not matching the header width are
/// padded or truncated first.
///
/// Percentages are normalized in place, so the full sheet carries values
/// in fraction form. Feeding that sheet back in reproduces the same
/// partitions, except for percentages in `(1.0, 1.01]`: those read as
/// whole percentages the second time and leave the auto-detraction band.
pub fn filter_and_classify(table: Table, rules: &FilterRules) -> TransformResult<Partitions> {
    let cols = ColumnMap::resolve(&table)?;
    let Table { columns: header, mut rows } = table;

    for row in rows.iter_mut() {
        row.resize(header.len(), CellValue::Empty);
    }

    let mut report = FilterReport {
        input_rows: rows.len(),
        ..Default::default()
    };

    // Normalize percentage in place; the full sheet shows the normalized value
    for row in rows.iter_mut() {
        let pct = normalize_percentage(&row[cols.percentage]);
        row[cols.percentage] = CellValue::Float(pct);
    }

    // Drop every line of invoices paid with the excluded receipt method
    let excluded: HashSet<Option<String>> = rows
        .iter()
        .filter(|row| row[cols.receipt_method].as_str() == Some(rules.excluded_receipt_method.as_str()))
        .map(|row| row[cols.invoice_id].text())
        .collect();
    report.excluded_invoices = excluded.len();

    let before = rows.len();
    rows.retain(|row| !excluded.contains(&row[cols.invoice_id].text()));
    report.rows_excluded_by_receipt_method = before - rows.len();

    // Drop transaction types carrying the marker; blanks and non-text are kept
    let before = rows.len();
    rows.retain(|row| {
        !row[cols.transaction_type]
            .as_str()
            .is_some_and(|t| t.contains(rules.excluded_transaction_marker.as_str()))
    });
    report.rows_excluded_by_transaction_type = before - rows.len();
    report.filtered_rows = rows.len();

    // Split by currency, each with its own amount column
    let by_currency = |code: &str, amount_col: usize| -> (Vec<Row>, usize) {
        let candidates: Vec<&Row> = rows
            .iter()
            .filter(|row| row[cols.currency].as_str() == Some(code))
            .collect();
        let total = candidates.len();
        let kept: Vec<Row> = candidates
            .into_iter()
            .filter(|row| rules.meets_minimum(&row[amount_col]))
            .cloned()
            .collect();
        let dropped = total - kept.len();
        (kept, dropped)
    };
    let (pen, pen_below) = by_currency("PEN", cols.amount);
    let (usd, usd_below) = by_currency("USD", cols.amount_functional);
    report.rows_below_minimum = pen_below + usd_below;

    let pct_of = |row: &Row| row[cols.percentage].as_f64().unwrap_or(0.0);

    // Auto-detractions: PEN first, then USD, first line per invoice wins
    let mut auto_rows: Vec<Row> = Vec::new();
    for (code, group) in [("PEN", &pen), ("USD", &usd)] {
        for row in group.iter().filter(|row| rules.is_auto_detraction(pct_of(row))) {
            let mut row = row.clone();
            row[cols.currency] = CellValue::from(code);
            auto_rows.push(row);
        }
    }
    let auto_rows = dedup_by(auto_rows, |row| row[cols.invoice_id].text());
    let auto_invoices: HashSet<Option<String>> = auto_rows
        .iter()
        .map(|row| row[cols.invoice_id].text())
        .collect();

    // Remaining working sets: no auto-detraction invoice, no mid-band row
    let mut mid_band = 0;
    let mut remaining = |group: Vec<Row>| -> Vec<Row> {
        group
            .into_iter()
            .filter(|row| {
                !rules.is_auto_detraction(pct_of(row))
                    && !auto_invoices.contains(&row[cols.invoice_id].text())
            })
            .filter(|row| {
                let keep = !rules.is_mid_band(pct_of(row));
                if !keep {
                    mid_band += 1;
                }
                keep
            })
            .collect()
    };
    let pen = remaining(pen);
    let usd = remaining(usd);
    report.mid_band_rows = mid_band;

    let auto_detractions = project(&auto_rows, &cols, false);
    let pen = finish_currency(&pen, &cols);
    let usd = finish_currency(&usd, &cols);

    report.pen_rows = pen.len();
    report.usd_rows = usd.len();
    report.auto_detraction_rows = auto_detractions.len();

    Ok(Partitions {
        all: Table {
            columns: header,
            rows,
        },
        usd,
        pen,
        auto_detractions,
        report,
    })
}

/// Project, add the suffix key, dedup by key and sort by key.
fn finish_currency(rows: &[Row], cols: &ColumnMap) -> Table {
    let mut table = project(rows, cols, true);
    let key_col = table.columns.len() - 1;

    let mut keyed = dedup_by(std::mem::take(&mut table.rows), |row| row[key_col].text());
    keyed.sort_by(|a, b| compare_keys(a[key_col].text(), b[key_col].text()));

    table.rows = keyed;
    table
}

/// Reduce rows to the output columns, optionally appending the suffix key.
fn project(rows: &[Row], cols: &ColumnMap, with_suffix: bool) -> Table {
    let mut header: Vec<String> = columns::PROJECTED.iter().map(|c| c.to_string()).collect();
    if with_suffix {
        header.push(columns::INVOICE_SUFFIX.to_string());
    }

    let mut table = Table::new(header);
    for row in rows {
        let mut out: Row = cols.projected.iter().map(|&i| row[i].clone()).collect();
        if with_suffix {
            out.push(invoice_suffix(&row[cols.invoice_id]).map_or(CellValue::Empty, CellValue::from));
        }
        table.push_row(out);
    }
    table
}

/// Keep the first row per key, preserving order. Missing keys form one group.
fn dedup_by<F>(rows: Vec<Row>, key: F) -> Vec<Row>
where
    F: Fn(&Row) -> Option<String>,
{
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(key(row))).collect()
}

/// Ascending string order with missing keys last.
fn compare_keys(a: Option<String>, b: Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
