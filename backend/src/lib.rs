//! # Autodetracciones - receivables report filtering for detraction review
//!
//! Takes the receivables report exported from the ERP and produces the
//! workbook the finance team reviews: every surviving row, plus USD, PEN and
//! auto-detraction partitions. A second flow turns plain `.txt` exports into
//! a spreadsheet without filtering.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ xlsx / txt  │────▶│   Parser    │────▶│  Transform  │────▶│   Export    │
//! │  (upload)   │     │ (auto-enc)  │     │  (rules)    │     │ (4 sheets)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autodetracciones::{process_file, ProcessOptions};
//!
//! let output = process_file("cobranzas.xlsx", &ProcessOptions::default())?;
//! std::fs::write(output.file_name, &output.workbook)?;
//! println!("{} rows moved to AUTODETRACCIONES", output.report.auto_detraction_rows);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cell values, tables and report column names
//! - [`parser`] - Text and spreadsheet ingest with auto-detection
//! - [`transform`] - Field normalization, filter rules and pipeline
//! - [`export`] - Multi-sheet xlsx writer
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Ingest
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ExportError, IngestError, PipelineError, ServerError, TransformError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{columns, CellValue, NamedTable, Table};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_file_auto, parse_text_bytes,
    parse_text_file, parse_workbook_bytes, parse_workbook_file, ParseResult,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    filter_and_classify, invoice_suffix, normalize_percentage, parse_percentage, sheets,
    FilterReport, FilterRules, Partitions, PercentageError,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert_text_bytes, convert_text_file, process_bytes, process_file, ConvertOutput,
    ProcessOptions, ProcessOutput, CONVERTED_FILE_NAME, PROCESSED_FILE_NAME,
};

// =============================================================================
// Re-exports - Export and API
// =============================================================================

pub use export::{write_workbook, XLSX_CONTENT_TYPE};
pub use api::{build_router, error_response, start_server, ServerConfig};
