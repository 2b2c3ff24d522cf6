//! Error types for the detraction filtering service.
//!
//! One enum per layer, mirroring the flow of a request:
//!
//! - [`IngestError`] - reading uploaded text or spreadsheet bytes
//! - [`TransformError`] - the filter-and-classify rules
//! - [`ExportError`] - writing the output workbook
//! - [`PipelineError`] - orchestration of the three above
//! - [`ServerError`] - HTTP surface, mapped to status codes in `api::server`
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Ingest Errors
// =============================================================================

/// Errors while turning uploaded bytes into a [`crate::models::Table`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be parsed.
    #[error("Invalid delimited text: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet container could not be opened or read.
    #[error("Invalid spreadsheet: {0}")]
    Workbook(#[from] calamine::Error),

    /// Spreadsheet has no worksheets.
    #[error("Spreadsheet contains no worksheets")]
    NoSheets,

    /// Empty file.
    #[error("File is empty")]
    EmptyFile,

    /// No header row found.
    #[error("No header row found")]
    NoHeaders,
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised by the filter-and-classify pipeline.
#[derive(Debug, Error)]
pub enum TransformError {
    /// One or more columns the rules depend on are absent.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing the output workbook.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Underlying xlsx writer failure (invalid sheet name, too many rows, ...).
    #[error("Failed to write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// No sheet was given to the writer.
    #[error("At least one sheet is required")]
    NoSheets,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::process_bytes`]
/// and [`crate::transform::pipeline::convert_text_bytes`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Ingest error.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body exceeds the configured upload limit.
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
