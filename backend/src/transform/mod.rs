//! Transformation module.
//!
//! This module handles the receivables report rules:
//! - Normalize: percentage and invoice suffix field rules
//! - Filter: exclusion, currency split and auto-detraction classification
//! - Pipeline: ingest → filter → export orchestration

pub mod filter;
pub mod normalize;
pub mod pipeline;

pub use filter::{filter_and_classify, sheets, FilterReport, FilterRules, Partitions};
pub use normalize::{invoice_suffix, normalize_percentage, parse_percentage, PercentageError};
pub use pipeline::*;
