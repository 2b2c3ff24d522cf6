//! Response bodies shared by the HTTP handlers.
//!
//! Successful uploads answer with a spreadsheet attachment; failures on the
//! filtering endpoint answer with a small JSON error document.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::export::XLSX_CONTENT_TYPE;

/// Error document sent to the browser when a request fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Unique identifier, handy to match a failure with the server log
    pub job_id: String,

    /// Always "error"
    pub status: String,

    /// Human readable message
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: "error".to_string(),
            error: error.into(),
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    serde_json::to_value(ErrorResponse::new(error))
        .unwrap_or_else(|_| Value::String(error.to_string()))
}

/// Build a `200 OK` download response for a generated workbook.
pub fn xlsx_attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    let mut response = (StatusCode::OK, Body::from(bytes)).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}
