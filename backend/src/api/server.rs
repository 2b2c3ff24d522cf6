//! HTTP server for the detraction filtering service.
//!
//! # API Endpoints
//!
//! | Method | Path                | Description                                  |
//! |--------|---------------------|----------------------------------------------|
//! | GET    | `/health`           | Health check                                 |
//! | POST   | `/procesar_archivo` | Filter a spreadsheet into the 4-sheet report |
//! | POST   | `/upload`           | Convert a `.txt` export into a spreadsheet   |
//! | GET    | `/api/logs`         | SSE stream for real-time logs                |

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, xlsx_attachment};
use crate::error::{PipelineError, ServerError, ServerResult, TransformError};
use crate::parser::is_text_upload;
use crate::transform::filter::FilterRules;
use crate::transform::pipeline::{convert_text_bytes, process_bytes, ProcessOptions};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5001;

/// Default upload size limit in MiB.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 32;

/// Multipart field carrying the upload.
const FILE_FIELD: &str = "file";

const MISSING_FILE_MESSAGE: &str = "No se encontró el archivo";
const UNSUPPORTED_FORMAT_MESSAGE: &str = "Formato no soportado";

/// Server settings, passed to [`build_router`] and [`start_server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Maximum accepted request body, in bytes
    pub max_upload_bytes: usize,
    /// Business constants used by `/procesar_archivo`
    pub rules: FilterRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            rules: FilterRules::default(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Per-router state shared by the handlers.
#[derive(Debug)]
struct AppState {
    options: ProcessOptions,
}

/// Build the application router.
pub fn build_router(config: &ServerConfig) -> Router {
    // Permissive CORS; the download name is read from Content-Disposition
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let state = Arc::new(AppState {
        options: ProcessOptions {
            rules: config.rules.clone(),
        },
    });

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/procesar_archivo", post(process_upload))
        .route("/upload", post(convert_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr();
    let app = build_router(&config);

    println!("🚀 Autodetracciones server running on http://{}", addr);
    println!("   POST /procesar_archivo - Filter detraction report");
    println!("   POST /upload           - Convert .txt to .xlsx");
    println!("   GET  /api/logs         - SSE log stream");
    println!("   GET  /health           - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "autodetracciones",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "process": "POST /procesar_archivo",
            "convert": "POST /upload",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the lost entries
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// An uploaded file pulled out of a multipart body.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Read the first `file` part of a multipart body, if any.
///
/// Only parts carrying a filename count as uploads; a plain form value
/// named `file` is skipped.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?.to_vec();
        return Ok(Some(Upload { file_name, bytes }));
    }

    Ok(None)
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(err.body_text())
        } else {
            ServerError::BadRequest(format!("Multipart error: {}", err.body_text()))
        }
    }
}

/// Filter an uploaded spreadsheet and return the four-sheet workbook
async fn process_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    let upload = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| ServerError::BadRequest(MISSING_FILE_MESSAGE.to_string()))?;

    log_info(format!(
        "📄 NEW UPLOAD: {} ({} bytes)",
        display_name(&upload.file_name),
        upload.bytes.len()
    ));

    let options = state.options.clone();
    let output = tokio::task::spawn_blocking(move || process_bytes(&upload.bytes, &options))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(xlsx_attachment(output.workbook, output.file_name))
}

/// Convert an uploaded `.txt` export into a single-sheet workbook
async fn convert_upload(mut multipart: Multipart) -> Result<Response, (StatusCode, String)> {
    let upload = read_upload(&mut multipart)
        .await
        .map_err(|e| (e.status(), e.body_text()))?
        .ok_or_else(|| (StatusCode::BAD_REQUEST, MISSING_FILE_MESSAGE.to_string()))?;

    if !is_text_upload(&upload.file_name) {
        return Err((StatusCode::BAD_REQUEST, UNSUPPORTED_FORMAT_MESSAGE.to_string()));
    }

    log_info(format!(
        "📄 NEW TEXT UPLOAD: {} ({} bytes)",
        upload.file_name,
        upload.bytes.len()
    ));

    let output = tokio::task::spawn_blocking(move || convert_text_bytes(&upload.bytes))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            log_error(format!("Conversion failed: {}", e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error al leer el archivo: {}", e),
            )
        })?;

    Ok(xlsx_attachment(output.workbook, output.file_name))
}

fn display_name(file_name: &str) -> &str {
    if file_name.is_empty() {
        "unknown"
    } else {
        file_name
    }
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Pipeline(PipelineError::Transform(TransformError::MissingColumns(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the browser.
    fn public_message(&self) -> String {
        match self {
            ServerError::BadRequest(msg)
            | ServerError::PayloadTooLarge(msg)
            | ServerError::Internal(msg) => msg.clone(),
            ServerError::Pipeline(PipelineError::Ingest(e)) => {
                format!("Error al leer el archivo Excel: {}", e)
            }
            ServerError::Pipeline(PipelineError::Transform(e)) => e.to_string(),
            ServerError::Pipeline(PipelineError::Export(e)) => e.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log_error(self.to_string());
        }
        (status, Json(error_response(&self.public_message()))).into_response()
    }
}
