//! HTTP API module.
//!
//! Router, handlers, response bodies and the SSE log stream of the
//! detraction filtering service.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{build_router, start_server, ServerConfig};
pub use types::*;
