//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info, graceful shutdown)
//!     → request.rs (attach request ID for tracing)
//!     → proxy::Forwarder (transform and forward)
//!     → streamed response to client
//! ```

pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer};
pub use server::{HttpServer, ServerError};
