//! Streambox Web - JSON API and media streaming server
//!
//! Exposes the content engine over HTTP: viewer sessions, range-capable
//! streaming of loaded content, status and monitoring endpoints, and the
//! runtime settings store.

pub mod error;
pub mod handlers;
pub mod server;

// Re-export main types
pub use error::ApiError;
pub use server::{AppState, build_router, run_server};
