//! Excel Mapper API Server module
//!
//! HTTP surface for server-held templates and source files.
//! Run with `excel-mapper-server`.

pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server, ApiConfig, AppState};
