//! `docqa-server` exposes the docqa retrieval pipeline over HTTP: document
//! uploads are indexed, questions are answered from the indexed text, and a
//! built single-page frontend is served for everything else.

pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;
pub mod upload;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, app_router, initialize, run_server};
