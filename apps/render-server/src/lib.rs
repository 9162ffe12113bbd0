//! NE Visualizer render server.
//!
//! Exposes the render pipeline over HTTP:
//!   POST /api/render    multipart `video` + optional `settings` JSON
//!   GET  /api/health    liveness and engine availability

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{app_router, OUTPUT_FILENAME};
pub use state::AppState;
