//! NE Visualizer Common Utilities
//!
//! Shared infrastructure for the render service crates:
//! - Error taxonomy and result aliases
//! - Configuration loading
//! - Tracing/logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
