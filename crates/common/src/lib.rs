//! Model Manager common library
//!
//! This crate contains the error taxonomy and configuration shared by the
//! Model Manager client crates.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{ClientConfig, ObservabilityConfig, SchemaConfig};
pub use error::{ModelManagerError, Result};
