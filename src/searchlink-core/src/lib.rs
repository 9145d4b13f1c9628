//! Searchlink Core Library
//!
//! Transport-independent building blocks for the searchlink client:
//! - Client and connection configuration
//! - Request arguments and batch operation models
//! - Line-delimited JSON codec for `_bulk` and `_msearch`
//! - Parsing of errors reported by the search service

pub mod codec;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ClientConfig, ConnectionConfig};
pub use error::{ErrorBody, RemoteError};
pub use models::*;
