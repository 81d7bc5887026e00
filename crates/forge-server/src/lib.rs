//! Stdio front end for forge-mux.
//!
//! Loads a [`ServerConfig`], builds the configured forges into a
//! [`forge_core::Federation`] and answers line-delimited JSON requests
//! against it.

pub mod config;
pub mod error;
pub mod forges;
pub mod service;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, ServiceError};
pub use forges::{build_federation, default_factory};
pub use service::{Service, serve};
