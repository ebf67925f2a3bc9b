//! Gatewatch Core - Foundation crate for the gatewatch CI integration.
//!
//! This crate provides the shared building blocks that the pipeline crates
//! depend on: error handling, configuration management, server version
//! parsing, capability negotiation, and the persisted cross-phase state
//! store.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`version`] - Lenient semantic server-version parsing
//! - [`capabilities`] - Version/kind-gated capability negotiation
//! - [`state`] - File-backed key/value state shared across phase processes
//!
//! # Example
//!
//! ```rust
//! use gatewatch_core::{capabilities, EndpointKind, ServerVersion};
//!
//! let version = ServerVersion::parse("10.4.1");
//! let caps = capabilities(EndpointKind::Server, version.as_ref());
//! assert!(caps.token_auth_property);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod capabilities;
pub mod config;
pub mod error;
pub mod state;
pub mod version;

// Re-export commonly used types
pub use capabilities::{capabilities, CapabilitySet, EndpointKind};
pub use config::{PipelineConfig, PublishConfig, ScannerConfig, ServerConfig};
pub use error::{GatewatchError, Result};
pub use state::{keys as state_keys, StateStore};
pub use version::ServerVersion;
