//! Gatewatch Server - Analysis-server connection layer.
//!
//! This crate owns everything that talks to the analysis server: the
//! immutable [`Endpoint`] descriptor with its credential and proxy
//! handling, the typed wire models, the REST client with its bounded
//! transport retry, and the asynchronous Compute Engine task poller.
//!
//! The two retry layers are deliberately separate policies: the client's
//! [`RetryPolicy`] absorbs transient transport blips inside a single
//! request, while the poller's [`PollPolicy`] budgets how long the
//! pipeline waits for a server-side task to finish. Conflating them would
//! silently change both the effective timeout and the resilience to blips.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatewatch_server::{Credential, Endpoint, PollPolicy, ServerClient};
//! use gatewatch_core::EndpointKind;
//!
//! let endpoint = Endpoint::new(
//!     EndpointKind::Server,
//!     "https://analysis.example.com/",
//!     Credential::from_parts(Some("squ_token".into()), None, None)?,
//!     None,
//! )?;
//! let client = ServerClient::new(endpoint)?;
//! let version = client.fetch_server_version().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
pub mod endpoint;
pub mod models;
pub mod poller;

// Re-export commonly used types
pub use client::{RetryPolicy, ServerClient, ServerError};
pub use endpoint::{Auth, Credential, Endpoint, ProxyConfig};
pub use models::{
    CeTask, ComponentMeasures, Condition, GateStatus, Measure, Metric, ProjectStatus, TaskStatus,
};
pub use poller::{wait_for_completion, PollError, PollPolicy, TaskSource};
