//! Gatewatch Scanner - External analyzer dispatch and invocation.
//!
//! This crate encapsulates how the pipeline prepares and invokes one of
//! several external analyzers. The mode set is a closed enum, so adding a
//! fourth mode is a compile-time-visible change at every dispatch site.
//!
//! The two phases of a scanner's life run in separate OS processes:
//! `prepare()` resolves (and may download) the scanner binary and persists
//! the resolved path, because the later `analyze()` process cannot
//! re-derive it; `analyze()` tolerates that state being absent and falls
//! back to the embedded default location.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod invoke;
pub mod resolve;
pub mod spec;

// Re-export commonly used types
pub use error::ScannerError;
pub use invoke::{is_benign_warning, AnalyzeOutcome};
pub use resolve::{default_binary_path, resolve_scanner_binary, SCANNER_HOME_ENV};
pub use spec::{properties, ScannerSpec};
