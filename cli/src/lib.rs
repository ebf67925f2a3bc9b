//! Gatewatch CLI - Phase orchestration for the three-step pipeline.
//!
//! The binary is invoked three times per pipeline run, as three separate
//! OS processes: `gatewatch prepare`, `gatewatch analyze` and
//! `gatewatch publish`. Everything the phases share travels through the
//! persisted state store; nothing is ambient.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod commands;
pub mod host;
