//! Operator-facing pieces of the `batchpool` binary.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env arguments and their conversion into a pipeline
//!   configuration.
//! - [`prompt`] - Interactive menu used with `--interactive`.
//! - [`telemetry`] - Log subscriber setup.

pub mod config;
pub mod prompt;
pub mod telemetry;
