#![deny(unsafe_code)]

//! Shared test utilities for the Inkwell workspace.
//!
//! Provides a scripted model gateway, an in-memory document, config
//! builders, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! inkwell-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod document;
pub mod gateway;
pub mod tracing_setup;

pub use document::MemoryDocument;
pub use gateway::ScriptedGateway;
