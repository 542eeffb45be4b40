//! Core data types for the Kargo build tool.
//!
//! This crate holds the global user configuration, including the publishing
//! settings and credentials consumed by the staging workflow.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod config;
