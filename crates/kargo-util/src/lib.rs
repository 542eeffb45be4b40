//! Shared utilities for the Kargo build tool.
//!
//! This crate provides cross-cutting concerns used by all other Kargo crates:
//! error types, filesystem helpers, and terminal progress indicators.

pub mod errors;
pub mod fs;
pub mod progress;
