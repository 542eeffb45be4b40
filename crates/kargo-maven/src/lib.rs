//! Maven repository publishing protocol: staging targets, authentication,
//! the legacy Nexus staging API, the Central Portal API, and artifact upload.

pub mod auth;
pub mod http;
pub mod nexus;
pub mod portal;
pub mod target;
pub mod upload;
