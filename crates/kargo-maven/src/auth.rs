//! Request authentication for staging targets.
//!
//! Credentials come from `[credentials.<name>]` in `~/.kargo/config.toml` or
//! the command line; by the time a target exists they are already resolved.

use base64::prelude::{Engine, BASE64_STANDARD};
use reqwest::RequestBuilder;

use crate::target::{NexusTarget, PortalTarget};

/// Apply HTTP Basic authentication for a Nexus staging target.
pub fn apply_nexus_auth(request: RequestBuilder, target: &NexusTarget) -> RequestBuilder {
    request.basic_auth(&target.username, Some(&target.password))
}

/// Central Portal user token: `base64(username:password)`.
pub fn portal_token(username: &str, password: &str) -> String {
    BASE64_STANDARD.encode(format!("{username}:{password}"))
}

/// Apply the Central Portal bearer user token.
pub fn apply_portal_auth(request: RequestBuilder, target: &PortalTarget) -> RequestBuilder {
    request.bearer_auth(portal_token(&target.username, &target.password))
}
