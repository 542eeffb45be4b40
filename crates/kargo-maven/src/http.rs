//! Shared HTTP plumbing for the staging clients.

use std::time::Duration;

use kargo_util::errors::{PublishError, PublishResult};
use reqwest::{Client, RequestBuilder, Response};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_BODY_IN_ERROR: usize = 512;

/// Build the reqwest client used for all staging calls.
pub fn build_client() -> PublishResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("kargo/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PublishError::Remote {
            message: format!("Failed to create HTTP client: {e}"),
        })
}

/// Send a request, mapping transport failures to [`PublishError::Remote`].
///
/// `what` is a short label such as `GET https://.../staging/profiles`.
pub async fn send(request: RequestBuilder, what: &str) -> PublishResult<Response> {
    request.send().await.map_err(|e| PublishError::Remote {
        message: format!("{what} failed: {e}"),
    })
}

/// Turn a non-2xx response into [`PublishError::Remote`] carrying the status and body.
pub async fn ensure_success(response: Response, what: &str) -> PublishResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::Remote {
        message: format!("HTTP {status} from {what}: {}", truncate(body.trim())),
    })
}

/// Read and deserialize a JSON body.
pub async fn json<T: serde::de::DeserializeOwned>(
    response: Response,
    what: &str,
) -> PublishResult<T> {
    response.json().await.map_err(|e| PublishError::Remote {
        message: format!("Invalid response from {what}: {e}"),
    })
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
