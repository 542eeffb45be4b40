//! Uploading a directory of Maven artifacts into an opened staging repository.

use std::path::Path;

use kargo_util::errors::{PublishError, PublishResult};
use reqwest::Client;
use tracing::debug;

use crate::auth;
use crate::http;
use crate::target::NexusTarget;

/// PUT every file under `dir` to `deploy_url` keeping its relative path.
///
/// `dir` is expected to be laid out like a Maven repository
/// (`io/example/lib/1.0/lib-1.0.jar`). Returns the number of uploaded files.
pub async fn upload_directory(
    client: &Client,
    target: &NexusTarget,
    deploy_url: &str,
    dir: &Path,
) -> PublishResult<usize> {
    let files = kargo_util::fs::walk_files(dir).map_err(|e| PublishError::Archive {
        message: format!("Failed to list {}: {e}", dir.display()),
    })?;
    let base = deploy_url.trim_end_matches('/');

    for file in &files {
        let url = format!("{base}/{}", file.relative);
        let what = format!("PUT {url}");
        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|e| PublishError::Archive {
                message: format!("Failed to read {}: {e}", file.path.display()),
            })?;
        debug!(%url, size = data.len(), "uploading artifact");
        let req = auth::apply_nexus_auth(client.put(&url), target).body(data);
        http::ensure_success(http::send(req, &what).await?, &what).await?;
    }

    Ok(files.len())
}
