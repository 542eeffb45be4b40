//! Client for the Central Portal publisher API.

use std::path::Path;

use async_trait::async_trait;
use kargo_util::errors::{PublishError, PublishResult};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::auth;
use crate::http;
use crate::target::PortalTarget;

/// Status of an uploaded deployment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Filled from the request when the status response omits it.
    #[serde(default)]
    pub deployment_id: String,
    /// Server-defined label such as `VALIDATING`, `VALIDATED` or `FAILED`.
    #[serde(rename = "deploymentState")]
    pub state: String,
    /// Validation problems reported for a `FAILED` deployment.
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Operations of the Central Portal publisher API.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Upload a bundle archive as one deployment and return its id.
    async fn create_deployment(&self, target: &PortalTarget, archive: &Path)
        -> PublishResult<String>;

    async fn get_deployment(
        &self,
        target: &PortalTarget,
        deployment_id: &str,
    ) -> PublishResult<Deployment>;

    async fn delete_deployment(&self, target: &PortalTarget, deployment_id: &str)
        -> PublishResult<()>;
}

/// HTTP implementation of [`PortalApi`].
#[derive(Debug, Clone)]
pub struct PortalClient {
    client: Client,
}

impl PortalClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PortalApi for PortalClient {
    async fn create_deployment(
        &self,
        target: &PortalTarget,
        archive: &Path,
    ) -> PublishResult<String> {
        let url = target.api_url("upload");
        let what = format!("POST {url}");
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|e| PublishError::Archive {
                message: format!("Failed to read {}: {e}", archive.display()),
            })?;
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "bundle.zip".to_string());
        debug!(%url, size = bytes.len(), "uploading deployment bundle");

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| PublishError::Remote {
                message: format!("Failed to create multipart body: {e}"),
            })?;
        let req = auth::apply_portal_auth(self.client.post(&url), target)
            .query(&[
                ("publishingType", target.publishing_type()),
                ("name", file_name.as_str()),
            ])
            .multipart(Form::new().part("bundle", part));

        let resp = http::ensure_success(http::send(req, &what).await?, &what).await?;
        let id = resp.text().await.map_err(|e| PublishError::Remote {
            message: format!("Invalid response from {what}: {e}"),
        })?;
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(PublishError::Remote {
                message: format!("{what} returned an empty deployment id"),
            });
        }
        Ok(id)
    }

    async fn get_deployment(
        &self,
        target: &PortalTarget,
        deployment_id: &str,
    ) -> PublishResult<Deployment> {
        let url = target.api_url("status");
        let what = format!("POST {url}?id={deployment_id}");
        debug!(%url, deployment_id, "portal status request");
        let req = auth::apply_portal_auth(self.client.post(&url), target)
            .query(&[("id", deployment_id)]);
        let resp = http::ensure_success(http::send(req, &what).await?, &what).await?;
        let mut deployment: Deployment = http::json(resp, &what).await?;
        if deployment.deployment_id.is_empty() {
            deployment.deployment_id = deployment_id.to_string();
        }
        Ok(deployment)
    }

    async fn delete_deployment(
        &self,
        target: &PortalTarget,
        deployment_id: &str,
    ) -> PublishResult<()> {
        let url = target.api_url(&format!("deployment/{deployment_id}"));
        let what = format!("DELETE {url}");
        debug!(%url, "portal delete request");
        let req = auth::apply_portal_auth(self.client.delete(&url), target);
        http::ensure_success(http::send(req, &what).await?, &what).await?;
        Ok(())
    }
}
