//! Client for the legacy Nexus 2 staging API used by OSSRH.
//!
//! Every call is a single request: no retries and no state. Waiting for the
//! asynchronous close/promote transitions is the caller's job.

use async_trait::async_trait;
use kargo_util::errors::PublishResult;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth;
use crate::http;
use crate::target::NexusTarget;

/// Server-side routing object that staging repositories are opened under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StagingProfile {
    pub id: String,
    pub name: String,
}

/// A staging repository as reported by `GET /staging/repository/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingRepository {
    #[serde(default)]
    pub profile_id: String,
    pub repository_id: String,
    /// Server-defined state label such as `open`, `closed` or `released`.
    #[serde(rename = "type")]
    pub state: String,
    #[serde(default)]
    pub transitioning: bool,
}

/// Operations of the Nexus staging API.
#[async_trait]
pub trait NexusApi: Send + Sync {
    async fn list_profiles(&self, target: &NexusTarget) -> PublishResult<Vec<StagingProfile>>;

    async fn list_repositories_for_profile(
        &self,
        target: &NexusTarget,
        profile: &StagingProfile,
    ) -> PublishResult<Vec<StagingRepository>>;

    /// Open a new staging repository and return its id.
    async fn open_repository(
        &self,
        target: &NexusTarget,
        profile: &StagingProfile,
        description: &str,
    ) -> PublishResult<String>;

    /// Request closing; the server transitions asynchronously.
    async fn close_repository(
        &self,
        target: &NexusTarget,
        profile: &StagingProfile,
        repository_id: &str,
    ) -> PublishResult<()>;

    /// Request release to the public repository; asynchronous.
    async fn promote_repositories(&self, target: &NexusTarget, ids: &[String])
        -> PublishResult<()>;

    async fn drop_repositories(&self, target: &NexusTarget, ids: &[String]) -> PublishResult<()>;

    /// Fetch a repository. `Ok(None)` means the server answered 404.
    async fn get_repository(
        &self,
        target: &NexusTarget,
        id: &str,
    ) -> PublishResult<Option<StagingRepository>>;
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Serialize)]
struct DataRequest<T> {
    data: T,
}

#[derive(Serialize)]
struct StartRequest<'a> {
    description: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    staged_repository_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinishRequest<'a> {
    staged_repository_id: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkRequest<'a> {
    staged_repository_ids: &'a [String],
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_drop_after_release: Option<bool>,
}

/// HTTP implementation of [`NexusApi`].
#[derive(Debug, Clone)]
pub struct NexusClient {
    client: Client,
}

impl NexusClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        target: &NexusTarget,
        path: &str,
    ) -> PublishResult<T> {
        let url = target.api_url(path);
        let what = format!("GET {url}");
        debug!(group = %target.group, %url, "nexus request");
        let req = auth::apply_nexus_auth(self.client.get(&url), target)
            .header(reqwest::header::ACCEPT, "application/json");
        let resp = http::ensure_success(http::send(req, &what).await?, &what).await?;
        let envelope: DataEnvelope<T> = http::json(resp, &what).await?;
        Ok(envelope.data)
    }

    async fn post<B: Serialize>(
        &self,
        target: &NexusTarget,
        path: &str,
        body: &B,
    ) -> PublishResult<reqwest::Response> {
        let url = target.api_url(path);
        let what = format!("POST {url}");
        debug!(group = %target.group, %url, "nexus request");
        let req = auth::apply_nexus_auth(self.client.post(&url), target)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&DataRequest { data: body });
        http::ensure_success(http::send(req, &what).await?, &what).await
    }
}

#[async_trait]
impl NexusApi for NexusClient {
    async fn list_profiles(&self, target: &NexusTarget) -> PublishResult<Vec<StagingProfile>> {
        self.get_data(target, "staging/profiles").await
    }

    async fn list_repositories_for_profile(
        &self,
        target: &NexusTarget,
        profile: &StagingProfile,
    ) -> PublishResult<Vec<StagingRepository>> {
        self.get_data(target, &format!("staging/profile_repositories/{}", profile.id))
            .await
    }

    async fn open_repository(
        &self,
        target: &NexusTarget,
        profile: &StagingProfile,
        description: &str,
    ) -> PublishResult<String> {
        let path = format!("staging/profiles/{}/start", profile.id);
        let resp = self
            .post(target, &path, &StartRequest { description })
            .await?;
        let what = format!("POST {}", target.api_url(&path));
        let envelope: DataEnvelope<StartResponse> = http::json(resp, &what).await?;
        Ok(envelope.data.staged_repository_id)
    }

    async fn close_repository(
        &self,
        target: &NexusTarget,
        profile: &StagingProfile,
        repository_id: &str,
    ) -> PublishResult<()> {
        let path = format!("staging/profiles/{}/finish", profile.id);
        let body = FinishRequest {
            staged_repository_id: repository_id,
            description: "Closed by kargo",
        };
        self.post(target, &path, &body).await?;
        Ok(())
    }

    async fn promote_repositories(
        &self,
        target: &NexusTarget,
        ids: &[String],
    ) -> PublishResult<()> {
        let body = BulkRequest {
            staged_repository_ids: ids,
            description: "Released by kargo",
            auto_drop_after_release: Some(true),
        };
        self.post(target, "staging/bulk/promote", &body).await?;
        Ok(())
    }

    async fn drop_repositories(&self, target: &NexusTarget, ids: &[String]) -> PublishResult<()> {
        let body = BulkRequest {
            staged_repository_ids: ids,
            description: "Dropped by kargo",
            auto_drop_after_release: None,
        };
        self.post(target, "staging/bulk/drop", &body).await?;
        Ok(())
    }

    async fn get_repository(
        &self,
        target: &NexusTarget,
        id: &str,
    ) -> PublishResult<Option<StagingRepository>> {
        let url = target.api_url(&format!("staging/repository/{id}"));
        let what = format!("GET {url}");
        debug!(group = %target.group, %url, "nexus request");
        let req = auth::apply_nexus_auth(self.client.get(&url), target)
            .header(reqwest::header::ACCEPT, "application/json");
        let resp = http::send(req, &what).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = http::ensure_success(resp, &what).await?;
        http::json(resp, &what).await.map(Some)
    }
}
