//! Operation: publish Maven output directories through a shared staging session.
//!
//! Every output directory is its own publishing unit running on its own
//! thread, the way modules of a parallel build would. The units meet in one
//! [`StagingService`], which opens a single remote session for all of them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};

use async_trait::async_trait;
use kargo_maven::target::NexusTarget;
use kargo_staging::{
    Begun, PublishUnit, StagingClients, StagingService, StagingSettings, StagingTarget,
};
use kargo_util::errors::{PublishError, PublishResult};
use kargo_util::progress::{spinner, status_warn};
use tracing::{debug, warn};

/// Puts a unit's artifacts into an opened Nexus staging repository.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, target: &NexusTarget, deploy_url: &str, dir: &Path)
        -> PublishResult<usize>;
}

/// Uploads over HTTP with `PUT` requests.
pub struct HttpUploader {
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactUploader for HttpUploader {
    async fn upload(
        &self,
        target: &NexusTarget,
        deploy_url: &str,
        dir: &Path,
    ) -> PublishResult<usize> {
        kargo_maven::upload::upload_directory(&self.client, target, deploy_url, dir).await
    }
}

/// What to publish and where.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub target: StagingTarget,
    /// Maven-layout output directories, one per publishing unit.
    pub directories: Vec<PathBuf>,
    pub settings: StagingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub units: usize,
    /// Files PUT into the staging repository (always 0 for the Central Portal,
    /// which receives a single bundle).
    pub files_uploaded: usize,
}

/// Publish over HTTP.
pub fn publish(request: &PublishRequest) -> miette::Result<PublishReport> {
    let client = kargo_maven::http::build_client()?;
    let clients = StagingClients::with_client(client.clone());
    let uploader = HttpUploader::new(client);
    Ok(publish_with(clients, Arc::new(uploader), request)?)
}

/// Publish with the given remote clients.
///
/// Errors of every unit are collected and the first one is returned. The
/// service is shut down in all cases, which drops a staging repository that
/// was opened but never released.
pub fn publish_with(
    clients: StagingClients,
    uploader: Arc<dyn ArtifactUploader>,
    request: &PublishRequest,
) -> PublishResult<PublishReport> {
    if request.directories.is_empty() {
        return Err(PublishError::Config {
            message: "No output directories to publish".to_string(),
        });
    }

    let verbose = request.settings.verbose;
    let units: Vec<PublishUnit> = request.directories.iter().map(|d| unit_for(d)).collect();
    let service = StagingService::new(clients, request.settings.clone())?;

    let sp = verbose.then(|| {
        spinner(&format!(
            "Publishing {} unit(s) to {}...",
            units.len(),
            request.target
        ))
    });

    let joined = Barrier::new(units.len());
    let results: Vec<PublishResult<usize>> = std::thread::scope(|s| {
        let handles: Vec<_> = units
            .iter()
            .map(|unit| {
                let joined = &joined;
                let service = &service;
                let uploader = uploader.as_ref();
                let target = &request.target;
                s.spawn(move || run_unit(service, joined, uploader, target, unit))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(PublishError::Remote {
                        message: "publishing thread panicked".to_string(),
                    })
                })
            })
            .collect()
    });

    service.shutdown();
    if let Some(sp) = sp {
        sp.finish_and_clear();
    }

    let mut files_uploaded = 0;
    let mut first_error = None;
    for (unit, result) in units.iter().zip(results) {
        match result {
            Ok(n) => files_uploaded += n,
            Err(e) => {
                warn!(unit = %unit.name, error = %e, "publishing unit failed");
                if verbose {
                    status_warn("Failed", &format!("{}: {e}", unit.name));
                }
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(PublishReport {
        units: units.len(),
        files_uploaded,
    })
}

/// One unit's life: join the session, upload, leave.
///
/// No unit leaves before every unit has joined, so one run stages into one
/// remote session. A unit whose upload fails never leaves its session, so the
/// repository is not released and shutdown drops it.
fn run_unit(
    service: &StagingService,
    joined: &Barrier,
    uploader: &dyn ArtifactUploader,
    target: &StagingTarget,
    unit: &PublishUnit,
) -> PublishResult<usize> {
    let begun = service.initialize(target, unit);
    joined.wait();
    let begun = begun?;
    let uploaded = match (&begun, target) {
        (Begun::DeployUrl(url), StagingTarget::Nexus(nexus)) => {
            let n = service.block_on(uploader.upload(nexus, url, &unit.output_dir))?;
            debug!(unit = %unit.name, files = n, "uploaded unit artifacts");
            n
        }
        _ => 0,
    };
    service.finalize(target, unit)?;
    Ok(uploaded)
}

fn unit_for(dir: &Path) -> PublishUnit {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());
    PublishUnit::new(name, dir)
}

/// Close (if still open) and release the single existing repository of `target`.
pub fn release_existing(target: &NexusTarget, settings: &StagingSettings) -> miette::Result<String> {
    Ok(release_existing_with(StagingClients::http()?, target, settings)?)
}

pub fn release_existing_with(
    clients: StagingClients,
    target: &NexusTarget,
    settings: &StagingSettings,
) -> PublishResult<String> {
    let service = StagingService::new(clients, settings.clone())?;
    let sp = settings
        .verbose
        .then(|| spinner(&format!("Releasing staging repository for {}...", target.group)));
    let result = service.release_existing(target);
    if let Some(sp) = sp {
        sp.finish_and_clear();
    }
    result
}

/// Drop one staging repository by id.
pub fn drop_repository(
    target: &NexusTarget,
    repository_id: &str,
    settings: &StagingSettings,
) -> miette::Result<()> {
    Ok(drop_repository_with(
        StagingClients::http()?,
        target,
        repository_id,
        settings,
    )?)
}

pub fn drop_repository_with(
    clients: StagingClients,
    target: &NexusTarget,
    repository_id: &str,
    settings: &StagingSettings,
) -> PublishResult<()> {
    let service = StagingService::new(clients, settings.clone())?;
    service.drop_repository(target, repository_id)
}
