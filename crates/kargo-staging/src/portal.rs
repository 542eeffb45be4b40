//! Shared deployments against the Central Portal.
//!
//! Publishers only register their output directory when they begin. The last
//! publisher to end zips every registered directory into one bundle, uploads
//! it as a single deployment and waits for it to validate (or publish).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use kargo_maven::portal::{Deployment, PortalApi};
use kargo_maven::target::PortalTarget;
use kargo_util::errors::{PublishError, PublishResult};
use tracing::{debug, info, warn};

use crate::archive;
use crate::lock;
use crate::poll::{poll_until, Progress};
use crate::settings::StagingSettings;

const BUNDLE_NAME: &str = "bundle.zip";

struct PortalSession {
    users: usize,
    directories: Vec<PathBuf>,
}

/// Reference-counted deployment session for one [`PortalTarget`].
pub struct PortalInvocation {
    target: PortalTarget,
    api: Arc<dyn PortalApi>,
    settings: StagingSettings,
    session: Mutex<Option<PortalSession>>,
}

impl PortalInvocation {
    pub fn new(target: PortalTarget, api: Arc<dyn PortalApi>, settings: StagingSettings) -> Self {
        Self {
            target,
            api,
            settings,
            session: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &PortalTarget {
        &self.target
    }

    /// Number of publishers currently attached.
    pub fn users(&self) -> usize {
        lock(&self.session).as_ref().map_or(0, |s| s.users)
    }

    /// Directories registered so far, in registration order.
    pub fn directories(&self) -> Vec<PathBuf> {
        lock(&self.session)
            .as_ref()
            .map(|s| s.directories.clone())
            .unwrap_or_default()
    }

    /// Attach a publisher and register its output directory. No remote call.
    pub fn begin(&self, output_dir: &Path) {
        let mut slot = lock(&self.session);
        let session = slot.get_or_insert_with(|| PortalSession {
            users: 0,
            directories: Vec::new(),
        });
        session.users += 1;
        if !session.directories.iter().any(|d| d == output_dir) {
            session.directories.push(output_dir.to_path_buf());
        }
        debug!(portal = %self.target, users = session.users, dir = %output_dir.display(), "joined portal session");
    }

    /// Detach a publisher; the last one uploads and waits for the deployment.
    ///
    /// Earlier publishers return immediately, see [`crate::nexus::NexusInvocation::end`].
    pub async fn end(&self) -> PublishResult<()> {
        let directories = {
            let mut slot = lock(&self.session);
            match slot.take() {
                None => {
                    return Err(PublishError::UnknownTarget {
                        target: self.target.to_string(),
                    })
                }
                Some(mut session) if session.users > 1 => {
                    session.users -= 1;
                    *slot = Some(session);
                    return Ok(());
                }
                Some(session) => session.directories,
            }
        };

        self.upload_and_wait(directories).await
    }

    async fn upload_and_wait(&self, directories: Vec<PathBuf>) -> PublishResult<()> {
        let workdir = tempfile::tempdir().map_err(|e| PublishError::Archive {
            message: format!("Failed to create bundle directory: {e}"),
        })?;
        let bundle = workdir.path().join(BUNDLE_NAME);

        let bundle_path = bundle.clone();
        let entries =
            tokio::task::spawn_blocking(move || archive::write_bundle(&directories, &bundle_path))
                .await
                .map_err(|e| PublishError::Archive {
                    message: format!("Bundle task failed: {e}"),
                })??;

        self.settings
            .report("Uploading", &format!("{entries} files to {}", self.target.url));
        let deployment_id = self.api.create_deployment(&self.target, &bundle).await?;
        info!(portal = %self.target, deployment = %deployment_id, entries, "uploaded deployment");

        let phase = format!("waiting for deployment {deployment_id}");
        let auto_publish = self.target.auto_publish;
        let label = self.target.to_string();
        let (id, label) = (deployment_id.as_str(), label.as_str());
        let result = poll_until(
            &phase,
            self.settings.portal_timeout,
            self.settings.poll_delay,
            move || async move {
                let deployment = self.api.get_deployment(&self.target, id).await?;
                deployment_progress(label, auto_publish, &deployment)
            },
        )
        .await;

        if let Err(PublishError::Validation { .. }) = &result {
            if let Err(e) = self.api.delete_deployment(&self.target, &deployment_id).await {
                warn!(deployment = %deployment_id, error = %e, "failed to delete failed deployment");
            }
        }
        let state = result?;
        self.settings
            .report("Published", &format!("deployment {deployment_id} is {state}"));
        Ok(())
    }
}

/// Interpret a deployment status poll.
///
/// Success is `PUBLISHED` with auto-publish, otherwise `VALIDATED`. Labels
/// are compared exactly; unknown labels are errors.
pub fn deployment_progress(
    target: &str,
    auto_publish: bool,
    deployment: &Deployment,
) -> PublishResult<Progress<String>> {
    match deployment.state.as_str() {
        "PUBLISHED" => Ok(Progress::Done(deployment.state.clone())),
        "VALIDATED" if !auto_publish => Ok(Progress::Done(deployment.state.clone())),
        "VALIDATED" | "PENDING" | "VALIDATING" | "PUBLISHING" => Ok(Progress::Waiting),
        "FAILED" => Err(PublishError::Validation {
            deployment_id: deployment.deployment_id.clone(),
            errors: deployment
                .errors
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no details reported".to_string()),
        }),
        other => Err(PublishError::UnexpectedState {
            phase: format!("waiting for deployment {}", deployment.deployment_id),
            group: target.to_string(),
            state: other.to_string(),
        }),
    }
}
