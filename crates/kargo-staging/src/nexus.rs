//! Shared staging sessions against the legacy Nexus (OSSRH) staging API.
//!
//! The first publisher to begin resolves the staging profile and opens one
//! repository; later publishers reuse it. The last publisher to end closes the
//! repository, waits for it to close, promotes it and waits for it to disappear.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use kargo_maven::nexus::{NexusApi, StagingProfile, StagingRepository};
use kargo_maven::target::NexusTarget;
use kargo_util::errors::{PublishError, PublishResult};
use tracing::{debug, info, warn};

use crate::lock;
use crate::outcome::{shared, SharedOutcome};
use crate::poll::{poll_until, Progress};
use crate::settings::StagingSettings;

const CLOSE_PHASE: &str = "closing staging repository";
const RELEASE_PHASE: &str = "releasing staging repository";

/// A staging repository opened for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedRepository {
    pub profile: StagingProfile,
    pub repository_id: String,
}

struct NexusSession {
    users: usize,
    created: SharedOutcome<OpenedRepository>,
}

/// Reference-counted staging session for one [`NexusTarget`].
pub struct NexusInvocation {
    target: NexusTarget,
    api: Arc<dyn NexusApi>,
    settings: StagingSettings,
    session: Mutex<Option<NexusSession>>,
    pending_repository_ids: Arc<Mutex<BTreeSet<String>>>,
}

impl NexusInvocation {
    pub fn new(target: NexusTarget, api: Arc<dyn NexusApi>, settings: StagingSettings) -> Self {
        Self {
            target,
            api,
            settings,
            session: Mutex::new(None),
            pending_repository_ids: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn target(&self) -> &NexusTarget {
        &self.target
    }

    /// Repositories opened but not yet released, in id order. A session that
    /// is still closing and a newer session can both be pending.
    pub fn pending_repository_ids(&self) -> Vec<String> {
        lock(&self.pending_repository_ids).iter().cloned().collect()
    }

    /// Number of publishers currently attached.
    pub fn users(&self) -> usize {
        lock(&self.session).as_ref().map_or(0, |s| s.users)
    }

    /// Attach a publisher and return the deploy URL of the shared repository.
    ///
    /// Only the first attached publisher's session issues the open request;
    /// everyone else awaits the same result, failures included.
    pub async fn begin(&self) -> PublishResult<String> {
        let created = {
            let mut session = lock(&self.session);
            match session.as_mut() {
                Some(existing) => {
                    existing.users += 1;
                    debug!(group = %self.target.group, users = existing.users, "joined staging session");
                    existing.created.clone()
                }
                None => {
                    let created = shared(open(
                        self.api.clone(),
                        self.target.clone(),
                        self.pending_repository_ids.clone(),
                        self.settings.clone(),
                    ));
                    *session = Some(NexusSession {
                        users: 1,
                        created: created.clone(),
                    });
                    debug!(group = %self.target.group, "started staging session");
                    created
                }
            }
        };

        let opened = created.await?;
        Ok(self.target.deploy_url(&opened.repository_id))
    }

    /// Detach a publisher.
    ///
    /// Publishers other than the last return immediately without waiting for
    /// the release; waiting there would serialize every publisher behind
    /// whichever one happens to finish last. The last publisher closes and
    /// releases the repository and receives the outcome.
    pub async fn end(&self) -> PublishResult<()> {
        let created = {
            let mut slot = lock(&self.session);
            match slot.take() {
                None => {
                    return Err(PublishError::UnknownTarget {
                        target: self.target.to_string(),
                    })
                }
                Some(mut session) if session.users > 1 => {
                    session.users -= 1;
                    debug!(group = %self.target.group, users = session.users, "left staging session");
                    *slot = Some(session);
                    return Ok(());
                }
                Some(session) => session.created,
            }
        };

        let opened = created.await?;
        self.close_and_release(&opened).await
    }

    async fn close_and_release(&self, opened: &OpenedRepository) -> PublishResult<()> {
        let id = opened.repository_id.as_str();
        let ids = [opened.repository_id.clone()];

        info!(group = %self.target.group, repository = id, "closing staging repository");
        self.settings.report("Closing", id);
        self.api
            .close_repository(&self.target, &opened.profile, id)
            .await?;
        poll_until(
            CLOSE_PHASE,
            self.settings.close_timeout,
            self.settings.poll_delay,
            move || async move {
                let current = self.api.get_repository(&self.target, id).await?;
                close_progress(&self.target.group, current.as_ref())
            },
        )
        .await?;

        info!(group = %self.target.group, repository = id, "releasing staging repository");
        self.settings.report("Releasing", id);
        self.api.promote_repositories(&self.target, &ids).await?;
        poll_until(
            RELEASE_PHASE,
            self.settings.release_timeout,
            self.settings.poll_delay,
            move || async move {
                let current = self.api.get_repository(&self.target, id).await?;
                release_progress(&self.target.group, current.as_ref())
            },
        )
        .await?;

        lock(&self.pending_repository_ids).remove(id);
        self.settings.report("Released", id);
        Ok(())
    }

    /// Drop every repository that was opened but never released.
    ///
    /// Failures are logged and swallowed: this runs during shutdown.
    pub async fn cleanup(&self) {
        let pending = std::mem::take(&mut *lock(&self.pending_repository_ids));
        for id in pending {
            warn!(group = %self.target.group, repository = %id, "dropping unreleased staging repository");
            if let Err(e) = self
                .api
                .drop_repositories(&self.target, std::slice::from_ref(&id))
                .await
            {
                warn!(group = %self.target.group, repository = %id, error = %e, "failed to drop staging repository");
            }
        }
    }
}

async fn open(
    api: Arc<dyn NexusApi>,
    target: NexusTarget,
    pending: Arc<Mutex<BTreeSet<String>>>,
    settings: StagingSettings,
) -> PublishResult<OpenedRepository> {
    let profiles = api.list_profiles(&target).await?;
    let profile = select_profile(&target.group, &profiles)?;
    let description = format!("{} staged by kargo", target.group);
    let repository_id = api
        .open_repository(&target, &profile, &description)
        .await?;
    lock(&pending).insert(repository_id.clone());

    info!(group = %target.group, profile = %profile.name, repository = %repository_id, "opened staging repository");
    settings.report("Staging", &format!("opened repository {repository_id}"));
    Ok(OpenedRepository {
        profile,
        repository_id,
    })
}

/// Pick the single staging profile whose name equals `group` or is a
/// dot-separated prefix of it.
pub fn select_profile(group: &str, profiles: &[StagingProfile]) -> PublishResult<StagingProfile> {
    let candidates: Vec<&StagingProfile> = profiles
        .iter()
        .filter(|p| {
            group == p.name
                || group
                    .strip_prefix(p.name.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
        .collect();

    match candidates.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(PublishError::Config {
            message: format!(
                "No staging profile matches group '{group}' (candidates: []). \
                 Available profiles: [{}]",
                names(profiles.iter())
            ),
        }),
        many => Err(PublishError::Config {
            message: format!(
                "More than one staging profile matches group '{group}' (candidates: [{}])",
                names(many.iter().copied())
            ),
        }),
    }
}

fn names<'a>(profiles: impl Iterator<Item = &'a StagingProfile>) -> String {
    profiles
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Interpret a status poll while waiting for `closed`.
pub fn close_progress(
    group: &str,
    repository: Option<&StagingRepository>,
) -> PublishResult<Progress<()>> {
    let Some(repo) = repository else {
        return Err(unexpected(CLOSE_PHASE, group, "not-found"));
    };
    if repo.transitioning {
        return Ok(Progress::Waiting);
    }
    if repo.state.eq_ignore_ascii_case("closed") {
        Ok(Progress::Done(()))
    } else {
        Err(unexpected(CLOSE_PHASE, group, &repo.state))
    }
}

/// Interpret a status poll while waiting for a promoted repository to vanish.
///
/// `closed` (promotion not started yet) and `released` (auto-drop pending)
/// keep waiting; a 404 means the release finished.
pub fn release_progress(
    group: &str,
    repository: Option<&StagingRepository>,
) -> PublishResult<Progress<()>> {
    let Some(repo) = repository else {
        return Ok(Progress::Done(()));
    };
    if repo.transitioning
        || repo.state.eq_ignore_ascii_case("closed")
        || repo.state.eq_ignore_ascii_case("released")
    {
        return Ok(Progress::Waiting);
    }
    Err(unexpected(RELEASE_PHASE, group, &repo.state))
}

fn unexpected(phase: &str, group: &str, state: &str) -> PublishError {
    PublishError::UnexpectedState {
        phase: phase.to_string(),
        group: group.to_string(),
        state: state.to_string(),
    }
}

/// Close (if still open) and release the single repository of the target's
/// staging profile. Used to finish a publish whose release step was skipped
/// or interrupted.
pub async fn release_existing(
    api: &dyn NexusApi,
    target: &NexusTarget,
    settings: &StagingSettings,
) -> PublishResult<String> {
    let profiles = api.list_profiles(target).await?;
    let profile = select_profile(&target.group, &profiles)?;
    let repositories = api.list_repositories_for_profile(target, &profile).await?;

    let repo = match repositories.as_slice() {
        [single] => single.clone(),
        other => {
            let ids: Vec<&str> = other.iter().map(|r| r.repository_id.as_str()).collect();
            return Err(PublishError::Config {
                message: format!(
                    "Expected exactly one staging repository for profile '{}', found [{}]",
                    profile.name,
                    ids.join(", ")
                ),
            });
        }
    };
    let id = repo.repository_id.as_str();

    if repo.state.eq_ignore_ascii_case("open") {
        settings.report("Closing", id);
        api.close_repository(target, &profile, id).await?;
        poll_until(CLOSE_PHASE, settings.close_timeout, settings.poll_delay, move || async move {
            let current = api.get_repository(target, id).await?;
            close_progress(&target.group, current.as_ref())
        })
        .await?;
    }

    settings.report("Releasing", id);
    api.promote_repositories(target, std::slice::from_ref(&repo.repository_id))
        .await?;
    poll_until(RELEASE_PHASE, settings.release_timeout, settings.poll_delay, move || async move {
        let current = api.get_repository(target, id).await?;
        release_progress(&target.group, current.as_ref())
    })
    .await?;
    settings.report("Released", id);
    Ok(repo.repository_id)
}

/// Drop one staging repository by id.
pub async fn drop_repository(
    api: &dyn NexusApi,
    target: &NexusTarget,
    repository_id: &str,
) -> PublishResult<()> {
    info!(group = %target.group, repository = repository_id, "dropping staging repository");
    api.drop_repositories(target, &[repository_id.to_string()])
        .await
}
