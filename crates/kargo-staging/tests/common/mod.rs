#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kargo_maven::nexus::{NexusApi, StagingProfile, StagingRepository};
use kargo_maven::portal::{Deployment, PortalApi};
use kargo_maven::target::{NexusTarget, PortalTarget};
use kargo_staging::StagingSettings;
use kargo_util::errors::{PublishError, PublishResult};

pub fn settings() -> StagingSettings {
    StagingSettings {
        poll_delay: Duration::from_secs(15),
        close_timeout: Duration::from_secs(12 * 60),
        release_timeout: Duration::from_secs(6 * 60),
        portal_timeout: Duration::from_secs(15 * 60),
        verbose: false,
    }
}

pub fn nexus_target() -> NexusTarget {
    NexusTarget::new("https://nexus.test/service/local", "user", "pass", "io.example")
}

pub fn portal_target(auto_publish: bool) -> PortalTarget {
    PortalTarget::new("https://central.test", "user", "pass", auto_publish)
}

pub fn remote_error(message: &str) -> PublishError {
    PublishError::Remote {
        message: message.to_string(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RepoPhase {
    Open,
    Closed,
    Released,
}

/// In-memory Nexus: close makes the repository `closed`, promote makes it vanish.
/// `script` overrides `get_repository` answers while non-empty.
pub struct FakeNexus {
    pub profiles: Vec<StagingProfile>,
    pub open_delay: Duration,
    pub close_delay: Duration,
    pub fail_open: bool,
    pub fail_drop: bool,
    pub script: Mutex<VecDeque<Option<(String, bool)>>>,
    pub open_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub promote_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub dropped: Mutex<Vec<String>>,
    phase: Mutex<RepoPhase>,
}

impl FakeNexus {
    pub fn new() -> Self {
        Self {
            profiles: vec![StagingProfile {
                id: "42".to_string(),
                name: "io.example".to_string(),
            }],
            open_delay: Duration::from_millis(100),
            close_delay: Duration::ZERO,
            fail_open: false,
            fail_drop: false,
            script: Mutex::new(VecDeque::new()),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            promote_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            dropped: Mutex::new(Vec::new()),
            phase: Mutex::new(RepoPhase::Open),
        }
    }

    pub fn with_script(self, answers: Vec<Option<(&str, bool)>>) -> Self {
        *self.script.lock().unwrap() = answers
            .into_iter()
            .map(|a| a.map(|(state, t)| (state.to_string(), t)))
            .collect();
        self
    }

    pub fn opens(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn promotes(&self) -> usize {
        self.promote_calls.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> Vec<String> {
        self.dropped.lock().unwrap().clone()
    }
}

fn repository(id: &str, state: &str, transitioning: bool) -> StagingRepository {
    StagingRepository {
        profile_id: "42".to_string(),
        repository_id: id.to_string(),
        state: state.to_string(),
        transitioning,
    }
}

#[async_trait]
impl NexusApi for FakeNexus {
    async fn list_profiles(&self, _target: &NexusTarget) -> PublishResult<Vec<StagingProfile>> {
        Ok(self.profiles.clone())
    }

    async fn list_repositories_for_profile(
        &self,
        _target: &NexusTarget,
        _profile: &StagingProfile,
    ) -> PublishResult<Vec<StagingRepository>> {
        Ok(vec![repository("ioexample-1001", "open", false)])
    }

    async fn open_repository(
        &self,
        _target: &NexusTarget,
        _profile: &StagingProfile,
        _description: &str,
    ) -> PublishResult<String> {
        let n = self.open_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.open_delay).await;
        if self.fail_open {
            return Err(remote_error("HTTP 401 Unauthorized"));
        }
        Ok(format!("ioexample-{}", 1000 + n))
    }

    async fn close_repository(
        &self,
        _target: &NexusTarget,
        _profile: &StagingProfile,
        _repository_id: &str,
    ) -> PublishResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.close_delay).await;
        *self.phase.lock().unwrap() = RepoPhase::Closed;
        Ok(())
    }

    async fn promote_repositories(&self, _target: &NexusTarget, _ids: &[String]) -> PublishResult<()> {
        self.promote_calls.fetch_add(1, Ordering::SeqCst);
        *self.phase.lock().unwrap() = RepoPhase::Released;
        Ok(())
    }

    async fn drop_repositories(&self, _target: &NexusTarget, ids: &[String]) -> PublishResult<()> {
        self.dropped.lock().unwrap().extend(ids.iter().cloned());
        if self.fail_drop {
            return Err(remote_error("HTTP 500 drop failed"));
        }
        Ok(())
    }

    async fn get_repository(
        &self,
        _target: &NexusTarget,
        id: &str,
    ) -> PublishResult<Option<StagingRepository>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(answer) = self.script.lock().unwrap().pop_front() {
            return Ok(answer.map(|(state, t)| repository(id, &state, t)));
        }
        Ok(match *self.phase.lock().unwrap() {
            RepoPhase::Open => Some(repository(id, "open", false)),
            RepoPhase::Closed => Some(repository(id, "closed", false)),
            RepoPhase::Released => None,
        })
    }
}

/// In-memory Central Portal answering status polls from `states`
/// (the last state repeats).
pub struct FakePortal {
    pub states: Mutex<VecDeque<String>>,
    pub errors: Option<serde_json::Value>,
    pub fail_delete: bool,
    pub upload_delay: Duration,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub uploaded_entries: Mutex<Vec<Vec<String>>>,
}

impl FakePortal {
    pub fn new(states: &[&str]) -> Self {
        Self {
            states: Mutex::new(states.iter().map(|s| s.to_string()).collect()),
            errors: None,
            fail_delete: false,
            upload_delay: Duration::ZERO,
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            uploaded_entries: Mutex::new(Vec::new()),
        }
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn last_upload(&self) -> Vec<String> {
        self.uploaded_entries
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PortalApi for FakePortal {
    async fn create_deployment(&self, _target: &PortalTarget, archive: &Path) -> PublishResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut zip = zip::ZipArchive::new(std::fs::File::open(archive).unwrap()).unwrap();
        let mut names = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).unwrap();
            let mut sink = Vec::new();
            entry.read_to_end(&mut sink).unwrap();
            names.push(entry.name().to_string());
        }
        names.sort();
        self.uploaded_entries.lock().unwrap().push(names);
        tokio::time::sleep(self.upload_delay).await;
        Ok("dep-1".to_string())
    }

    async fn get_deployment(&self, _target: &PortalTarget, deployment_id: &str) -> PublishResult<Deployment> {
        let mut states = self.states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front().unwrap_or_default()
        } else {
            states.front().cloned().unwrap_or_default()
        };
        Ok(Deployment {
            deployment_id: deployment_id.to_string(),
            state,
            errors: self.errors.clone(),
        })
    }

    async fn delete_deployment(&self, _target: &PortalTarget, _deployment_id: &str) -> PublishResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(remote_error("HTTP 500 delete failed"));
        }
        Ok(())
    }
}
