//! Build-wide registry of staging sessions with a blocking API.
//!
//! Publishing units run as ordinary synchronous build steps, so
//! [`StagingService::initialize`] and [`StagingService::finalize`] block the
//! calling thread while the shared session does its async work on the
//! service's runtime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kargo_maven::target::NexusTarget;
use kargo_util::errors::{PublishError, PublishResult};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::invocation::{Begun, Invocation, PublishUnit, StagingClients, StagingTarget};
use crate::lock;
use crate::nexus;
use crate::settings::StagingSettings;

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Owns every [`Invocation`] of a build and tears them down at the end.
pub struct StagingService {
    runtime: Runtime,
    clients: StagingClients,
    settings: StagingSettings,
    invocations: Mutex<HashMap<StagingTarget, Arc<Invocation>>>,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl StagingService {
    pub fn new(clients: StagingClients, settings: StagingSettings) -> PublishResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("kargo-staging")
            .build()
            .map_err(|e| PublishError::Config {
                message: format!("Failed to start async runtime: {e}"),
            })?;
        Ok(Self {
            runtime,
            clients,
            settings,
            invocations: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &StagingSettings {
        &self.settings
    }

    /// Join (or start) the session for `target`. Blocks until the shared
    /// open step has finished.
    pub fn initialize(&self, target: &StagingTarget, unit: &PublishUnit) -> PublishResult<Begun> {
        let invocation = {
            let mut invocations = lock(&self.invocations);
            invocations
                .entry(target.clone())
                .or_insert_with(|| {
                    debug!(%target, "creating staging invocation");
                    Arc::new(Invocation::new(target, &self.clients, &self.settings))
                })
                .clone()
        };
        debug!(%target, unit = %unit.name, "initializing publish unit");
        self.block_on(invocation.begin(unit))
    }

    /// Leave the session for `target`. Blocks only if this is the last unit,
    /// which then runs the close/release (or upload) sequence.
    pub fn finalize(&self, target: &StagingTarget, unit: &PublishUnit) -> PublishResult<()> {
        let invocation = lock(&self.invocations)
            .get(target)
            .cloned()
            .ok_or_else(|| PublishError::UnknownTarget {
                target: target.to_string(),
            })?;
        debug!(%target, unit = %unit.name, "finalizing publish unit");
        self.block_on(invocation.end())
    }

    /// Close (if needed) and release the one existing repository of a Nexus target.
    pub fn release_existing(&self, target: &NexusTarget) -> PublishResult<String> {
        self.block_on(nexus::release_existing(
            self.clients.nexus.as_ref(),
            target,
            &self.settings,
        ))
    }

    /// Drop a Nexus staging repository by id.
    pub fn drop_repository(&self, target: &NexusTarget, repository_id: &str) -> PublishResult<()> {
        self.block_on(nexus::drop_repository(
            self.clients.nexus.as_ref(),
            target,
            repository_id,
        ))
    }

    /// Number of units currently attached to `target`'s session.
    pub fn users(&self, target: &StagingTarget) -> usize {
        lock(&self.invocations)
            .get(target)
            .map_or(0, |inv| inv.users())
    }

    /// Cancel in-flight work, then drop repositories that were opened but
    /// never released. Never fails; safe to call more than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let invocations: Vec<Arc<Invocation>> =
            lock(&self.invocations).values().cloned().collect();
        for invocation in invocations {
            let cleanup = self.runtime.block_on(async move {
                tokio::time::timeout(CLEANUP_TIMEOUT, invocation.cleanup()).await
            });
            if cleanup.is_err() {
                warn!("staging cleanup timed out after {}s", CLEANUP_TIMEOUT.as_secs());
            }
        }
    }

    /// Run `work` on the service runtime, giving up with
    /// [`PublishError::Cancelled`] once the service shuts down.
    pub fn block_on<T>(&self, work: impl Future<Output = PublishResult<T>>) -> PublishResult<T> {
        if self.cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(PublishError::Cancelled),
                result = work => result,
            }
        })
    }
}

impl Drop for StagingService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
