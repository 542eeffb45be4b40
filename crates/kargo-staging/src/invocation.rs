//! The closed set of staging backends behind one begin/end interface.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kargo_maven::nexus::{NexusApi, NexusClient};
use kargo_maven::portal::{PortalApi, PortalClient};
use kargo_maven::target::{NexusTarget, PortalTarget};
use kargo_util::errors::PublishResult;

use crate::nexus::NexusInvocation;
use crate::portal::PortalInvocation;
use crate::settings::StagingSettings;

/// Which remote destination a publishing unit stages into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StagingTarget {
    Nexus(NexusTarget),
    Portal(PortalTarget),
}

impl fmt::Display for StagingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nexus(t) => write!(f, "nexus {t}"),
            Self::Portal(t) => write!(f, "central portal {t}"),
        }
    }
}

/// One publishing unit, typically a module of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishUnit {
    pub name: String,
    /// Maven-layout directory holding the unit's signed artifacts.
    pub output_dir: PathBuf,
}

impl PublishUnit {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// What a unit gets back from beginning a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Begun {
    /// Upload artifacts here (Nexus).
    DeployUrl(String),
    /// The output directory was registered for the shared bundle (Portal).
    Registered,
}

impl Begun {
    pub fn deploy_url(&self) -> Option<&str> {
        match self {
            Self::DeployUrl(url) => Some(url),
            Self::Registered => None,
        }
    }
}

/// Remote clients handed to new invocations.
#[derive(Clone)]
pub struct StagingClients {
    pub nexus: Arc<dyn NexusApi>,
    pub portal: Arc<dyn PortalApi>,
}

impl StagingClients {
    /// Clients talking HTTP through one shared reqwest client.
    pub fn http() -> PublishResult<Self> {
        Ok(Self::with_client(kargo_maven::http::build_client()?))
    }

    /// HTTP clients reusing `client`, e.g. the one artifact uploads go through.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            nexus: Arc::new(NexusClient::new(client.clone())),
            portal: Arc::new(PortalClient::new(client)),
        }
    }
}

/// Staging session for one target.
pub enum Invocation {
    Nexus(NexusInvocation),
    Portal(PortalInvocation),
}

impl Invocation {
    pub fn new(target: &StagingTarget, clients: &StagingClients, settings: &StagingSettings) -> Self {
        match target {
            StagingTarget::Nexus(t) => Self::Nexus(NexusInvocation::new(
                t.clone(),
                clients.nexus.clone(),
                settings.clone(),
            )),
            StagingTarget::Portal(t) => Self::Portal(PortalInvocation::new(
                t.clone(),
                clients.portal.clone(),
                settings.clone(),
            )),
        }
    }

    /// Attach `unit` to the shared session.
    pub async fn begin(&self, unit: &PublishUnit) -> PublishResult<Begun> {
        match self {
            Self::Nexus(inv) => inv.begin().await.map(Begun::DeployUrl),
            Self::Portal(inv) => {
                inv.begin(&unit.output_dir);
                Ok(Begun::Registered)
            }
        }
    }

    /// Detach a unit; the last one runs the release sequence.
    pub async fn end(&self) -> PublishResult<()> {
        match self {
            Self::Nexus(inv) => inv.end().await,
            Self::Portal(inv) => inv.end().await,
        }
    }

    /// Best-effort removal of remote state left behind by an aborted session.
    pub async fn cleanup(&self) {
        match self {
            Self::Nexus(inv) => inv.cleanup().await,
            Self::Portal(_) => {}
        }
    }

    pub fn users(&self) -> usize {
        match self {
            Self::Nexus(inv) => inv.users(),
            Self::Portal(inv) => inv.users(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_client_builds_every_backend() {
        let clients = StagingClients::with_client(reqwest::Client::new());
        let settings = StagingSettings::default();
        let nexus = StagingTarget::Nexus(NexusTarget::new("https://n.test", "u", "p", "io.example"));
        let portal = StagingTarget::Portal(PortalTarget::new("https://c.test", "u", "p", false));

        assert!(matches!(
            Invocation::new(&nexus, &clients, &settings),
            Invocation::Nexus(_)
        ));
        assert!(matches!(
            Invocation::new(&portal, &clients, &settings),
            Invocation::Portal(_)
        ));
        assert_eq!(Invocation::new(&nexus, &clients, &settings).users(), 0);
    }
}
