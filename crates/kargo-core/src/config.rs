use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Nexus staging API base for OSSRH accounts created after Feb 2021.
pub const DEFAULT_NEXUS_URL: &str = "https://s01.oss.sonatype.org/service/local";

/// Default Central Portal base URL.
pub const DEFAULT_PORTAL_URL: &str = "https://central.sonatype.com";

/// Global user configuration loaded from `~/.kargo/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,
}

/// Credential entry for a named repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Publishing settings from `[publish]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PublishConfig {
    #[serde(default = "default_poll_delay_secs")]
    pub poll_delay_secs: u64,
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
    #[serde(default = "default_release_timeout_secs")]
    pub release_timeout_secs: u64,
    #[serde(default = "default_portal_timeout_secs")]
    pub portal_timeout_secs: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub nexus: Option<NexusConfig>,
    #[serde(default)]
    pub portal: Option<PortalConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_delay_secs: default_poll_delay_secs(),
            close_timeout_secs: default_close_timeout_secs(),
            release_timeout_secs: default_release_timeout_secs(),
            portal_timeout_secs: default_portal_timeout_secs(),
            verbose: false,
            nexus: None,
            portal: None,
        }
    }
}

fn default_poll_delay_secs() -> u64 {
    15
}

fn default_close_timeout_secs() -> u64 {
    12 * 60
}

fn default_release_timeout_secs() -> u64 {
    6 * 60
}

fn default_portal_timeout_secs() -> u64 {
    15 * 60
}

/// Legacy Nexus staging target from `[publish.nexus]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default = "default_nexus_url")]
    pub url: String,
    /// Artifact group used to pick the staging profile, e.g. `io.github.example`.
    #[serde(default)]
    pub group: Option<String>,
    /// Name of a `[credentials.<name>]` entry.
    #[serde(default)]
    pub credentials: Option<String>,
}

fn default_nexus_url() -> String {
    DEFAULT_NEXUS_URL.to_string()
}

/// Central Portal target from `[publish.portal]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub url: String,
    #[serde(default)]
    pub credentials: Option<String>,
    /// Publish automatically once validated instead of waiting for a manual release.
    #[serde(default)]
    pub auto_publish: bool,
}

fn default_portal_url() -> String {
    DEFAULT_PORTAL_URL.to_string()
}

impl PublishConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_secs(self.release_timeout_secs)
    }

    pub fn portal_timeout(&self) -> Duration {
        Duration::from_secs(self.portal_timeout_secs)
    }
}

impl GlobalConfig {
    /// Load the global configuration from `~/.kargo/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from an explicit path, returning defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no global config, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            kargo_util::errors::KargoError::Generic {
                message: format!("Failed to read global config: {e}"),
            }
        })?;
        toml::from_str(&content).map_err(|e| {
            kargo_util::errors::KargoError::Generic {
                message: format!("Failed to parse global config: {e}"),
            }
            .into()
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Look up a named credential entry.
    pub fn credential(&self, name: &str) -> Option<&CredentialEntry> {
        self.credentials.get(name)
    }
}

/// Returns the path to the Kargo data directory (`~/.kargo/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".kargo")
}
