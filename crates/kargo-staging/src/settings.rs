use std::time::Duration;

use kargo_core::config::PublishConfig;

/// Timing and output settings shared by every staging session in a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSettings {
    /// Fixed delay between status polls.
    pub poll_delay: Duration,
    /// Limit for a Nexus repository to reach `closed`.
    pub close_timeout: Duration,
    /// Limit for a promoted Nexus repository to disappear.
    pub release_timeout: Duration,
    /// Limit for a Central Portal deployment to validate or publish.
    pub portal_timeout: Duration,
    /// Print Cargo-style progress lines.
    pub verbose: bool,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self::from(&PublishConfig::default())
    }
}

impl From<&PublishConfig> for StagingSettings {
    fn from(config: &PublishConfig) -> Self {
        Self {
            poll_delay: config.poll_delay(),
            close_timeout: config.close_timeout(),
            release_timeout: config.release_timeout(),
            portal_timeout: config.portal_timeout(),
            verbose: config.verbose,
        }
    }
}

impl StagingSettings {
    pub(crate) fn report(&self, label: &str, message: &str) {
        if self.verbose {
            kargo_util::progress::status(label, message);
        }
    }
}
