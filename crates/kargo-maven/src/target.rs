//! Staging targets: the identity that multiplexes concurrent publishers onto
//! one remote staging session.

use std::fmt;

/// Identity of a legacy Nexus (OSSRH) staging destination.
///
/// Two publishers with equal targets share one staging repository.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NexusTarget {
    /// Staging API base, e.g. `https://s01.oss.sonatype.org/service/local`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Artifact group used to select the staging profile.
    pub group: String,
}

impl NexusTarget {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            group: group.into(),
        }
    }

    /// Full URL for a staging API path such as `staging/profiles`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    /// URL artifacts are uploaded to for an opened staging repository.
    pub fn deploy_url(&self, repository_id: &str) -> String {
        self.api_url(&format!("staging/deployByRepositoryId/{repository_id}/"))
    }
}

impl fmt::Debug for NexusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NexusTarget")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for NexusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} @ {})", self.group, self.username, self.url)
    }
}

/// Identity of a Central Portal destination.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PortalTarget {
    /// Portal base, e.g. `https://central.sonatype.com`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Publish automatically once validation passes.
    pub auto_publish: bool,
}

impl PortalTarget {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        auto_publish: bool,
    ) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            auto_publish,
        }
    }

    /// Full URL for a publisher API path such as `upload`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/publisher/{}", self.url, path.trim_start_matches('/'))
    }

    /// `publishingType` query value for uploads.
    pub fn publishing_type(&self) -> &'static str {
        if self.auto_publish {
            "AUTOMATIC"
        } else {
            "USER_MANAGED"
        }
    }
}

impl fmt::Debug for PortalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalTarget")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("auto_publish", &self.auto_publish)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PortalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.username, self.url)
    }
}
