use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Kargo operations.
#[derive(Debug, Error, Diagnostic)]
pub enum KargoError {
    /// Publishing to a staging repository failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Publish(#[from] PublishError),

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Errors raised while staging, closing, and releasing artifacts.
///
/// Cloneable so that a single failed remote step can be handed, unchanged,
/// to every caller waiting on the same staging session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum PublishError {
    /// Missing or ambiguous publishing configuration, raised before any remote call.
    #[error("Publish configuration error: {message}")]
    #[diagnostic(help("Check the [publish] section of ~/.kargo/config.toml"))]
    Config { message: String },

    /// A request to the staging API failed or returned a non-2xx status.
    #[error("Remote call failed: {message}")]
    Remote { message: String },

    /// A polled resource reported a state outside the set expected for the phase.
    #[error("Staging for {group} reached unexpected state '{state}' while {phase}")]
    UnexpectedState {
        phase: String,
        group: String,
        state: String,
    },

    /// A polling phase did not reach its target state in time.
    #[error("Timed out after {}s while {phase}", .timeout.as_secs())]
    Timeout { phase: String, timeout: Duration },

    /// The Central Portal rejected a deployment.
    #[error("Deployment {deployment_id} failed validation: {errors}")]
    #[diagnostic(help("Fix the reported problems and publish again"))]
    Validation {
        deployment_id: String,
        errors: String,
    },

    /// Building the upload bundle failed.
    #[error("Failed to build upload bundle: {message}")]
    Archive { message: String },

    /// The staging service shut down before the operation finished.
    #[error("Publishing was cancelled")]
    Cancelled,

    /// `finalize` was called for a target that was never initialized.
    #[error("No staging session registered for {target}")]
    UnknownTarget { target: String },
}

/// Result alias used by the staging clients and orchestration.
pub type PublishResult<T> = Result<T, PublishError>;
