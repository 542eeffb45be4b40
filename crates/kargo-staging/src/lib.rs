//! Staging repository orchestration for publishing to Maven Central.
//!
//! Many publishing units (one per module) share one remote staging session per
//! [`StagingTarget`]: the first unit to begin opens it, the last unit to end
//! closes and releases it. [`StagingService`] is the build-wide registry that
//! hands out those sessions behind a blocking API.

pub mod archive;
pub mod invocation;
pub mod nexus;
pub mod poll;
pub mod portal;
pub mod service;
pub mod settings;

mod outcome;

pub use invocation::{Begun, Invocation, PublishUnit, StagingClients, StagingTarget};
pub use service::StagingService;
pub use settings::StagingSettings;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a session mutex. Critical sections never panic mid-update, so a
/// poisoned lock still holds consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
