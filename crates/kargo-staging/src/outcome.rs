//! Single-resolution results observed by many callers.

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use kargo_util::errors::PublishResult;

/// A remote step that runs once; every clone awaits the same result,
/// including the same error.
pub(crate) type SharedOutcome<T> = Shared<BoxFuture<'static, PublishResult<T>>>;

pub(crate) fn shared<T, F>(future: F) -> SharedOutcome<T>
where
    T: Clone + Send + Sync + 'static,
    F: Future<Output = PublishResult<T>> + Send + 'static,
{
    future.boxed().shared()
}
