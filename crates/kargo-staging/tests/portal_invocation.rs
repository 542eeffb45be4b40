mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{portal_target, settings, FakePortal};
use kargo_staging::portal::PortalInvocation;
use kargo_util::errors::PublishError;
use tempfile::TempDir;
use tokio::time::Instant;

fn output_dirs(tmp: &TempDir) -> (PathBuf, PathBuf) {
    let a = tmp.path().join("A");
    let b = tmp.path().join("B");
    std::fs::create_dir_all(&a).unwrap();
    std::fs::create_dir_all(&b).unwrap();
    std::fs::write(a.join("x.txt"), "x").unwrap();
    std::fs::write(a.join("y.txt"), "y").unwrap();
    std::fs::write(b.join("z.txt"), "z").unwrap();
    (a, b)
}

fn invocation(fake: &Arc<FakePortal>, auto_publish: bool) -> PortalInvocation {
    PortalInvocation::new(portal_target(auto_publish), fake.clone(), settings())
}

#[tokio::test(start_paused = true)]
async fn test_last_end_uploads_one_bundle_of_all_directories() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = output_dirs(&tmp);
    let fake = Arc::new(FakePortal::new(&["VALIDATING", "VALIDATED"]));
    let inv = invocation(&fake, false);

    inv.begin(&a);
    inv.begin(&b);
    assert_eq!(inv.users(), 2);
    assert_eq!(inv.directories(), vec![a, b]);

    inv.end().await.unwrap();
    assert_eq!(fake.creates(), 0);
    inv.end().await.unwrap();

    assert_eq!(fake.creates(), 1);
    assert_eq!(fake.last_upload(), vec!["x.txt", "y.txt", "z.txt"]);
    assert_eq!(inv.users(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_same_directory_registered_once() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = output_dirs(&tmp);
    let fake = Arc::new(FakePortal::new(&["VALIDATED"]));
    let inv = invocation(&fake, false);

    inv.begin(&a);
    inv.begin(&a);
    assert_eq!(inv.users(), 2);
    assert_eq!(inv.directories().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_last_end_does_not_wait_for_upload() {
    let tmp = TempDir::new().unwrap();
    let (a, b) = output_dirs(&tmp);
    let mut fake = FakePortal::new(&["VALIDATED"]);
    fake.upload_delay = Duration::from_secs(300);
    let fake = Arc::new(fake);
    let inv = invocation(&fake, false);

    inv.begin(&a);
    inv.begin(&b);
    inv.begin(&b);

    let start = Instant::now();
    inv.end().await.unwrap();
    inv.end().await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    inv.end().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_auto_publish_waits_for_published() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = output_dirs(&tmp);
    let fake = Arc::new(FakePortal::new(&[
        "PENDING",
        "VALIDATING",
        "VALIDATED",
        "PUBLISHING",
        "PUBLISHED",
    ]));
    let inv = invocation(&fake, true);

    inv.begin(&a);
    let start = Instant::now();
    inv.end().await.unwrap();
    assert_eq!(start.elapsed(), settings().poll_delay * 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_deployment_is_deleted() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = output_dirs(&tmp);
    let mut fake = FakePortal::new(&["VALIDATING", "FAILED"]);
    fake.errors = Some(serde_json::json!({"pkg:maven/io.example/lib@1.0": ["Missing signature"]}));
    let fake = Arc::new(fake);
    let inv = invocation(&fake, false);

    inv.begin(&a);
    let err = inv.end().await.unwrap_err();
    match &err {
        PublishError::Validation {
            deployment_id,
            errors,
        } => {
            assert_eq!(deployment_id, "dep-1");
            assert!(errors.contains("Missing signature"), "got: {errors}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(fake.deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_keeps_validation_error() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = output_dirs(&tmp);
    let mut fake = FakePortal::new(&["FAILED"]);
    fake.fail_delete = true;
    let fake = Arc::new(fake);
    let inv = invocation(&fake, false);

    inv.begin(&a);
    let err = inv.end().await.unwrap_err();
    assert!(matches!(err, PublishError::Validation { .. }), "got {err:?}");
    assert_eq!(fake.deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_portal_times_out() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = output_dirs(&tmp);
    let fake = Arc::new(FakePortal::new(&["VALIDATING"]));
    let inv = invocation(&fake, false);
    let timeout = settings().portal_timeout;

    inv.begin(&a);
    let start = Instant::now();
    let err = inv.end().await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, PublishError::Timeout { .. }), "got {err:?}");
    assert!(elapsed >= timeout && elapsed < timeout + settings().poll_delay);
    assert_eq!(fake.deletes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_state_is_error() {
    let tmp = TempDir::new().unwrap();
    let (a, _) = output_dirs(&tmp);
    let fake = Arc::new(FakePortal::new(&["QUARANTINED"]));
    let inv = invocation(&fake, false);

    inv.begin(&a);
    let err = inv.end().await.unwrap_err();
    assert!(err.to_string().contains("QUARANTINED"), "got: {err}");
}
