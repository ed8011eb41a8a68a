//! Image builder tests

use std::collections::BTreeMap;
use std::sync::Arc;

use gakwaya_panel::deploy::builder::{ImageBuilder, DEFAULT_PLATFORM};
use gakwaya_panel::deploy::package::{pack_blocking, BuildContext};
use gakwaya_panel::engine::BuildEvent;
use gakwaya_panel::errors::BuildError;

use crate::support::FakeEngine;

fn context() -> BuildContext {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
    pack_blocking(dir.path()).unwrap()
}

fn builder() -> (Arc<FakeEngine>, ImageBuilder) {
    let engine = Arc::new(FakeEngine::new());
    let builder = ImageBuilder::new(engine.clone(), DEFAULT_PLATFORM);
    (engine, builder)
}

#[tokio::test]
async fn test_verify_dockerfile() {
    let (engine, builder) = builder();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
    std::fs::create_dir_all(dir.path().join("deploy")).unwrap();
    std::fs::write(dir.path().join("deploy/api.Dockerfile"), "FROM alpine\n").unwrap();

    builder
        .verify_dockerfile(dir.path(), "Dockerfile")
        .await
        .unwrap();
    builder
        .verify_dockerfile(dir.path(), "deploy/api.Dockerfile")
        .await
        .unwrap();
    builder
        .verify_dockerfile(dir.path(), "./Dockerfile")
        .await
        .unwrap();

    assert!(matches!(
        builder.verify_dockerfile(dir.path(), "Containerfile").await,
        Err(BuildError::DockerfileMissing(path)) if path == "Containerfile"
    ));
    // a directory is not a Dockerfile
    assert!(matches!(
        builder.verify_dockerfile(dir.path(), "deploy").await,
        Err(BuildError::DockerfileMissing(_))
    ));
    assert_eq!(engine.state().calls(), 0);
}

#[tokio::test]
async fn test_verify_dockerfile_rejects_escaping_paths() {
    let (_engine, builder) = builder();
    let dir = tempfile::tempdir().unwrap();

    for path in ["../Dockerfile", "/etc/passwd", "deploy/../../Dockerfile", ""] {
        assert!(
            matches!(
                builder.verify_dockerfile(dir.path(), path).await,
                Err(BuildError::InvalidDockerfilePath(_))
            ),
            "{path} should be rejected"
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_verify_dockerfile_rejects_symlinks() {
    use std::os::unix::fs::symlink;

    let (engine, builder) = builder();
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("Dockerfile"), "FROM alpine\n").unwrap();
    std::fs::create_dir_all(outside.path().join("docker")).unwrap();
    std::fs::write(outside.path().join("docker/api.Dockerfile"), "FROM alpine\n").unwrap();

    let dir = tempfile::tempdir().unwrap();
    symlink(outside.path().join("Dockerfile"), dir.path().join("Dockerfile")).unwrap();
    symlink(outside.path().join("docker"), dir.path().join("docker")).unwrap();

    assert!(matches!(
        builder.verify_dockerfile(dir.path(), "Dockerfile").await,
        Err(BuildError::InvalidDockerfilePath(_))
    ));
    assert!(matches!(
        builder.verify_dockerfile(dir.path(), "docker/api.Dockerfile").await,
        Err(BuildError::InvalidDockerfilePath(_))
    ));

    // the packer leaves both out, so nothing would reach the engine
    let context = pack_blocking(dir.path()).unwrap();
    assert_eq!(context.entries(), 0);
    assert_eq!(engine.state().calls(), 0);
}

#[tokio::test]
async fn test_build_verifies_image() {
    let (engine, builder) = builder();
    let args = BTreeMap::from([("VERSION".to_string(), "2".to_string())]);

    let outcome = builder
        .build(context(), "Dockerfile", "7:1700000000", &args)
        .await
        .unwrap();

    assert_eq!(outcome.image_tag, "7:1700000000");
    assert!(outcome.verified);
    assert!(outcome.log.contains("Step 1/2"));
    assert!(outcome.log.contains("Step 2/2"));

    let state = engine.state();
    assert_eq!(state.image_queries, 1);
    let (request, entries) = &state.builds[0];
    assert_eq!(*entries, 1);
    assert_eq!(request.dockerfile, "Dockerfile");
    assert_eq!(request.build_args["VERSION"], "2");
    assert_eq!(request.build_args["BUILDPLATFORM"], "linux/amd64");
    assert_eq!(request.build_args["TARGETPLATFORM"], "linux/amd64");
}

#[tokio::test]
async fn test_build_caller_platform_wins() {
    let (engine, builder) = builder();
    let args = BTreeMap::from([("TARGETPLATFORM".to_string(), "linux/arm64".to_string())]);

    builder
        .build(context(), "Dockerfile", "7:1", &args)
        .await
        .unwrap();

    let state = engine.state();
    let (request, _) = &state.builds[0];
    assert_eq!(request.build_args["TARGETPLATFORM"], "linux/arm64");
    assert_eq!(request.build_args["BUILDPLATFORM"], "linux/amd64");
}

#[tokio::test]
async fn test_build_without_image_fails_with_log() {
    let (engine, builder) = builder();
    {
        let mut state = engine.state();
        state.produce_image = false;
        state
            .build_output
            .push(BuildEvent::Error("COPY failed: file not found".to_string()));
    }

    let err = builder
        .build(context(), "Dockerfile", "7:2", &BTreeMap::new())
        .await
        .unwrap_err();

    match &err {
        BuildError::ImageNotProduced { tag, log } => {
            assert_eq!(tag, "7:2");
            assert!(log.contains("Step 1/2"));
            assert!(log.contains("COPY failed: file not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.log().is_some());
    assert_eq!(engine.state().image_queries, 1);
}

#[tokio::test]
async fn test_build_call_failure_keeps_partial_log() {
    let (engine, builder) = builder();
    engine.state().fail_build_call = true;

    let err = builder
        .build(context(), "Dockerfile", "7:3", &BTreeMap::new())
        .await
        .unwrap_err();

    match err {
        BuildError::EngineCall { reason, log } => {
            assert!(reason.contains("connection reset"));
            assert!(log.contains("Step 2/2"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // never trusted, never queried
    assert_eq!(engine.state().image_queries, 0);
}
