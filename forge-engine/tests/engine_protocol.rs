//! Drives the real `forge-engine` binary through the client and orchestrator

#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use forge_client::detect::detect_dependencies;
use forge_client::{ClientError, EngineClient, Resolver, ResolverConfig};
use forge_core::EngineRef;
use forge_core::domain::test_report::TestStatus;
use forge_core::dto::build::BuildInput;
use forge_core::dto::test::RunTestsInput;
use forge_orchestrator::repository::ArtifactStore;
use forge_orchestrator::service::build::{BuildRequest, build_artifact};
use forge_orchestrator::service::engine::SubprocessEngineProvider;
use forge_orchestrator::service::test::run_test_stage;
use serde_json::json;

fn engine_ref() -> String {
    format!("file://{}", env!("CARGO_BIN_EXE_forge-engine"))
}

fn client() -> EngineClient {
    EngineClient::new(
        Arc::new(Resolver::new(ResolverConfig::default())),
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn test_handshake_lists_reference_tools() {
    let engine: EngineRef = engine_ref().parse().unwrap();
    let mut process = client().connect(&engine).await.unwrap();

    assert_eq!(process.info().name, "forge-engine");
    let tools = process.list_tools().await.unwrap();
    assert_eq!(tools, vec!["build", "detectDependencies", "runTests"]);

    process.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_detect_dependencies_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.go"), "package main").unwrap();
    fs::create_dir(dir.path().join("target")).unwrap();
    fs::write(dir.path().join("target/out"), "bin").unwrap();

    let engine: EngineRef = engine_ref().parse().unwrap();
    let deps = detect_dependencies(&client(), &engine, dir.path()).await.unwrap();

    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].file_path, dir.path().join("main.go"));
}

#[tokio::test]
async fn test_failed_build_carries_command_output() {
    let dir = tempfile::tempdir().unwrap();
    let engine: EngineRef = engine_ref().parse().unwrap();

    let input = BuildInput {
        name: "broken".to_string(),
        src: Some(dir.path().display().to_string()),
        spec: BTreeMap::from([("command".to_string(), json!("echo 'undefined: foo' >&2; exit 2"))]),
        ..Default::default()
    };

    let err = client().invoke(&engine, "build", &input).await.unwrap_err();
    match err {
        ClientError::ToolFailed { tool, message, .. } => {
            assert_eq!(tool, "build");
            assert!(message.contains("undefined: foo"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_lazy_rebuild_end_to_end() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("input.txt"), "hello").unwrap();

    let store = ArtifactStore::new(work.path().join(".forge/artifact-store.json"));
    let provider = SubprocessEngineProvider::new(client());

    let request = || {
        let mut request = BuildRequest::new("copy", engine_ref().parse().unwrap());
        request.src = Some(src.display().to_string());
        request.spec.insert("command".to_string(), json!(["cp", "input.txt", "output.txt"]));
        request
            .spec
            .insert("dependencyDetector".to_string(), json!(engine_ref()));
        request
    };

    let first = build_artifact(&store, &provider, request(), false).await.unwrap();
    assert!(first.was_built());
    let artifact = first.artifact();
    assert_eq!(artifact.dependency_detector_engine, engine_ref());
    assert!(artifact.dependencies.iter().any(|d| d.file_path == src.join("input.txt")));

    let second = build_artifact(&store, &provider, request(), false).await.unwrap();
    assert!(!second.was_built());

    fs::File::options()
        .write(true)
        .open(src.join("input.txt"))
        .unwrap()
        .set_modified(std::time::SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let third = build_artifact(&store, &provider, request(), false).await.unwrap();
    assert!(third.was_built());
}

#[tokio::test]
async fn test_run_tests_records_report() {
    let work = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(work.path().join("store.json"));
    let provider = SubprocessEngineProvider::new(client());
    let engine: EngineRef = engine_ref().parse().unwrap();

    let spec = BTreeMap::from([
        ("command".to_string(), json!("exit 1")),
        ("workDir".to_string(), json!(work.path())),
    ]);
    let report = run_test_stage(&store, &provider, &engine, "unit", spec)
        .await
        .unwrap();

    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.id.starts_with("test-unit-"));
    assert!(store.read().unwrap().test_reports.contains_key(&report.id));

    let direct = client()
        .invoke(
            &engine,
            "runTests",
            &RunTestsInput {
                stage: "smoke".to_string(),
                name: String::new(),
                spec: BTreeMap::from([("command".to_string(), json!(["true"]))]),
            },
        )
        .await
        .unwrap();
    assert!(direct.test_report.unwrap().passed());
}

#[tokio::test]
async fn test_back_to_back_stages_keep_every_report() {
    let work = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(work.path().join("store.json"));
    let provider = SubprocessEngineProvider::new(client());
    let engine: EngineRef = engine_ref().parse().unwrap();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let spec = BTreeMap::from([("command".to_string(), json!(["true"]))]);
        let report = run_test_stage(&store, &provider, &engine, "unit", spec)
            .await
            .unwrap();
        ids.push(report.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.read().unwrap().test_reports.len(), 3);
}
