//! Deployment run orchestration tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use deployer::app::options::{DeploymentPaths, DeploymentType, RunOptions};
use deployer::app::run::Deployer;
use deployer::deploy::fsm::RunState;
use deployer::deploy::git::{FetchOutcome, GitProvider, RemoteConfigRequest, RepositoryFetcher};
use deployer::deploy::handler::HandlerRegistry;
use deployer::errors::DeployerError;
use deployer::filesys::dir::Dir;
use deployer::filesys::sink::{FsSink, MemorySink};
use deployer::storage::layout::Platform;
use deployer::storage::settings::Settings;

/// Fetcher writing a fixed `config.json` into the checkout
struct StubFetcher {
    overlay: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn with_overlay(overlay: &str) -> Self {
        Self {
            overlay: Some(overlay.to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            overlay: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryFetcher for StubFetcher {
    async fn fetch(
        &self,
        _request: &RemoteConfigRequest,
        dest: &Dir,
    ) -> Result<FetchOutcome, DeployerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DeployerError::FetchError("authentication failed".to_string()));
        }
        dest.create().await?;
        if let Some(overlay) = &self.overlay {
            dest.file("config.json").write_string(overlay).await?;
        }
        Ok(FetchOutcome::Cloned)
    }
}

fn settings(output_root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.output_root = output_root.to_path_buf();
    settings.paths.remote_config_root = output_root.join("config-repo");
    settings.proxy.platform = Platform::Ubuntu;
    settings.proxy.api.domain = "api.example.com".to_string();
    settings
}

fn paths(output_root: &Path) -> DeploymentPaths {
    DeploymentPaths {
        output_root: output_root.to_path_buf(),
        remote_config_root: output_root.join("config-repo"),
    }
}

fn remote(owner: Option<&str>, repo: Option<&str>) -> RemoteConfigRequest {
    RemoteConfigRequest {
        provider: GitProvider::Github,
        owner: owner.map(str::to_string),
        repo: repo.map(str::to_string),
        branch: "master".to_string(),
        domain: "github.com".to_string(),
        token: None,
    }
}

fn deployer(
    root: &Path,
    remote_config: Option<RemoteConfigRequest>,
    fetcher: Arc<StubFetcher>,
    sink: Arc<MemorySink>,
) -> Deployer {
    let options = RunOptions {
        paths: paths(root),
        remote_config,
    };
    let registry = HandlerRegistry::from_settings(&settings(root));
    Deployer::new(options, registry, fetcher, sink)
}

#[tokio::test]
async fn test_unknown_type_fails_before_side_effects() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::with_overlay("{}"));
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(
        tmp.path(),
        Some(remote(Some("acme"), Some("config"))),
        fetcher.clone(),
        sink.clone(),
    );

    let err = run.run("lambda").await.unwrap_err();

    assert!(err.is_config_error());
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(run.fsm().history(), &[RunState::Init, RunState::Failed]);
    assert!(run.fsm().error().is_some());
    assert_eq!(fetcher.calls(), 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_proxy_without_remote_config() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::with_overlay("{}"));
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(tmp.path(), None, fetcher.clone(), sink.clone());

    let report = run.run("proxy").await.unwrap();

    assert_eq!(report.deployment_type, DeploymentType::Proxy);
    assert!(!report.fetched);
    assert_eq!(
        report.states,
        vec![
            RunState::Init,
            RunState::Dispatching,
            RunState::Generating,
            RunState::Done
        ]
    );
    assert!(report.finished_at >= report.started_at);
    assert_eq!(fetcher.calls(), 0);

    assert_eq!(
        sink.write_order(),
        vec![
            tmp.path().join("conf.d/upstream.conf"),
            tmp.path().join("sites-enabled/api.conf"),
        ]
    );
    let api = sink.get(tmp.path().join("sites-enabled/api.conf")).unwrap();
    assert!(api.contains("server_name  api.example.com;"));
    assert!(api.contains("proxy_pass http://controller;"));
}

#[tokio::test]
async fn test_service_with_fetched_profile() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::with_overlay(
        r#"{"profile": {"name": "billing", "replicas": 2}}"#,
    ));
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(
        tmp.path(),
        Some(remote(Some("acme"), Some("config"))),
        fetcher.clone(),
        sink.clone(),
    );

    let report = run.run("service").await.unwrap();

    assert!(report.fetched);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(
        report.states,
        vec![
            RunState::Init,
            RunState::Fetching,
            RunState::Dispatching,
            RunState::Generating,
            RunState::Done
        ]
    );

    let profile = sink.get(tmp.path().join("profiles/profile.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&profile).unwrap();
    assert_eq!(value["name"], "billing");
    assert_eq!(value["replicas"], 2);
}

#[tokio::test]
async fn test_fetch_failure_stops_run() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::failing());
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(
        tmp.path(),
        Some(remote(Some("acme"), Some("config"))),
        fetcher.clone(),
        sink.clone(),
    );

    let err = run.run("proxy").await.unwrap_err();

    assert!(matches!(err, DeployerError::FetchError(_)));
    assert_eq!(
        run.fsm().history(),
        &[RunState::Init, RunState::Fetching, RunState::Failed]
    );
    assert_eq!(fetcher.calls(), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_overlay_must_be_an_object() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::with_overlay("[1]"));
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(
        tmp.path(),
        Some(remote(Some("acme"), Some("config"))),
        fetcher,
        sink.clone(),
    );

    let err = run.run("node").await.unwrap_err();

    assert!(err.is_config_error());
    assert_eq!(run.state(), RunState::Failed);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_partial_remote_config_is_not_fetched() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::with_overlay("{}"));
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(
        tmp.path(),
        Some(remote(Some("acme"), None)),
        fetcher.clone(),
        sink,
    );

    let report = run.run("node").await.unwrap();

    assert!(!report.fetched);
    assert_eq!(fetcher.calls(), 0);
    assert!(!report.states.contains(&RunState::Fetching));
}

#[tokio::test]
async fn test_run_is_single_use() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::with_overlay("{}"));
    let sink = Arc::new(MemorySink::new());
    let mut run = deployer(tmp.path(), None, fetcher, sink.clone());

    run.run("proxy").await.unwrap();
    let writes = sink.write_order().len();

    let err = run.run("proxy").await.unwrap_err();
    assert!(matches!(err, DeployerError::Internal(_)));
    assert_eq!(run.state(), RunState::Done);
    assert_eq!(sink.write_order().len(), writes);
}

#[tokio::test]
async fn test_proxy_end_to_end_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let root: PathBuf = tmp.path().join("nginx");
    let settings = settings(&root);

    let options = RunOptions {
        paths: paths(&root),
        remote_config: None,
    };
    let mut run = Deployer::new(
        options,
        HandlerRegistry::from_settings(&settings),
        Arc::new(StubFetcher::failing()),
        Arc::new(FsSink::new()),
    );

    run.run("nginx").await.unwrap();

    let upstream = std::fs::read_to_string(root.join("conf.d/upstream.conf")).unwrap();
    assert!(upstream.starts_with("upstream controller {"));
    assert!(root.join("sites-enabled/api.conf").exists());
    assert!(!root.join("sites-enabled/site.conf").exists());
}
