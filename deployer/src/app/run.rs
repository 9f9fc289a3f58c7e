//! Deployment run orchestration
//!
//! `INIT → (FETCHING) → DISPATCHING → GENERATING → DONE`, or `FAILED` from
//! any non-terminal state. Every stage awaits the previous one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::options::{ConfigOverlay, DeploymentOptions, DeploymentType, RunOptions};
use crate::deploy::fsm::{RunEvent, RunFsm, RunState};
use crate::deploy::git::{FetchOutcome, RemoteConfigRequest, RepositoryFetcher};
use crate::deploy::handler::HandlerRegistry;
use crate::errors::DeployerError;
use crate::filesys::dir::Dir;
use crate::filesys::sink::ArtifactSink;

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub deployment_type: DeploymentType,
    /// A configuration repository was cloned
    pub fetched: bool,
    pub states: Vec<RunState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives a single deployment run
pub struct Deployer {
    options: RunOptions,
    registry: HandlerRegistry,
    fetcher: Arc<dyn RepositoryFetcher>,
    sink: Arc<dyn ArtifactSink>,
    fsm: RunFsm,
}

impl Deployer {
    pub fn new(
        options: RunOptions,
        registry: HandlerRegistry,
        fetcher: Arc<dyn RepositoryFetcher>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            options,
            registry,
            fetcher,
            sink,
            fsm: RunFsm::new(),
        }
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.fsm.state()
    }

    pub fn fsm(&self) -> &RunFsm {
        &self.fsm
    }

    /// Run the deployment for `requested_type`
    pub async fn run(&mut self, requested_type: &str) -> Result<RunReport, DeployerError> {
        let started_at = Utc::now();

        match self.drive(requested_type).await {
            Ok((deployment_type, fetched)) => Ok(RunReport {
                deployment_type,
                fetched,
                states: self.fsm.history().to_vec(),
                started_at,
                finished_at: Utc::now(),
            }),
            Err(e) => {
                error!("Deployment failed during {:?}: {}", self.fsm.state(), e);
                if !self.fsm.state().is_terminal() {
                    if let Err(transition) = self.fsm.process(RunEvent::Fail(e.to_string())) {
                        warn!("Unable to record failure: {}", transition);
                    }
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, requested_type: &str) -> Result<(DeploymentType, bool), DeployerError> {
        // INIT: reject unknown types before any side effect
        let deployment_type: DeploymentType = requested_type.parse()?;

        info!("Looking for configuration repository settings ...");
        let mut fetched = false;
        let overlay = match self.options.remote_config.take() {
            Some(request) if request.is_configured() => {
                self.transition(RunEvent::Fetch)?;
                let overlay = self.fetch_overlay(&request).await?;
                fetched = overlay.is_some();
                overlay
            }
            _ => {
                info!("No configuration repository detected, proceeding ...");
                None
            }
        };

        self.transition(RunEvent::Dispatch)?;
        let handler = self.registry.get(deployment_type)?;
        let options = DeploymentOptions {
            deployment_type,
            paths: self.options.paths.clone(),
            overlay,
        };

        self.transition(RunEvent::Generate)?;
        info!("Deploying a new {} instance ...", deployment_type);
        handler.generate(&options, self.sink.as_ref()).await?;

        self.transition(RunEvent::Complete)?;
        info!("{} deployment completed", deployment_type);
        Ok((deployment_type, fetched))
    }

    async fn fetch_overlay(
        &self,
        request: &RemoteConfigRequest,
    ) -> Result<Option<ConfigOverlay>, DeployerError> {
        info!("Configuration repository detected, cloning ...");
        let checkout = Dir::new(&self.options.paths.remote_config_root);

        match self.fetcher.fetch(request, &checkout).await? {
            FetchOutcome::Cloned => {
                let overlay = ConfigOverlay::load(&checkout).await?;
                info!("Loaded {} from {}", ConfigOverlay::FILE_NAME, request.location());
                Ok(Some(overlay))
            }
            FetchOutcome::Skipped => Ok(None),
        }
    }

    fn transition(&mut self, event: RunEvent) -> Result<(), DeployerError> {
        self.fsm.process(event).map_err(DeployerError::Internal)
    }
}
