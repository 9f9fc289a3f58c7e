//! Service and node deployments
//!
//! Both write the overlay profile, if any, then hand the configured start
//! command to the host shell and wait for it.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::app::options::{DeploymentOptions, DeploymentType};
use crate::deploy::handler::DeploymentHandler;
use crate::errors::DeployerError;
use crate::filesys::sink::ArtifactSink;
use crate::storage::settings::RuntimeSettings;

/// Overlay key holding the runtime profile
pub const PROFILE_KEY: &str = "profile";

/// Handler for [`DeploymentType::Service`] and [`DeploymentType::Node`]
#[derive(Debug, Clone)]
pub struct RuntimeHandler {
    kind: DeploymentType,
    settings: RuntimeSettings,
}

impl RuntimeHandler {
    pub fn service(settings: RuntimeSettings) -> Self {
        Self {
            kind: DeploymentType::Service,
            settings,
        }
    }

    pub fn node(settings: RuntimeSettings) -> Self {
        Self {
            kind: DeploymentType::Node,
            settings,
        }
    }

    async fn write_profile(
        &self,
        options: &DeploymentOptions,
        sink: &dyn ArtifactSink,
    ) -> Result<(), DeployerError> {
        let Some(profile) = options.overlay.as_ref().and_then(|o| o.get(PROFILE_KEY)) else {
            debug!("No profile in configuration overlay");
            return Ok(());
        };

        let path = options
            .paths
            .output_root
            .join("profiles")
            .join(&self.settings.profile_file_name);
        let content = serde_json::to_string_pretty(profile)?;
        sink.write(&path, &content).await?;
        info!("Profile written to {}", path.display());
        Ok(())
    }

    async fn launch(&self, start_command: &str) -> Result<(), DeployerError> {
        info!("Starting {}: {}", self.kind, start_command);

        let mut command = Command::new("sh");
        command.arg("-c").arg(start_command);
        if let Some(dir) = &self.settings.work_dir {
            command.current_dir(dir);
        }

        let status = command.status().await.map_err(|e| {
            DeployerError::HandlerError(format!("Failed to run {} start command: {}", self.kind, e))
        })?;
        if !status.success() {
            return Err(DeployerError::HandlerError(format!(
                "{} start command failed: {}",
                self.kind, status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentHandler for RuntimeHandler {
    fn deployment_type(&self) -> DeploymentType {
        self.kind
    }

    async fn generate(
        &self,
        options: &DeploymentOptions,
        sink: &dyn ArtifactSink,
    ) -> Result<(), DeployerError> {
        self.write_profile(options, sink).await?;

        match &self.settings.start_command {
            Some(start_command) => self.launch(start_command).await,
            None => {
                info!("No start command configured for {}, leaving execution to the host", self.kind);
                Ok(())
            }
        }
    }
}
