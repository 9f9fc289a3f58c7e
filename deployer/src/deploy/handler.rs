//! Deployment handlers and their registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::options::{DeploymentOptions, DeploymentType};
use crate::deploy::proxy::ProxyHandler;
use crate::deploy::runtime::RuntimeHandler;
use crate::errors::DeployerError;
use crate::filesys::sink::ArtifactSink;
use crate::storage::settings::Settings;

/// Generates the artifacts of one deployment type
#[async_trait]
pub trait DeploymentHandler: Send + Sync {
    /// Type this handler is registered under
    fn deployment_type(&self) -> DeploymentType;

    /// Run to completion; the only output is success or failure
    async fn generate(
        &self,
        options: &DeploymentOptions,
        sink: &dyn ArtifactSink,
    ) -> Result<(), DeployerError>;
}

/// Handlers keyed by deployment type
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<DeploymentType, Arc<dyn DeploymentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler, each given its own settings subtree
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ProxyHandler::new(settings.proxy.clone())));
        registry.register(Arc::new(RuntimeHandler::service(settings.service.clone())));
        registry.register(Arc::new(RuntimeHandler::node(settings.node.clone())));
        registry
    }

    /// Register a handler, replacing any previous one for the same type
    pub fn register(&mut self, handler: Arc<dyn DeploymentHandler>) {
        self.handlers.insert(handler.deployment_type(), handler);
    }

    /// Handler for `deployment_type`
    pub fn get(&self, deployment_type: DeploymentType) -> Result<Arc<dyn DeploymentHandler>, DeployerError> {
        self.handlers.get(&deployment_type).cloned().ok_or_else(|| {
            DeployerError::ConfigError(format!(
                "No handler registered for deployment type {}",
                deployment_type
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
