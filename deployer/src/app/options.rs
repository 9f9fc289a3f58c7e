//! Deployment options

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::deploy::git::RemoteConfigRequest;
use crate::errors::DeployerError;
use crate::filesys::dir::Dir;
use crate::storage::env::Environment;
use crate::storage::settings::{PathSettings, Settings};

/// The closed set of deployment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    /// Reverse proxy tier
    Proxy,
    /// Application service
    Service,
    /// Runtime-only node
    Node,
}

impl DeploymentType {
    pub const ALL: [DeploymentType; 3] = [
        DeploymentType::Proxy,
        DeploymentType::Service,
        DeploymentType::Node,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Proxy => "proxy",
            DeploymentType::Service => "service",
            DeploymentType::Node => "node",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = DeployerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proxy" | "nginx" => Ok(DeploymentType::Proxy),
            "service" => Ok(DeploymentType::Service),
            "node" | "nodejs" => Ok(DeploymentType::Node),
            _ => Err(DeployerError::ConfigError(format!(
                "Deployment type '{}' is not supported, choose one of {}",
                s,
                DeploymentType::ALL.map(|t| t.as_str()).join(", ")
            ))),
        }
    }
}

/// Where artifacts go and where the configuration repository is cloned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPaths {
    pub output_root: PathBuf,
    pub remote_config_root: PathBuf,
}

impl From<&PathSettings> for DeploymentPaths {
    fn from(paths: &PathSettings) -> Self {
        Self {
            output_root: paths.output_root.clone(),
            remote_config_root: paths.remote_config_root.clone(),
        }
    }
}

/// Parsed `config.json` from the configuration repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverlay(Map<String, Value>);

impl ConfigOverlay {
    pub const FILE_NAME: &'static str = "config.json";

    /// Load `config.json` from a checkout
    pub async fn load(checkout: &Dir) -> Result<Self, DeployerError> {
        let file = checkout.file(Self::FILE_NAME);
        let value: Value = file.read_json().await.map_err(|e| {
            DeployerError::ConfigError(format!(
                "Unable to load {} from configuration repository: {}",
                file.path().display(),
                e
            ))
        })?;
        Self::from_value(value)
    }

    /// The overlay must be a JSON object
    pub fn from_value(value: Value) -> Result<Self, DeployerError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DeployerError::ConfigError(format!(
                "Configuration overlay must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validated options handed to a deployment handler
#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    pub deployment_type: DeploymentType,
    pub paths: DeploymentPaths,
    /// Present only when a configuration repository was fetched
    pub overlay: Option<ConfigOverlay>,
}

/// Inputs of a run, before the deployment type is validated
#[derive(Debug)]
pub struct RunOptions {
    pub paths: DeploymentPaths,
    /// Consumed by the first run
    pub remote_config: Option<RemoteConfigRequest>,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings, env: &Environment) -> Result<Self, DeployerError> {
        Ok(Self {
            paths: DeploymentPaths::from(&settings.paths),
            remote_config: RemoteConfigRequest::from_settings(&settings.config_repo, env)?,
        })
    }
}
