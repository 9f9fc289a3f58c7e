//! Configuration repository fetcher

use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::errors::DeployerError;
use crate::filesys::dir::Dir;
use crate::storage::env::Environment;
use crate::storage::settings::{ConfigRepoSettings, ENV_REPO_TOKEN};

/// Public Bitbucket host, self-hosted servers get the `scm/` layout
const BITBUCKET_CLOUD: &str = "bitbucket.org";

/// Supported git hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitProvider {
    Github,
    Bitbucket,
}

impl GitProvider {
    pub fn default_domain(&self) -> &'static str {
        match self {
            GitProvider::Github => "github.com",
            GitProvider::Bitbucket => BITBUCKET_CLOUD,
        }
    }
}

impl FromStr for GitProvider {
    type Err = DeployerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(GitProvider::Github),
            "bitbucket" => Ok(GitProvider::Bitbucket),
            other => Err(DeployerError::ConfigError(format!(
                "Unsupported configuration repository provider: {}",
                other
            ))),
        }
    }
}

/// Where to fetch the configuration overlay from
#[derive(Debug)]
pub struct RemoteConfigRequest {
    pub provider: GitProvider,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: String,
    pub domain: String,
    pub token: Option<SecretString>,
}

impl RemoteConfigRequest {
    /// Build the request from settings and the token in the environment.
    ///
    /// Returns `None` when neither an owner nor a repository is set.
    pub fn from_settings(
        settings: &ConfigRepoSettings,
        env: &Environment,
    ) -> Result<Option<Self>, DeployerError> {
        if settings.owner.is_none() && settings.repo.is_none() {
            return Ok(None);
        }

        let provider: GitProvider = settings.provider.parse()?;
        let domain = settings
            .domain
            .clone()
            .unwrap_or_else(|| provider.default_domain().to_string());

        Ok(Some(Self {
            provider,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            branch: settings.branch.clone(),
            domain,
            token: env.get_string(ENV_REPO_TOKEN).map(SecretString::from),
        }))
    }

    /// Both owner and repository are known
    pub fn is_configured(&self) -> bool {
        self.owner.is_some() && self.repo.is_some()
    }

    /// `domain/owner/repo`, safe to log
    pub fn location(&self) -> String {
        format!(
            "{}/{}/{}",
            self.domain,
            self.owner.as_deref().unwrap_or("?"),
            self.repo.as_deref().unwrap_or("?")
        )
    }

    /// HTTPS clone URL, with the token embedded when there is one
    pub fn clone_url(&self) -> Result<Url, DeployerError> {
        let (owner, repo) = match (self.owner.as_deref(), self.repo.as_deref()) {
            (Some(owner), Some(repo)) => (owner, repo),
            _ => {
                return Err(DeployerError::ConfigError(
                    "Repository owner and name are required to build a clone URL".to_string(),
                ))
            }
        };

        let mut url = Url::parse(&format!("https://{}", self.domain)).map_err(|e| {
            DeployerError::ConfigError(format!("Invalid repository domain {}: {}", self.domain, e))
        })?;

        let Some(token) = &self.token else {
            url.set_path(&format!("/{}/{}", owner, repo));
            return Ok(url);
        };
        let token = token.expose_secret();

        let credentials = match self.provider {
            GitProvider::Github => {
                url.set_path(&format!("/{}/{}", owner, repo));
                url.set_username(token)
            }
            GitProvider::Bitbucket if self.domain == BITBUCKET_CLOUD => {
                url.set_path(&format!("/{}/{}", owner, repo));
                url.set_username("x-token-auth")
                    .and_then(|_| url.set_password(Some(token)))
            }
            GitProvider::Bitbucket => {
                url.set_path(&format!("/scm/{}/{}", owner, repo));
                url.set_username(token)
            }
        };
        credentials.map_err(|_| {
            DeployerError::ConfigError(format!("Cannot embed credentials for {}", self.domain))
        })?;

        Ok(url)
    }
}

/// What a fetch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing configured, nothing fetched
    Skipped,
    /// Branch checked out into the destination
    Cloned,
}

/// Produces a local checkout of a configuration repository
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &RemoteConfigRequest,
        dest: &Dir,
    ) -> Result<FetchOutcome, DeployerError>;
}

/// Fetcher shelling out to `git clone --depth 1`
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git_bin: String,
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            git_bin: "git".to_string(),
            timeout,
        }
    }

    /// Use a specific git executable
    pub fn with_git_bin(mut self, git_bin: impl Into<String>) -> Self {
        self.git_bin = git_bin.into();
        self
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(
        &self,
        request: &RemoteConfigRequest,
        dest: &Dir,
    ) -> Result<FetchOutcome, DeployerError> {
        if !request.is_configured() {
            info!("Repository information is missing, skipping ...");
            return Ok(FetchOutcome::Skipped);
        }

        let url = request.clone_url()?;
        let visibility = if request.token.is_some() { "private" } else { "public" };
        info!(
            "Cloning {} from {:?} {} repository (branch: {}) ...",
            request.location(),
            request.provider,
            visibility,
            request.branch
        );

        dest.create().await.map_err(|e| {
            DeployerError::FetchError(format!(
                "Unable to create {}: {}",
                dest.path().display(),
                e
            ))
        })?;
        if dest.is_git_checkout().await {
            return Err(DeployerError::FetchError(format!(
                "{} already contains a checkout",
                dest.path().display()
            )));
        }

        debug!("Running {} clone into {}", self.git_bin, dest.path().display());
        let mut command = Command::new(&self.git_bin);
        command
            .args(["clone", "--branch", &request.branch, "--depth", "1", "--single-branch"])
            .arg(url.as_str())
            .arg(dest.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let status = match tokio::time::timeout(self.timeout, command.status()).await {
            Ok(result) => result.map_err(|e| {
                DeployerError::FetchError(format!("Failed to run git clone: {}", e))
            })?,
            Err(_) => {
                return Err(DeployerError::FetchError(format!(
                    "Cloning {} timed out after {:?}",
                    request.location(),
                    self.timeout
                )))
            }
        };

        if !status.success() {
            return Err(DeployerError::FetchError(format!(
                "Cloning {} failed: {}",
                request.location(),
                status
            )));
        }

        info!("Cloning repository {} was successful", request.location());
        Ok(FetchOutcome::Cloned)
    }
}
