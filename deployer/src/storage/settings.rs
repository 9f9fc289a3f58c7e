//! Settings file management
//!
//! Settings come from an optional JSON file and are then overridden by
//! `DEPLOYER_*` variables from the [`Environment`] snapshot. They are built
//! once in `main` and passed down.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::nginx::conf::UpstreamMember;
use crate::storage::env::Environment;
use crate::storage::layout::Platform;

pub const ENV_LOG_LEVEL: &str = "DEPLOYER_LOG_LEVEL";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "DEPLOYER_FETCH_TIMEOUT_SECS";
pub const ENV_OUTPUT_ROOT: &str = "DEPLOYER_OUTPUT_ROOT";
pub const ENV_REMOTE_CONFIG_ROOT: &str = "DEPLOYER_REMOTE_CONFIG_ROOT";

pub const ENV_REPO_PROVIDER: &str = "DEPLOYER_CONFIG_REPO_PROVIDER";
pub const ENV_REPO_OWNER: &str = "DEPLOYER_CONFIG_REPO_OWNER";
pub const ENV_REPO_NAME: &str = "DEPLOYER_CONFIG_REPO_NAME";
pub const ENV_REPO_BRANCH: &str = "DEPLOYER_CONFIG_REPO_BRANCH";
pub const ENV_REPO_DOMAIN: &str = "DEPLOYER_CONFIG_REPO_DOMAIN";
pub const ENV_REPO_TOKEN: &str = "DEPLOYER_CONFIG_REPO_TOKEN";

pub const ENV_NX_OS: &str = "DEPLOYER_NX_OS";
pub const ENV_NX_UPSTREAM_NAME: &str = "DEPLOYER_NX_UPSTREAM_NAME";
pub const ENV_NX_CONTROLLER_NB: &str = "DEPLOYER_NX_CONTROLLER_NB";
pub const ENV_NX_CONTROLLER_PORT: &str = "DEPLOYER_NX_CONTROLLER_PORT";
pub const ENV_NX_CONTROLLER_IP_ENV: &str = "DEPLOYER_NX_CONTROLLER_IP_ENV";
pub const ENV_NX_API_DOMAIN: &str = "DEPLOYER_NX_API_DOMAIN";
pub const ENV_NX_API_FILE: &str = "DEPLOYER_NX_API_FILE";
pub const ENV_NX_API_HTTPS: &str = "DEPLOYER_NX_API_HTTPS";
pub const ENV_NX_API_HTTP_REDIRECT: &str = "DEPLOYER_NX_API_HTTP_REDIRECT";
pub const ENV_NX_SITE_DOMAIN: &str = "DEPLOYER_NX_SITE_DOMAIN";
pub const ENV_NX_SITE_FILE: &str = "DEPLOYER_NX_SITE_FILE";
pub const ENV_NX_SITE_PATH: &str = "DEPLOYER_NX_SITE_PATH";
pub const ENV_NX_SITE_HTTPS: &str = "DEPLOYER_NX_SITE_HTTPS";
pub const ENV_NX_SITE_HTTP_REDIRECT: &str = "DEPLOYER_NX_SITE_HTTP_REDIRECT";
pub const ENV_NX_SSL_CUSTOM_PATH: &str = "DEPLOYER_NX_SSL_CUSTOM_PATH";

pub const ENV_SERVICE_START_CMD: &str = "DEPLOYER_SERVICE_START_CMD";
pub const ENV_SERVICE_WORKDIR: &str = "DEPLOYER_SERVICE_WORKDIR";
pub const ENV_NODE_START_CMD: &str = "DEPLOYER_NODE_START_CMD";
pub const ENV_NODE_WORKDIR: &str = "DEPLOYER_NODE_WORKDIR";

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Optional directory for a log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Upper bound for the configuration repository clone
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Output and checkout locations
    #[serde(default)]
    pub paths: PathSettings,

    /// External configuration repository
    #[serde(default)]
    pub config_repo: ConfigRepoSettings,

    /// Proxy tier
    #[serde(default)]
    pub proxy: ProxySettings,

    /// Application service
    #[serde(default)]
    pub service: RuntimeSettings,

    /// Runtime-only node
    #[serde(default)]
    pub node: RuntimeSettings,
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            paths: PathSettings::default(),
            config_repo: ConfigRepoSettings::default(),
            proxy: ProxySettings::default(),
            service: RuntimeSettings::default(),
            node: RuntimeSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional JSON file, then apply the environment
    pub async fn load(file: Option<&File>, env: &Environment) -> Result<Self, DeployerError> {
        let mut settings = match file {
            Some(file) => {
                debug!("Reading settings from {}", file.path().display());
                file.read_json::<Settings>().await.map_err(|e| {
                    DeployerError::ConfigError(format!(
                        "Unable to read settings file {}: {}",
                        file.path().display(),
                        e
                    ))
                })?
            }
            None => Settings::default(),
        };
        settings.apply_env(env)?;
        Ok(settings)
    }

    /// Defaults overridden by the environment
    pub fn from_env(env: &Environment) -> Result<Self, DeployerError> {
        let mut settings = Settings::default();
        settings.apply_env(env)?;
        Ok(settings)
    }

    /// Apply `DEPLOYER_*` overrides and resolve upstream members
    pub fn apply_env(&mut self, env: &Environment) -> Result<(), DeployerError> {
        if let Some(level) = env.get_parsed::<LogLevel>(ENV_LOG_LEVEL)? {
            self.log_level = level;
        }
        if let Some(secs) = env.get_parsed::<u64>(ENV_FETCH_TIMEOUT_SECS)? {
            self.fetch_timeout_secs = secs;
        }
        if let Some(root) = env.get(ENV_OUTPUT_ROOT) {
            self.paths.output_root = PathBuf::from(root);
        }
        if let Some(root) = env.get(ENV_REMOTE_CONFIG_ROOT) {
            self.paths.remote_config_root = PathBuf::from(root);
        }

        let repo = &mut self.config_repo;
        if let Some(provider) = env.get_string(ENV_REPO_PROVIDER) {
            repo.provider = provider;
        }
        override_opt(&mut repo.owner, env.get_string(ENV_REPO_OWNER));
        override_opt(&mut repo.repo, env.get_string(ENV_REPO_NAME));
        override_opt(&mut repo.domain, env.get_string(ENV_REPO_DOMAIN));
        if let Some(branch) = env.get_string(ENV_REPO_BRANCH) {
            repo.branch = branch;
        }

        self.proxy.apply_env(env)?;

        override_opt(&mut self.service.start_command, env.get_string(ENV_SERVICE_START_CMD));
        override_opt(&mut self.service.work_dir, env.get(ENV_SERVICE_WORKDIR).map(PathBuf::from));
        override_opt(&mut self.node.start_command, env.get_string(ENV_NODE_START_CMD));
        override_opt(&mut self.node.work_dir, env.get(ENV_NODE_WORKDIR).map(PathBuf::from));

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn override_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root that generated artifacts are placed under
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Where the configuration repository is cloned
    #[serde(default = "default_remote_config_root")]
    pub remote_config_root: PathBuf,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("/etc/nginx")
}

fn default_remote_config_root() -> PathBuf {
    PathBuf::from("/opt/deployer/config-repo")
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            remote_config_root: default_remote_config_root(),
        }
    }
}

/// Configuration repository coordinates (the token only ever comes from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRepoSettings {
    /// `github` or `bitbucket`
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub repo: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Host name; derived from the provider when absent
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_provider() -> String {
    "github".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

impl Default for ConfigRepoSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            owner: None,
            repo: None,
            branch: default_branch(),
            domain: None,
        }
    }
}

/// Proxy tier settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Directory convention
    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    pub ports: ListenSettings,

    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub site: SiteSettings,

    #[serde(default)]
    pub ssl: SslSettings,
}

impl ProxySettings {
    fn apply_env(&mut self, env: &Environment) -> Result<(), DeployerError> {
        if let Some(platform) = env.get_parsed::<Platform>(ENV_NX_OS)? {
            self.platform = platform;
        }

        let upstream = &mut self.upstream;
        if let Some(name) = env.get_string(ENV_NX_UPSTREAM_NAME) {
            upstream.name = name;
        }
        if let Some(count) = env.get_parsed::<u32>(ENV_NX_CONTROLLER_NB)? {
            upstream.count = count;
        }
        if let Some(port) = env.get_parsed::<u16>(ENV_NX_CONTROLLER_PORT)? {
            upstream.port = port;
        }
        if let Some(prefix) = env.get_string(ENV_NX_CONTROLLER_IP_ENV) {
            upstream.ip_env_prefix = prefix;
        }
        upstream.resolve_members(env);

        let api = &mut self.api;
        if let Some(domain) = env.get_string(ENV_NX_API_DOMAIN) {
            api.domain = domain;
        }
        if let Some(file_name) = env.get_string(ENV_NX_API_FILE) {
            api.file_name = file_name;
        }
        if let Some(tls) = env.get_flag(ENV_NX_API_HTTPS)? {
            api.tls = tls;
        }
        if let Some(redirect) = env.get_flag(ENV_NX_API_HTTP_REDIRECT)? {
            api.http_redirect = redirect;
        }

        let site = &mut self.site;
        override_opt(&mut site.domain, env.get_string(ENV_NX_SITE_DOMAIN));
        if let Some(file_name) = env.get_string(ENV_NX_SITE_FILE) {
            site.file_name = file_name;
        }
        if let Some(path) = env.get(ENV_NX_SITE_PATH) {
            site.root_path = PathBuf::from(path);
        }
        if let Some(tls) = env.get_flag(ENV_NX_SITE_HTTPS)? {
            site.tls = tls;
        }
        if let Some(redirect) = env.get_flag(ENV_NX_SITE_HTTP_REDIRECT)? {
            site.http_redirect = redirect;
        }

        override_opt(
            &mut self.ssl.custom_certs_path,
            env.get(ENV_NX_SSL_CUSTOM_PATH).map(PathBuf::from),
        );
        Ok(())
    }
}

/// Listen ports of generated server blocks
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListenSettings {
    #[serde(default = "default_http_port")]
    pub http: u16,

    #[serde(default = "default_https_port")]
    pub https: u16,
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            http: default_http_port(),
            https: default_https_port(),
        }
    }
}

/// Upstream pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Pool name, referenced verbatim by `proxy_pass`
    #[serde(default = "default_upstream_name")]
    pub name: String,

    /// Port every member listens on
    #[serde(default = "default_controller_port")]
    pub port: u16,

    /// Member hosts are read from `<prefix>1` ..= `<prefix><count>`
    #[serde(default = "default_ip_env_prefix")]
    pub ip_env_prefix: String,

    /// Expected member count
    #[serde(default = "default_count")]
    pub count: u32,

    /// Hosts found for member `i`, filled by [`UpstreamSettings::resolve_members`]
    #[serde(skip)]
    hosts: BTreeMap<u32, String>,
}

fn default_upstream_name() -> String {
    "controller".to_string()
}

fn default_controller_port() -> u16 {
    4000
}

fn default_ip_env_prefix() -> String {
    "DEPLOYER_NX_CONTROLLER_IP_".to_string()
}

fn default_count() -> u32 {
    1
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            name: default_upstream_name(),
            port: default_controller_port(),
            ip_env_prefix: default_ip_env_prefix(),
            count: default_count(),
            hosts: BTreeMap::new(),
        }
    }
}

impl UpstreamSettings {
    /// Look up the host of every declared member in `<prefix><i>`
    pub fn resolve_members(&mut self, env: &Environment) {
        self.hosts = (1..=self.count)
            .filter_map(|i| env.get_string(&self.member_key(i)).map(|host| (i, host)))
            .collect();
    }

    /// Set the host of member `index` (1-based)
    pub fn set_host(&mut self, index: u32, host: impl Into<String>) {
        self.hosts.insert(index, host.into());
    }

    /// Exactly `count` members in declaration order, unresolved ones without a host
    pub fn members(&self) -> Vec<UpstreamMember> {
        (1..=self.count)
            .map(|i| UpstreamMember::new(self.member_key(i), self.hosts.get(&i).cloned(), self.port))
            .collect()
    }

    fn member_key(&self, index: u32) -> String {
        format!("{}{}", self.ip_env_prefix, index)
    }
}

/// API server block settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_file")]
    pub file_name: String,

    #[serde(default = "default_api_domain")]
    pub domain: String,

    #[serde(default)]
    pub tls: bool,

    #[serde(default)]
    pub http_redirect: bool,
}

fn default_api_file() -> String {
    "api.conf".to_string()
}

fn default_api_domain() -> String {
    "api.example.com".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            file_name: default_api_file(),
            domain: default_api_domain(),
            tls: false,
            http_redirect: false,
        }
    }
}

/// Static site server block settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_site_file")]
    pub file_name: String,

    /// No site block is written without a domain
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default = "default_site_root")]
    pub root_path: PathBuf,

    #[serde(default)]
    pub tls: bool,

    #[serde(default)]
    pub http_redirect: bool,
}

fn default_site_file() -> String {
    "site.conf".to_string()
}

fn default_site_root() -> PathBuf {
    PathBuf::from("/opt/deployer/site")
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            file_name: default_site_file(),
            domain: None,
            root_path: default_site_root(),
            tls: false,
            http_redirect: false,
        }
    }
}

/// Certificate location settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SslSettings {
    /// Directory holding `tls.crt` / `tls.key` instead of `<output_root>/ssl`
    #[serde(default)]
    pub custom_certs_path: Option<PathBuf>,
}

/// Service / node runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Command handed to the host shell once artifacts are written
    #[serde(default)]
    pub start_command: Option<String>,

    /// Working directory for the start command
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// File name of the profile taken from the configuration overlay
    #[serde(default = "default_profile_file")]
    pub profile_file_name: String,
}

fn default_profile_file() -> String {
    "profile.json".to_string()
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            start_command: None,
            work_dir: None,
            profile_file_name: default_profile_file(),
        }
    }
}
