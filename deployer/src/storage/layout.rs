//! Proxy configuration directory layout

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Host platform convention for where nginx picks up configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Homebrew nginx, everything under `servers/`
    Mac,
    /// Debian-style `conf.d/` and `sites-enabled/`
    Ubuntu,
    /// Anything else, everything under `nginx/`
    Generic,
}

impl Platform {
    /// Platform of the machine we were built for
    pub fn host() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else if cfg!(target_os = "linux") {
            Platform::Ubuntu
        } else {
            Platform::Generic
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

impl std::str::FromStr for Platform {
    type Err = std::convert::Infallible;

    // unknown discriminators fall back to the generic layout
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "mac" | "macos" | "darwin" => Platform::Mac,
            "ubuntu" | "debian" => Platform::Ubuntu,
            _ => Platform::Generic,
        })
    }
}

/// Directory layout of generated proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyLayout {
    /// Proxy install root (e.g. `/etc/nginx`)
    pub root: PathBuf,

    /// Directory convention
    pub platform: Platform,
}

impl ProxyLayout {
    /// Create a new layout
    pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            root: root.into(),
            platform,
        }
    }

    /// Directory receiving `upstream.conf`
    pub fn upstream_dir(&self) -> PathBuf {
        match self.platform {
            Platform::Mac => self.root.join("servers"),
            Platform::Ubuntu => self.root.join("conf.d"),
            Platform::Generic => self.root.join("nginx"),
        }
    }

    /// Directory receiving server block files
    pub fn sites_dir(&self) -> PathBuf {
        match self.platform {
            Platform::Mac => self.root.join("servers"),
            Platform::Ubuntu => self.root.join("sites-enabled"),
            Platform::Generic => self.root.join("nginx"),
        }
    }

    /// Path of the upstream pool file
    pub fn upstream_file(&self) -> PathBuf {
        self.upstream_dir().join("upstream.conf")
    }

    /// Path of a server block file
    pub fn site_file(&self, file_name: &str) -> PathBuf {
        self.sites_dir().join(file_name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
