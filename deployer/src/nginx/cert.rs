//! Certificate location

use std::path::{Path, PathBuf};

/// Certificate, key and TLS parameter include referenced by HTTPS blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertLocation {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// Shared `ssl_*` directives, always under the proxy root
    pub params: PathBuf,
}

impl CertLocation {
    /// Certificates live in `<proxy_root>/ssl` unless a custom directory is given
    pub fn resolve(proxy_root: &Path, custom_dir: Option<&Path>) -> Self {
        let default_dir = proxy_root.join("ssl");
        let cert_dir = custom_dir.map(Path::to_path_buf).unwrap_or_else(|| default_dir.clone());

        Self {
            cert: cert_dir.join("tls.crt"),
            key: cert_dir.join("tls.key"),
            params: default_dir.join("ssl.conf"),
        }
    }
}
