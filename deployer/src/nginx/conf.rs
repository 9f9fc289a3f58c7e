//! nginx configuration blocks
//!
//! `render_*` functions are pure and return the file content. `write_*`
//! functions render and hand the result to an [`ArtifactSink`], one file per
//! call.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::DeployerError;
use crate::filesys::sink::ArtifactSink;
use crate::nginx::cert::CertLocation;

/// Maximum request body accepted by every generated server
const CLIENT_MAX_BODY_SIZE: &str = "100m";

/// Redirect targets omit the port when it is this one
const DEFAULT_HTTPS_PORT: u16 = 443;

/// One declared upstream member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamMember {
    /// Where the host was looked up (environment key)
    pub key: String,
    /// Resolved host, `None` when the lookup came back empty
    pub host: Option<String>,
    pub port: u16,
}

impl UpstreamMember {
    pub fn new(key: impl Into<String>, host: Option<String>, port: u16) -> Self {
        Self {
            key: key.into(),
            host,
            port,
        }
    }

    /// Member with a known host
    pub fn resolved(key: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self::new(key, Some(host.into()), port)
    }
}

/// Upstream pool declaration
#[derive(Debug, Clone)]
pub struct UpstreamSpec {
    /// Used verbatim by `proxy_pass`
    pub name: String,
    /// Declaration order is output order
    pub members: Vec<UpstreamMember>,
}

/// A declared member that had no address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityGap {
    pub key: String,
}

impl fmt::Display for IntegrityGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no address for upstream member {}", self.key)
    }
}

/// Result of rendering an upstream pool
#[derive(Debug, Clone)]
pub struct RenderedUpstream {
    pub name: String,
    pub content: String,
    /// Number of `server` lines emitted
    pub servers: usize,
    pub gaps: Vec<IntegrityGap>,
}

/// Render an upstream pool, skipping members without an address
pub fn render_upstream(spec: &UpstreamSpec) -> RenderedUpstream {
    let mut content = format!("upstream {} {{\n", spec.name);
    let mut servers = 0;
    let mut gaps = Vec::new();

    for member in &spec.members {
        match &member.host {
            Some(host) => {
                content.push_str(&format!("  server {}:{};\n", host, member.port));
                servers += 1;
            }
            None => {
                warn!("Unable to find upstream address in {}, skipping member", member.key);
                gaps.push(IntegrityGap {
                    key: member.key.clone(),
                });
            }
        }
    }
    content.push_str("}\n");

    RenderedUpstream {
        name: spec.name.clone(),
        content,
        servers,
        gaps,
    }
}

/// Render and write `upstream.conf`
pub async fn write_upstream(
    spec: &UpstreamSpec,
    path: &Path,
    sink: &dyn ArtifactSink,
) -> Result<RenderedUpstream, DeployerError> {
    info!("Writing upstream {} to {}", spec.name, path.display());
    let rendered = render_upstream(spec);
    sink.write(path, &rendered.content).await?;
    Ok(rendered)
}

/// What a server block does with requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockBody {
    /// Reverse-proxy to a named upstream
    Proxy { upstream_name: String },
    /// Serve files from disk
    Static { root_path: PathBuf },
}

/// A virtual host
#[derive(Debug, Clone)]
pub struct ServerBlockSpec {
    pub domain: String,
    pub http_port: u16,
    pub https_port: u16,
    pub tls: bool,
    /// Only honoured together with `tls`
    pub redirect_from_http: bool,
    pub body: BlockBody,
}

impl ServerBlockSpec {
    /// Whether a plain HTTP redirect block precedes the HTTPS block
    pub fn emits_redirect(&self) -> bool {
        self.tls && self.redirect_from_http
    }
}

/// Render a server block file following the TLS/redirect decision tree
pub fn render_server_block(spec: &ServerBlockSpec, certs: &CertLocation) -> String {
    let mut out = String::new();

    if spec.emits_redirect() {
        render_redirect(&mut out, spec);
    }
    if spec.tls {
        render_server(&mut out, spec, &format!("{} ssl", spec.https_port), Some(certs));
    } else {
        if spec.redirect_from_http {
            warn!(
                "HTTP redirect requested for {} without TLS, serving plain HTTP instead",
                spec.domain
            );
        }
        render_server(&mut out, spec, &spec.http_port.to_string(), None);
    }

    out
}

/// Render and write one server block file
pub async fn write_server_block(
    spec: &ServerBlockSpec,
    certs: &CertLocation,
    path: &Path,
    sink: &dyn ArtifactSink,
) -> Result<(), DeployerError> {
    info!("Writing server block for {} to {}", spec.domain, path.display());
    let content = render_server_block(spec, certs);
    sink.write(path, &content).await
}

fn render_header(out: &mut String, listen: &str, domain: &str) {
    out.push_str("server {\n");
    out.push_str(&format!("  listen       {};\n", listen));
    out.push_str(&format!("  server_name  {};\n", domain));
    out.push_str(&format!("  client_max_body_size {};\n", CLIENT_MAX_BODY_SIZE));
}

fn render_redirect(out: &mut String, spec: &ServerBlockSpec) {
    render_header(out, &spec.http_port.to_string(), &spec.domain);
    let target = match spec.https_port {
        DEFAULT_HTTPS_PORT => spec.domain.clone(),
        port => format!("{}:{}", spec.domain, port),
    };
    out.push_str(&format!("  rewrite ^/(.*) https://{}/$1 permanent;\n", target));
    out.push_str("}\n");
}

fn render_server(out: &mut String, spec: &ServerBlockSpec, listen: &str, certs: Option<&CertLocation>) {
    render_header(out, listen, &spec.domain);
    if let Some(certs) = certs {
        render_tls(out, certs);
    }
    match &spec.body {
        BlockBody::Proxy { upstream_name } => render_proxy_location(out, upstream_name),
        BlockBody::Static { root_path } => render_static_location(out, root_path),
    }
    out.push_str("}\n");
}

fn render_tls(out: &mut String, certs: &CertLocation) {
    out.push_str(&format!("  ssl_certificate         {};\n", certs.cert.display()));
    out.push_str(&format!("  ssl_certificate_key     {};\n", certs.key.display()));
    out.push_str(&format!("  include {};\n", certs.params.display()));
}

fn render_proxy_location(out: &mut String, upstream_name: &str) {
    out.push_str("  location / {\n");
    out.push_str(&format!("    proxy_pass http://{};\n", upstream_name));
    out.push_str("    proxy_set_header X-Forwarded-Proto $scheme;\n");
    out.push_str("    proxy_set_header X-Forwarded-For $remote_addr;\n");
    out.push_str("    proxy_set_header Host $http_host;\n");
    out.push_str("    proxy_set_header X-NginX-Proxy true;\n");
    out.push_str("    proxy_set_header Connection \"\";\n");
    out.push_str("  }\n");
}

fn render_static_location(out: &mut String, root_path: &Path) {
    out.push_str("  location / {\n");
    out.push_str(&format!("    root  {};\n", root_path.display()));
    out.push_str("    sendfile off;\n");
    out.push_str("    index  index.html index.htm;\n");
    out.push_str("  }\n");
}
