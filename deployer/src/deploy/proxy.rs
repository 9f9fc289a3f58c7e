//! Proxy tier deployment
//!
//! Writes, strictly in this order: the upstream pool, the API server block
//! (which proxies to the pool written first) and, when a site domain is
//! configured, the static site server block.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::app::options::{DeploymentOptions, DeploymentType};
use crate::deploy::handler::DeploymentHandler;
use crate::errors::DeployerError;
use crate::filesys::sink::ArtifactSink;
use crate::nginx::cert::CertLocation;
use crate::nginx::conf::{
    write_server_block, write_upstream, BlockBody, ServerBlockSpec, UpstreamSpec,
};
use crate::storage::layout::ProxyLayout;
use crate::storage::settings::ProxySettings;

/// Handler for [`DeploymentType::Proxy`]
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    settings: ProxySettings,
}

impl ProxyHandler {
    pub fn new(settings: ProxySettings) -> Self {
        Self { settings }
    }

    fn upstream_spec(&self) -> UpstreamSpec {
        UpstreamSpec {
            name: self.settings.upstream.name.clone(),
            members: self.settings.upstream.members(),
        }
    }

    fn api_spec(&self, upstream_name: &str) -> ServerBlockSpec {
        let api = &self.settings.api;
        ServerBlockSpec {
            domain: api.domain.clone(),
            http_port: self.settings.ports.http,
            https_port: self.settings.ports.https,
            tls: api.tls,
            redirect_from_http: api.http_redirect,
            body: BlockBody::Proxy {
                upstream_name: upstream_name.to_string(),
            },
        }
    }

    fn site_spec(&self, domain: &str) -> ServerBlockSpec {
        let site = &self.settings.site;
        ServerBlockSpec {
            domain: domain.to_string(),
            http_port: self.settings.ports.http,
            https_port: self.settings.ports.https,
            tls: site.tls,
            redirect_from_http: site.http_redirect,
            body: BlockBody::Static {
                root_path: site.root_path.clone(),
            },
        }
    }
}

#[async_trait]
impl DeploymentHandler for ProxyHandler {
    fn deployment_type(&self) -> DeploymentType {
        DeploymentType::Proxy
    }

    async fn generate(
        &self,
        options: &DeploymentOptions,
        sink: &dyn ArtifactSink,
    ) -> Result<(), DeployerError> {
        let layout = ProxyLayout::new(&options.paths.output_root, self.settings.platform);
        let certs = CertLocation::resolve(
            layout.root(),
            self.settings.ssl.custom_certs_path.as_deref(),
        );

        // (a) upstream pool
        let upstream = write_upstream(&self.upstream_spec(), &layout.upstream_file(), sink).await?;
        if !upstream.gaps.is_empty() {
            warn!(
                "Upstream {} written with {} of {} members",
                upstream.name,
                upstream.servers,
                upstream.servers + upstream.gaps.len()
            );
        }
        info!("Upstream {} was written successfully", upstream.name);

        // (b) API server block, proxying to the pool written above
        let api = self.api_spec(&upstream.name);
        let api_file = layout.site_file(&self.settings.api.file_name);
        write_server_block(&api, &certs, &api_file, sink).await?;
        info!("API config for {} was written successfully", api.domain);

        // (c) static site, optional
        match &self.settings.site.domain {
            Some(domain) => {
                let site = self.site_spec(domain);
                let site_file = layout.site_file(&self.settings.site.file_name);
                write_server_block(&site, &certs, &site_file, sink).await?;
                info!("Site config for {} was written successfully", domain);
            }
            None => debug!("No site domain configured, skipping site config"),
        }

        Ok(())
    }
}
