//! Config-block writer tests

use std::path::{Path, PathBuf};

use deployer::filesys::sink::MemorySink;
use deployer::nginx::cert::CertLocation;
use deployer::nginx::conf::{
    render_server_block, render_upstream, write_server_block, write_upstream, BlockBody,
    ServerBlockSpec, UpstreamMember, UpstreamSpec,
};

fn certs() -> CertLocation {
    CertLocation::resolve(Path::new("/etc/nginx"), None)
}

fn api_spec(tls: bool, redirect: bool) -> ServerBlockSpec {
    ServerBlockSpec {
        domain: "api.example.com".to_string(),
        http_port: 80,
        https_port: 443,
        tls,
        redirect_from_http: redirect,
        body: BlockBody::Proxy {
            upstream_name: "core".to_string(),
        },
    }
}

/// Split rendered output into its `server { ... }` blocks
fn blocks(rendered: &str) -> Vec<String> {
    rendered
        .split_inclusive("}\n")
        .fold((Vec::new(), String::new(), 0i32), |(mut blocks, mut current, depth), chunk| {
            let depth = depth + chunk.matches('{').count() as i32 - chunk.matches('}').count() as i32;
            current.push_str(chunk);
            if depth == 0 {
                blocks.push(std::mem::take(&mut current));
            }
            (blocks, current, depth)
        })
        .0
}

#[test]
fn test_tls_with_redirect_emits_redirect_then_https() {
    let out = render_server_block(&api_spec(true, true), &certs());
    let blocks = blocks(&out);

    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].contains("  listen       80;\n"));
    assert!(blocks[0].contains("  rewrite ^/(.*) https://api.example.com/$1 permanent;\n"));
    assert!(!blocks[0].contains("location"));
    assert!(blocks[1].contains("  listen       443 ssl;\n"));
    assert!(blocks[1].contains("proxy_pass http://core;"));
}

#[test]
fn test_tls_without_redirect_has_no_http_block() {
    let out = render_server_block(&api_spec(true, false), &certs());
    let blocks = blocks(&out);

    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].contains("  listen       443 ssl;\n"));
    assert!(!out.contains("listen       80;"));
    assert!(!out.contains("rewrite"));
}

#[test]
fn test_plain_http_regardless_of_redirect_flag() {
    for redirect in [false, true] {
        let out = render_server_block(&api_spec(false, redirect), &certs());
        let blocks = blocks(&out);

        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("  listen       80;\n"));
        assert!(!out.contains("ssl"));
        assert!(!out.contains("rewrite"));
    }
}

#[test]
fn test_end_to_end_api_block() {
    let out = render_server_block(&api_spec(true, true), &certs());
    let expected = "\
server {
  listen       80;
  server_name  api.example.com;
  client_max_body_size 100m;
  rewrite ^/(.*) https://api.example.com/$1 permanent;
}
server {
  listen       443 ssl;
  server_name  api.example.com;
  client_max_body_size 100m;
  ssl_certificate         /etc/nginx/ssl/tls.crt;
  ssl_certificate_key     /etc/nginx/ssl/tls.key;
  include /etc/nginx/ssl/ssl.conf;
  location / {
    proxy_pass http://core;
    proxy_set_header X-Forwarded-Proto $scheme;
    proxy_set_header X-Forwarded-For $remote_addr;
    proxy_set_header Host $http_host;
    proxy_set_header X-NginX-Proxy true;
    proxy_set_header Connection \"\";
  }
}
";
    assert_eq!(out, expected);
}

#[test]
fn test_custom_ports() {
    let spec = ServerBlockSpec {
        http_port: 8080,
        https_port: 8443,
        ..api_spec(true, true)
    };
    let out = render_server_block(&spec, &certs());
    assert!(out.contains("  listen       8080;\n"));
    assert!(out.contains("  listen       8443 ssl;\n"));
    assert!(out.contains("  rewrite ^/(.*) https://api.example.com:8443/$1 permanent;\n"));
}

#[tokio::test]
async fn test_rendering_is_idempotent() {
    let spec = api_spec(true, true);
    let path = PathBuf::from("/etc/nginx/sites-enabled/api.conf");
    let first = MemorySink::new();
    let second = MemorySink::new();

    write_server_block(&spec, &certs(), &path, &first).await.unwrap();
    write_server_block(&spec, &certs(), &path, &second).await.unwrap();

    assert_eq!(first.get(&path).unwrap(), second.get(&path).unwrap());
}

#[test]
fn test_upstream_keeps_declaration_order_and_skips_gaps() {
    let spec = UpstreamSpec {
        name: "core".to_string(),
        members: vec![
            UpstreamMember::resolved("IP_1", "10.0.0.3", 4000),
            UpstreamMember::new("IP_2", None, 4000),
            UpstreamMember::resolved("IP_3", "10.0.0.1", 4000),
            UpstreamMember::new("IP_4", None, 4000),
            UpstreamMember::resolved("IP_5", "ctrl-5", 4000),
        ],
    };
    let rendered = render_upstream(&spec);

    assert_eq!(
        rendered.content,
        "upstream core {\n  server 10.0.0.3:4000;\n  server 10.0.0.1:4000;\n  server ctrl-5:4000;\n}\n"
    );
    assert_eq!(rendered.servers, 3);
    let gap_keys: Vec<&str> = rendered.gaps.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(gap_keys, vec!["IP_2", "IP_4"]);
}

#[tokio::test]
async fn test_write_upstream_returns_pool_name() {
    let sink = MemorySink::new();
    let path = PathBuf::from("/etc/nginx/conf.d/upstream.conf");
    let spec = UpstreamSpec {
        name: "controller".to_string(),
        members: vec![],
    };

    let rendered = write_upstream(&spec, &path, &sink).await.unwrap();

    assert_eq!(rendered.name, "controller");
    assert_eq!(sink.get(&path).as_deref(), Some("upstream controller {\n}\n"));
}
