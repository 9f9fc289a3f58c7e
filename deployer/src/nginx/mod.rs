//! nginx configuration generation

pub mod cert;
pub mod conf;
