//! Deployer Library
//!
//! Generates reverse-proxy configuration and orchestrates deployment runs
//! for proxy, service and node targets.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod nginx;
pub mod storage;
pub mod utils;
