//! Filesystem helpers and artifact sinks

pub mod dir;
pub mod file;
pub mod sink;
