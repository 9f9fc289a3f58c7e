//! Process environment snapshot
//!
//! The environment is captured once at startup. Everything downstream reads
//! from this snapshot, never from `std::env` directly.

use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::DeployerError;
use crate::utils::parse_flag;

/// Immutable copy of environment variables
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Build from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`; empty values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Owned value of `key`
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Parse `key` into `T`, a present but invalid value is a configuration error
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, DeployerError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                DeployerError::ConfigError(format!("Invalid value for {}: {} ({})", key, raw, e))
            }),
        }
    }

    /// Boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`)
    pub fn get_flag(&self, key: &str) -> Result<Option<bool>, DeployerError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => parse_flag(raw).map(Some).ok_or_else(|| {
                DeployerError::ConfigError(format!("Invalid boolean for {}: {}", key, raw))
            }),
        }
    }
}
