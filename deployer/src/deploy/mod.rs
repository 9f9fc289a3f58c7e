//! Deployment module

pub mod fsm;
pub mod git;
pub mod handler;
pub mod proxy;
pub mod runtime;
