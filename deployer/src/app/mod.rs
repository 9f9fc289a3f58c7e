//! Run options and orchestration

pub mod options;
pub mod run;
