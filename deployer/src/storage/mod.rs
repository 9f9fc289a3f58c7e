//! Settings, environment snapshot and output layout

pub mod env;
pub mod layout;
pub mod settings;
