//! `tasksync` -- translate local task edits into remote Sync API commands.

pub mod client;
pub mod config;
pub mod hooks;
pub mod model;
pub mod provider;
pub mod store;
pub mod translate;
pub mod transport;
