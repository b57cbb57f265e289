//! `tasksyncd` library -- the batching daemon behind the `tasksync` hooks.

pub mod config;
pub mod server;
pub mod writeback;
