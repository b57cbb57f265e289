//! Shared protocol definitions for `tasksync`.
//!
//! - [`command`]: remote Sync API command records and their typed arguments.
//! - [`sync`]: request/response envelopes for pushing commands and pulling changes.
//! - [`daemon`]: requests exchanged between hooks and the background daemon.
//! - [`codec`]: length-prefixed framing for the daemon socket.

pub mod codec;
pub mod command;
pub mod daemon;
pub mod sync;
