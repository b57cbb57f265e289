//! Configuration for the `tasksyncd` daemon.
//!
//! Shares the layered `tasksync` configuration (CLI > env > TOML file >
//! defaults) and adds the options that only the daemon has.

use std::path::PathBuf;

use tasksync::config::{CommonArgs, Config, ConfigError};

/// CLI arguments for the daemon.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Batches tasksync hook commands and pushes them when idle")]
pub struct DaemonCliArgs {
    /// Options shared with `tasksync`.
    #[command(flatten)]
    pub common: CommonArgs,

    /// Host task manager executable used to write remote ids back.
    #[arg(long, env = "TASKSYNC_TASK_BIN", default_value = "task")]
    pub task_bin: PathBuf,

    /// Record batches in memory instead of sending them.
    #[arg(long)]
    pub dry_run: bool,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Shared configuration.
    pub base: Config,
    /// Host task manager executable.
    pub task_bin: PathBuf,
    /// Skip the remote service.
    pub dry_run: bool,
}

impl DaemonConfig {
    /// Load configuration from CLI args, env vars and the config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or a resolved value is invalid.
    pub fn load(cli: &DaemonCliArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            base: Config::load(&cli.common)?,
            task_bin: cli.task_bin.clone(),
            dry_run: cli.dry_run,
        })
    }
}
