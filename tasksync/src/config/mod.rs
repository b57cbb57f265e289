//! Configuration for `tasksync` and `tasksyncd`.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasksync/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;

use crate::provider::SyncSettings;
use crate::translate::DEFAULT_PROJECT;
use crate::transport::http::DEFAULT_API_URL;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A configured zone name is not a known IANA zone.
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    /// A value is out of range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Config key.
        key: &'static str,
        /// What was wrong.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    remote: RemoteFileConfig,
    cache: CacheFileConfig,
    daemon: DaemonFileConfig,
    sync: SyncFileConfig,
    log: LogFileConfig,
}

/// `[remote]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RemoteFileConfig {
    api_url: Option<String>,
    api_token: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[cache]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CacheFileConfig {
    dir: Option<PathBuf>,
}

/// `[daemon]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DaemonFileConfig {
    socket_path: Option<PathBuf>,
    flush_interval_secs: Option<u64>,
    max_batch_age_secs: Option<u64>,
    connection_timeout_secs: Option<u64>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    timezone: Option<String>,
    default_project: Option<String>,
}

/// `[log]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LogFileConfig {
    level: Option<String>,
    file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // -- Remote --
    /// Sync endpoint URL.
    pub api_url: String,
    /// API token; required only when pushing.
    pub api_token: Option<String>,
    /// Timeout for one Sync request.
    pub request_timeout: Duration,

    // -- Cache --
    /// Directory holding the cached remote collections.
    pub cache_dir: PathBuf,

    // -- Daemon --
    /// Daemon socket path.
    pub socket_path: PathBuf,
    /// Idle time after which the daemon pushes buffered commands.
    pub flush_interval: Duration,
    /// Age of the oldest buffered command after which the daemon pushes
    /// even while requests keep arriving.
    pub max_batch_age: Duration,
    /// Bound on one client connection's I/O.
    pub connection_timeout: Duration,

    // -- Sync --
    /// Zone and default project used by translation.
    pub sync: SyncSettings,

    // -- Log --
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log file for hook invocations.
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(30),
            cache_dir: default_cache_dir(),
            socket_path: default_socket_path(),
            flush_interval: Duration::from_secs(10),
            max_batch_age: Duration::from_secs(60),
            connection_timeout: Duration::from_secs(5),
            sync: SyncSettings {
                timezone: Tz::UTC,
                default_project: DEFAULT_PROJECT.to_string(),
            },
            log_level: "info".to_string(),
            log_file: std::env::temp_dir().join("tasksync.log"),
        }
    }
}

impl Config {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/tasksync/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or a resolved value is invalid.
    pub fn load(cli: &CommonArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file, std::env::var("TZ").ok().as_deref())
    }

    /// Resolve a `Config` from CLI args, a parsed config file and the
    /// process `TZ` value.
    ///
    /// Priority: CLI > file > `TZ` > default for the zone; CLI > file >
    /// default for everything else. Separated from `load()` to enable unit
    /// testing without CLI parsing or process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit zone name is unknown or an
    /// interval is zero.
    pub fn resolve(
        cli: &CommonArgs,
        file: &ConfigFile,
        tz_env: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timezone = match cli.timezone.as_deref().or(file.sync.timezone.as_deref()) {
            Some(name) => parse_zone(name)?,
            // `TZ` often holds a path (`:/etc/localtime`); only a bare zone name counts.
            None => tz_env
                .and_then(|name| name.parse::<Tz>().ok())
                .unwrap_or(defaults.sync.timezone),
        };

        let flush_interval = file
            .daemon
            .flush_interval_secs
            .map_or(Ok(defaults.flush_interval), |s| {
                positive_secs("daemon.flush_interval_secs", s)
            })?;
        let max_batch_age = file
            .daemon
            .max_batch_age_secs
            .map_or(Ok(defaults.max_batch_age), |s| {
                positive_secs("daemon.max_batch_age_secs", s)
            })?;
        let connection_timeout = file
            .daemon
            .connection_timeout_secs
            .map_or(Ok(defaults.connection_timeout), |s| {
                positive_secs("daemon.connection_timeout_secs", s)
            })?;

        Ok(Self {
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.remote.api_url.clone())
                .unwrap_or(defaults.api_url),
            api_token: cli
                .api_token
                .clone()
                .or_else(|| file.remote.api_token.clone()),
            request_timeout: file
                .remote
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            cache_dir: cli
                .cache_dir
                .clone()
                .or_else(|| file.cache.dir.clone())
                .unwrap_or(defaults.cache_dir),
            socket_path: cli
                .socket
                .clone()
                .or_else(|| file.daemon.socket_path.clone())
                .unwrap_or(defaults.socket_path),
            flush_interval,
            max_batch_age,
            connection_timeout,
            sync: SyncSettings {
                timezone,
                default_project: file
                    .sync
                    .default_project
                    .clone()
                    .unwrap_or(defaults.sync.default_project),
            },
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.log.level.clone())
                .unwrap_or(defaults.log_level),
            log_file: cli
                .log_file
                .clone()
                .or_else(|| file.log.file.clone())
                .unwrap_or(defaults.log_file),
        })
    }
}

/// Arguments shared by `tasksync` and `tasksyncd`.
///
/// Environment variables are supported via `env` attributes.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct CommonArgs {
    /// Path to config file (default: `~/.config/tasksync/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Sync endpoint URL.
    #[arg(long, env = "TASKSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// API token for the remote service.
    #[arg(long, env = "TODOIST_API_TOKEN", hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// Directory holding the cached remote collections.
    #[arg(long, env = "TASKSYNC_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Daemon socket path.
    #[arg(long, env = "TASKSYNC_SOCKET", global = true)]
    pub socket: Option<PathBuf>,

    /// Zone for tasks that do not record one (IANA name).
    #[arg(long, env = "TASKSYNC_TIMEZONE", global = true)]
    pub timezone: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TASKSYNC_LOG", global = true)]
    pub log_level: Option<String>,

    /// Path to log file (default: `$TMPDIR/tasksync.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// CLI arguments of the `tasksync` binary.
#[derive(clap::Parser, Debug)]
#[command(version, about = "Sync local task edits to a remote task service")]
pub struct CliArgs {
    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,

    /// What to do.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// `tasksync` subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Run as the host's on-add hook (one task line on stdin).
    OnAdd {
        /// Push directly instead of going through the daemon.
        #[arg(long)]
        direct: bool,
    },
    /// Run as the host's on-modify hook (two task lines on stdin).
    OnModify {
        /// Push directly instead of going through the daemon.
        #[arg(long)]
        direct: bool,
    },
    /// Start the daemon in the background.
    Start,
    /// Push anything buffered and refresh the cache of remote objects.
    Sync {
        /// Fetch every object instead of the changes since the last sync.
        #[arg(long)]
        full: bool,
        /// Sync directly instead of going through the daemon.
        #[arg(long)]
        direct: bool,
    },
    /// Ask the daemon to flush and exit.
    Stop,
    /// Print daemon status.
    Status,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_zone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}

fn positive_secs(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(
        || std::env::temp_dir().join("tasksync-cache"),
        |dir| dir.join("tasksync"),
    )
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tasksync.sock")
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("tasksync").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
