//! `tasksync` -- host hooks and daemon control.
//!
//! Installed as the host task manager's `on-add` and `on-modify` hooks.
//! Hooks hand their task lines to the `tasksyncd` daemon when it is
//! running, and otherwise translate and push the change themselves.
//!
//! ```bash
//! # Hook scripts
//! tasksync on-add
//! tasksync on-modify
//!
//! # Refresh the cache of remote projects, sections, labels and items
//! tasksync sync [--full]
//!
//! # Daemon control
//! tasksync start
//! tasksync status
//! tasksync stop
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::process::{ExitCode, Stdio};

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use tasksync::client::{ClientError, DaemonClient};
use tasksync::config::{CliArgs, CliCommand, CommonArgs, Config};
use tasksync::hooks::{self, HookError, HookOutput};
use tasksync::provider::{Provider, ProviderError};
use tasksync::store::{CacheStore, StoreError};
use tasksync::transport::{HttpTransport, TransportError};
use tasksync_proto::daemon::{DaemonRequest, DaemonResponse};

/// Exit code the host treats as "hook failed".
const EXIT_FAILURE: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match Config::load(&cli.common) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let _guard = init_logging(&config.log_level, &config.log_file);

    match cli.command {
        CliCommand::OnAdd { direct } => run_hook(&config, HookKind::Add, direct).await,
        CliCommand::OnModify { direct } => run_hook(&config, HookKind::Modify, direct).await,
        CliCommand::Sync { full, direct } => sync(&config, full, direct).await,
        CliCommand::Start => start_daemon(&cli.common, &config),
        CliCommand::Stop => stop_daemon(&config).await,
        CliCommand::Status => daemon_status(&config).await,
    }
}

/// Initialize file-based logging (stdout belongs to the host tool).
///
/// Returns a `WorkerGuard` that must be held until exit to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, log_path: &Path) -> Option<WorkerGuard> {
    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

#[derive(Debug, Clone, Copy)]
enum HookKind {
    Add,
    Modify,
}

impl HookKind {
    const fn line_count(self) -> usize {
        match self {
            Self::Add => 1,
            Self::Modify => 2,
        }
    }
}

/// Prints the task line and feedback the host expects from a hook.
fn emit(task_line: &str, feedback: &str) {
    let mut stdout = io::stdout().lock();
    // A closed stdout leaves nothing to report to.
    let _ = writeln!(stdout, "{task_line}");
    if !feedback.is_empty() {
        let _ = writeln!(stdout, "{feedback}");
    }
}

async fn run_hook(config: &Config, kind: HookKind, direct: bool) -> ExitCode {
    let lines = match hooks::read_lines(io::stdin().lock(), kind.line_count()) {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(error = %e, "failed to read hook input");
            eprintln!("tasksync: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    // On failure the host gets back the line it would have stored anyway.
    let passthrough = lines.last().cloned().unwrap_or_default();

    if !direct {
        let request = match kind {
            HookKind::Add => DaemonRequest::OnAdd {
                task: passthrough.clone(),
            },
            HookKind::Modify => DaemonRequest::OnModify {
                old: lines[0].clone(),
                new: passthrough.clone(),
            },
        };
        let client = DaemonClient::new(&config.socket_path, config.connection_timeout);
        match client.request(&request).await {
            Ok(DaemonResponse::Feedback { task, message }) => {
                emit(&task, &message);
                return ExitCode::SUCCESS;
            }
            Ok(DaemonResponse::Error { reason }) => {
                tracing::error!(%reason, "daemon rejected hook request");
                emit(&passthrough, &format!("Todoist: {reason}"));
                return ExitCode::from(EXIT_FAILURE);
            }
            Ok(other) => {
                tracing::error!(response = ?other, "unexpected daemon response");
                emit(&passthrough, "Todoist: unexpected response from tasksyncd");
                return ExitCode::from(EXIT_FAILURE);
            }
            Err(ClientError::Unavailable(path)) => {
                tracing::info!(path = %path.display(), "daemon not running, pushing directly");
            }
            Err(e) => {
                tracing::error!(error = %e, "daemon request failed");
                emit(&passthrough, &format!("Todoist: {e}"));
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    }

    match run_direct(config, kind, &lines).await {
        Ok(output) => {
            emit(&output.task_json(), &output.feedback);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "hook failed");
            emit(&passthrough, &format!("Todoist: {e}"));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn direct_provider(config: &Config) -> Result<Provider<CacheStore, HttpTransport>, DirectError> {
    let store = CacheStore::load(&config.cache_dir)?;
    let token = config.api_token.clone().unwrap_or_default();
    let transport = HttpTransport::new(&config.api_url, token, config.request_timeout)?;
    Ok(Provider::new(store, transport, config.sync.clone()))
}

/// Translates and pushes one hook event without the daemon.
async fn run_direct(config: &Config, kind: HookKind, lines: &[String]) -> Result<HookOutput, DirectError> {
    let mut provider = direct_provider(config)?;

    let mut output = match (kind, lines) {
        (HookKind::Add, [task]) => hooks::on_add(&mut provider, task)?,
        (HookKind::Modify, [old, new]) => hooks::on_modify(&mut provider, old, new)?,
        _ => {
            return Err(HookError::MissingInput {
                expected: kind.line_count(),
                got: lines.len(),
            }
            .into());
        }
    };

    let outcome = provider.push().await?;
    output.apply_writebacks(&outcome.writebacks);
    if outcome.pushed > 0
        && let Err(e) = provider.pull(false).await
    {
        // The push went through; a stale cache only costs a lookup miss.
        tracing::warn!(error = %e, "cache refresh after push failed");
    }
    Ok(output)
}

#[derive(Debug, thiserror::Error)]
enum DirectError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

async fn sync(config: &Config, full: bool, direct: bool) -> ExitCode {
    if !direct {
        // The daemon pushes and pulls before it answers.
        let timeout = config.connection_timeout + config.request_timeout * 2;
        let client = DaemonClient::new(&config.socket_path, timeout);
        match client.request(&DaemonRequest::Sync { full }).await {
            Ok(DaemonResponse::Synced { changed }) => {
                println!("Todoist: {changed} cached objects updated");
                return ExitCode::SUCCESS;
            }
            Ok(DaemonResponse::Error { reason }) => {
                eprintln!("tasksyncd: {reason}");
                return ExitCode::from(EXIT_FAILURE);
            }
            Ok(other) => {
                eprintln!("unexpected response: {other:?}");
                return ExitCode::from(EXIT_FAILURE);
            }
            Err(ClientError::Unavailable(path)) => {
                tracing::info!(path = %path.display(), "daemon not running, syncing directly");
            }
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    }

    let pulled = match direct_provider(config) {
        Ok(mut provider) => provider.pull(full).await.map_err(DirectError::from),
        Err(e) => Err(e),
    };
    match pulled {
        Ok(changed) => {
            println!("Todoist: {changed} cached objects updated");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "sync failed");
            eprintln!("tasksync: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn start_daemon(common: &CommonArgs, config: &Config) -> ExitCode {
    let program = std::env::current_exe()
        .map(|exe| exe.with_file_name("tasksyncd"))
        .ok()
        .filter(|path| path.exists())
        .unwrap_or_else(|| "tasksyncd".into());

    let mut command = std::process::Command::new(&program);
    command
        .arg("--socket")
        .arg(&config.socket_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(path) = &common.config {
        command.arg("--config").arg(path);
    }

    match command.spawn() {
        Ok(child) => {
            tracing::info!(pid = child.id(), program = %program.display(), "spawned daemon");
            println!("tasksyncd started (pid {})", child.id());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to start {}: {e}", program.display());
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn stop_daemon(config: &Config) -> ExitCode {
    let client = DaemonClient::new(&config.socket_path, config.connection_timeout);
    match client.request(&DaemonRequest::Stop).await {
        Ok(DaemonResponse::Stopping) => {
            println!("tasksyncd stopping");
            ExitCode::SUCCESS
        }
        Ok(other) => {
            eprintln!("unexpected response: {other:?}");
            ExitCode::from(EXIT_FAILURE)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn daemon_status(config: &Config) -> ExitCode {
    let client = DaemonClient::new(&config.socket_path, config.connection_timeout);
    match client.request(&DaemonRequest::Status).await {
        Ok(DaemonResponse::Status { pid, pending }) => {
            println!("tasksyncd running (pid {pid}, {pending} pending commands)");
            ExitCode::SUCCESS
        }
        Ok(other) => {
            eprintln!("unexpected response: {other:?}");
            ExitCode::from(EXIT_FAILURE)
        }
        Err(ClientError::Unavailable(_)) => {
            println!("tasksyncd not running");
            ExitCode::from(EXIT_FAILURE)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
