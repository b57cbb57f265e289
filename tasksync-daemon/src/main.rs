//! `tasksyncd` -- batches hook commands, pushes them, and keeps the cache fresh.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default socket
//! tasksyncd
//!
//! # Custom socket, without contacting the remote service
//! tasksyncd --socket /tmp/tasksync.sock --dry-run
//! ```

use clap::Parser;
use tasksync::provider::Provider;
use tasksync::store::CacheStore;
use tasksync::transport::{HttpTransport, RecordingTransport, SyncTransport};
use tasksync_daemon::config::{DaemonCliArgs, DaemonConfig};
use tasksync_daemon::server::{DaemonError, Server, Timing};
use tasksync_daemon::writeback::TaskCommand;

#[tokio::main]
async fn main() {
    let cli = DaemonCliArgs::parse();

    let config = match DaemonConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.base.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let result = if config.dry_run {
        tracing::info!("dry run: batches are recorded, not sent");
        serve(&config, RecordingTransport::new()).await
    } else {
        let token = config.base.api_token.clone().unwrap_or_default();
        match HttpTransport::new(&config.base.api_url, token, config.base.request_timeout) {
            Ok(transport) => serve(&config, transport).await,
            Err(e) => {
                tracing::error!(error = %e, "invalid remote settings");
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "daemon failed");
        std::process::exit(1);
    }
}

async fn serve<T: SyncTransport>(config: &DaemonConfig, transport: T) -> Result<(), DaemonError> {
    let store = CacheStore::load(&config.base.cache_dir)?;
    let provider = Provider::new(store, transport, config.base.sync.clone());
    let timing = Timing {
        flush_interval: config.base.flush_interval,
        max_batch_age: config.base.max_batch_age,
        connection_timeout: config.base.connection_timeout,
    };
    let server = Server::bind(
        &config.base.socket_path,
        provider,
        TaskCommand::new(&config.task_bin),
        timing,
    )
    .await?;
    server.run().await;
    Ok(())
}
