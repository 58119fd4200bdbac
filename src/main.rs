use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};

use crate::config::{GatewayConfig, Limits};
use crate::dispatch::Dispatcher;
use crate::gateway::FileGateway;
use crate::logging::init_logging;
use crate::request::CommandKind;

mod allowed;
mod batch;
mod config;
mod dispatch;
mod download;
mod error;
mod extract;
mod format;
mod fs_ops;
mod gateway;
mod lenient;
mod logging;
mod mime;
mod path;
mod readers;
mod request;
mod search;
mod trash;
mod unique;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Allowed directories. Empty means every path is accepted.
    #[arg(value_name = "DIR", num_args = 0.., env = "ALLOWED_DIRECTORIES", value_delimiter = ',')]
    allowed_dirs: Vec<PathBuf>,

    /// Largest file (bytes) that may be read, written or copied. 0 = default (20 MiB).
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = 0)]
    max_file_size: u64,

    /// Cap on entries returned by ListDirectory. 0 = default (1000).
    #[arg(long, env = "MAX_DIRECTORY_ITEMS", default_value_t = 0)]
    max_directory_items: usize,

    /// Cap on SearchFiles results. 0 = default (100).
    #[arg(long, env = "MAX_SEARCH_RESULTS", default_value_t = 0)]
    max_search_results: usize,

    /// Verbose logging.
    #[arg(long, env = "DEBUG_MODE", default_value_t = false)]
    debug: bool,

    /// Allow SearchFiles to descend and CopyFile to copy directories.
    #[arg(
        long,
        env = "ENABLE_RECURSIVE_OPERATIONS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    recursive: bool,

    /// Include dot-files in listings and searches unless a request says otherwise.
    #[arg(long, env = "ENABLE_HIDDEN_FILES", default_value_t = false)]
    show_hidden: bool,

    /// Where WebReadFile and DownloadFile store fetched files.
    #[arg(long, env = "DOWNLOAD_DIRECTORY", default_value = config::DEFAULT_DOWNLOAD_DIR)]
    download_dir: PathBuf,

    /// Move deleted items into this directory instead of the platform trash.
    #[arg(long, env = "TRASH_DIRECTORY")]
    trash_dir: Option<PathBuf>,

    /// HTTP connect timeout in seconds.
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout_secs: u64,

    /// Write logs to a file instead of stderr (default name: file-gateway.log).
    #[arg(
        short = 'l',
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "file-gateway.log"
    )]
    log: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> GatewayConfig {
        GatewayConfig {
            allowed_dirs: self.allowed_dirs,
            limits: Limits::new(
                self.max_file_size,
                self.max_directory_items,
                self.max_search_results,
            ),
            debug: self.debug,
            recursive: self.recursive,
            show_hidden: self.show_hidden,
            download_dir: self.download_dir,
            trash_dir: self.trash_dir,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let mut args = Args::parse();
    init_logging(args.debug, args.log.take().as_deref())?;

    let config = args.into_config();
    info!(
        allowed = ?config.allowed_dirs,
        limits = ?config.limits,
        debug = config.debug,
        recursive = config.recursive,
        show_hidden = config.show_hidden,
        "file gateway starting"
    );
    if config.allowed_dirs.is_empty() {
        tracing::warn!("no allowed directories configured; all paths are accessible");
    }
    info!(
        commands = ?CommandKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>(),
        "ready"
    );

    let dispatcher = Dispatcher::new(FileGateway::new(config)?);
    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();

    tokio::select! {
        res = dispatcher.serve(input, output) => {
            if let Err(err) = res {
                error!("stdio transport failed: {err}");
                return Err(err.into());
            }
        }
        _ = shutdown_signal() => info!("shutdown signal received"),
    }

    let pending = dispatcher.gateway().downloads().in_flight();
    if !pending.is_empty() {
        info!(count = pending.len(), "abandoning unfinished downloads");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
