//! ntree - interactive browser over a cached notebook hierarchy

mod handler;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use notecache::{
    CacheConfig, CancellationToken, ChannelProgress, FetchConfig, NoProgress, Notebooks,
    ProgressSink, TracingProgress,
};
use notestore::{DataSource, SnapshotSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::handler::{Command, CommandHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// No progress output
    Off,
    /// Progress lines on stderr
    Bar,
    /// Progress through the log
    Log,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hierarchy snapshot (JSON)
    #[arg(short, long, env = "NTREE_SNAPSHOT")]
    snapshot: String,

    /// Root to select on startup (name or id)
    #[arg(short, long, env = "NTREE_ROOT")]
    root: Option<String>,

    /// Freshness window for child lists, searches and lookups
    #[arg(long, default_value_t = 300, env = "NTREE_TTL_SECS")]
    ttl_secs: u64,

    /// Container levels to expand when fetching a hierarchy
    #[arg(long, default_value_t = notecache::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// How to show progress of slow fetches
    #[arg(long, value_enum, default_value_t = ProgressMode::Bar)]
    progress: ProgressMode,

    /// Run a single command instead of reading commands from stdin
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting ntree v{}", env!("CARGO_PKG_VERSION"));
    let source = load_source(&args.snapshot)?;
    info!("Snapshot loaded from {}", args.snapshot);

    let notebooks = Arc::new(Notebooks::new(
        source,
        CacheConfig {
            ttl: Duration::from_secs(args.ttl_secs),
        },
        FetchConfig {
            max_depth: args.max_depth,
        },
    ));

    let handler = CommandHandler::new(Arc::clone(&notebooks), progress_sink(args.progress));

    if let Some(root) = &args.root {
        let root = notebooks
            .select_root_by(root, &CancellationToken::new())
            .await
            .with_context(|| format!("Failed to select root '{}'", root))?;
        info!("Selected {} ({})", root.display_name, root.id);
    }

    if !args.command.is_empty() {
        let cmd = Command::parse(&args.command.join(" "))?;
        println!("{}", run(&handler, cmd).await?);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(&line) {
            Ok(cmd) => match run(&handler, cmd).await {
                Ok(out) => println!("{}", out),
                Err(e) => error!("{:#}", e),
            },
            Err(e) => warn!("Parse error: {}", e),
        }
    }

    Ok(())
}

/// Run one command, cancelling it on Ctrl+C
async fn run(handler: &CommandHandler, cmd: Command) -> Result<String> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    let result = handler.handle(cmd, &cancel).await;
    watcher.abort();
    result
}

fn load_source<P: AsRef<Path>>(path: P) -> Result<Arc<dyn DataSource>> {
    let path = path.as_ref();
    let source = SnapshotSource::open(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    Ok(Arc::new(source))
}

fn progress_sink(mode: ProgressMode) -> Arc<dyn ProgressSink> {
    match mode {
        ProgressMode::Off => Arc::new(NoProgress),
        ProgressMode::Log => Arc::new(TracingProgress),
        ProgressMode::Bar => {
            let (sink, mut rx) = ChannelProgress::new();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    eprintln!("[{:>3}/{}] {}", event.current, event.total, event.message);
                }
            });
            Arc::new(sink)
        }
    }
}
