//! Encore daemon - offline media cache and playback sync
use anyhow::Context;
use clap::{Parser, Subcommand};
use encore_cache::{spawn_cleanup_task, CacheControl, CacheControlHandle};
use encore_core::{DownloadId, PlaybackSnapshot};
use encore_daemon::{probe, DaemonConfig, Services, SnapshotRouter};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long the final playback sync may take on shutdown
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tracks listed by `stats`
const FREQUENT_TRACKS_LIMIT: u32 = 10;

#[derive(Parser)]
#[command(name = "encore-daemon")]
#[command(about = "Encore offline media cache and playback sync", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ENCORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cache and sync services, reading playback snapshots from stdin
    Run,
    /// Show cache usage and listening statistics
    Stats,
    /// Remove every cached track
    Clear,
    /// Request a server-side download
    Download {
        /// Source URL
        url: String,
        /// Title shown while the download is pending
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List locally queued downloads
    Downloads,
    /// Drop a locally queued download
    CancelDownload {
        /// Local queue id
        id: String,
    },
    /// Submit queued downloads now
    SyncDownloads,
    /// Show the playback session stored on the server
    Resume,
    /// Delete the playback session stored on the server
    ForgetSession,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = DaemonConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let services = Services::open(&config)
        .await
        .context("Failed to start services")?;

    match cli.command {
        Commands::Run => run(services).await?,
        Commands::Stats => stats(&services).await?,
        Commands::Clear => {
            let count = services.store.clear().await?;
            println!("Removed {count} cached tracks");
        }
        Commands::Download { url, title } => {
            let outcome = services.downloads.enqueue(&url, title).await?;
            print_json(&outcome)?;
        }
        Commands::Downloads => {
            let pending = services.downloads.list_pending().await?;
            print_json(&pending)?;
        }
        Commands::CancelDownload { id } => {
            if services.downloads.remove(&DownloadId::new(id.clone())).await? {
                println!("Removed {id}");
            } else {
                anyhow::bail!("No queued download with id {id}");
            }
        }
        Commands::SyncDownloads => {
            let summary = services.downloads.trigger_sync().await?;
            println!(
                "Submitted {}, failed {}{}",
                summary.submitted,
                summary.failed,
                summary
                    .skipped
                    .map(|reason| format!(" (skipped: {reason:?})"))
                    .unwrap_or_default()
            );
        }
        Commands::Resume => match services.playback.fetch_remote_session().await? {
            Some(session) => print_json(&session)?,
            None => println!("No playback session stored"),
        },
        Commands::ForgetSession => {
            services.playback.clear_remote_session().await?;
            println!("Playback session cleared");
        }
    }

    Ok(())
}

async fn run(services: Services) -> anyhow::Result<()> {
    tracing::info!(server = %services.config.server.url, "Starting Encore daemon");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = vec![
        spawn_cleanup_task(
            services.store.clone(),
            services.config.cache_config().cleanup_interval,
            shutdown_rx.clone(),
        ),
        tokio::spawn(services.downloads.clone().run(shutdown_rx.clone())),
        tokio::spawn(services.playback.clone().run(shutdown_rx.clone())),
    ];

    match probe::probe_target(&services.config.server.url) {
        Some(target) => tasks.push(probe::spawn_probe_task(
            services.network.clone(),
            target,
            services.config.probe_interval(),
            shutdown_rx.clone(),
        )),
        None => tracing::warn!("Server URL has no host, connectivity probe disabled"),
    }

    let (control, control_task) = CacheControl::spawn(services.store.clone(), services.prefetcher.clone());
    let mut router = SnapshotRouter::new(
        services.playback.clone(),
        services.prefetcher.clone(),
        services.analytics.clone(),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => handle_line(&line, &mut router, &control).await?,
                None => {
                    tracing::info!("Input closed, shutting down");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    router.finish().await;
    if let Some(final_sync) = services.playback.teardown() {
        let _ = tokio::time::timeout(TEARDOWN_GRACE, final_sync).await;
    }

    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    drop(control);
    let _ = control_task.await;

    tracing::info!("Encore daemon stopped");
    Ok(())
}

/// Route one input line: tagged cache-control requests are answered on
/// stdout, anything else must be a playback snapshot
async fn handle_line(
    line: &str,
    router: &mut SnapshotRouter,
    control: &CacheControlHandle,
) -> anyhow::Result<()> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed input line");
            return Ok(());
        }
    };

    if value.get("type").is_some() {
        let response = match control.request_json(line).await {
            Ok(response) => serde_json::to_string(&response)?,
            Err(e) => serde_json::json!({ "type": "error", "message": e.to_string() }).to_string(),
        };
        let mut stdout = tokio::io::stdout();
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        return Ok(());
    }

    match serde_json::from_value::<PlaybackSnapshot>(value) {
        Ok(snapshot) => {
            let routed = router.handle(snapshot).await;
            tracing::debug!(
                sync = ?routed.sync,
                prefetching = routed.prefetch_started.len(),
                "Snapshot routed"
            );
        }
        Err(e) => tracing::warn!(error = %e, "Ignoring invalid playback snapshot"),
    }
    Ok(())
}

async fn stats(services: &Services) -> anyhow::Result<()> {
    let stats = services.store.stats().await?;
    let frequent = services.analytics.frequently_played(FREQUENT_TRACKS_LIMIT).await?;

    println!("Cached tracks: {} / {}", stats.count, services.config.cache.max_entries);
    println!(
        "Cache size:    {:.1} MB / {:.1} MB",
        stats.total_bytes as f64 / 1_048_576.0,
        services.config.cache.max_cache_bytes as f64 / 1_048_576.0
    );
    if let Some(oldest) = stats.oldest_cached_at {
        println!("Oldest entry:  {}", oldest.to_rfc3339());
    }
    if !frequent.is_empty() {
        println!("Frequently played:");
        for id in frequent {
            println!("  {id}");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
