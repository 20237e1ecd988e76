//! dsk-daemon entry point.
//!
//! Loads config and secrets, wires the collaborators, starts the localhost
//! status server and runs the reconciliation loop until Ctrl-C.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use dsk_config::{load_layered_yaml, report_unused_keys, resolve_secrets, UnusedKeyPolicy};
use dsk_daemon::{
    routes,
    runner::{self, IterationOutcome, LoopSettings},
    state,
};
use dsk_publisher::{BskyClient, HttpLinkPreviewer};
use dsk_reconcile::{Collaborators, ReconcileEngine};
use dsk_source::HttpDisturbanceSource;
use dsk_store::FileCheckpointStore;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "dsk-daemon")]
#[command(about = "Mirrors official transit disturbance updates as threaded posts", long_about = None)]
struct Args {
    /// Layered config paths in merge order
    #[arg(long = "config", required = true)]
    config_paths: Vec<String>,

    /// Run a single iteration and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Status server bind address
    #[arg(long, env = "DSK_DAEMON_ADDR", default_value = "127.0.0.1:8898")]
    status_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let args = Args::parse();

    let path_refs: Vec<&str> = args.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(key = %ptr, "config key is not read by dsk-daemon");
    }

    let bot = loaded.bot()?;
    let creds = resolve_secrets(&loaded.config_json)?;

    let publisher = Arc::new(BskyClient::new(
        &bot.publisher.host,
        &creds.handle,
        &creds.app_password,
    ));
    publisher
        .connect()
        .await
        .context("PUBLISHER_CONNECT_FAILED: could not establish a session")?;
    info!(handle = %creds.handle, "publisher session established");

    let collab = Collaborators {
        source: Arc::new(HttpDisturbanceSource::new(&bot.feed.endpoint)),
        publisher,
        previewer: Arc::new(HttpLinkPreviewer::new()),
        store: Arc::new(FileCheckpointStore::new(&bot.store.checkpoint_path)),
    };
    let mut engine = ReconcileEngine::load(collab, bot.content_builder()?)
        .context("CHECKPOINT_LOAD_FAILED")?;

    let shared = Arc::new(state::AppState::new());
    shared
        .set_config(&loaded.config_hash, engine.checkpoint().len())
        .await;

    if args.once {
        return match runner::run_once(&mut engine, bot.iteration_timeout(), &shared).await {
            IterationOutcome::Completed(_) => Ok(()),
            IterationOutcome::Failed(e) => Err(anyhow::Error::new(e).context("ITERATION_FAILED")),
            IterationOutcome::TimedOut(t) => {
                anyhow::bail!("ITERATION_TIMEOUT after {}s", t.as_secs())
            }
        };
    }

    let app = routes::build_app(Arc::clone(&shared));

    let listener = tokio::net::TcpListener::bind(args.status_addr)
        .await
        .with_context(|| format!("failed to bind status server on {}", args.status_addr))?;
    info!("dsk-daemon status server on http://{}", args.status_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "status server stopped");
        }
    });

    let settings = LoopSettings {
        interval: bot.interval(),
        iteration_timeout: bot.iteration_timeout(),
    };
    runner::run_loop(engine, settings, shared, shutdown_signal()).await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the loop runs until killed.
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
