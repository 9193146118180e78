//! Tunelog Service - tuner reading ingest, live dashboard and CSV/XLSX logging.
//!
//! Run with: `cargo run -p tunelog-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use tunelog_service::{AppState, Config, LogRenderer, RefreshLoop, api, ws};
use tunelog_store::{DurableLog, ReadingStore, analyze_csv};

/// Tunelog Service - HTTP ingest and live dashboard for tuner readings.
#[derive(Parser, Debug)]
#[command(name = "tunelog-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Directory holding the CSV and workbook logs (overrides config).
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Number of readings kept in memory (overrides config).
    #[arg(long, global = true)]
    max_points: Option<usize>,

    /// Disable the periodic refresh loop.
    #[arg(long, global = true)]
    no_refresh: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run,

    /// Print an analysis of the CSV log.
    Report {
        /// CSV log to analyze (defaults to the configured log).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();

    match args.command.take() {
        Some(Command::Report { csv, json }) => print_report(&args, csv, json),
        Some(Command::Run) | None => run_server(args).await,
    }
}

/// Load the configuration file and apply CLI overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(max_points) = args.max_points {
        config.history.max_points = max_points;
    }
    if args.no_refresh {
        config.refresh.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn print_report(args: &Args, csv: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let path = match csv {
        Some(path) => path,
        None => load_config(args)?.storage.log_paths().csv_path(),
    };

    let report = analyze_csv(&path).with_context(|| format!("reading {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tunelog_service=info".parse()?)
                .add_directive("tunelog_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    // Open both logs
    let paths = config.storage.log_paths();
    info!("Opening logs in {}", paths.dir.display());
    let log = DurableLog::initialize(&paths)?;

    let store = ReadingStore::new(config.history.max_points);
    let state = AppState::new(store, log, config.clone());

    // Start the refresh loop
    let refresh_task = if config.refresh.enabled {
        Some(
            RefreshLoop::new(
                state.snapshots.clone(),
                LogRenderer::new(),
                config.refresh.interval(),
                Arc::clone(&state.refresh),
            )
            .spawn(),
        )
    } else {
        info!("Refresh loop disabled");
        None
    };

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.refresh.signal_stop();
    if let Some(task) = refresh_task {
        task.await?;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
