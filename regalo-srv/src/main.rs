//! regalo-srv - Gift reveal service
//!
//! Serves the reveal UI, assigns each anonymous visitor a phrase and a video
//! variant exactly once, and drives the reveal phases per browser session.

use anyhow::{Context, Result};
use clap::Parser;
use regalo_common::config::{
    database_path, media_path, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV,
};
use regalo_common::db::{frases, init::init_database};
use regalo_common::time::SystemClock;
use regalo_srv::config::GiftSettings;
use regalo_srv::engine::{AssignmentEngine, EngineConfig, SqliteStore};
use regalo_srv::identity::SqliteIdentityProvider;
use regalo_srv::session::spawn_sweeper;
use regalo_srv::{build_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// How often abandoned sessions are looked for
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Command-line arguments for regalo-srv
#[derive(Parser, Debug)]
#[command(name = "regalo-srv")]
#[command(about = "Gift reveal service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides regalo.toml)
    #[arg(short, long, env = "REGALO_PORT")]
    port: Option<u16>,

    /// Root folder holding regalo.db and public/ media
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Bootstrap config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = match &args.config {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TomlConfig::load_default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml.logging.level.as_str().into()),
        )
        .init();

    // Build identification immediately after tracing init
    info!(
        "Starting Regalo gift service (regalo-srv) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml);
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let phrase_count = frases::count_phrases(&pool).await?;
    if phrase_count == 0 {
        warn!("Phrase catalog is empty; run seed-frases before opening to visitors");
    } else {
        info!("Phrase catalog holds {} phrases", phrase_count);
    }

    let settings = GiftSettings::load(&pool)
        .await
        .context("Failed to load runtime settings")?;
    info!(
        "Policies: variant={:?} catalog_miss={:?} gate={:?}",
        settings.variant_policy, settings.on_catalog_miss, settings.gate
    );
    info!(
        "Sessions: stream grace {:?}, ttl {:?}",
        settings.stream_grace, settings.session_ttl
    );
    let session_ttl = settings.session_ttl;

    let engine = Arc::new(AssignmentEngine::with_sqlite(
        SqliteStore::new(pool.clone()),
        EngineConfig::from(&settings),
    ));
    let identities = Arc::new(SqliteIdentityProvider::new(pool.clone()));

    let state = AppState::new(engine, identities, settings, Arc::new(SystemClock));
    let sessions = state.sessions.clone();
    let sweeper = spawn_sweeper(sessions.clone(), state.clock.clone(), session_ttl, SWEEP_PERIOD);

    let media_dir = media_path(&root_folder);
    if !media_dir.exists() {
        warn!("Media folder {} not found; videos and images will 404", media_dir.display());
    }
    let app = build_router(state, &media_dir);

    let port = args.port.unwrap_or(toml.port);
    let addr: SocketAddr = format!("{}:{}", toml.host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", toml.host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("regalo-srv listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    sessions.end_all().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
